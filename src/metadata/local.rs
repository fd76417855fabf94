//! Adapter over the host media database.
//!
//! The host library is reached through the [`LocalDatabase`] trait: filtered
//! lookups returning records and patch updates for writing resolved artwork
//! back. [`LocalLibraryProvider`] exposes the library as an ordinary
//! provider so it can head a fallback chain, and [`InMemoryLibrary`] is a
//! self-contained implementation for tests and offline use.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use metaforged_common::text::{clean_image, normalize_name};
use metaforged_common::{Error, MediaKind, ProviderQuery, Record, Result, Scalar, Value, ART_FIELD};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Field holding a record's library id.
pub const ID_FIELD: &str = "dbid";

/// Top-level fields that hold artwork references besides the `art` record.
const IMAGE_FIELDS: &[&str] = &["thumbnail", "fanart", "thumb"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Is,
    Contains,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: String,
}

impl Condition {
    /// Case-insensitive test against `record`. List fields match when any
    /// item matches.
    pub fn matches(&self, record: &Record) -> bool {
        let Some(value) = record.get(&self.field) else {
            return false;
        };
        let wanted = normalize_name(&self.value);
        let test = |v: &Value| match v {
            Value::Scalar(s) => {
                let text = normalize_name(&s.to_string());
                match self.operator {
                    Operator::Is => text == wanted,
                    Operator::Contains => text.contains(&wanted),
                }
            }
            _ => false,
        };
        match value {
            Value::List(items) => items.iter().any(test),
            other => test(other),
        }
    }
}

/// Conjunction of conditions over one media kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub kind: MediaKind,
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            conditions: Vec::new(),
        }
    }

    pub fn is(self, field: impl Into<String>, value: impl ToString) -> Self {
        self.with(field, Operator::Is, value)
    }

    pub fn contains(self, field: impl Into<String>, value: impl ToString) -> Self {
        self.with(field, Operator::Contains, value)
    }

    fn with(mut self, field: impl Into<String>, operator: Operator, value: impl ToString) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            operator,
            value: value.to_string(),
        });
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

/// Host-managed media records.
#[async_trait]
pub trait LocalDatabase: Send + Sync {
    async fn lookup(&self, filter: &Filter) -> Result<Vec<Record>>;

    /// Replace the fields named in `patch` on record `id` of `kind`.
    async fn update(&self, kind: MediaKind, id: i64, patch: &Record) -> Result<()>;
}

/// Local library as the first link of a provider chain.
pub struct LocalLibraryProvider {
    db: Arc<dyn LocalDatabase>,
}

impl LocalLibraryProvider {
    pub fn new(db: Arc<dyn LocalDatabase>) -> Self {
        Self { db }
    }

    fn filter_for(query: &ProviderQuery) -> Filter {
        let mut filter = Filter::new(query.kind);
        if let Some(id) = query.id(ID_FIELD) {
            return filter.is(ID_FIELD, id);
        }
        filter = filter.is("title", &query.title);
        if let Some(year) = query.year {
            filter = filter.is("year", year);
        }
        if let Some(artist) = query.extra("artist") {
            filter = filter.contains("artist", artist);
        }
        filter
    }
}

#[async_trait]
impl super::Provider for LocalLibraryProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn rate_limit_key(&self, _query: &ProviderQuery) -> Option<String> {
        None
    }

    async fn query(&self, query: &ProviderQuery) -> Result<Record> {
        if query.is_blank() {
            return Ok(Record::new());
        }
        let filter = Self::filter_for(query);
        let mut records = self
            .db
            .lookup(&filter)
            .await
            .map_err(|e| Error::unavailable(format!("local library lookup failed: {e}")))?;

        debug!(query = %query.fingerprint(), hits = records.len(), "Local library lookup");
        if records.is_empty() {
            return Ok(Record::new());
        }
        let mut record = records.swap_remove(0);
        clean_artwork(&mut record);
        Ok(record)
    }
}

/// Unwrap host `image://` references in `art` and the top-level image fields.
pub fn clean_artwork(record: &mut Record) {
    for field in IMAGE_FIELDS {
        if let Some(Value::Scalar(Scalar::Text(uri))) = record.get_mut(field) {
            *uri = clean_image(uri);
        }
    }
    if let Some(Value::Record(art)) = record.get_mut(ART_FIELD) {
        for (_, value) in art.iter_mut() {
            if let Value::Scalar(Scalar::Text(uri)) = value {
                *uri = clean_image(uri);
            }
        }
    }
}

/// Write the `art` sub-record of `record` back to library item `id`.
///
/// Returns `false` without touching the database when there is no artwork.
pub async fn write_back_artwork(
    db: &dyn LocalDatabase,
    kind: MediaKind,
    id: i64,
    record: &Record,
) -> Result<bool> {
    let Some(art) = record.art().filter(|art| !art.is_empty()) else {
        return Ok(false);
    };
    let patch = Record::new().with(ART_FIELD, art.clone());
    db.update(kind, id, &patch).await?;
    debug!(%kind, id, fields = art.len(), "Wrote artwork back to library");
    Ok(true)
}

/// Thread-safe in-process library keyed by kind and id.
#[derive(Default)]
pub struct InMemoryLibrary {
    items: RwLock<BTreeMap<(MediaKind, i64), Record>>,
}

impl InMemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an item. Its `dbid` field is set to `id`.
    pub fn insert(&self, kind: MediaKind, id: i64, record: Record) {
        let record = record.with(ID_FIELD, id);
        self.items.write().insert((kind, id), record);
    }

    pub fn get(&self, kind: MediaKind, id: i64) -> Option<Record> {
        self.items.read().get(&(kind, id)).cloned()
    }
}

#[async_trait]
impl LocalDatabase for InMemoryLibrary {
    async fn lookup(&self, filter: &Filter) -> Result<Vec<Record>> {
        Ok(self
            .items
            .read()
            .iter()
            .filter(|((kind, _), record)| *kind == filter.kind && filter.matches(record))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn update(&self, kind: MediaKind, id: i64, patch: &Record) -> Result<()> {
        let mut items = self.items.write();
        let record = items
            .get_mut(&(kind, id))
            .ok_or_else(|| Error::not_found(format!("{kind} {id}")))?;
        for (field, value) in patch {
            record.insert(field.clone(), value.clone());
        }
        Ok(())
    }
}
