//! Deep merge of partial records.
//!
//! `merge(base, addition)` is a field-by-field union in which `base` is
//! authoritative:
//!
//! - an empty value in `addition` is ignored;
//! - a missing or empty field in `base` takes `addition`'s value verbatim;
//! - two lists are concatenated, base order first, skipping items already
//!   present;
//! - two records are merged recursively;
//! - two differing scalars keep `base` unless the field is in the
//!   [`MergePolicy`] overwrite set;
//! - values of different kinds keep `base` and log a diagnostic.
//!
//! Feeding providers in priority order through successive merges therefore
//! lets earlier providers win scalar conflicts while every provider
//! contributes to collections.
//!
//! ```
//! use metaforged::merge::{merge, MergePolicy};
//! use metaforged_common::Record;
//!
//! let base = Record::new().with("title", "A").with("genre", vec!["x"]);
//! let addition = Record::new().with("title", "B").with("genre", vec!["y", "x"]);
//!
//! let merged = merge(&base, &addition, &MergePolicy::default());
//! assert_eq!(merged, Record::new().with("title", "A").with("genre", vec!["x", "y"]));
//! ```

use std::collections::BTreeSet;

use metaforged_common::{Record, Value};
use tracing::debug;

/// Fields whose scalar values a later record may replace.
///
/// Paths are dotted from the top-level record, e.g. `"rating"` or
/// `"art.thumb"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePolicy {
    overwrite: BTreeSet<String>,
}

impl MergePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_overwrite(mut self, path: impl Into<String>) -> Self {
        self.overwrite.insert(path.into());
        self
    }

    pub fn allows(&self, path: &str) -> bool {
        self.overwrite.contains(path)
    }
}

impl<S: Into<String>> FromIterator<S> for MergePolicy {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            overwrite: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Merge `addition` into a copy of `base`.
pub fn merge(base: &Record, addition: &Record, policy: &MergePolicy) -> Record {
    let mut merged = base.clone();
    merge_into(&mut merged, addition, policy);
    merged
}

/// Merge `addition` into `base` in place.
pub fn merge_into(base: &mut Record, addition: &Record, policy: &MergePolicy) {
    merge_record(base, addition, policy, "");
}

/// Fold `records` left to right, the first being most authoritative.
pub fn merge_all<'a, I>(records: I, policy: &MergePolicy) -> Record
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut merged = Record::new();
    for record in records {
        merge_into(&mut merged, record, policy);
    }
    merged
}

fn merge_record(base: &mut Record, addition: &Record, policy: &MergePolicy, prefix: &str) {
    for (field, value) in addition {
        if value.is_empty() {
            continue;
        }
        let path = if prefix.is_empty() {
            field.clone()
        } else {
            format!("{prefix}.{field}")
        };

        if !base.has(field) {
            base.insert(field.clone(), value.clone());
        } else if let Some(existing) = base.get_mut(field) {
            merge_value(existing, value, policy, &path);
        }
    }
}

fn merge_value(existing: &mut Value, addition: &Value, policy: &MergePolicy, path: &str) {
    match (existing, addition) {
        (Value::List(items), Value::List(more)) => {
            for item in more {
                if !items.contains(item) {
                    items.push(item.clone());
                }
            }
        }
        (Value::Record(inner), Value::Record(more)) => merge_record(inner, more, policy, path),
        (Value::Scalar(current), Value::Scalar(other)) => {
            if current != other && policy.allows(path) {
                *current = other.clone();
            }
        }
        (existing, addition) => {
            debug!(
                field = path,
                base = existing.kind(),
                addition = addition.kind(),
                "Merge type conflict, keeping base value"
            );
        }
    }
}
