//! Movie-set details aggregated from the set's member movies.
//!
//! The aggregate is cached under [`CacheKey::movie_set`] together with a
//! checksum of the members' ids and play counts, so adding a movie to the set
//! or watching one invalidates it without any explicit flush.

use std::time::Duration;

use metaforged_common::{MediaKind, Record, Result, Value, ART_FIELD};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::local::{Filter, LocalDatabase, ID_FIELD};
use crate::cache::{Cache, CacheKey};
use crate::memoize::Lookup;
use crate::merge::{merge_into, MergePolicy};

/// Field on a movie naming the set it belongs to.
pub const SET_FIELD: &str = "setid";

/// Member fields unioned into the set.
const LIST_FIELDS: &[&str] = &["genre", "studio", "country", "director", "writer", "tag"];

/// SHA-256 hex digest over the members' `id:playcount` pairs, independent of
/// member order.
pub fn members_checksum(members: &[Record]) -> String {
    let mut lines: Vec<String> = members
        .iter()
        .map(|m| format!("{}:{}", int_field(m, ID_FIELD), int_field(m, "playcount")))
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Combine member movies into one set record.
///
/// Members are taken in release order, so the earliest movie's artwork wins
/// where several provide the same art type.
pub fn aggregate_members(set_id: i64, members: &[Record]) -> Record {
    let mut sorted: Vec<&Record> = members.iter().collect();
    sorted.sort_by(|a, b| {
        int_field(a, "year")
            .cmp(&int_field(b, "year"))
            .then_with(|| a.get_str("title").cmp(&b.get_str("title")))
    });

    let policy = MergePolicy::new();
    let mut unioned = Record::new();
    let mut titles = Vec::new();
    let mut ids = Vec::new();
    let mut years = Vec::new();
    let mut runtime = 0i64;
    let mut watched = 0i64;

    for member in &sorted {
        let mut contribution = Record::new();
        for field in LIST_FIELDS {
            if let Some(value) = member.get(field) {
                contribution.insert(*field, as_list(value));
            }
        }
        if let Some(art) = member.art() {
            contribution.insert(ART_FIELD, art.clone());
        }
        merge_into(&mut unioned, &contribution, &policy);

        if let Some(title) = member.get_str("title") {
            titles.push(Value::from(title));
        }
        ids.push(Value::from(int_field(member, ID_FIELD)));
        if let Some(year) = member.get("year").and_then(Value::as_i64) {
            years.push(year);
        }
        runtime += int_field(member, "runtime");
        if int_field(member, "playcount") > 0 {
            watched += 1;
        }
    }

    let count = sorted.len() as i64;
    let mut aggregate = Record::new()
        .with(SET_FIELD, set_id)
        .with("count", count)
        .with("watched", watched)
        .with("unwatched", count - watched)
        .with("runtime", runtime)
        .with("movies", Value::List(titles))
        .with("movieids", Value::List(ids));

    if let (Some(first), Some(last)) = (years.iter().min(), years.iter().max()) {
        aggregate.insert("year", *first);
        let range = if first == last {
            first.to_string()
        } else {
            format!("{first}-{last}")
        };
        aggregate.insert("year_range", range);
    }

    merge_into(&mut aggregate, &unioned, &policy);
    aggregate
}

/// Aggregated details of movie set `set_id`.
///
/// Returns [`Lookup::NotFound`] for a set without members. Library lookup
/// failures propagate.
pub async fn movie_set_details(
    cache: &Cache,
    db: &dyn LocalDatabase,
    set_id: i64,
    ttl: Duration,
) -> Result<Lookup<Record>> {
    let members = db
        .lookup(&Filter::new(MediaKind::Movie).is(SET_FIELD, set_id))
        .await?;
    if members.is_empty() {
        debug!(set_id, "Movie set has no members");
        return Ok(Lookup::NotFound);
    }

    let checksum = members_checksum(&members);
    let key = CacheKey::movie_set(set_id);
    if let Some(cached) = cache.get::<Record>(key.as_str(), Some(&checksum)) {
        debug!(set_id, "Movie set served from cache");
        return Ok(Lookup::Found(cached));
    }

    let aggregate = aggregate_members(set_id, &members);
    cache.set(key.as_str(), &aggregate, ttl, Some(&checksum));
    debug!(set_id, members = members.len(), "Movie set aggregated");
    Ok(Lookup::Found(aggregate))
}

fn int_field(record: &Record, field: &str) -> i64 {
    record.get(field).and_then(Value::as_i64).unwrap_or(0)
}

fn as_list(value: &Value) -> Value {
    match value {
        Value::List(_) => value.clone(),
        other => Value::List(vec![other.clone()]),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::MemoryStore;
    use crate::metadata::local::InMemoryLibrary;
    use metaforged_common::ManualClock;

    const TTL: Duration = Duration::from_secs(3600);

    fn cache() -> Cache {
        Cache::new(Arc::new(MemoryStore::new(Arc::new(ManualClock::default()))))
    }

    fn library() -> InMemoryLibrary {
        let library = InMemoryLibrary::new();
        library.insert(
            MediaKind::Movie,
            11,
            Record::new()
                .with("title", "Aliens")
                .with("year", 1986)
                .with("setid", 7)
                .with("runtime", 8220)
                .with("genre", vec!["Action", "Sci-Fi"])
                .with("art", Record::new().with("poster", "aliens.jpg")),
        );
        library.insert(
            MediaKind::Movie,
            10,
            Record::new()
                .with("title", "Alien")
                .with("year", 1979)
                .with("setid", 7)
                .with("runtime", 7020)
                .with("playcount", 2)
                .with("genre", "Sci-Fi")
                .with(
                    "art",
                    Record::new()
                        .with("poster", "alien.jpg")
                        .with("fanart", "alien-fanart.jpg"),
                ),
        );
        library.insert(
            MediaKind::Movie,
            12,
            Record::new().with("title", "Heat").with("year", 1995),
        );
        library
    }

    #[test]
    fn test_aggregate_members() {
        let library = library();
        let members = vec![
            library.get(MediaKind::Movie, 11).unwrap(),
            library.get(MediaKind::Movie, 10).unwrap(),
        ];
        let set = aggregate_members(7, &members);

        assert_eq!(set.get("count"), Some(&Value::from(2)));
        assert_eq!(set.get("watched"), Some(&Value::from(1)));
        assert_eq!(set.get("unwatched"), Some(&Value::from(1)));
        assert_eq!(set.get("runtime"), Some(&Value::from(15240)));
        assert_eq!(set.get_str("year_range"), Some("1979-1986"));
        assert_eq!(set.get("movies"), Some(&Value::from(vec!["Alien", "Aliens"])));
        assert_eq!(set.get("genre"), Some(&Value::from(vec!["Sci-Fi", "Action"])));

        let art = set.art().unwrap();
        assert_eq!(art.get_str("poster"), Some("alien.jpg"));
        assert_eq!(art.get_str("fanart"), Some("alien-fanart.jpg"));
    }

    #[test]
    fn test_checksum_ignores_order_and_tracks_playcount() {
        let a = Record::new().with("dbid", 1).with("playcount", 0);
        let b = Record::new().with("dbid", 2).with("playcount", 3);
        let forward = members_checksum(&[a.clone(), b.clone()]);
        assert_eq!(forward, members_checksum(&[b, a.clone()]));
        assert_eq!(forward.len(), 64);

        let watched = Record::new().with("dbid", 2).with("playcount", 4);
        assert_ne!(forward, members_checksum(&[a, watched]));
    }

    #[tokio::test]
    async fn test_details_cached_until_members_change() {
        let cache = cache();
        let library = library();

        let first = movie_set_details(&cache, &library, 7, TTL).await.unwrap();
        assert_eq!(first.as_ref().found().unwrap().get("count"), Some(&Value::from(2)));

        // A title edit does not touch the checksum, so the cached aggregate stays.
        library
            .update(MediaKind::Movie, 11, &Record::new().with("title", "Aliens (Special Edition)"))
            .await
            .unwrap();
        let cached = movie_set_details(&cache, &library, 7, TTL).await.unwrap();
        assert_eq!(cached, first);

        // Watching a member changes the checksum.
        library
            .update(MediaKind::Movie, 11, &Record::new().with("playcount", 1))
            .await
            .unwrap();
        let fresh = movie_set_details(&cache, &library, 7, TTL)
            .await
            .unwrap()
            .found()
            .unwrap();
        assert_eq!(fresh.get("watched"), Some(&Value::from(2)));
        assert_eq!(
            fresh.get("movies"),
            Some(&Value::from(vec!["Alien", "Aliens (Special Edition)"]))
        );
    }

    #[tokio::test]
    async fn test_empty_set_is_not_found() {
        let result = movie_set_details(&cache(), &library(), 99, TTL).await.unwrap();
        assert_eq!(result, Lookup::NotFound);
    }
}
