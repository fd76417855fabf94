//! Integration tests for rate-limited, memoized provider calls.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{dyn_provider, ScriptedProvider, TestHarness};
use metaforged::config::Config;
use metaforged::resolver::ResolveMode;
use metaforged_common::{MediaKind, ProviderQuery, Record};

#[tokio::test(start_paused = true)]
async fn concurrent_identical_lookups_reach_the_provider_once() {
    let provider = ScriptedProvider::slow(
        "tmdb",
        Record::new().with("title", "Alien"),
        Duration::from_millis(300),
    );
    let h = Arc::new(TestHarness::with_providers(
        Config::default(),
        vec![dyn_provider(&provider)],
    ));
    let query = ProviderQuery::new(MediaKind::Movie, "Alien");

    let tasks: Vec<_> = (0..3)
        .map(|_| {
            let h = h.clone();
            let query = query.clone();
            tokio::spawn(async move {
                h.service
                    .resolve_named(&query, &["tmdb"], h.service.options(ResolveMode::FirstMatch))
                    .await
            })
        })
        .collect();

    for task in tasks {
        let resolution = task.await.unwrap().unwrap();
        assert_eq!(resolution.record.get_str("title"), Some("Alien"));
    }
    assert_eq!(provider.calls(), 1);
    assert_eq!(provider.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn different_queries_are_not_serialized() {
    let provider = ScriptedProvider::slow(
        "tmdb",
        Record::new().with("title", "any"),
        Duration::from_millis(300),
    );
    let h = Arc::new(TestHarness::with_providers(
        Config::default(),
        vec![dyn_provider(&provider)],
    ));

    let tasks: Vec<_> = ["Alien", "Aliens"]
        .into_iter()
        .map(|title| {
            let h = h.clone();
            tokio::spawn(async move {
                let query = ProviderQuery::new(MediaKind::Movie, title);
                h.service
                    .resolve_named(&query, &["tmdb"], h.service.options(ResolveMode::FirstMatch))
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(provider.calls(), 2);
    assert_eq!(provider.max_in_flight(), 2);
}

#[tokio::test(start_paused = true)]
async fn bounded_wait_lets_a_stuck_caller_through() {
    let h = TestHarness::new();
    let limiter = h.service.limiter().clone();

    let held = limiter.acquire("host:api.example.org").await;
    let start = tokio::time::Instant::now();
    let second = limiter.acquire("host:api.example.org").await;

    assert!(second.forced());
    // Default settings: 100 polls of 50ms.
    assert!(start.elapsed() >= Duration::from_secs(5));
    drop(held);
    assert!(limiter.is_held("host:api.example.org"));
    drop(second);
    assert!(!limiter.is_held("host:api.example.org"));
}
