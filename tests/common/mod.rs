//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], a [`MetadataService`] over an in-memory SQLite
//! cache driven by a [`ManualClock`], with an [`InMemoryLibrary`] attached,
//! and [`ScriptedProvider`], a provider whose answers and call counts are
//! controlled by the test.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metaforged::cache::{Cache, SqliteStore};
use metaforged::config::Config;
use metaforged::fuzzy::LocalFilesystem;
use metaforged::metadata::{InMemoryLibrary, Provider, ProviderRegistry};
use metaforged::service::MetadataService;
use metaforged_common::{Error, ManualClock, ProviderQuery, Record, Result};
use parking_lot::Mutex;

/// Test harness wrapping a fully-constructed [`MetadataService`].
pub struct TestHarness {
    pub service: MetadataService,
    pub clock: Arc<ManualClock>,
    pub library: Arc<InMemoryLibrary>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_providers(Config::default(), Vec::new())
    }

    /// Register `providers` (in order) next to the `local` library provider.
    pub fn with_providers(config: Config, providers: Vec<Arc<dyn Provider>>) -> Self {
        let clock = Arc::new(ManualClock::default());
        let store =
            Arc::new(SqliteStore::in_memory(clock.clone()).expect("failed to open in-memory cache"));

        let mut registry = ProviderRegistry::new();
        for provider in providers {
            registry.register(provider);
        }

        let library = Arc::new(InMemoryLibrary::new());
        let service = MetadataService::new(config, store, registry, Arc::new(LocalFilesystem))
            .with_library(library.clone());

        Self {
            service,
            clock,
            library,
        }
    }

    pub fn cache(&self) -> &Cache {
        self.service.cache()
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

/// Canned reply of a [`ScriptedProvider`].
#[derive(Clone)]
pub enum Answer {
    Found(Record),
    Empty,
    Unavailable,
}

/// Provider returning a scripted answer, optionally after a delay, and
/// counting calls and concurrent invocations.
pub struct ScriptedProvider {
    name: &'static str,
    answer: Mutex<Answer>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(name: &'static str, answer: Answer) -> Arc<Self> {
        Self::build(name, answer, None)
    }

    pub fn found(name: &'static str, record: Record) -> Arc<Self> {
        Self::new(name, Answer::Found(record))
    }

    pub fn empty(name: &'static str) -> Arc<Self> {
        Self::new(name, Answer::Empty)
    }

    pub fn unavailable(name: &'static str) -> Arc<Self> {
        Self::new(name, Answer::Unavailable)
    }

    pub fn slow(name: &'static str, record: Record, delay: Duration) -> Arc<Self> {
        Self::build(name, Answer::Found(record), Some(delay))
    }

    fn build(name: &'static str, answer: Answer, delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            name,
            answer: Mutex::new(answer),
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn set_answer(&self, answer: Answer) {
        *self.answer.lock() = answer;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping `query` calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn query(&self, _query: &ProviderQuery) -> Result<Record> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let answer = self.answer.lock().clone();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match answer {
            Answer::Found(record) => Ok(record),
            Answer::Empty => Ok(Record::new()),
            Answer::Unavailable => Err(Error::unavailable(format!("{} is down", self.name))),
        }
    }
}

/// Upcast for registries and chains.
pub fn dyn_provider(provider: &Arc<ScriptedProvider>) -> Arc<dyn Provider> {
    provider.clone()
}
