//! Metaforged - metadata resolution and caching core for media centers
//!
//! This library crate exposes the core functionality for integration testing.

pub mod cache;
pub mod config;
pub mod fuzzy;
pub mod http;
pub mod memoize;
pub mod merge;
pub mod metadata;
pub mod ratelimit;
pub mod resolver;
pub mod service;
