//! eyeprof-core: request diagnostics for the eyeprof ecosystem.
//!
//! Provides:
//! - `config`: typed application configuration and its flattened tree
//! - `snapshot`: the per-request diagnostics data model
//! - `profiler`: request-scoped collection of time, memory, files, queries, errors
//! - `memory`: process memory readers and memory ceiling parsing
//! - `gate`: viewer identity and the "should we report" decision
//! - `severity`: good/normal/bad classification of headline figures
//! - `report`: HTML rendering of a snapshot
//! - `bootstrap`: per-request module services (locale, translator, widgets)
//! - `translate`: array and store-backed translators
//! - `widgets`: widget metadata store, TTL cache and registry
//! - `session`: session values consumed by the bootstrap
//! - `error`: config, store and bootstrap error types
//! - `fmt`: shared formatting helpers (rounding, escaping, whitespace)

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod fmt;
pub mod gate;
pub mod memory;
pub mod profiler;
pub mod report;
pub mod session;
pub mod severity;
pub mod snapshot;
pub mod translate;
pub mod widgets;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
