//! # docindex-core
//!
//! Persistent document vector index with exact (brute-force) nearest-neighbor
//! matching. Documents are stored in insertion order under unique ids in one of
//! four backends: in memory, whole-store blob snapshots, a memory-mapped record
//! log, or an SQLite table.
//!
//! [`SimpleIndexer`] is the entry point and exposes the named operations
//! `index`, `search`, `delete`, `update`, `fill_embedding`, `dump`, `load` and
//! `clear`.

/// Configuration constants and runtime [`IndexerConfig`].
pub mod config;
/// Core document types: `Document`, `Embedding`, `Shape` and `MetadataValue`.
pub mod document;
/// Library error type.
pub mod error;
/// The `SimpleIndexer` facade.
pub mod indexer;
/// Brute-force matcher: metrics, parameters and traversal paths.
pub mod matcher;
/// CRC-checked whole-store snapshots with atomic writes.
pub mod persistence;
/// Reference embedding shape tracking.
pub mod shape;
/// Entity stores behind a common trait.
pub mod store;

pub use config::{Backend, IndexerConfig};
pub use document::{Content, Document, Embedding, MetadataValue, Shape};
pub use error::{IndexError, Result};
pub use indexer::{BatchReport, IndexerStats, Parameters, SimpleIndexer, Skipped};
pub use matcher::{MatchArgs, MatchStats, Metric};
pub use shape::SkipReason;
pub use store::EntityStore;
