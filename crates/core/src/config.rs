//! Configuration for docindex.
//!
//! Compile-time constants (artifact names, defaults, format magic) live at the
//! top of this module. Runtime configuration is the [`IndexerConfig`] struct,
//! built in code or loaded from a JSON file.

use crate::error::{IndexError, Result};
use crate::matcher::{MatchArgs, Metric};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File name of the whole-blob snapshot inside a workspace.
pub const BLOB_FILE_NAME: &str = "index.bin";

/// File name of the memory-mapped record log inside a workspace.
pub const MEMMAP_FILE_NAME: &str = "index.mmap";

/// File name of the SQLite table inside a workspace.
pub const TABLE_FILE_NAME: &str = "index.sqlite";

/// Suffix of the temporary file written before an atomic rename.
pub const TMP_SUFFIX: &str = "tmp";

/// Magic bytes appended before the CRC32 footer of a blob snapshot.
pub const SNAPSHOT_CRC_MAGIC: &[u8; 4] = b"DIX1";

/// Magic bytes at the start of a memmap record log, followed by a u32 format version.
pub const LOG_MAGIC: &[u8; 4] = b"DIXL";

/// Current memmap record log format version.
pub const LOG_VERSION: u32 = 1;

/// Metric used when neither the indexer defaults nor the call name one.
pub const DEFAULT_METRIC: Metric = Metric::Cosine;

/// Default number of embeddings held by the memmap buffer pool.
pub const DEFAULT_BUFFER_POOL_CAPACITY: usize = 10_000;

/// Default dead-record ratio that triggers memmap log compaction.
///
/// 0.0 = disabled. At 0.5 the log is rewritten once half of its records are
/// superseded or deleted.
pub const DEFAULT_COMPACT_RATIO: f32 = 0.5;

/// Minimum number of dead records before automatic compaction is considered.
pub const COMPACT_MIN_DEAD_RECORDS: usize = 64;

/// Storage backend of an [`crate::store::EntityStore`], fixed per workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-memory only; nothing is persisted.
    Memory,
    /// In-memory with whole-store snapshots written on dump.
    #[default]
    Blob,
    /// Memory-mapped append log, durable per mutation.
    Memmap,
    /// Embedded SQLite table, durable per mutation.
    Table,
}

impl Backend {
    pub const ALL: [Backend; 4] = [
        Backend::Memory,
        Backend::Blob,
        Backend::Memmap,
        Backend::Table,
    ];

    /// Name of the index artifact this backend keeps in the workspace.
    pub fn artifact_name(&self) -> Option<&'static str> {
        match self {
            Backend::Memory => None,
            Backend::Blob => Some(BLOB_FILE_NAME),
            Backend::Memmap => Some(MEMMAP_FILE_NAME),
            Backend::Table => Some(TABLE_FILE_NAME),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::Blob => "blob",
            Backend::Memmap => "memmap",
            Backend::Table => "table",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        Backend::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| IndexError::InvalidParameter(format!("unknown backend '{}'", s)))
    }
}

/// Runtime configuration of a [`crate::indexer::SimpleIndexer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Durable-storage directory of this index. Created if absent.
    pub workspace: PathBuf,
    pub backend: Backend,
    /// Default match arguments; per-call parameters override them.
    pub match_args: MatchArgs,
    /// Skip documents without an embedding or with a foreign shape on index/update.
    pub validate_shapes: bool,
    /// Capacity of the memmap embedding buffer pool (entries).
    pub buffer_pool_capacity: usize,
    /// fsync after every mutation in memmap mode.
    pub sync_writes: bool,
    /// Dead-record ratio that triggers memmap log compaction (0.0 = disabled).
    pub compact_ratio: f32,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("./workspace"),
            backend: Backend::default(),
            match_args: MatchArgs::default(),
            validate_shapes: true,
            buffer_pool_capacity: DEFAULT_BUFFER_POOL_CAPACITY,
            sync_writes: true,
            compact_ratio: DEFAULT_COMPACT_RATIO,
        }
    }
}

impl IndexerConfig {
    /// Default configuration rooted at `workspace`.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            ..Self::default()
        }
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_match_args(mut self, match_args: MatchArgs) -> Self {
        self.match_args = match_args;
        self
    }

    pub fn with_validate_shapes(mut self, validate: bool) -> Self {
        self.validate_shapes = validate;
        self
    }

    /// Load a configuration from a JSON file. Missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.compact_ratio) {
            return Err(IndexError::InvalidParameter(format!(
                "compact_ratio must be in [0.0, 1.0), got {}",
                self.compact_ratio
            )));
        }
        if self.buffer_pool_capacity == 0 {
            return Err(IndexError::InvalidParameter(
                "buffer_pool_capacity must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Path of this backend's artifact inside the workspace.
    pub fn artifact_path(&self) -> Option<PathBuf> {
        self.backend
            .artifact_name()
            .map(|name| self.workspace.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_roundtrip_names() {
        for backend in Backend::ALL {
            assert_eq!(backend.as_str().parse::<Backend>().unwrap(), backend);
        }
        assert!("rocksdb".parse::<Backend>().is_err());
    }

    #[test]
    fn test_artifact_names_are_distinct() {
        assert_eq!(Backend::Memory.artifact_name(), None);
        let names: Vec<_> = Backend::ALL
            .iter()
            .filter_map(|b| b.artifact_name())
            .collect();
        assert_eq!(names, vec![BLOB_FILE_NAME, MEMMAP_FILE_NAME, TABLE_FILE_NAME]);
    }

    #[test]
    fn test_config_from_json_file_fills_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"workspace": "/tmp/ws", "backend": "memmap", "match_args": {"metric": "euclidean"}}"#,
        )
        .unwrap();
        let config = IndexerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.backend, Backend::Memmap);
        assert_eq!(config.match_args.metric, Some(Metric::Euclidean));
        assert!(config.validate_shapes);
        assert_eq!(config.buffer_pool_capacity, DEFAULT_BUFFER_POOL_CAPACITY);
    }

    #[test]
    fn test_validate_rejects_out_of_range_ratio() {
        let mut config = IndexerConfig::new("/tmp/ws");
        config.compact_ratio = 1.5;
        assert!(config.validate().is_err());
        config.compact_ratio = 0.0;
        assert!(config.validate().is_ok());
    }
}
