//! Error types for index operations.

use crate::document::Shape;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors that can occur while indexing, matching or persisting documents.
///
/// Per-document validation outcomes during batch index/update are not errors;
/// they are reported through [`crate::indexer::BatchReport`].
#[derive(Debug, Error)]
pub enum IndexError {
    /// Document id not present in the store.
    #[error("document not found: `{id}`")]
    NotFound { id: String },

    /// No persisted snapshot exists at the expected location.
    #[error("snapshot not found: {path:?}")]
    SnapshotNotFound { path: PathBuf },

    /// Embedding shape disagrees with the shape it is compared against.
    #[error("embedding shape {found} of document `{id}` does not match expected shape {expected}")]
    ShapeMismatch {
        id: String,
        expected: Shape,
        found: Shape,
    },

    /// A document taking part in a distance computation has no embedding.
    #[error("document `{id}` has no embedding")]
    MissingEmbedding { id: String },

    /// Raw append of an id that is already stored.
    #[error("document already exists: `{id}`")]
    DuplicateId { id: String },

    /// A recognized runtime parameter has an unusable value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Embedding values do not fit the declared shape.
    #[error("invalid embedding shape: {0}")]
    InvalidShape(String),

    /// Unparseable traversal path.
    #[error("invalid traversal path: {0}")]
    InvalidTraversal(String),

    /// Workspace already holds the artifact of a different backend.
    #[error("workspace holds a `{found}` index, cannot open it as `{expected}`")]
    WorkspaceConflict { found: String, expected: String },

    /// On-disk data failed an integrity check.
    #[error("corrupt index data: {0}")]
    Corrupt(String),

    /// Encoding or decoding a record failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl IndexError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// True for a missing document id or a missing snapshot file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::SnapshotNotFound { .. })
    }

    /// True for errors caused by non-uniform or absent embeddings.
    pub fn is_shape_error(&self) -> bool {
        matches!(self, Self::ShapeMismatch { .. } | Self::MissingEmbedding { .. })
    }
}

impl From<bincode::Error> for IndexError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
