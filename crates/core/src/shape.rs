//! Embedding shape consistency for a single store.
//!
//! The reference shape is the shape of the first stored document that has an
//! embedding. It is cached on the guard, dropped by [`ShapeGuard::invalidate`]
//! after anything that may remove that document, and rescanned lazily.

use crate::document::{Document, Shape};
use crate::error::Result;
use crate::store::EntityStore;
use std::fmt;

/// Why a document was left out of a batch index or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The document has no embedding.
    MissingEmbedding,
    /// The embedding shape differs from the store's reference shape.
    ShapeMismatch { expected: Shape, found: Shape },
    /// Index of an id that is already stored.
    DuplicateId,
    /// Update of an id that is not stored.
    NotFound,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingEmbedding => write!(f, "embedding is None"),
            SkipReason::ShapeMismatch { expected, found } => write!(
                f,
                "embedding shape {} does not match the expected embedding shape {}",
                found, expected
            ),
            SkipReason::DuplicateId => write!(f, "id already exists in storage"),
            SkipReason::NotFound => write!(f, "id does not exist in storage"),
        }
    }
}

/// Tracks the expected embedding shape of one store.
#[derive(Debug, Default)]
pub struct ShapeGuard {
    reference: Option<Shape>,
}

impl ShapeGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached reference shape without scanning.
    pub fn cached(&self) -> Option<&Shape> {
        self.reference.as_ref()
    }

    /// Returns the reference shape, scanning `store` for the first embedded
    /// document when nothing is cached. `None` when no document has an embedding.
    pub fn expected_shape(&mut self, store: &dyn EntityStore) -> Result<Option<Shape>> {
        if self.reference.is_none() {
            for doc in store.iter() {
                if let Some(shape) = doc?.embedding_shape() {
                    self.reference = Some(shape.clone());
                    break;
                }
            }
        }
        Ok(self.reference.clone())
    }

    /// Checks `doc` against the reference shape.
    ///
    /// Returns `None` when the document is usable. With no reference yet, a
    /// usable document's shape becomes the reference.
    pub fn check(&mut self, doc: &Document, store: &dyn EntityStore) -> Result<Option<SkipReason>> {
        let Some(found) = doc.embedding_shape() else {
            return Ok(Some(SkipReason::MissingEmbedding));
        };
        match self.expected_shape(store)? {
            Some(expected) if &expected != found => Ok(Some(SkipReason::ShapeMismatch {
                expected,
                found: found.clone(),
            })),
            Some(_) => Ok(None),
            None => {
                self.reference = Some(found.clone());
                Ok(None)
            }
        }
    }

    /// True iff `doc` has an embedding of the reference shape.
    pub fn validate(&mut self, doc: &Document, store: &dyn EntityStore) -> Result<bool> {
        Ok(self.check(doc, store)?.is_none())
    }

    /// Forget the cached shape. Call after every delete.
    pub fn invalidate(&mut self) {
        self.reference = None;
    }

    /// Delete every stored document whose embedding is missing or not of the
    /// reference shape. Returns the removed ids.
    pub fn purge_invalid(&mut self, store: &mut dyn EntityStore) -> Result<Vec<String>> {
        let expected = self.expected_shape(store)?;
        let mut stale = Vec::new();
        for doc in store.iter() {
            let doc = doc?;
            if doc.embedding_shape() != expected.as_ref() || doc.embedding.is_none() {
                tracing::warn!(
                    "filtering storage - embedding of doc {} is either None or has mismatched embedding shape, deleting it",
                    doc.id
                );
                stale.push(doc.id);
            }
        }
        store.delete_many(&stale)?;
        self.invalidate();
        Ok(stale)
    }
}
