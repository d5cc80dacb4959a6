//! Entity stores: insertion-ordered documents keyed by unique id.
//!
//! Every backend implements [`EntityStore`] with the same contracts:
//! - ids are unique; [`EntityStore::append`] of a stored id fails with `DuplicateId`
//! - [`EntityStore::set`] overwrites in place (position preserved) and fails
//!   with `NotFound` when the id is absent
//! - deleting an absent id is a no-op
//! - iteration follows insertion order and always reflects the current state
//!
//! The backend is selected by [`crate::config::Backend`] through [`open_store`].

/// LRU cache of recently touched embeddings for the memmap backend.
pub mod buffer_pool;
/// In-memory `Vec` + id→position map.
pub mod memory;
/// Memory-mapped append-only record log.
pub mod memmap;
/// SQLite table.
pub mod table;

pub use buffer_pool::{BufferPool, BufferPoolStats};
pub use memmap::MemmapStore;
pub use memory::MemoryStore;
pub use table::TableStore;

use crate::config::{Backend, IndexerConfig};
use crate::document::{Document, Embedding};
use crate::error::{IndexError, Result};
use std::borrow::Cow;
use std::sync::Arc;

/// Lazy, finite iterator over stored documents in insertion order.
pub type DocumentIter<'a> = Box<dyn Iterator<Item = Result<Document>> + 'a>;

/// Ordered document storage keyed by id.
pub trait EntityStore: Send {
    /// Backend kind of this store.
    fn backend(&self) -> Backend;

    /// Number of stored documents.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, id: &str) -> bool;

    /// Fetch a document by id. Fails with `NotFound` if absent.
    fn get(&self, id: &str) -> Result<Document>;

    /// Fetch only the embedding of a stored document. Fails with `NotFound` if absent.
    fn embedding(&self, id: &str) -> Result<Option<Embedding>> {
        Ok(self.get(id)?.embedding)
    }

    /// Every stored id with its embedding, in insertion order.
    fn embeddings(&self) -> Result<Vec<(String, Option<Arc<Embedding>>)>> {
        self.iter()
            .map(|doc| doc.map(|doc| (doc.id, doc.embedding.map(Arc::new))))
            .collect()
    }

    /// Whether [`EntityStore::embeddings`] is served from a cache and is cheaper
    /// than [`EntityStore::snapshot`].
    fn caches_embeddings(&self) -> bool {
        false
    }

    /// Append a document at the end. Fails with `DuplicateId` if the id is stored.
    fn append(&mut self, doc: Document) -> Result<()>;

    /// Overwrite the stored document with the same id, keeping its position.
    /// Fails with `NotFound` if absent.
    fn set(&mut self, doc: Document) -> Result<()>;

    /// Remove a document. Returns `false` when the id was not stored.
    fn delete(&mut self, id: &str) -> Result<bool>;

    /// Remove every listed id that is stored. Returns how many were removed.
    fn delete_many(&mut self, ids: &[String]) -> Result<usize> {
        let mut removed = 0;
        for id in ids {
            if self.delete(id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove every document, including from the backing storage.
    fn clear(&mut self) -> Result<()>;

    /// Stored ids in insertion order.
    fn ids(&self) -> Result<Vec<String>>;

    /// Iterate over stored documents in insertion order.
    fn iter(&self) -> DocumentIter<'_>;

    /// All documents in insertion order. In-memory backends borrow instead of copying.
    fn snapshot(&self) -> Result<Cow<'_, [Document]>> {
        self.iter().collect::<Result<Vec<_>>>().map(Cow::Owned)
    }

    /// Make pending writes durable.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Open the store selected by `config.backend` inside `config.workspace`.
///
/// Creates the workspace directory if needed. Refuses a workspace that already
/// holds another backend's artifact. The blob backend opens empty here; its
/// snapshot is loaded by [`crate::persistence`].
pub fn open_store(config: &IndexerConfig) -> Result<Box<dyn EntityStore>> {
    ensure_workspace(config)?;
    let store: Box<dyn EntityStore> = match config.backend {
        Backend::Memory | Backend::Blob => Box::new(MemoryStore::new()),
        Backend::Memmap => Box::new(MemmapStore::open(
            &config.workspace,
            config.buffer_pool_capacity,
            config.sync_writes,
            config.compact_ratio,
        )?),
        Backend::Table => Box::new(TableStore::open(&config.workspace)?),
    };
    tracing::info!(
        "Opened {} store in {:?} ({} documents)",
        config.backend,
        config.workspace,
        store.len()
    );
    Ok(store)
}

fn ensure_workspace(config: &IndexerConfig) -> Result<()> {
    if config.backend == Backend::Memory {
        return Ok(());
    }
    std::fs::create_dir_all(&config.workspace)?;
    for other in Backend::ALL {
        if other == config.backend {
            continue;
        }
        if let Some(name) = other.artifact_name() {
            if config.workspace.join(name).exists() {
                return Err(IndexError::WorkspaceConflict {
                    found: other.to_string(),
                    expected: config.backend.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backends(dir: &TempDir) -> Vec<Box<dyn EntityStore>> {
        [Backend::Memory, Backend::Memmap, Backend::Table]
            .into_iter()
            .map(|backend| {
                let ws = dir.path().join(backend.as_str());
                open_store(&IndexerConfig::new(ws).with_backend(backend)).unwrap()
            })
            .collect()
    }

    fn doc(id: &str, x: f32) -> Document {
        Document::with_id(id).embedding(vec![x, 1.0 - x])
    }

    // ── Shared contract, exercised for every backend ───────────────────

    #[test]
    fn test_append_get_and_duplicate() {
        let dir = TempDir::new().unwrap();
        for mut store in backends(&dir) {
            store.append(doc("a", 0.0)).unwrap();
            store.append(doc("b", 1.0)).unwrap();
            assert_eq!(store.len(), 2, "{}", store.backend());
            assert_eq!(store.get("b").unwrap(), doc("b", 1.0));
            let err = store.append(doc("a", 0.5)).unwrap_err();
            assert!(matches!(err, IndexError::DuplicateId { .. }));
            assert!(store.get("zzz").unwrap_err().is_not_found());
        }
    }

    #[test]
    fn test_set_preserves_position_and_rejects_absent() {
        let dir = TempDir::new().unwrap();
        for mut store in backends(&dir) {
            for (i, id) in ["a", "b", "c"].iter().enumerate() {
                store.append(doc(id, i as f32)).unwrap();
            }
            store.set(doc("a", 9.0)).unwrap();
            assert_eq!(store.ids().unwrap(), vec!["a", "b", "c"], "{}", store.backend());
            assert_eq!(store.get("a").unwrap(), doc("a", 9.0));
            assert!(store.set(doc("x", 1.0)).unwrap_err().is_not_found());
            assert_eq!(store.len(), 3);
        }
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        for mut store in backends(&dir) {
            for (i, id) in ["a", "b", "c", "d"].iter().enumerate() {
                store.append(doc(id, i as f32)).unwrap();
            }
            let ids = vec!["b".to_string(), "nope".to_string()];
            assert_eq!(store.delete_many(&ids).unwrap(), 1);
            assert_eq!(store.delete_many(&ids).unwrap(), 0);
            assert_eq!(store.delete_many(&[]).unwrap(), 0);
            assert_eq!(store.ids().unwrap(), vec!["a", "c", "d"], "{}", store.backend());
            assert_eq!(store.embedding("d").unwrap(), doc("d", 3.0).embedding);
        }
    }

    #[test]
    fn test_iteration_reflects_mutations() {
        let dir = TempDir::new().unwrap();
        for mut store in backends(&dir) {
            store.append(doc("a", 0.0)).unwrap();
            store.append(doc("b", 1.0)).unwrap();
            let first: Vec<String> = store.iter().map(|d| d.unwrap().id).collect();
            assert_eq!(first, vec!["a", "b"]);

            store.delete("a").unwrap();
            store.append(doc("c", 2.0)).unwrap();
            let second: Vec<String> = store.iter().map(|d| d.unwrap().id).collect();
            assert_eq!(second, vec!["b", "c"], "{}", store.backend());
            assert_eq!(store.snapshot().unwrap().len(), 2);
        }
    }

    #[test]
    fn test_clear_empties_store() {
        let dir = TempDir::new().unwrap();
        for mut store in backends(&dir) {
            store.append(doc("a", 0.0)).unwrap();
            store.clear().unwrap();
            assert!(store.is_empty(), "{}", store.backend());
            assert!(!store.contains("a"));
            store.append(doc("a", 0.0)).unwrap();
            assert_eq!(store.len(), 1);
        }
    }

    // ── Workspace ──────────────────────────────────────────────────────

    #[test]
    fn test_workspace_conflict_detected() {
        let dir = TempDir::new().unwrap();
        let config = IndexerConfig::new(dir.path()).with_backend(Backend::Table);
        drop(open_store(&config).unwrap());
        let other = IndexerConfig::new(dir.path()).with_backend(Backend::Memmap);
        let err = open_store(&other).err().unwrap();
        assert!(matches!(err, IndexError::WorkspaceConflict { .. }));
    }
}
