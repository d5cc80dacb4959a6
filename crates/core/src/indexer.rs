//! The indexer facade: the named operations over one workspace.
//!
//! [`SimpleIndexer`] owns an [`EntityStore`] chosen by configuration, the
//! [`ShapeGuard`] of that store and the default [`MatchArgs`]. Calls are
//! synchronous and take `&mut self`, so at most one mutation is in flight.

use crate::config::{Backend, IndexerConfig, BLOB_FILE_NAME};
use crate::document::{Document, Shape};
use crate::error::{IndexError, Result};
use crate::matcher::{Candidate, MatchArgs, MatchSettings, MatchStats, Matcher};
use crate::persistence;
use crate::shape::{ShapeGuard, SkipReason};
use crate::store::{open_store, EntityStore, MemoryStore};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Flat runtime parameter map passed with a call.
pub type Parameters = Map<String, Value>;

/// A document left out of a batch, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub id: String,
    pub reason: SkipReason,
}

/// Per-document outcome of a batch index, update or dump merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Documents written to the store.
    pub applied: usize,
    pub skipped: Vec<Skipped>,
}

impl BatchReport {
    fn skip(&mut self, op: &str, id: String, reason: SkipReason) {
        tracing::warn!("{} - skipping doc {}: {}", op, id, reason);
        self.skipped.push(Skipped { id, reason });
    }

    /// True when no document was skipped.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Summary of an indexer's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexerStats {
    pub backend: Backend,
    pub workspace: PathBuf,
    pub documents: usize,
    pub expected_shape: Option<Shape>,
}

pub struct SimpleIndexer {
    config: IndexerConfig,
    store: Box<dyn EntityStore>,
    shape: ShapeGuard,
}

impl SimpleIndexer {
    /// Open the workspace. A blob snapshot is loaded if present; log and table
    /// backends reopen their existing artifact.
    pub fn new(config: IndexerConfig) -> Result<Self> {
        config.validate()?;
        let store = open_store(&config)?;
        let mut indexer = Self {
            config,
            store,
            shape: ShapeGuard::new(),
        };
        if indexer.config.backend == Backend::Blob {
            indexer.load()?;
        }
        Ok(indexer)
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn backend(&self) -> Backend {
        self.config.backend
    }

    pub fn store(&self) -> &dyn EntityStore {
        self.store.as_ref()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn get(&self, id: &str) -> Result<Document> {
        self.store.get(id)
    }

    /// All stored documents in insertion order.
    pub fn documents(&self) -> Result<Vec<Document>> {
        Ok(self.store.snapshot()?.into_owned())
    }

    /// Reference embedding shape of the store, if any document has an embedding.
    pub fn expected_shape(&mut self) -> Result<Option<Shape>> {
        self.shape.expected_shape(self.store.as_ref())
    }

    pub fn stats(&mut self) -> Result<IndexerStats> {
        Ok(IndexerStats {
            backend: self.config.backend,
            workspace: self.config.workspace.clone(),
            documents: self.store.len(),
            expected_shape: self.expected_shape()?,
        })
    }

    fn snapshot_path(&self) -> PathBuf {
        self.config.workspace.join(BLOB_FILE_NAME)
    }

    /// Append documents. Ids already stored are skipped; with shape validation
    /// on, documents without an embedding or with a foreign shape are skipped too.
    pub fn index(&mut self, docs: Vec<Document>) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for doc in docs {
            if self.store.contains(&doc.id) {
                report.skip("index", doc.id, SkipReason::DuplicateId);
                continue;
            }
            if self.config.validate_shapes {
                if let Some(reason) = self.shape.check(&doc, self.store.as_ref())? {
                    report.skip("index", doc.id, reason);
                    continue;
                }
            }
            self.store.append(doc)?;
            report.applied += 1;
        }
        tracing::debug!(
            "index - appended {} docs, skipped {}",
            report.applied,
            report.skipped.len()
        );
        Ok(report)
    }

    /// Overwrite stored documents in place. Absent ids are skipped; the store
    /// never grows.
    pub fn update(&mut self, docs: Vec<Document>) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for doc in docs {
            if !self.store.contains(&doc.id) {
                report.skip("update", doc.id, SkipReason::NotFound);
                continue;
            }
            if self.config.validate_shapes {
                if let Some(reason) = self.shape.check(&doc, self.store.as_ref())? {
                    report.skip("update", doc.id, reason);
                    continue;
                }
            }
            self.store.set(doc)?;
            report.applied += 1;
        }
        Ok(report)
    }

    /// Delete the ids listed under the `ids` parameter. A missing or null
    /// `ids` is a no-op; any other non-list value is `InvalidParameter`.
    pub fn delete(&mut self, parameters: &Parameters) -> Result<usize> {
        let ids: Vec<String> = match parameters.get("ids") {
            None | Some(Value::Null) => return Ok(0),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                IndexError::InvalidParameter(format!("`ids` must be a list of strings: {}", e))
            })?,
        };
        self.delete_ids(&ids)
    }

    /// Remove every listed id that is stored. Returns how many were removed.
    pub fn delete_ids(&mut self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let removed = self.store.delete_many(ids)?;
        self.shape.invalidate();
        tracing::info!("delete - removed {} of {} requested ids", removed, ids.len());
        Ok(removed)
    }

    /// Copy the stored embedding onto each document by id.
    ///
    /// Every id is resolved before any document is touched; the first absent
    /// id fails the whole call with `NotFound`.
    pub fn fill_embedding(&self, docs: &mut [Document]) -> Result<()> {
        let embeddings = docs
            .iter()
            .map(|doc| self.store.embedding(&doc.id))
            .collect::<Result<Vec<_>>>()?;
        for (doc, embedding) in docs.iter_mut().zip(embeddings) {
            doc.embedding = embedding;
        }
        Ok(())
    }

    /// Match `docs` against the store, replacing their match lists.
    ///
    /// `parameters` override the configured match defaults for this call only.
    /// A shape error triggers one purge of invalid stored documents and one
    /// retry; a second failure is returned as is.
    pub fn search(
        &mut self,
        docs: &mut [Document],
        parameters: Option<&Parameters>,
    ) -> Result<MatchStats> {
        if docs.is_empty() {
            return Ok(MatchStats::default());
        }
        let settings = self.resolve_settings(parameters)?;
        match self.match_store(docs, &settings) {
            Err(e) if e.is_shape_error() => {
                tracing::warn!("search - {}, purging invalid documents and retrying", e);
                let purged = self.shape.purge_invalid(self.store.as_mut())?;
                tracing::info!("search - purged {} invalid documents", purged.len());
                self.match_store(docs, &settings)
            }
            other => other,
        }
    }

    fn resolve_settings(&self, parameters: Option<&Parameters>) -> Result<MatchSettings> {
        let overrides = match parameters {
            Some(parameters) => MatchArgs::from_parameters(parameters)?,
            None => MatchArgs::default(),
        };
        self.config.match_args.merge(&overrides).resolve()
    }

    fn match_store(&self, docs: &mut [Document], settings: &MatchSettings) -> Result<MatchStats> {
        let matcher = Matcher::new(settings);
        let root_only = matches!(settings.candidate_paths.as_slice(), [path] if path.is_root());
        if root_only && self.store.caches_embeddings() {
            // Score on cached embeddings, decode full records for kept matches only.
            let embeddings = self.store.embeddings()?;
            let pool: Vec<Candidate<'_>> = embeddings
                .iter()
                .map(|(id, embedding)| Candidate {
                    id: id.as_str(),
                    embedding: embedding.as_deref(),
                })
                .collect();
            return matcher.run_with(docs, &pool, |pos| self.store.get(&embeddings[pos].0));
        }
        let candidates = self.store.snapshot()?;
        matcher.run(docs, &candidates)
    }

    /// Persist the store, after merging `extra` into it (existing ids
    /// overwritten in place, new ids appended).
    ///
    /// Blob mode rewrites the snapshot. Log and table modes are already
    /// durable; they only flush (the log is compacted).
    pub fn dump(&mut self, extra: Option<Vec<Document>>) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for doc in extra.unwrap_or_default() {
            if self.config.validate_shapes {
                if let Some(reason) = self.shape.check(&doc, self.store.as_ref())? {
                    report.skip("dump", doc.id, reason);
                    continue;
                }
            }
            if self.store.contains(&doc.id) {
                self.store.set(doc)?;
            } else {
                self.store.append(doc)?;
            }
            report.applied += 1;
        }

        match self.config.backend {
            Backend::Blob => {
                let path = self.snapshot_path();
                persistence::save_snapshot(&path, &self.store.snapshot()?)?;
            }
            Backend::Memory => tracing::debug!("dump - memory backend, nothing to persist"),
            Backend::Memmap | Backend::Table => self.store.flush()?,
        }
        Ok(report)
    }

    /// Replace the in-memory store with the blob snapshot. An absent snapshot
    /// leaves the store unchanged. Log and table backends load at construction,
    /// so this is a no-op for them.
    pub fn load(&mut self) -> Result<()> {
        if self.config.backend != Backend::Blob {
            tracing::debug!("load - {} backend loads at open", self.config.backend);
            return Ok(());
        }
        let path = self.snapshot_path();
        match persistence::load_snapshot(&path) {
            Ok(docs) => {
                self.store = Box::new(MemoryStore::from_documents(docs)?);
                self.shape.invalidate();
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::info!("load - no snapshot at {:?}, starting empty", path);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Empty the store and its backing artifact.
    pub fn clear(&mut self) -> Result<()> {
        self.store.clear()?;
        self.shape.invalidate();
        if self.config.backend == Backend::Blob {
            persistence::remove_snapshot(&self.snapshot_path())?;
        }
        tracing::info!("clear - {} store emptied", self.config.backend);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_indexer() -> SimpleIndexer {
        SimpleIndexer::new(IndexerConfig::new("unused").with_backend(Backend::Memory)).unwrap()
    }

    fn params(value: Value) -> Parameters {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_index_reports_skips() {
        let mut indexer = memory_indexer();
        let report = indexer
            .index(vec![
                Document::with_id("a").embedding(vec![1.0, 0.0]),
                Document::with_id("a").embedding(vec![0.0, 1.0]),
                Document::with_id("b"),
                Document::with_id("c").embedding(vec![1.0]),
            ])
            .unwrap();
        assert_eq!(report.applied, 1);
        let reasons: Vec<_> = report.skipped.iter().map(|s| &s.reason).collect();
        assert_eq!(reasons[0], &SkipReason::DuplicateId);
        assert_eq!(reasons[1], &SkipReason::MissingEmbedding);
        assert!(matches!(reasons[2], SkipReason::ShapeMismatch { .. }));
        assert!(!report.is_clean());
    }

    #[test]
    fn test_non_validating_appends_everything_new() {
        let config = IndexerConfig::new("unused")
            .with_backend(Backend::Memory)
            .with_validate_shapes(false);
        let mut indexer = SimpleIndexer::new(config).unwrap();
        let report = indexer
            .index(vec![
                Document::with_id("a").embedding(vec![1.0, 0.0]),
                Document::with_id("b"),
                Document::with_id("c").embedding(vec![1.0]),
            ])
            .unwrap();
        assert_eq!(report.applied, 3);
        assert_eq!(indexer.len(), 3);
    }

    #[test]
    fn test_delete_parameter_forms() {
        let mut indexer = memory_indexer();
        indexer
            .index(vec![
                Document::with_id("a").embedding(vec![1.0]),
                Document::with_id("b").embedding(vec![2.0]),
            ])
            .unwrap();
        assert_eq!(indexer.delete(&Parameters::new()).unwrap(), 0);
        assert_eq!(indexer.delete(&params(json!({"ids": null}))).unwrap(), 0);
        assert!(matches!(
            indexer.delete(&params(json!({"ids": "a"}))),
            Err(IndexError::InvalidParameter(_))
        ));
        assert_eq!(indexer.delete(&params(json!({"ids": ["a", "zz"]}))).unwrap(), 1);
        assert_eq!(indexer.len(), 1);
    }

    #[test]
    fn test_delete_resets_reference_shape() {
        let config = IndexerConfig::new("unused")
            .with_backend(Backend::Memory)
            .with_validate_shapes(false);
        let mut indexer = SimpleIndexer::new(config).unwrap();
        indexer
            .index(vec![
                Document::with_id("a").embedding(vec![1.0, 0.0]),
                Document::with_id("b").embedding(vec![1.0, 0.0, 0.0]),
            ])
            .unwrap();
        assert_eq!(indexer.expected_shape().unwrap(), Some(Shape(vec![2])));
        indexer.delete_ids(&["a".to_string()]).unwrap();
        assert_eq!(indexer.expected_shape().unwrap(), Some(Shape(vec![3])));
    }

    #[test]
    fn test_search_rejects_bad_parameter() {
        let mut indexer = memory_indexer();
        indexer
            .index(vec![Document::with_id("a").embedding(vec![1.0])])
            .unwrap();
        let mut queries = vec![Document::with_id("q").embedding(vec![1.0])];
        let err = indexer
            .search(&mut queries, Some(&params(json!({"metric": "hamming"}))))
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidParameter(_)));
        assert!(queries[0].matches.is_empty());
    }

    #[test]
    fn test_stats_reports_shape() {
        let mut indexer = memory_indexer();
        indexer
            .index(vec![Document::with_id("a").embedding(vec![1.0, 2.0, 3.0])])
            .unwrap();
        let stats = indexer.stats().unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.backend, Backend::Memory);
        assert_eq!(stats.expected_shape, Some(Shape(vec![3])));
    }
}
