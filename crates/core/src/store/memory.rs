//! In-memory entity store.

use crate::config::Backend;
use crate::document::{Document, Embedding};
use crate::error::{IndexError, Result};
use crate::store::{DocumentIter, EntityStore};
use std::borrow::Cow;
use std::collections::HashMap;

/// Documents in a `Vec`, with an id→position side map.
///
/// Deleting shifts later documents down by one and rewrites their positions.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    documents: Vec<Document>,
    positions: HashMap<String, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from documents in order. Fails with `DuplicateId` on repeated ids.
    pub fn from_documents(documents: Vec<Document>) -> Result<Self> {
        let mut store = Self {
            documents: Vec::with_capacity(documents.len()),
            positions: HashMap::with_capacity(documents.len()),
        };
        for doc in documents {
            store.append(doc)?;
        }
        Ok(store)
    }

    pub fn as_slice(&self) -> &[Document] {
        &self.documents
    }

    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }

    fn reindex_from(&mut self, start: usize) {
        for (pos, doc) in self.documents.iter().enumerate().skip(start) {
            self.positions.insert(doc.id.clone(), pos);
        }
    }
}

impl EntityStore for MemoryStore {
    fn backend(&self) -> Backend {
        Backend::Memory
    }

    fn len(&self) -> usize {
        self.documents.len()
    }

    fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    fn get(&self, id: &str) -> Result<Document> {
        self.positions
            .get(id)
            .map(|&pos| self.documents[pos].clone())
            .ok_or_else(|| IndexError::not_found(id))
    }

    fn embedding(&self, id: &str) -> Result<Option<Embedding>> {
        self.positions
            .get(id)
            .map(|&pos| self.documents[pos].embedding.clone())
            .ok_or_else(|| IndexError::not_found(id))
    }

    fn append(&mut self, doc: Document) -> Result<()> {
        if self.positions.contains_key(&doc.id) {
            return Err(IndexError::DuplicateId { id: doc.id });
        }
        self.positions.insert(doc.id.clone(), self.documents.len());
        self.documents.push(doc);
        Ok(())
    }

    fn set(&mut self, doc: Document) -> Result<()> {
        let pos = *self
            .positions
            .get(&doc.id)
            .ok_or_else(|| IndexError::not_found(doc.id.as_str()))?;
        self.documents[pos] = doc;
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        let Some(pos) = self.positions.remove(id) else {
            return Ok(false);
        };
        self.documents.remove(pos);
        self.reindex_from(pos);
        Ok(true)
    }

    fn delete_many(&mut self, ids: &[String]) -> Result<usize> {
        let before = self.documents.len();
        let mut removed_any = false;
        for id in ids {
            removed_any |= self.positions.remove(id.as_str()).is_some();
        }
        if !removed_any {
            return Ok(0);
        }
        // single compaction pass instead of one shift per id
        let positions = &self.positions;
        self.documents.retain(|doc| positions.contains_key(&doc.id));
        self.reindex_from(0);
        Ok(before - self.documents.len())
    }

    fn clear(&mut self) -> Result<()> {
        self.documents.clear();
        self.positions.clear();
        Ok(())
    }

    fn ids(&self) -> Result<Vec<String>> {
        Ok(self.documents.iter().map(|d| d.id.clone()).collect())
    }

    fn iter(&self) -> DocumentIter<'_> {
        Box::new(self.documents.iter().cloned().map(Ok::<_, IndexError>))
    }

    fn snapshot(&self) -> Result<Cow<'_, [Document]>> {
        Ok(Cow::Borrowed(&self.documents))
    }
}
