//! SQLite-backed entity store.
//!
//! One row per document in `documents`. The `pos` column is an
//! AUTOINCREMENT key, so ordering by it gives insertion order and an
//! `UPDATE` keeps a document's position. The body is the bincode-encoded
//! [`Document`]. Every mutation commits before returning.

use crate::config::{Backend, TABLE_FILE_NAME};
use crate::document::Document;
use crate::error::{IndexError, Result};
use crate::store::{DocumentIter, EntityStore};
use rusqlite::{params, Connection, OptionalExtension};
use std::borrow::Cow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS documents (
        pos  INTEGER PRIMARY KEY AUTOINCREMENT,
        id   TEXT NOT NULL UNIQUE,
        body BLOB NOT NULL
    );
";

pub struct TableStore {
    path: PathBuf,
    conn: Connection,
    /// Stored ids, kept in step with the table for `len`/`contains`.
    ids: HashSet<String>,
}

impl TableStore {
    /// Open (or create) `index.sqlite` inside `workspace`.
    pub fn open(workspace: &Path) -> Result<Self> {
        let path = workspace.join(TABLE_FILE_NAME);
        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA synchronous = FULL;")?;
        conn.execute_batch(SCHEMA)?;

        let mut ids = HashSet::new();
        {
            let mut stmt = conn.prepare("SELECT id FROM documents")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            for row in rows {
                ids.insert(row?);
            }
        }
        tracing::debug!("Opened table {:?} ({} rows)", path, ids.len());
        Ok(Self { path, conn, ids })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode(id: &str, body: &[u8]) -> Result<Document> {
        bincode::deserialize(body)
            .map_err(|e| IndexError::Corrupt(format!("row `{}` does not decode: {}", id, e)))
    }
}

impl EntityStore for TableStore {
    fn backend(&self) -> Backend {
        Backend::Table
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn get(&self, id: &str) -> Result<Document> {
        let body: Option<Vec<u8>> = self
            .conn
            .prepare_cached("SELECT body FROM documents WHERE id = ?1")?
            .query_row(params![id], |row| row.get(0))
            .optional()?;
        match body {
            Some(body) => Self::decode(id, &body),
            None => Err(IndexError::not_found(id)),
        }
    }

    fn append(&mut self, doc: Document) -> Result<()> {
        if self.ids.contains(&doc.id) {
            return Err(IndexError::DuplicateId { id: doc.id });
        }
        let body = bincode::serialize(&doc)?;
        self.conn
            .prepare_cached("INSERT INTO documents (id, body) VALUES (?1, ?2)")?
            .execute(params![doc.id, body])?;
        self.ids.insert(doc.id);
        Ok(())
    }

    fn set(&mut self, doc: Document) -> Result<()> {
        let body = bincode::serialize(&doc)?;
        let changed = self
            .conn
            .prepare_cached("UPDATE documents SET body = ?2 WHERE id = ?1")?
            .execute(params![doc.id, body])?;
        if changed == 0 {
            return Err(IndexError::not_found(doc.id));
        }
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        if !self.ids.contains(id) {
            return Ok(false);
        }
        self.conn
            .prepare_cached("DELETE FROM documents WHERE id = ?1")?
            .execute(params![id])?;
        self.ids.remove(id);
        Ok(true)
    }

    fn delete_many(&mut self, ids: &[String]) -> Result<usize> {
        let present: Vec<String> = ids
            .iter()
            .filter(|id| self.ids.contains(id.as_str()))
            .cloned()
            .collect();
        if present.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM documents WHERE id = ?1")?;
            for id in &present {
                stmt.execute(params![id])?;
            }
        }
        tx.commit()?;

        let mut removed = 0;
        for id in &present {
            if self.ids.remove(id) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn clear(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "DELETE FROM documents;
             DELETE FROM sqlite_sequence WHERE name = 'documents';",
        )?;
        self.ids.clear();
        tracing::info!("Cleared table {:?}", self.path);
        Ok(())
    }

    fn ids(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id FROM documents ORDER BY pos")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::with_capacity(self.ids.len());
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn iter(&self) -> DocumentIter<'_> {
        // ids up front, bodies fetched one row at a time
        match self.ids() {
            Ok(ids) => Box::new(ids.into_iter().map(move |id| self.get(&id))),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn snapshot(&self) -> Result<Cow<'_, [Document]>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id, body FROM documents ORDER BY pos")?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let body: Vec<u8> = row.get(1)?;
            Ok((id, body))
        })?;
        let mut docs = Vec::with_capacity(self.ids.len());
        for row in rows {
            let (id, body) = row?;
            docs.push(Self::decode(&id, &body)?);
        }
        Ok(Cow::Owned(docs))
    }
}
