//! Memory-mapped append-only record log.
//!
//! Every mutation is appended to `index.mmap` and optionally fsynced before the
//! call returns. The file starts with `[magic "DIXL"][u32 version LE]`, followed by
//! frames `[u32 length BE][u32 CRC32 BE][bincode record]`.
//!
//! Reads go through a `memmap2` mapping that is refreshed lazily when the file
//! has grown. An in-memory id → (offset, position) map is rebuilt by replaying
//! the log at open; a truncated or corrupt tail is cut off. Superseded and
//! deleted records stay in the file until compaction rewrites the live ones.

use crate::config::{self, Backend};
use crate::document::{Document, Embedding};
use crate::error::{IndexError, Result};
use crate::store::buffer_pool::{BufferPool, BufferPoolStats};
use crate::store::{DocumentIter, EntityStore};
use memmap2::Mmap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const HEADER_LEN: u64 = 8;
const FRAME_HEADER_LEN: usize = 8;

/// Record written by a mutation. Field layout must match [`Record`].
#[derive(Serialize)]
enum RecordRef<'a> {
    Put(&'a Document),
    Delete { id: &'a str },
}

/// Record read back from the log.
#[derive(Deserialize)]
enum Record {
    Put(Document),
    Delete { id: String },
}

/// Where a live document sits in the log and in insertion order.
#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: u64,
    position: usize,
}

/// Outcome of parsing one frame from the mapped log.
enum Frame<'a> {
    Complete { payload: &'a [u8], next: usize },
    Truncated,
    CrcMismatch,
}

fn frame_at(buf: &[u8], offset: usize) -> Frame<'_> {
    if offset + FRAME_HEADER_LEN > buf.len() {
        return Frame::Truncated;
    }
    let header = &buf[offset..offset + FRAME_HEADER_LEN];
    let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let stored_crc = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    let start = offset + FRAME_HEADER_LEN;
    let end = start + len;
    if end > buf.len() {
        return Frame::Truncated;
    }
    let payload = &buf[start..end];
    if crc32fast::hash(payload) != stored_crc {
        return Frame::CrcMismatch;
    }
    Frame::Complete { payload, next: end }
}

fn serialize_and_frame(record: &RecordRef<'_>) -> Result<Vec<u8>> {
    let bytes = bincode::serialize(record)?;
    let len = u32::try_from(bytes.len())
        .map_err(|_| IndexError::Serialization("record larger than 4 GiB".into()))?;
    let crc = crc32fast::hash(&bytes);

    let mut framed = Vec::with_capacity(FRAME_HEADER_LEN + bytes.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(&crc.to_be_bytes());
    framed.extend_from_slice(&bytes);
    Ok(framed)
}

fn header_bytes() -> [u8; HEADER_LEN as usize] {
    let mut header = [0u8; HEADER_LEN as usize];
    header[..4].copy_from_slice(config::LOG_MAGIC);
    header[4..].copy_from_slice(&config::LOG_VERSION.to_le_bytes());
    header
}

fn open_log(path: &Path) -> Result<File> {
    let mut opts = OpenOptions::new();
    opts.create(true).read(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    Ok(opts.open(path)?)
}

/// Diagnostic statistics from the replay at open.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    /// Records applied.
    pub success: usize,
    /// Records skipped because they could not be decoded (CRC was valid).
    pub skipped: usize,
    /// CRC mismatches encountered (replay stopped).
    pub crc_errors: usize,
    /// Whether replay was terminated by a truncated record.
    pub truncated: bool,
}

/// Append-log entity store with an embedding buffer pool.
pub struct MemmapStore {
    path: PathBuf,
    file: File,
    mmap: RwLock<Option<Mmap>>,
    file_len: u64,
    slots: HashMap<String, Slot>,
    order: Vec<String>,
    dead_records: usize,
    pool: BufferPool,
    sync_writes: bool,
    compact_ratio: f32,
    replay: ReplayStats,
}

impl std::fmt::Debug for MemmapStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemmapStore")
            .field("path", &self.path)
            .field("len", &self.order.len())
            .field("file_len", &self.file_len)
            .field("dead_records", &self.dead_records)
            .finish()
    }
}

impl MemmapStore {
    /// Open or create `index.mmap` in `workspace` and replay it.
    pub fn open(
        workspace: &Path,
        buffer_pool_capacity: usize,
        sync_writes: bool,
        compact_ratio: f32,
    ) -> Result<Self> {
        fs::create_dir_all(workspace)?;
        let path = workspace.join(config::MEMMAP_FILE_NAME);
        let mut file = open_log(&path)?;
        let mut file_len = file.metadata()?.len();
        if file_len == 0 {
            file.write_all(&header_bytes())?;
            file.sync_all()?;
            file_len = HEADER_LEN;
        }

        let mut store = Self {
            path,
            file,
            mmap: RwLock::new(None),
            file_len,
            slots: HashMap::new(),
            order: Vec::new(),
            dead_records: 0,
            pool: BufferPool::new(buffer_pool_capacity),
            sync_writes,
            compact_ratio,
            replay: ReplayStats::default(),
        };
        store.replay_log()?;
        Ok(store)
    }

    /// Statistics of the replay performed at open.
    pub fn replay_stats(&self) -> ReplayStats {
        self.replay
    }

    pub fn buffer_pool_stats(&self) -> BufferPoolStats {
        self.pool.stats()
    }

    /// Number of superseded or deleted records still in the log.
    pub fn dead_records(&self) -> usize {
        self.dead_records
    }

    /// Current size of the log file in bytes.
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    fn replay_log(&mut self) -> Result<()> {
        self.ensure_mapped()?;
        let mut stats = ReplayStats::default();
        let mut applied: Vec<(usize, Record)> = Vec::new();
        let valid_end = {
            let guard = self.mmap.read();
            let buf: &[u8] = guard.as_deref().unwrap_or(&[]);
            if buf.len() < HEADER_LEN as usize || buf[..4] != config::LOG_MAGIC[..] {
                return Err(IndexError::Corrupt(format!(
                    "{:?} is not a docindex record log",
                    self.path
                )));
            }
            let version = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
            if version != config::LOG_VERSION {
                return Err(IndexError::Corrupt(format!(
                    "unsupported record log version {} in {:?}",
                    version, self.path
                )));
            }

            let mut cursor = HEADER_LEN as usize;
            while cursor < buf.len() {
                match frame_at(buf, cursor) {
                    Frame::Complete { payload, next } => {
                        match bincode::deserialize::<Record>(payload) {
                            Ok(record) => {
                                applied.push((cursor, record));
                                stats.success += 1;
                            }
                            Err(e) => {
                                tracing::warn!("Log record deserialization failed, skipping: {}", e);
                                stats.skipped += 1;
                            }
                        }
                        cursor = next;
                    }
                    Frame::Truncated => {
                        tracing::warn!("Record log truncated mid-record, stopping replay");
                        stats.truncated = true;
                        break;
                    }
                    Frame::CrcMismatch => {
                        tracing::warn!("Record log CRC mismatch, stopping replay");
                        stats.crc_errors += 1;
                        break;
                    }
                }
            }
            cursor as u64
        };

        for (offset, record) in applied {
            match record {
                Record::Put(doc) => self.apply_put(doc.id, offset as u64),
                Record::Delete { id } => {
                    self.apply_delete(&id);
                    self.dead_records += 1;
                }
            }
        }

        if valid_end < self.file_len {
            tracing::warn!(
                "Cutting {} bytes of damaged tail from {:?}",
                self.file_len - valid_end,
                self.path
            );
            *self.mmap.get_mut() = None;
            self.file.set_len(valid_end)?;
            self.file.sync_all()?;
            self.file_len = valid_end;
        }

        tracing::info!(
            "Replayed record log {:?}: {} records, {} live documents, {} dead",
            self.path,
            stats.success,
            self.order.len(),
            self.dead_records
        );
        self.replay = stats;
        Ok(())
    }

    fn apply_put(&mut self, id: String, offset: u64) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.offset = offset;
            self.dead_records += 1;
        } else {
            let position = self.order.len();
            self.order.push(id.clone());
            self.slots.insert(id, Slot { offset, position });
        }
    }

    fn apply_delete(&mut self, id: &str) -> bool {
        let Some(slot) = self.slots.remove(id) else {
            return false;
        };
        self.order.remove(slot.position);
        self.reindex_from(slot.position);
        self.dead_records += 1;
        true
    }

    fn reindex_from(&mut self, start: usize) {
        for (position, id) in self.order.iter().enumerate().skip(start) {
            if let Some(slot) = self.slots.get_mut(id) {
                slot.position = position;
            }
        }
    }

    /// Refresh the mapping when the file size changed since it was taken.
    fn ensure_mapped(&self) -> Result<()> {
        let stale = self
            .mmap
            .read()
            .as_ref()
            .map_or(true, |m| m.len() as u64 != self.file_len);
        if stale {
            let mut guard = self.mmap.write();
            if guard.as_ref().map_or(true, |m| m.len() as u64 != self.file_len) {
                // SAFETY: the file is only appended to or truncated by this store,
                // and the mapping is dropped before any truncation.
                *guard = Some(unsafe { Mmap::map(&self.file) }?);
            }
        }
        Ok(())
    }

    fn read_document(&self, id: &str) -> Result<Document> {
        let slot = self
            .slots
            .get(id)
            .ok_or_else(|| IndexError::not_found(id))?;
        self.ensure_mapped()?;
        let guard = self.mmap.read();
        let buf: &[u8] = guard.as_deref().unwrap_or(&[]);
        match frame_at(buf, slot.offset as usize) {
            Frame::Complete { payload, .. } => match bincode::deserialize::<Record>(payload)? {
                Record::Put(doc) => Ok(doc),
                Record::Delete { .. } => Err(IndexError::Corrupt(format!(
                    "offset {} of `{}` points at a delete record",
                    slot.offset, id
                ))),
            },
            Frame::Truncated => Err(IndexError::Corrupt(format!(
                "record of `{}` at offset {} is truncated",
                id, slot.offset
            ))),
            Frame::CrcMismatch => Err(IndexError::Corrupt(format!(
                "record of `{}` at offset {} failed CRC32 check",
                id, slot.offset
            ))),
        }
    }

    fn write_record(&mut self, record: &RecordRef<'_>) -> Result<u64> {
        let framed = serialize_and_frame(record)?;
        let offset = self.file_len;
        if let Err(e) = self.write_frame(&framed) {
            if let Err(rollback) = self.discard_tail() {
                tracing::error!(
                    "Failed to cut partial record from {:?} at offset {}: {}",
                    self.path,
                    offset,
                    rollback
                );
            }
            return Err(e);
        }
        self.file_len += framed.len() as u64;
        Ok(offset)
    }

    fn write_frame(&mut self, framed: &[u8]) -> Result<()> {
        self.file.write_all(framed)?;
        if self.sync_writes {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Truncate the log back to the end of the last complete record.
    fn discard_tail(&mut self) -> Result<()> {
        *self.mmap.get_mut() = None;
        self.file.set_len(self.file_len)?;
        Ok(())
    }

    fn cache_embedding(&self, doc: &Document) {
        match &doc.embedding {
            Some(embedding) => self.pool.insert(doc.id.clone(), Arc::new(embedding.clone())),
            None => self.pool.invalidate(&doc.id),
        }
    }

    fn maybe_compact(&mut self) -> Result<()> {
        if self.compact_ratio <= 0.0 || self.dead_records < config::COMPACT_MIN_DEAD_RECORDS {
            return Ok(());
        }
        let total = self.dead_records + self.order.len();
        if (self.dead_records as f32) / (total as f32) > self.compact_ratio {
            self.compact()?;
        }
        Ok(())
    }

    /// Rewrite the log with only the live records, in insertion order.
    ///
    /// Writes to a temp file, fsyncs, then renames it over the log.
    pub fn compact(&mut self) -> Result<()> {
        let tmp_path = self
            .path
            .with_extension(format!("mmap.{}", config::TMP_SUFFIX));
        let before = self.file_len;
        let mut new_offsets = Vec::with_capacity(self.order.len());
        {
            self.ensure_mapped()?;
            let guard = self.mmap.read();
            let buf: &[u8] = guard.as_deref().unwrap_or(&[]);
            let mut out = Vec::with_capacity(buf.len());
            out.extend_from_slice(&header_bytes());
            for id in &self.order {
                let offset = self.slots[id].offset as usize;
                match frame_at(buf, offset) {
                    Frame::Complete { next, .. } => {
                        new_offsets.push(out.len() as u64);
                        out.extend_from_slice(&buf[offset..next]);
                    }
                    _ => {
                        return Err(IndexError::Corrupt(format!(
                            "record of `{}` at offset {} is damaged, refusing to compact",
                            id, offset
                        )))
                    }
                }
            }
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&out)?;
            tmp.sync_all()?;
        }

        *self.mmap.get_mut() = None;
        fs::rename(&tmp_path, &self.path)?;
        self.file = open_log(&self.path)?;
        self.file_len = self.file.metadata()?.len();
        for (id, offset) in self.order.iter().zip(new_offsets) {
            if let Some(slot) = self.slots.get_mut(id) {
                slot.offset = offset;
            }
        }
        self.dead_records = 0;
        tracing::info!(
            "Compacted record log {:?}: {} -> {} bytes",
            self.path,
            before,
            self.file_len
        );
        Ok(())
    }
}

impl EntityStore for MemmapStore {
    fn backend(&self) -> Backend {
        Backend::Memmap
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    fn get(&self, id: &str) -> Result<Document> {
        let doc = self.read_document(id)?;
        self.cache_embedding(&doc);
        Ok(doc)
    }

    fn embedding(&self, id: &str) -> Result<Option<Embedding>> {
        if !self.slots.contains_key(id) {
            return Err(IndexError::not_found(id));
        }
        if let Some(cached) = self.pool.get(id) {
            return Ok(Some((*cached).clone()));
        }
        Ok(self.get(id)?.embedding)
    }

    /// Served from the buffer pool; a miss decodes the record and caches it.
    fn embeddings(&self) -> Result<Vec<(String, Option<Arc<Embedding>>)>> {
        self.order
            .iter()
            .map(|id| {
                let embedding = match self.pool.get(id) {
                    Some(cached) => Some(cached),
                    None => self.read_document(id)?.embedding.map(|embedding| {
                        let embedding = Arc::new(embedding);
                        self.pool.insert(id.clone(), Arc::clone(&embedding));
                        embedding
                    }),
                };
                Ok((id.clone(), embedding))
            })
            .collect()
    }

    fn caches_embeddings(&self) -> bool {
        true
    }

    fn append(&mut self, doc: Document) -> Result<()> {
        if self.slots.contains_key(&doc.id) {
            return Err(IndexError::DuplicateId { id: doc.id });
        }
        let offset = self.write_record(&RecordRef::Put(&doc))?;
        self.cache_embedding(&doc);
        self.apply_put(doc.id, offset);
        Ok(())
    }

    fn set(&mut self, doc: Document) -> Result<()> {
        if !self.slots.contains_key(&doc.id) {
            return Err(IndexError::not_found(doc.id));
        }
        let offset = self.write_record(&RecordRef::Put(&doc))?;
        self.cache_embedding(&doc);
        self.apply_put(doc.id, offset);
        self.maybe_compact()
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        if !self.slots.contains_key(id) {
            return Ok(false);
        }
        self.write_record(&RecordRef::Delete { id })?;
        self.apply_delete(id);
        // the delete record itself is dead weight too
        self.dead_records += 1;
        self.pool.invalidate(id);
        self.maybe_compact()?;
        Ok(true)
    }

    fn delete_many(&mut self, ids: &[String]) -> Result<usize> {
        let mut removed = 0;
        for id in ids {
            if self.slots.remove(id.as_str()).is_none() {
                continue;
            }
            self.write_record(&RecordRef::Delete { id: id.as_str() })?;
            self.pool.invalidate(id);
            self.dead_records += 2;
            removed += 1;
        }
        if removed > 0 {
            let slots = &self.slots;
            self.order.retain(|id| slots.contains_key(id));
            self.reindex_from(0);
            self.maybe_compact()?;
        }
        Ok(removed)
    }

    fn clear(&mut self) -> Result<()> {
        *self.mmap.get_mut() = None;
        self.file.set_len(HEADER_LEN)?;
        self.file.sync_all()?;
        self.file_len = HEADER_LEN;
        self.slots.clear();
        self.order.clear();
        self.dead_records = 0;
        self.pool.clear();
        Ok(())
    }

    fn ids(&self) -> Result<Vec<String>> {
        Ok(self.order.clone())
    }

    fn iter(&self) -> DocumentIter<'_> {
        Box::new(self.order.iter().map(move |id| self.get(id)))
    }

    /// Compacts away dead records, then fsyncs the log.
    fn flush(&mut self) -> Result<()> {
        if self.dead_records > 0 {
            self.compact()?;
        }
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> MemmapStore {
        MemmapStore::open(dir.path(), 16, true, 0.0).unwrap()
    }

    fn doc(id: &str, values: &[f32]) -> Document {
        Document::with_id(id).embedding(values.to_vec()).text(id)
    }

    #[test]
    fn test_reopen_replays_puts_updates_and_deletes() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = open(&dir);
            store.append(doc("a", &[1.0, 0.0])).unwrap();
            store.append(doc("b", &[0.0, 1.0])).unwrap();
            store.append(doc("c", &[1.0, 1.0])).unwrap();
            store.set(doc("a", &[2.0, 2.0])).unwrap();
            store.delete("b").unwrap();
        }
        let store = open(&dir);
        assert_eq!(store.ids().unwrap(), vec!["a", "c"]);
        assert_eq!(store.get("a").unwrap(), doc("a", &[2.0, 2.0]));
        assert_eq!(store.replay_stats().success, 5);
        // superseded put of "a", put of "b", delete of "b"
        assert_eq!(store.dead_records(), 3);
    }

    #[test]
    fn test_truncated_tail_is_cut_off() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(config::MEMMAP_FILE_NAME);
        let intact_len;
        {
            let mut store = open(&dir);
            store.append(doc("a", &[1.0])).unwrap();
            intact_len = store.file_len();
            store.append(doc("b", &[2.0])).unwrap();
        }
        let full = fs::read(&path).unwrap();
        fs::write(&path, &full[..full.len() - 3]).unwrap();

        let mut store = open(&dir);
        assert!(store.replay_stats().truncated);
        assert_eq!(store.ids().unwrap(), vec!["a"]);
        assert_eq!(store.file_len(), intact_len);
        store.append(doc("c", &[3.0])).unwrap();
        drop(store);
        assert_eq!(open(&dir).ids().unwrap(), vec!["a", "c"]);
    }

    #[test]
    fn test_crc_corruption_stops_replay() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(config::MEMMAP_FILE_NAME);
        {
            let mut store = open(&dir);
            store.append(doc("a", &[1.0])).unwrap();
        }
        let mut data = fs::read(&path).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        fs::write(&path, &data).unwrap();

        let store = open(&dir);
        assert_eq!(store.replay_stats().crc_errors, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_rejects_foreign_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(config::MEMMAP_FILE_NAME), b"not a log at all").unwrap();
        let err = MemmapStore::open(dir.path(), 16, true, 0.0).unwrap_err();
        assert!(matches!(err, IndexError::Corrupt(_)));
    }

    #[test]
    fn test_embedding_served_from_buffer_pool() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store.append(doc("a", &[1.0, 2.0])).unwrap();
        let first = store.embedding("a").unwrap();
        let second = store.embedding("a").unwrap();
        assert_eq!(first, second);
        assert!(store.buffer_pool_stats().hits >= 2);

        store.set(doc("a", &[3.0, 4.0])).unwrap();
        assert_eq!(store.embedding("a").unwrap().unwrap().values(), &[3.0, 4.0]);
        assert!(store.embedding("zzz").unwrap_err().is_not_found());
    }

    #[test]
    fn test_pool_miss_falls_back_to_log() {
        let dir = TempDir::new().unwrap();
        let mut store = MemmapStore::open(dir.path(), 1, true, 0.0).unwrap();
        store.append(doc("a", &[1.0])).unwrap();
        store.append(doc("b", &[2.0])).unwrap();
        // capacity 1: "a" was evicted by "b"
        assert_eq!(store.embedding("a").unwrap().unwrap().values(), &[1.0]);
        assert!(store.buffer_pool_stats().misses >= 1);
    }

    #[test]
    fn test_partial_write_is_discarded_before_next_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(config::MEMMAP_FILE_NAME);
        let mut store = open(&dir);
        store.append(doc("a", &[1.0])).unwrap();
        let intact_len = store.file_len();

        // leftover bytes of a frame whose write failed midway
        let mut torn = OpenOptions::new().append(true).open(&path).unwrap();
        torn.write_all(&[0, 0, 0, 9, 1, 2]).unwrap();
        drop(torn);
        store.discard_tail().unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), intact_len);

        store.append(doc("b", &[2.0])).unwrap();
        assert_eq!(store.get("b").unwrap(), doc("b", &[2.0]));
        drop(store);

        let store = open(&dir);
        assert!(!store.replay_stats().truncated);
        assert_eq!(store.ids().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_embeddings_in_order_through_buffer_pool() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store.append(doc("a", &[1.0])).unwrap();
        store.append(doc("b", &[2.0])).unwrap();
        store.append(Document::with_id("bare")).unwrap();
        store.append(doc("c", &[3.0])).unwrap();
        assert!(store.caches_embeddings());

        let first = store.embeddings().unwrap();
        let ids: Vec<&str> = first.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "bare", "c"]);
        assert_eq!(first[0].1.as_deref().unwrap().values(), &[1.0]);
        assert!(first[2].1.is_none());

        let hits = store.buffer_pool_stats().hits;
        let second = store.embeddings().unwrap();
        assert_eq!(second, first);
        assert!(store.buffer_pool_stats().hits > hits);
    }

    #[test]
    fn test_compact_drops_dead_records() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        for i in 0..10 {
            store.append(doc(&format!("d{i}"), &[i as f32])).unwrap();
        }
        for i in 0..5 {
            store.set(doc(&format!("d{i}"), &[10.0 + i as f32])).unwrap();
        }
        store.delete("d9").unwrap();
        let before = store.file_len();
        store.compact().unwrap();
        assert!(store.file_len() < before);
        assert_eq!(store.dead_records(), 0);
        assert_eq!(store.get("d0").unwrap().embedding.unwrap().values(), &[10.0]);
        drop(store);

        let store = open(&dir);
        assert_eq!(store.len(), 9);
        assert_eq!(store.dead_records(), 0);
        assert_eq!(store.ids().unwrap()[0], "d0");
    }

    #[test]
    fn test_auto_compaction_by_ratio() {
        let dir = TempDir::new().unwrap();
        let mut store = MemmapStore::open(dir.path(), 16, false, 0.5).unwrap();
        store.append(doc("a", &[0.0])).unwrap();
        for i in 0..(config::COMPACT_MIN_DEAD_RECORDS + 1) {
            store.set(doc("a", &[i as f32])).unwrap();
        }
        assert!(store.dead_records() < config::COMPACT_MIN_DEAD_RECORDS);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clear_truncates_log() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = open(&dir);
            store.append(doc("a", &[1.0])).unwrap();
            store.clear().unwrap();
            assert_eq!(store.file_len(), HEADER_LEN);
        }
        assert!(open(&dir).is_empty());
    }
}
