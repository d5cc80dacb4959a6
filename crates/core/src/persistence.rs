//! Whole-store snapshots for the blob backend.
//!
//! A snapshot is the bincode encoding of the ordered document list followed by
//! an 8-byte footer: `[magic "DIX1"][u32 CRC32 BE]` over the payload. Writes go
//! to a temporary file that is renamed over the target, so a crash mid-write
//! leaves the previous snapshot intact.

use crate::config::{SNAPSHOT_CRC_MAGIC, TMP_SUFFIX};
use crate::document::Document;
use crate::error::{IndexError, Result};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const FOOTER_LEN: usize = 8;

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

/// Write `documents` to `path`, replacing any existing snapshot atomically.
pub fn save_snapshot(path: &Path, documents: &[Document]) -> Result<()> {
    let bytes = bincode::serialize(documents)?;
    let crc = crc32fast::hash(&bytes);

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o700));
        }
    }

    let mut output = Vec::with_capacity(bytes.len() + FOOTER_LEN);
    output.extend_from_slice(&bytes);
    output.extend_from_slice(SNAPSHOT_CRC_MAGIC);
    output.extend_from_slice(&crc.to_be_bytes());

    let tmp = tmp_path(path);
    write_synced(&tmp, &output)?;
    fs::rename(&tmp, path)?;
    sync_parent_dir(path)?;

    tracing::info!(
        "Saved snapshot {:?} ({} documents, {} bytes, CRC32={:#010x})",
        path,
        documents.len(),
        bytes.len(),
        crc
    );
    Ok(())
}

/// Read the snapshot at `path`.
///
/// Fails with `SnapshotNotFound` when the file does not exist and `Corrupt`
/// when the checksum or the payload does not verify. Snapshots written
/// without a footer are accepted with a warning.
pub fn load_snapshot(path: &Path) -> Result<Vec<Document>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(IndexError::SnapshotNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    let payload = match split_footer(&raw) {
        Some((payload, stored_crc)) => {
            let computed_crc = crc32fast::hash(payload);
            if computed_crc != stored_crc {
                return Err(IndexError::Corrupt(format!(
                    "snapshot CRC32 mismatch: expected {:#010x}, got {:#010x} in {:?}",
                    stored_crc, computed_crc, path
                )));
            }
            tracing::debug!("Snapshot CRC32 verified: {:#010x}", stored_crc);
            payload
        }
        None => {
            tracing::warn!("Snapshot {:?} has no CRC32 checksum", path);
            &raw[..]
        }
    };

    let documents: Vec<Document> = bincode::deserialize(payload)
        .map_err(|e| IndexError::Corrupt(format!("snapshot {:?} does not decode: {}", path, e)))?;

    let mut seen = HashSet::with_capacity(documents.len());
    for doc in &documents {
        if !seen.insert(doc.id.as_str()) {
            return Err(IndexError::Corrupt(format!(
                "snapshot {:?} repeats document id `{}`",
                path, doc.id
            )));
        }
    }

    tracing::info!("Loaded snapshot {:?} ({} documents)", path, documents.len());
    Ok(documents)
}

/// Remove the snapshot at `path`. Absent files are not an error.
pub fn remove_snapshot(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::info!("Removed snapshot {:?}", path);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Write `bytes` to a fresh file at `path` (mode 0600) and fsync it.
fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Make a rename inside the parent directory durable.
fn sync_parent_dir(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            File::open(dir)?.sync_all()?;
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

fn split_footer(raw: &[u8]) -> Option<(&[u8], u32)> {
    if raw.len() < FOOTER_LEN {
        return None;
    }
    let (payload, footer) = raw.split_at(raw.len() - FOOTER_LEN);
    if &footer[..4] != SNAPSHOT_CRC_MAGIC {
        return None;
    }
    let crc = u32::from_be_bytes([footer[4], footer[5], footer[6], footer[7]]);
    Some((payload, crc))
}
