// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable write primitive: temp-write, fsync, rename, backup, digest.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::warn;

use mnemo_core::MnemoError;

/// Rolling backups retained per logical file.
const BACKUP_KEEP: usize = 5;

/// Hex sha256 digest of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Atomically replace `path` with `bytes`.
///
/// The destination is left either in its prior valid state or the new valid
/// state: bytes go to a temp file in the same directory, are forced to
/// stable storage, and are renamed over the destination. On success the new
/// file is copied into a rolling `backup/` set (newest [`BACKUP_KEEP`] kept)
/// and a `<path>.sha256` sidecar digest is written. On any failure before
/// the rename the destination is untouched and an error is returned; backup
/// and digest failures after the rename are logged, not raised, since the
/// destination is already committed.
pub fn atomic_save_bytes(path: &Path, bytes: &[u8]) -> Result<(), MnemoError> {
    let dir = path.parent().ok_or_else(|| {
        MnemoError::Persist {
            message: format!("destination {} has no parent directory", path.display()),
            source: None,
        }
    })?;
    fs::create_dir_all(dir)
        .map_err(|e| MnemoError::persist(format!("create {}", dir.display()), e))?;

    let tmp = tmp_path(path);
    let write_result = (|| -> std::io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    })();
    if let Err(e) = write_result {
        let _ = fs::remove_file(&tmp);
        return Err(MnemoError::persist(format!("write {}", tmp.display()), e));
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(MnemoError::persist(
            format!("rename {} over {}", tmp.display(), path.display()),
            e,
        ));
    }

    // Destination is committed; backup and digest are best-effort.
    if let Err(e) = rotate_backup(path, dir) {
        warn!(path = %path.display(), error = %e, "backup rotation failed");
    }
    if let Err(e) = fs::write(digest_path(path), sha256_hex(bytes)) {
        warn!(path = %path.display(), error = %e, "digest sidecar write failed");
    }

    Ok(())
}

/// Serialize `value` as pretty JSON and [`atomic_save_bytes`] it.
pub fn atomic_save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), MnemoError> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| MnemoError::persist(format!("serialize {}", path.display()), e))?;
    atomic_save_bytes(path, &bytes)
}

/// Read `path`, verifying the sha256 sidecar when one exists.
///
/// Returns `Ok(None)` if the file is missing. A digest mismatch is an
/// [`MnemoError::Integrity`] error so callers can distinguish corruption
/// from absence and recover accordingly.
pub fn load_bytes_verified(path: &Path) -> Result<Option<Vec<u8>>, MnemoError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)
        .map_err(|e| MnemoError::persist(format!("read {}", path.display()), e))?;

    let sidecar = digest_path(path);
    if sidecar.exists() {
        let expected = fs::read_to_string(&sidecar)
            .map_err(|e| MnemoError::persist(format!("read {}", sidecar.display()), e))?;
        let actual = sha256_hex(&bytes);
        if expected.trim() != actual {
            return Err(MnemoError::Integrity(format!(
                "digest mismatch for {}: sidecar {} != computed {}",
                path.display(),
                expected.trim(),
                actual
            )));
        }
    }

    Ok(Some(bytes))
}

/// Load and deserialize a JSON file written by [`atomic_save_json`].
///
/// Returns `Ok(None)` if the file is missing; unparsable content is an
/// [`MnemoError::Integrity`] error.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, MnemoError> {
    let Some(bytes) = load_bytes_verified(path)? else {
        return Ok(None);
    };
    let value = serde_json::from_slice(&bytes).map_err(|e| {
        MnemoError::Integrity(format!("unparsable JSON in {}: {e}", path.display()))
    })?;
    Ok(Some(value))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn digest_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".sha256");
    path.with_file_name(name)
}

/// Copy the committed file into `backup/<name>.<unix_ts>.bak` and prune the
/// set down to the [`BACKUP_KEEP`] most recent for that logical file.
fn rotate_backup(path: &Path, dir: &Path) -> std::io::Result<()> {
    let backup_dir = dir.join("backup");
    fs::create_dir_all(&backup_dir)?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    fs::copy(path, backup_dir.join(format!("{name}.{ts}.bak")))?;

    // Prune, oldest first by modification time.
    let prefix = format!("{name}.");
    let mut backups: Vec<(SystemTime, PathBuf)> = fs::read_dir(&backup_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|n| n.starts_with(&prefix) && n.ends_with(".bak"))
                .unwrap_or(false)
        })
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((modified, entry.path()))
        })
        .collect();
    backups.sort_by_key(|(modified, _)| *modified);

    while backups.len() > BACKUP_KEEP {
        let (_, oldest) = backups.remove(0);
        if let Err(e) = fs::remove_file(&oldest) {
            warn!(path = %oldest.display(), error = %e, "failed to prune old backup");
        }
    }

    Ok(())
}
