//! Local consent state storage.
//!
//! # Contract
//!
//! A [`ConsentStore`] holds exactly one [`ConsentRecord`]. Reads of a store
//! that has never been written return the default record (status
//! `Undefined`, timestamp `0`, not synced). Every write replaces the whole
//! record in a single call, so an observer never sees a new status paired
//! with a stale sync flag.
//!
//! # Implementations
//!
//! - [`JsonFileStore`]: `~/.consent/state.json`, atomic `.tmp` + rename.
//! - [`MemoryStore`]: process-local, for tests and embedders without disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{io_err, StoreError};
use crate::paths;
use crate::types::{ConsentRecord, ConsentStatus};

/// Durable storage for the consent record.
pub trait ConsentStore: Send + Sync {
    /// Current record, or the default record when nothing was stored.
    fn load(&self) -> Result<ConsentRecord, StoreError>;

    /// Replace the stored record.
    fn save(&self, record: &ConsentRecord) -> Result<(), StoreError>;

    /// Forget everything; subsequent loads return the default record.
    fn clear(&self) -> Result<(), StoreError>;

    fn status(&self) -> Result<ConsentStatus, StoreError> {
        Ok(self.load()?.status)
    }

    fn updated_at_ms(&self) -> Result<i64, StoreError> {
        Ok(self.load()?.updated_at_ms)
    }

    fn is_remotely_synced(&self) -> Result<bool, StoreError> {
        Ok(self.load()?.remotely_synced)
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// File-backed store writing a single JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<home>/.consent/state.json`.
    pub fn at(home: &Path) -> Self {
        Self::new(paths::state_path(home))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

impl ConsentStore for JsonFileStore {
    fn load(&self) -> Result<ConsentRecord, StoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ConsentRecord::default()),
            Err(err) => return Err(io_err(&self.path, err)),
        };
        if contents.trim().is_empty() {
            return Ok(ConsentRecord::default());
        }
        serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Write flow: serialize → `.json.tmp` sibling → `chmod 0600` → `rename`.
    fn save(&self, record: &ConsentRecord) -> Result<(), StoreError> {
        let Some(dir) = self.path.parent() else {
            return Err(io_err(
                &self.path,
                std::io::Error::other("invalid consent state path"),
            ));
        };
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
            set_dir_permissions(dir)?;
        }

        let json = serde_json::to_string_pretty(record)?;
        let tmp = self.tmp_path();
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        set_file_permissions(&tmp)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&self.path, e));
        }
        tracing::debug!(
            path = %self.path.display(),
            status = %record.status,
            revision = record.revision,
            synced = record.remotely_synced,
            "saved consent state"
        );
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_err(&self.path, err)),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<ConsentRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: ConsentRecord) -> Self {
        Self {
            record: Mutex::new(record),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ConsentRecord> {
        // A panic mid-assignment cannot leave a torn Copy value behind.
        self.record.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl ConsentStore for MemoryStore {
    fn load(&self) -> Result<ConsentRecord, StoreError> {
        Ok(*self.lock())
    }

    fn save(&self, record: &ConsentRecord) -> Result<(), StoreError> {
        *self.lock() = *record;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.lock() = ConsentRecord::default();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
