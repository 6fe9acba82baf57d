//! Per-user persistent license storage.
//!
//! One directory per OS-user profile holds at most one encoded token and at
//! most one pending activation request. Every write goes to a temporary file
//! in the same directory and is then renamed into place.

use crate::error::{LicenseError, LicenseResult};
use crate::request::ActivationRequest;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the encoded license token.
pub const TOKEN_FILE: &str = "license.lic";

/// File name of the most recent activation request built on this machine.
pub const PENDING_FILE: &str = "pending-request.json";

/// Reads and writes the license token for the current user.
#[derive(Debug, Clone)]
pub struct LicenseStore {
    dir: PathBuf,
}

impl LicenseStore {
    /// Opens the store under the platform's per-user local data directory,
    /// e.g. `~/.local/share/<app_name>` on Linux.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the platform has no local data directory.
    pub fn open_default(app_name: &str) -> LicenseResult<Self> {
        let base = dirs::data_local_dir().ok_or_else(|| {
            LicenseError::Storage("no per-user data directory on this platform".to_string())
        })?;
        Ok(Self::at(base.join(app_name)))
    }

    /// Opens a store rooted at `dir`. The directory is created on first save.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the token file path.
    pub fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    /// Returns the pending request file path.
    pub fn pending_path(&self) -> PathBuf {
        self.dir.join(PENDING_FILE)
    }

    /// Loads the encoded token. Absence is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file exists but cannot be read.
    pub fn load(&self) -> LicenseResult<Option<Vec<u8>>> {
        read_optional(&self.token_path())
    }

    /// Atomically replaces the stored token with `bytes`.
    ///
    /// # Errors
    ///
    /// Returns `Io`/`Storage` if the write or rename fails; the previous token
    /// is left untouched in that case.
    pub fn save(&self, bytes: &[u8]) -> LicenseResult<()> {
        write_atomic(&self.dir, &self.token_path(), bytes)?;
        debug!(path = %self.token_path().display(), "license token saved");
        Ok(())
    }

    /// Deletes the stored token. Removing an absent token is not an error.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file exists but cannot be removed.
    pub fn remove(&self) -> LicenseResult<()> {
        remove_optional(&self.token_path())
    }

    /// Loads the pending activation request, if one was saved.
    ///
    /// # Errors
    ///
    /// Returns `Io` on read failure and `Serialization` if the file is corrupt.
    pub fn load_pending(&self) -> LicenseResult<Option<ActivationRequest>> {
        match read_optional(&self.pending_path())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Atomically replaces the pending activation request.
    ///
    /// # Errors
    ///
    /// Returns `Io`/`Storage` if the write fails.
    pub fn save_pending(&self, request: &ActivationRequest) -> LicenseResult<()> {
        let json = serde_json::to_vec_pretty(request)?;
        write_atomic(&self.dir, &self.pending_path(), &json)
    }

    /// Deletes the pending activation request.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file exists but cannot be removed.
    pub fn clear_pending(&self) -> LicenseResult<()> {
        remove_optional(&self.pending_path())
    }
}

fn read_optional(path: &Path) -> LicenseResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_optional(path: &Path) -> LicenseResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Writes `bytes` to `path` via a temp file in `dir` plus rename.
fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> LicenseResult<()> {
    fs::create_dir_all(dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| {
        LicenseError::Storage(format!("failed to persist {}: {}", path.display(), e.error))
    })?;
    Ok(())
}

/// Runs blocking store I/O off the async runtime with a deadline.
///
/// # Errors
///
/// Returns `Storage` if the deadline passes or the blocking task panics,
/// otherwise whatever `op` returns.
pub async fn with_deadline<T, F>(deadline: std::time::Duration, op: F) -> LicenseResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> LicenseResult<T> + Send + 'static,
{
    match tokio::time::timeout(deadline, tokio::task::spawn_blocking(op)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(LicenseError::Storage(format!("store task failed: {join}"))),
        Err(_) => Err(LicenseError::Storage(format!(
            "store I/O timed out after {:?}",
            deadline
        ))),
    }
}
