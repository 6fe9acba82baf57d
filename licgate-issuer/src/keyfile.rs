//! Signing-key files.
//!
//! A key file holds the 32-byte Ed25519 seed as standard base64 on one line.
//! It lives only on administrator machines.

use crate::error::{IssueError, IssueResult};
use base64::{Engine, engine::general_purpose::STANDARD};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::RngCore;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Generates a fresh signing key from the OS random source.
pub fn generate_signing_key() -> SigningKey {
    let mut seed = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut seed);
    SigningKey::from_bytes(&seed)
}

/// Writes `key` to `path`, refusing to overwrite an existing file.
///
/// On Unix the file is created with mode `0600`.
///
/// # Errors
///
/// Returns `Key` if the file already exists and `Io` on write failure.
pub fn write_signing_key(path: &Path, key: &SigningKey) -> IssueResult<()> {
    if path.exists() {
        return Err(IssueError::Key(format!(
            "{} already exists; refusing to overwrite",
            path.display()
        )));
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    writeln!(file, "{}", STANDARD.encode(key.to_bytes()))?;
    file.sync_all()?;
    Ok(())
}

/// Reads a signing key written by [`write_signing_key`].
///
/// # Errors
///
/// Returns `Io` if the file cannot be read and `Key` if it is malformed.
pub fn read_signing_key(path: &Path) -> IssueResult<SigningKey> {
    let text = fs::read_to_string(path)?;
    let bytes = STANDARD
        .decode(text.trim())
        .map_err(|e| IssueError::Key(format!("invalid base64 in {}: {e}", path.display())))?;
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|_| IssueError::Key("signing key seed must be 32 bytes".to_string()))?;
    Ok(SigningKey::from_bytes(&seed))
}

/// Encodes a verifying key the way `LicenseConfig::verifying_key` expects.
pub fn encode_verifying_key(key: &VerifyingKey) -> String {
    STANDARD.encode(key.to_bytes())
}
