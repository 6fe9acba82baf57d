//! Error types for license issuance.

use licgate_license::LicenseError;
use thiserror::Error;

/// Issuance-specific errors.
#[derive(Debug, Error)]
pub enum IssueError {
    /// Request email is not on an approved domain.
    #[error("email domain not approved: {0}")]
    DomainRejected(String),

    /// Signing key file is missing or malformed.
    #[error("signing key error: {0}")]
    Key(String),

    /// Token could not be written; the approval did not take effect.
    #[error("failed to store license token: {0}")]
    Store(#[source] LicenseError),

    /// Token could not be built or does not verify.
    #[error("license token error: {0}")]
    Token(#[source] LicenseError),

    /// No pending request on this machine and none supplied.
    #[error("no pending activation request found")]
    NoPendingRequest,

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for issuance operations.
pub type IssueResult<T> = Result<T, IssueError>;
