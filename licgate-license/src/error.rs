//! Error types for the licensing gate.

use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// No token in the store (first run).
    #[error("no license present")]
    NoLicensePresent,

    /// Token is structurally corrupt or carries an unknown version tag.
    #[error("malformed license token: {0}")]
    MalformedToken(String),

    /// Ed25519 signature verification failed.
    #[error("license token signature invalid")]
    SignatureInvalid,

    /// License validity window has ended.
    #[error("license expired on {0}")]
    Expired(String),

    /// Token is dated in the future relative to this machine's clock.
    #[error("license not valid until {0}")]
    NotYetValid(String),

    /// Token was issued for a different machine.
    #[error("license is bound to a different device")]
    DeviceMismatch,

    /// Email is not on an approved corporate domain.
    #[error("email domain not approved: {0}")]
    DomainRejected(String),

    /// The admin notification could not be delivered.
    #[error("activation request dispatch failed: {0}")]
    DispatchFailed(String),

    /// Store read/write failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LicenseError {
    /// Returns true for failures that can come out of validating a stored token.
    ///
    /// All of these collapse to the same externally visible `Locked` state.
    /// `DomainRejected` is included because a stored token whose subject
    /// falls outside the approved domains is rejected the same way.
    pub fn is_check_failure(&self) -> bool {
        matches!(
            self,
            Self::NoLicensePresent
                | Self::MalformedToken(_)
                | Self::SignatureInvalid
                | Self::Expired(_)
                | Self::NotYetValid(_)
                | Self::DeviceMismatch
                | Self::DomainRejected(_)
        )
    }

    /// Short, stable label used in log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NoLicensePresent => "no_license",
            Self::MalformedToken(_) => "malformed",
            Self::SignatureInvalid => "signature_invalid",
            Self::Expired(_) => "expired",
            Self::NotYetValid(_) => "not_yet_valid",
            Self::DeviceMismatch => "device_mismatch",
            Self::DomainRejected(_) => "domain_rejected",
            Self::DispatchFailed(_) => "dispatch_failed",
            Self::Storage(_) | Self::Io(_) => "store_io",
            Self::Serialization(_) => "serialization",
            Self::Config(_) => "config",
        }
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
