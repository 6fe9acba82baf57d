//! The acceptance checks applied to a stored token.

use crate::device::DeviceFingerprint;
use crate::error::{LicenseError, LicenseResult};
use crate::policy::DomainPolicy;
use crate::token::LicenseToken;
use chrono::{DateTime, Utc};
use ed25519_dalek::VerifyingKey;

/// Decodes `bytes` and accepts the token only if its signature verifies,
/// `now` lies between its issue time and its expiry, it is bound to `current`, and its subject is
/// on an approved domain.
///
/// # Errors
///
/// Returns the first failing check: `MalformedToken`, `SignatureInvalid`,
/// `NotYetValid`, `Expired`, `DeviceMismatch` or `DomainRejected`.
pub fn validate_token(
    bytes: &[u8],
    key: &VerifyingKey,
    policy: &DomainPolicy,
    current: &DeviceFingerprint,
    now: DateTime<Utc>,
) -> LicenseResult<LicenseToken> {
    let token = LicenseToken::decode_with_key(bytes, key)?;
    check_token(&token, policy, current, now)?;
    Ok(token)
}

/// Applies the non-cryptographic checks to an already-verified token.
///
/// # Errors
///
/// Returns `NotYetValid`, `Expired`, `DeviceMismatch` or `DomainRejected`.
pub fn check_token(
    token: &LicenseToken,
    policy: &DomainPolicy,
    current: &DeviceFingerprint,
    now: DateTime<Utc>,
) -> LicenseResult<()> {
    if !token.is_issued_by(now) {
        return Err(LicenseError::NotYetValid(token.issued_at().to_rfc3339()));
    }
    if !token.is_current_at(now) {
        return Err(LicenseError::Expired(token.expires_at().to_rfc3339()));
    }
    if token.device_fingerprint() != *current {
        return Err(LicenseError::DeviceMismatch);
    }
    policy.check(token.subject_email())?;
    Ok(())
}
