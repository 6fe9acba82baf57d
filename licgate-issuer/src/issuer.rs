//! Approval of activation requests.
//!
//! This is the only code in the workspace that produces token signatures.
//! It runs under an administrator's control on the machine being activated,
//! or on the administrator's own machine when the token is relayed back.

use crate::error::{IssueError, IssueResult};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use licgate_license::{
    ActivationRequest, Clock, DeviceFingerprint, DomainPolicy, LicenseClaims, LicenseError,
    LicenseStore, LicenseToken, SystemClock,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Mints license tokens for approved activation requests.
pub struct Issuer {
    signing_key: SigningKey,
    policy: DomainPolicy,
    clock: Arc<dyn Clock>,
}

impl Issuer {
    /// Creates an issuer using the system clock.
    pub fn new(signing_key: SigningKey, policy: DomainPolicy) -> Self {
        Self::with_clock(signing_key, policy, Arc::new(SystemClock))
    }

    /// Creates an issuer with an explicit clock.
    pub fn with_clock(
        signing_key: SigningKey,
        policy: DomainPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            signing_key,
            policy,
            clock,
        }
    }

    /// Returns the key installations must embed or configure to verify tokens.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Issues a token for `email` on the machine identified by `fingerprint`.
    ///
    /// # Errors
    ///
    /// Returns `DomainRejected` if the email fails the domain policy and
    /// `Token` if the claims cannot be built.
    pub fn issue(&self, email: &str, fingerprint: &DeviceFingerprint) -> IssueResult<LicenseToken> {
        let email = self.policy.check(email).map_err(|e| match e {
            LicenseError::DomainRejected(email) => IssueError::DomainRejected(email),
            other => IssueError::Token(other),
        })?;

        let claims =
            LicenseClaims::new(email, fingerprint, self.clock.now()).map_err(IssueError::Token)?;
        let input = claims.signing_input().map_err(IssueError::Token)?;
        let signature = self.signing_key.sign(input.as_bytes());
        let token = LicenseToken::from_parts(claims, signature);

        info!(
            email = %token.subject_email(),
            fingerprint = %fingerprint,
            expires_at = %token.expires_at().to_rfc3339(),
            "license issued"
        );
        Ok(token)
    }

    /// Approves `request`, re-checking its email against the domain policy.
    ///
    /// # Errors
    ///
    /// See [`issue`](Self::issue).
    pub fn approve(&self, request: &ActivationRequest) -> IssueResult<LicenseToken> {
        self.issue(&request.email, &request.fingerprint)
    }

    /// Approves `request` and atomically writes the token into `store`,
    /// replacing any previous token. The pending request is then cleared.
    ///
    /// # Errors
    ///
    /// Returns `Store` when the write fails; the approval has not taken effect
    /// and must be retried.
    pub fn approve_and_store(
        &self,
        request: &ActivationRequest,
        store: &LicenseStore,
    ) -> IssueResult<LicenseToken> {
        self.issue_and_store(&request.email, &request.fingerprint, store)
    }

    /// Issues a token for an administrator-supplied email and fingerprint and
    /// writes it into `store`. Any pending request there is cleared, since the
    /// machine is now licensed.
    ///
    /// # Errors
    ///
    /// See [`issue`](Self::issue) and [`install_token`].
    pub fn issue_and_store(
        &self,
        email: &str,
        fingerprint: &DeviceFingerprint,
        store: &LicenseStore,
    ) -> IssueResult<LicenseToken> {
        let token = self.issue(email, fingerprint)?;
        install_token(&token, store)?;
        if let Err(e) = store.clear_pending() {
            warn!(error = %e, "approved, but the pending request could not be cleared");
        }
        Ok(token)
    }
}

/// Writes an issued token into `store`.
///
/// # Errors
///
/// Returns `Token` if the token cannot be encoded and `Store` if the write
/// fails.
pub fn install_token(token: &LicenseToken, store: &LicenseStore) -> IssueResult<()> {
    let encoded = token.encode().map_err(IssueError::Token)?;
    store.save(encoded.as_bytes()).map_err(IssueError::Store)?;
    info!(path = %store.token_path().display(), "license token installed");
    Ok(())
}

/// Verifies a relayed token with `key` before writing it into `store`.
///
/// # Errors
///
/// Returns `Token` if the token does not decode or verify, and `Store` if
/// the write fails.
pub fn install_encoded(
    encoded: &str,
    key: &VerifyingKey,
    store: &LicenseStore,
) -> IssueResult<LicenseToken> {
    let token =
        LicenseToken::decode_with_key(encoded.as_bytes(), key).map_err(IssueError::Token)?;
    install_token(&token, store)?;
    Ok(token)
}
