//! Activation requests sent to administrators.

use crate::clock::Clock;
use crate::device::{DeviceFingerprint, DeviceInfo, FingerprintSource};
use crate::error::LicenseResult;
use crate::policy::DomainPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A request for an administrator to approve this installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRequest {
    /// Correlation ID quoted in the admin mail.
    pub request_id: Uuid,
    /// Requesting user's email (normalized).
    pub email: String,
    /// Fingerprint of the requesting machine.
    pub fingerprint: DeviceFingerprint,
    /// When the request was built.
    pub requested_at: DateTime<Utc>,
    /// Descriptive host details for the administrator.
    pub device: DeviceInfo,
}

impl ActivationRequest {
    /// One-line description used as the mail subject.
    pub fn summary(&self) -> String {
        format!(
            "License activation request: {} on {}",
            self.email, self.device.hostname
        )
    }

    /// Plain-text body with everything the administrator needs to decide.
    pub fn body(&self) -> String {
        format!(
            "A new installation is requesting a license.\n\n\
             Request ID:  {}\n\
             Email:       {}\n\
             Fingerprint: {}\n\
             Requested:   {}\n\
             Host:        {} ({} {}, {})\n\n\
             To approve, run on the requesting machine:\n\n    \
             licgate-admin approve --key <signing-key-file>\n\n\
             or, from any machine, issue a token to relay back:\n\n    \
             licgate-admin approve --key <signing-key-file> --email {} --fingerprint {} --emit\n",
            self.request_id,
            self.email,
            self.fingerprint,
            self.requested_at.to_rfc3339(),
            self.device.hostname,
            self.device.os_name,
            self.device.os_version,
            self.device.arch,
            self.email,
            self.fingerprint,
        )
    }
}

/// Builds activation requests for the current machine.
pub struct RequestBuilder {
    policy: DomainPolicy,
    fingerprints: Arc<dyn FingerprintSource>,
    clock: Arc<dyn Clock>,
}

impl RequestBuilder {
    /// Creates a builder enforcing `policy`.
    pub fn new(
        policy: DomainPolicy,
        fingerprints: Arc<dyn FingerprintSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            policy,
            fingerprints,
            clock,
        }
    }

    /// Returns the policy this builder enforces.
    pub fn policy(&self) -> &DomainPolicy {
        &self.policy
    }

    /// Builds a request for `email`.
    ///
    /// The domain check happens first and locally; nothing is sent.
    ///
    /// # Errors
    ///
    /// Returns `DomainRejected` if `email` is not on an approved domain.
    pub fn build(&self, email: &str) -> LicenseResult<ActivationRequest> {
        let email = self.policy.check(email)?;
        Ok(ActivationRequest {
            request_id: Uuid::now_v7(),
            email,
            fingerprint: self.fingerprints.fingerprint(),
            requested_at: self.clock.now(),
            device: DeviceInfo::collect(),
        })
    }
}
