//! Configuration for the licensing gate.

use crate::error::{LicenseError, LicenseResult};
use crate::policy::{DEFAULT_APPROVED_DOMAIN, DomainPolicy};
use crate::token::{embedded_verifying_key, verifying_key_from_base64};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Mail relay settings for administrator notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// HTTPS endpoint of the mail relay.
    pub endpoint: String,
    /// Bearer token for the relay.
    pub api_token: String,
    /// Sender address.
    pub sender: String,
    /// Administrator recipients.
    pub recipients: Vec<String>,
    /// Per-request HTTP timeout (seconds).
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_token: String::new(),
            sender: "licgate@shopee.com".to_string(),
            recipients: Vec::new(),
            timeout_secs: 10,
        }
    }
}

impl NotifierConfig {
    /// True when an endpoint and at least one recipient are set.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty() && !self.recipients.is_empty()
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    /// Directory name under the per-user data directory.
    pub app_name: String,
    /// Explicit store directory, overriding the per-user default.
    pub store_dir: Option<PathBuf>,
    /// Email domains allowed to hold a license.
    pub approved_domains: Vec<String>,
    /// Base64 Ed25519 verifying key overriding the embedded one.
    pub verifying_key: Option<String>,
    /// Interval between periodic re-checks (seconds).
    pub recheck_interval_secs: u64,
    /// Deadline for a single store read (seconds).
    pub store_timeout_secs: u64,
    /// Deadline for a single notification attempt (seconds).
    pub dispatch_timeout_secs: u64,
    /// Administrator notification channel.
    pub notifier: NotifierConfig,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            app_name: "licgate".to_string(),
            store_dir: None,
            approved_domains: vec![DEFAULT_APPROVED_DOMAIN.to_string()],
            verifying_key: None,
            recheck_interval_secs: 4 * 60 * 60,
            store_timeout_secs: 5,
            dispatch_timeout_secs: 10,
            notifier: NotifierConfig::default(),
        }
    }
}

impl LicenseConfig {
    /// Loads configuration from a JSON file. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, `Serialization` if it is not
    /// valid JSON, and `Config` if [`validate`](Self::validate) fails.
    pub fn from_file(path: &Path) -> LicenseResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `Config` describing the first problem found.
    pub fn validate(&self) -> LicenseResult<()> {
        if self.app_name.trim().is_empty() {
            return Err(LicenseError::Config("app_name must not be empty".to_string()));
        }
        if self.recheck_interval_secs == 0 {
            return Err(LicenseError::Config(
                "recheck_interval_secs must be positive".to_string(),
            ));
        }
        if self.store_timeout_secs == 0 || self.dispatch_timeout_secs == 0 {
            return Err(LicenseError::Config("timeouts must be positive".to_string()));
        }
        self.domain_policy()?;
        self.verifying_key()?;
        Ok(())
    }

    /// Builds the domain policy.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the domain list is empty or invalid.
    pub fn domain_policy(&self) -> LicenseResult<DomainPolicy> {
        DomainPolicy::new(&self.approved_domains)
    }

    /// Returns the verifying key: the configured override, else the embedded key.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the override is not a valid key.
    pub fn verifying_key(&self) -> LicenseResult<VerifyingKey> {
        match &self.verifying_key {
            Some(encoded) => verifying_key_from_base64(encoded),
            None => embedded_verifying_key(),
        }
    }

    /// Periodic re-check interval.
    pub fn recheck_interval(&self) -> Duration {
        Duration::from_secs(self.recheck_interval_secs)
    }

    /// Store read deadline.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Notification deadline.
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }
}
