//! Approved-domain policy for activation emails.
//!
//! The rule is an exact, case-insensitive match of the domain part against
//! the configured list. Subdomains of an approved domain are not approved.

use crate::error::{LicenseError, LicenseResult};

/// Default corporate domain.
pub const DEFAULT_APPROVED_DOMAIN: &str = "shopee.com";

/// The set of email domains allowed to request and hold a license.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPolicy {
    domains: Vec<String>,
}

impl DomainPolicy {
    /// Creates a policy from a list of approved domains.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the list is empty or an entry is not a bare domain.
    pub fn new<I, S>(domains: I) -> LicenseResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized = Vec::new();
        for d in domains {
            let d = d.as_ref().trim().trim_start_matches('@').to_ascii_lowercase();
            if d.is_empty()
                || d.contains('@')
                || d.contains(char::is_whitespace)
                || !d.contains('.')
            {
                return Err(LicenseError::Config(format!(
                    "approved domain {:?} is not a bare domain name",
                    d
                )));
            }
            if !normalized.contains(&d) {
                normalized.push(d);
            }
        }
        if normalized.is_empty() {
            return Err(LicenseError::Config(
                "at least one approved domain is required".to_string(),
            ));
        }
        Ok(Self {
            domains: normalized,
        })
    }

    /// Returns the approved domains, lower-cased.
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Checks `email` and returns its normalized (trimmed, lower-cased) form.
    ///
    /// # Errors
    ///
    /// Returns `DomainRejected` if the address is malformed or its domain is
    /// not on the approved list.
    pub fn check(&self, email: &str) -> LicenseResult<String> {
        let normalized = email.trim().to_lowercase();
        let rejected = || LicenseError::DomainRejected(email.trim().to_string());

        let (local, domain) = normalized.split_once('@').ok_or_else(rejected)?;
        if local.is_empty() || domain.contains('@') || local.contains(char::is_whitespace) {
            return Err(rejected());
        }
        if !self.domains.iter().any(|d| d == domain) {
            return Err(rejected());
        }
        Ok(normalized)
    }

    /// Returns true if `email` passes [`check`](Self::check).
    pub fn is_allowed(&self, email: &str) -> bool {
        self.check(email).is_ok()
    }
}

impl Default for DomainPolicy {
    fn default() -> Self {
        Self {
            domains: vec![DEFAULT_APPROVED_DOMAIN.to_string()],
        }
    }
}
