//! Licensing and activation gate for the automation tool.
//!
//! This crate handles:
//! - License token verification via Ed25519 signatures
//! - Device fingerprinting for machine binding
//! - Corporate email-domain policy
//! - Activation requests mailed to administrators
//! - Startup and periodic re-validation (Locked/Unlocked)
//!
//! # Design Principles
//!
//! - **Verify, never mint**: only a verifying key is compiled in; tokens are
//!   signed by the separate administrator tool
//! - **Fail closed**: every check failure leaves the application Locked
//! - **Human approval**: every activation is approved out of band
//! - **Device binding**: a token is tied to the machine it was issued for
//!
//! # Token Format
//!
//! Tokens are formatted as: `lg1.base64url(payload).base64url(signature)`
//! The payload is a JSON object with the subject email, device fingerprint,
//! issue time, and an expiry exactly six months later.

mod activation;
mod clock;
mod config;
mod device;
mod error;
mod gate;
mod notify;
mod policy;
mod request;
mod scheduler;
mod store;
mod token;
mod validation;

pub use activation::{ActivationFlow, ActivationOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LicenseConfig, NotifierConfig};
pub use device::{
    DeviceFingerprint, DeviceInfo, FingerprintSource, HostFingerprint, StaticFingerprint,
};
pub use error::{LicenseError, LicenseResult};
pub use gate::LicenseGate;
pub use notify::{AdminNotifier, DisabledNotifier, Dispatcher, MailRelayNotifier};
pub use policy::{DEFAULT_APPROVED_DOMAIN, DomainPolicy};
pub use request::{ActivationRequest, RequestBuilder};
pub use scheduler::{
    DEFAULT_RECHECK_INTERVAL, DEFAULT_STORE_TIMEOUT, LicenseState, ValidationScheduler,
};
pub use store::{LicenseStore, PENDING_FILE, TOKEN_FILE, with_deadline};
pub use token::{
    ISSUE_CLOCK_SKEW_SECS, LICENSE_VALIDITY_MONTHS, LicenseClaims, LicenseToken, TOKEN_VERSION,
    embedded_verifying_key, expiry_for, verifying_key_from_base64,
};
pub use validation::{check_token, validate_token};
