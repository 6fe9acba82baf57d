//! Shared test helpers for issuer tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use ed25519_dalek::SigningKey;
use licgate_issuer::Issuer;
use licgate_license::{
    ActivationRequest, DomainPolicy, ManualClock, RequestBuilder, StaticFingerprint,
};
use std::sync::Arc;

pub const MACHINE_A: &str = "machine-a-fingerprint";
pub const MACHINE_B: &str = "machine-b-fingerprint";

/// Deterministic administrator key.
pub fn admin_key() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

/// 2026-03-02T14:30:00Z.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 0).unwrap()
}

/// An issuer on the default policy whose clock starts at [`t0`].
pub fn issuer_at(clock: Arc<ManualClock>) -> Issuer {
    Issuer::with_clock(admin_key(), DomainPolicy::default(), clock)
}

/// A request as an installation on `machine` would build it.
pub fn request_from(machine: &str, email: &str) -> ActivationRequest {
    RequestBuilder::new(
        DomainPolicy::default(),
        Arc::new(StaticFingerprint::new(machine)),
        Arc::new(ManualClock::new(t0())),
    )
    .build(email)
    .unwrap()
}
