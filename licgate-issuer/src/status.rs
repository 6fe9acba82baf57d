//! Read-only license status for the administrator tool.

use ed25519_dalek::VerifyingKey;
use licgate_license::{
    Clock, DomainPolicy, FingerprintSource, LicenseState, LicenseStore, ValidationScheduler,
};
use std::sync::Arc;
use std::time::Duration;

/// Runs one validation pass over `store` and reports the result.
///
/// The pass has no activation flow attached, so a failing check never
/// notifies administrators.
pub async fn local_status(
    store: LicenseStore,
    key: VerifyingKey,
    policy: DomainPolicy,
    store_timeout: Duration,
    fingerprints: Arc<dyn FingerprintSource>,
    clock: Arc<dyn Clock>,
) -> LicenseState {
    ValidationScheduler::new(store, key, policy, fingerprints, clock)
        .with_store_timeout(store_timeout)
        .check_now()
        .await
}
