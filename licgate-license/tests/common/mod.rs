//! Shared test helpers for license tests.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeZone, Utc};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use licgate_license::{
    ActivationFlow, ActivationRequest, AdminNotifier, DeviceFingerprint, Dispatcher,
    DomainPolicy, LicenseClaims, LicenseError, LicenseResult, LicenseStore, LicenseToken,
    ManualClock, RequestBuilder, StaticFingerprint, ValidationScheduler,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const MACHINE_A: &str = "machine-a-fingerprint";
pub const MACHINE_B: &str = "machine-b-fingerprint";

/// Returns a deterministic Ed25519 key pair from a fixed seed.
pub fn test_keypair() -> (SigningKey, VerifyingKey) {
    let seed: [u8; 32] = [
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 27, 28, 29, 30, 31, 32,
    ];
    let signing_key = SigningKey::from_bytes(&seed);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key)
}

/// A second, unrelated key pair.
pub fn other_keypair() -> (SigningKey, VerifyingKey) {
    let signing_key = SigningKey::from_bytes(&[7u8; 32]);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key)
}

/// 2026-01-15T09:00:00Z.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap()
}

/// Signs a token for `email` bound to `fp`, issued at `iat`.
pub fn sign_token(sk: &SigningKey, email: &str, fp: &str, iat: DateTime<Utc>) -> LicenseToken {
    let claims = LicenseClaims::new(email, &DeviceFingerprint::from_id(fp), iat).unwrap();
    let input = claims.signing_input().unwrap();
    LicenseToken::from_parts(claims, sk.sign(input.as_bytes()))
}

/// Encoded form of [`sign_token`].
pub fn encoded_token(sk: &SigningKey, email: &str, fp: &str, iat: DateTime<Utc>) -> String {
    sign_token(sk, email, fp, iat).encode().unwrap()
}

/// Signs an arbitrary payload under an arbitrary version tag.
pub fn sign_raw(sk: &SigningKey, version: &str, payload_json: &str) -> String {
    let input = format!("{version}.{}", URL_SAFE_NO_PAD.encode(payload_json.as_bytes()));
    let signature = sk.sign(input.as_bytes());
    format!("{input}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes()))
}

/// Notifier that records requests and can be told to fail or stall.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<ActivationRequest>>,
    fail: bool,
    stall: Option<Duration>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn stalling(stall: Duration) -> Self {
        Self {
            stall: Some(stall),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<ActivationRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl AdminNotifier for RecordingNotifier {
    fn channel_name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, request: &ActivationRequest) -> LicenseResult<()> {
        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        if self.fail {
            return Err(LicenseError::DispatchFailed("relay unreachable".into()));
        }
        self.sent.lock().unwrap().push(request.clone());
        Ok(())
    }
}

/// One machine's worth of licensing components over a temp store.
pub struct Harness {
    pub dir: TempDir,
    pub store: LicenseStore,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub flow: Arc<ActivationFlow>,
    pub signing_key: SigningKey,
    pub verifying_key: VerifyingKey,
    pub fingerprint: String,
}

impl Harness {
    pub fn new(fingerprint: &str) -> Self {
        Self::with_notifier(fingerprint, RecordingNotifier::default())
    }

    pub fn with_notifier(fingerprint: &str, notifier: RecordingNotifier) -> Self {
        let dir = TempDir::new().unwrap();
        Self::in_dir(dir, fingerprint, notifier)
    }

    pub fn in_dir(dir: TempDir, fingerprint: &str, notifier: RecordingNotifier) -> Self {
        let store = LicenseStore::at(dir.path());
        let clock = Arc::new(ManualClock::new(t0()));
        let notifier = Arc::new(notifier);
        let (signing_key, verifying_key) = test_keypair();
        let flow = Arc::new(ActivationFlow::new(
            RequestBuilder::new(
                DomainPolicy::default(),
                Arc::new(StaticFingerprint::new(fingerprint)),
                clock.clone(),
            ),
            Dispatcher::new(notifier.clone(), Duration::from_secs(2)),
            store.clone(),
            Duration::from_secs(5),
        ));
        Self {
            dir,
            store,
            clock,
            notifier,
            flow,
            signing_key,
            verifying_key,
            fingerprint: fingerprint.to_string(),
        }
    }

    /// Scheduler for this machine, wired to the activation flow.
    pub fn scheduler(&self) -> ValidationScheduler {
        ValidationScheduler::new(
            self.store.clone(),
            self.verifying_key,
            DomainPolicy::default(),
            Arc::new(StaticFingerprint::new(self.fingerprint.clone())),
            self.clock.clone(),
        )
        .with_activation(self.flow.clone())
    }

    /// Writes a token for this machine issued at the harness clock's time.
    pub fn install(&self, email: &str) {
        let token = encoded_token(&self.signing_key, email, &self.fingerprint, t0());
        self.store.save(token.as_bytes()).unwrap();
    }
}
