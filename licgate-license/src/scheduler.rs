//! Validation scheduler: the Locked/Unlocked state machine.
//!
//! The scheduler only reads the store. It checks the token at startup and on
//! a fixed interval, publishes the resulting state on a `watch` channel, and
//! kicks off the activation flow when the application falls back to Locked.

use crate::activation::{ActivationFlow, ActivationOutcome};
use crate::clock::Clock;
use crate::device::FingerprintSource;
use crate::error::{LicenseError, LicenseResult};
use crate::policy::DomainPolicy;
use crate::store::{LicenseStore, with_deadline};
use crate::token::LicenseToken;
use crate::validation::check_token;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Default interval between periodic checks.
pub const DEFAULT_RECHECK_INTERVAL: Duration = Duration::from_secs(4 * 60 * 60);

/// Default deadline for a store read.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether the application may run its protected features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseState {
    /// No valid license; only the activation UI is available.
    Locked,
    /// A valid license is present for this machine.
    Unlocked,
}

impl LicenseState {
    /// Returns true for `Unlocked`.
    pub fn is_unlocked(&self) -> bool {
        matches!(self, Self::Unlocked)
    }
}

#[derive(Debug, Default)]
struct CheckMemory {
    /// Reason label of the last failed check, `None` after a success.
    last_reason: Option<&'static str>,
    /// Most recent approved email seen on a token.
    known_email: Option<String>,
}

/// Periodically validates the stored license.
pub struct ValidationScheduler {
    store: LicenseStore,
    key: VerifyingKey,
    policy: DomainPolicy,
    fingerprints: Arc<dyn FingerprintSource>,
    clock: Arc<dyn Clock>,
    activation: Option<Arc<ActivationFlow>>,
    recheck_interval: Duration,
    store_timeout: Duration,
    state: watch::Sender<LicenseState>,
    memory: Mutex<CheckMemory>,
    /// Held for a whole pass so overlapping callers observe each other's result.
    pass: AsyncMutex<()>,
    reactivation: Mutex<Option<JoinHandle<ActivationOutcome>>>,
}

impl ValidationScheduler {
    /// Creates a scheduler in the `Locked` state.
    pub fn new(
        store: LicenseStore,
        key: VerifyingKey,
        policy: DomainPolicy,
        fingerprints: Arc<dyn FingerprintSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state, _) = watch::channel(LicenseState::Locked);
        Self {
            store,
            key,
            policy,
            fingerprints,
            clock,
            activation: None,
            recheck_interval: DEFAULT_RECHECK_INTERVAL,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            state,
            memory: Mutex::new(CheckMemory::default()),
            pass: AsyncMutex::new(()),
            reactivation: Mutex::new(None),
        }
    }

    /// Re-triggers `flow` when the application locks.
    #[must_use]
    pub fn with_activation(mut self, flow: Arc<ActivationFlow>) -> Self {
        self.activation = Some(flow);
        self
    }

    /// Sets the periodic check interval.
    #[must_use]
    pub fn with_recheck_interval(mut self, interval: Duration) -> Self {
        self.recheck_interval = interval;
        self
    }

    /// Sets the store read deadline.
    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Current state.
    pub fn state(&self) -> LicenseState {
        *self.state.borrow()
    }

    /// True when the current state is `Unlocked`.
    pub fn is_licensed(&self) -> bool {
        self.state().is_unlocked()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<LicenseState> {
        self.state.subscribe()
    }

    /// Periodic check interval.
    pub fn recheck_interval(&self) -> Duration {
        self.recheck_interval
    }

    /// Runs one validation pass and publishes the result.
    ///
    /// Passes run one at a time; a caller arriving during a pass waits for it
    /// and then runs its own against the published state.
    pub async fn check_now(&self) -> LicenseState {
        let _pass = self.pass.lock().await;
        let previous = self.state();
        let (result, decoded_email) = self.evaluate().await;

        let (next, trigger) = {
            let mut memory = self.memory.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(email) = decoded_email {
                memory.known_email = Some(email);
            }
            match &result {
                Ok(()) => {
                    memory.last_reason = None;
                    (LicenseState::Unlocked, None)
                }
                Err(e) => {
                    let reason = e.reason();
                    let first_of_kind = memory.last_reason != Some(reason);
                    let trigger = previous.is_unlocked()
                        || (first_of_kind && !matches!(e, LicenseError::NoLicensePresent));
                    memory.last_reason = Some(reason);
                    (
                        LicenseState::Locked,
                        trigger.then(|| memory.known_email.clone()),
                    )
                }
            }
        };

        match &result {
            Ok(()) if previous != next => info!("license valid, application unlocked"),
            Ok(()) => debug!("license still valid"),
            Err(e) if previous != next => {
                warn!(reason = e.reason(), error = %e, "license check failed, application locked")
            }
            Err(e) => debug!(reason = e.reason(), error = %e, "application remains locked"),
        }

        self.state.send_replace(next);

        if let Some(email) = trigger {
            self.retrigger_activation(email).await;
        }
        next
    }

    /// Waits for the activation flow spawned by the last locking check.
    pub async fn wait_reactivation(&self) -> Option<ActivationOutcome> {
        let handle = self
            .reactivation
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()?;
        handle.await.ok()
    }

    /// Runs periodic checks until `shutdown` becomes `true` or its sender is
    /// dropped. The caller is expected to have run the startup check already.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.recheck_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_now().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("validation scheduler stopped");
                        break;
                    }
                }
            }
        }
    }

    /// Loads and checks the token. Store failures are treated as absence.
    async fn evaluate(&self) -> (LicenseResult<()>, Option<String>) {
        let store = self.store.clone();
        let bytes = match with_deadline(self.store_timeout, move || store.load()).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return (Err(LicenseError::NoLicensePresent), None),
            Err(e) => {
                warn!(error = %e, "license store unreadable, treating as unlicensed");
                return (Err(LicenseError::NoLicensePresent), None);
            }
        };

        let token = match LicenseToken::decode_with_key(&bytes, &self.key) {
            Ok(token) => token,
            Err(e) => return (Err(e), None),
        };
        let email = self
            .policy
            .is_allowed(token.subject_email())
            .then(|| token.subject_email().to_string());

        let current = self.fingerprints.fingerprint();
        (
            check_token(&token, &self.policy, &current, self.clock.now()),
            email,
        )
    }

    async fn retrigger_activation(&self, known_email: Option<String>) {
        let Some(flow) = self.activation.clone() else {
            return;
        };
        let email = match known_email {
            Some(email) => Some(email),
            None => flow.pending_email().await,
        };
        let Some(email) = email else {
            info!("license activation required; waiting for the user to request it");
            return;
        };

        info!(email = %email, "re-requesting activation");
        let handle = tokio::spawn(async move { flow.request(&email).await });
        *self.reactivation.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }
}
