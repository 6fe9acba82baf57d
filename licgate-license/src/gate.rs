//! The surface the host application talks to.

use crate::activation::{ActivationFlow, ActivationOutcome};
use crate::clock::{Clock, SystemClock};
use crate::config::LicenseConfig;
use crate::device::{FingerprintSource, HostFingerprint};
use crate::error::LicenseResult;
use crate::notify::{AdminNotifier, DisabledNotifier, Dispatcher, MailRelayNotifier};
use crate::request::RequestBuilder;
use crate::scheduler::{LicenseState, ValidationScheduler};
use crate::store::LicenseStore;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Running license gate: startup check done, periodic checks scheduled.
pub struct LicenseGate {
    scheduler: Arc<ValidationScheduler>,
    activation: Arc<ActivationFlow>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LicenseGate {
    /// Application startup hook.
    ///
    /// Wires the subsystem from `config` for the real host, runs the initial
    /// check before returning, and spawns the periodic re-check. Must be
    /// called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `Config` for invalid configuration and `Storage` if no store
    /// location can be determined. Token problems never fail startup; they
    /// leave the gate Locked.
    pub async fn start(config: LicenseConfig) -> LicenseResult<Self> {
        config.validate()?;

        let store = match &config.store_dir {
            Some(dir) => LicenseStore::at(dir),
            None => LicenseStore::open_default(&config.app_name)?,
        };
        let notifier: Arc<dyn AdminNotifier> = if config.notifier.is_configured() {
            Arc::new(MailRelayNotifier::new(config.notifier.clone())?)
        } else {
            warn!("no administrator notification channel configured");
            Arc::new(DisabledNotifier)
        };
        let fingerprints: Arc<dyn FingerprintSource> = Arc::new(HostFingerprint);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let activation = Arc::new(ActivationFlow::new(
            RequestBuilder::new(config.domain_policy()?, fingerprints.clone(), clock.clone()),
            Dispatcher::new(notifier, config.dispatch_timeout()),
            store.clone(),
            config.store_timeout(),
        ));
        let scheduler = ValidationScheduler::new(
            store,
            config.verifying_key()?,
            config.domain_policy()?,
            fingerprints,
            clock,
        )
        .with_activation(activation.clone())
        .with_recheck_interval(config.recheck_interval())
        .with_store_timeout(config.store_timeout());

        Ok(Self::start_with(Arc::new(scheduler), activation).await)
    }

    /// Starts a gate from pre-built parts.
    pub async fn start_with(
        scheduler: Arc<ValidationScheduler>,
        activation: Arc<ActivationFlow>,
    ) -> Self {
        let state = scheduler.check_now().await;
        info!(?state, "startup license check complete");

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(scheduler.clone().run(shutdown_rx));
        Self {
            scheduler,
            activation,
            shutdown,
            task,
        }
    }

    /// Whether protected features may run.
    pub fn is_licensed(&self) -> bool {
        self.scheduler.is_licensed()
    }

    /// Current state.
    pub fn state(&self) -> LicenseState {
        self.scheduler.state()
    }

    /// Requests activation for `email` on behalf of the user.
    pub async fn request_activation(&self, email: &str) -> ActivationOutcome {
        self.activation.request(email).await
    }

    /// Runs a check immediately, e.g. after an administrator approved this
    /// machine.
    pub async fn check_now(&self) -> LicenseState {
        self.scheduler.check_now().await
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<LicenseState> {
        self.scheduler.subscribe()
    }

    /// Returns the scheduler.
    pub fn scheduler(&self) -> &Arc<ValidationScheduler> {
        &self.scheduler
    }

    /// Stops periodic checks and waits for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}
