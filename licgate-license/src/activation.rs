//! The user-facing activation flow: build, remember, dispatch once.

use crate::error::LicenseError;
use crate::notify::Dispatcher;
use crate::request::RequestBuilder;
use crate::store::{LicenseStore, with_deadline};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Result of a user's activation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationOutcome {
    /// Administrators were notified.
    Sent,
    /// The email is not on an approved domain; nothing was sent.
    DomainRejected,
    /// The notification could not be delivered; contact an admin manually.
    DispatchFailed,
}

impl ActivationOutcome {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Sent => "Activation request sent. An administrator will approve this machine.",
            Self::DomainRejected => "Please use your corporate email address.",
            Self::DispatchFailed => {
                "Activation request failed. Please contact an administrator directly."
            }
        }
    }
}

/// Builds activation requests, records them, and notifies administrators.
pub struct ActivationFlow {
    builder: RequestBuilder,
    dispatcher: Dispatcher,
    store: LicenseStore,
    store_timeout: Duration,
}

impl ActivationFlow {
    /// Creates a flow writing pending requests to `store`.
    pub fn new(
        builder: RequestBuilder,
        dispatcher: Dispatcher,
        store: LicenseStore,
        store_timeout: Duration,
    ) -> Self {
        Self {
            builder,
            dispatcher,
            store,
            store_timeout,
        }
    }

    /// Requests activation for `email` with a single dispatch attempt.
    pub async fn request(&self, email: &str) -> ActivationOutcome {
        let request = match self.builder.build(email) {
            Ok(request) => request,
            Err(LicenseError::DomainRejected(rejected)) => {
                info!(email = %rejected, "activation request rejected by domain policy");
                return ActivationOutcome::DomainRejected;
            }
            Err(e) => {
                warn!(error = %e, "could not build activation request");
                return ActivationOutcome::DispatchFailed;
            }
        };

        let store = self.store.clone();
        let pending = request.clone();
        let saved = with_deadline(self.store_timeout, move || store.save_pending(&pending)).await;
        if let Err(e) = saved {
            warn!(error = %e, "could not record pending activation request");
        }

        match self.dispatcher.dispatch(&request).await {
            Ok(()) => ActivationOutcome::Sent,
            Err(_) => ActivationOutcome::DispatchFailed,
        }
    }

    /// Email of the pending request on this machine, if any.
    pub async fn pending_email(&self) -> Option<String> {
        let store = self.store.clone();
        match with_deadline(self.store_timeout, move || store.load_pending()).await {
            Ok(pending) => pending.map(|r| r.email),
            Err(e) => {
                warn!(error = %e, "could not read pending activation request");
                None
            }
        }
    }
}
