//! Out-of-band administrator notification.
//!
//! Activation requests are mailed to a fixed recipient list through an
//! authenticated HTTP mail relay. Delivery is attempted exactly once.

use crate::config::NotifierConfig;
use crate::error::{LicenseError, LicenseResult};
use crate::request::ActivationRequest;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A channel that can alert administrators about an activation request.
#[async_trait]
pub trait AdminNotifier: Send + Sync {
    /// Name of the channel, for logs.
    fn channel_name(&self) -> &'static str;

    /// Delivers `request` to every administrator.
    async fn notify(&self, request: &ActivationRequest) -> LicenseResult<()>;
}

#[derive(Debug, Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a [String],
    subject: String,
    text: String,
}

/// Sends mail through an HTTP mail relay (`POST {endpoint}` with a bearer
/// token and a JSON `{from, to, subject, text}` body).
pub struct MailRelayNotifier {
    config: NotifierConfig,
    client: Client,
}

impl MailRelayNotifier {
    /// Creates a notifier for `config`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the recipient list is empty or the HTTP client
    /// cannot be built.
    pub fn new(config: NotifierConfig) -> LicenseResult<Self> {
        if config.recipients.is_empty() {
            return Err(LicenseError::Config(
                "at least one administrator recipient is required".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LicenseError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    /// Returns the configured recipients.
    pub fn recipients(&self) -> &[String] {
        &self.config.recipients
    }
}

#[async_trait]
impl AdminNotifier for MailRelayNotifier {
    fn channel_name(&self) -> &'static str {
        "mail-relay"
    }

    async fn notify(&self, request: &ActivationRequest) -> LicenseResult<()> {
        let mail = OutgoingMail {
            from: &self.config.sender,
            to: &self.config.recipients,
            subject: request.summary(),
            text: request.body(),
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_token)
            .json(&mail)
            .send()
            .await
            .map_err(|e| LicenseError::DispatchFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LicenseError::DispatchFailed(format!(
                "mail relay returned {status}: {body}"
            )));
        }
        Ok(())
    }
}

/// A notifier for installations without a configured channel.
#[derive(Debug, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl AdminNotifier for DisabledNotifier {
    fn channel_name(&self) -> &'static str {
        "disabled"
    }

    async fn notify(&self, _request: &ActivationRequest) -> LicenseResult<()> {
        Err(LicenseError::DispatchFailed(
            "no notification channel configured".to_string(),
        ))
    }
}

/// Sends activation requests with a bounded deadline.
#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn AdminNotifier>,
    timeout: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher that gives up after `timeout`.
    pub fn new(notifier: Arc<dyn AdminNotifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    /// Makes one delivery attempt for `request`.
    ///
    /// # Errors
    ///
    /// Returns `DispatchFailed` on any channel error or when the deadline
    /// passes. The caller is expected not to retry.
    pub async fn dispatch(&self, request: &ActivationRequest) -> LicenseResult<()> {
        let channel = self.notifier.channel_name();
        let result = match tokio::time::timeout(self.timeout, self.notifier.notify(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(LicenseError::DispatchFailed(format!(
                "timed out after {:?}",
                self.timeout
            ))),
        };

        match result {
            Ok(()) => {
                info!(
                    channel,
                    request_id = %request.request_id,
                    email = %request.email,
                    "activation request sent to administrators"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    channel,
                    request_id = %request.request_id,
                    error = %e,
                    "activation request could not be delivered"
                );
                if matches!(e, LicenseError::DispatchFailed(_)) {
                    Err(e)
                } else {
                    Err(LicenseError::DispatchFailed(e.to_string()))
                }
            }
        }
    }
}
