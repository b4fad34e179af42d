use std::time::Duration;

use anyhow::Context as _;
use serde::Serialize;

use crate::domain::repository::Notifier;
use crate::error::OtpServiceError;

const RELAY_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON payload accepted by the mail relay.
#[derive(Debug, Serialize)]
struct MailMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Posts messages to an HTTP mail relay.
#[derive(Clone)]
pub struct MailRelay {
    client: reqwest::Client,
    url: String,
    from: String,
}

impl MailRelay {
    pub fn new(url: String, from: String) -> Result<Self, OtpServiceError> {
        let client = reqwest::Client::builder()
            .timeout(RELAY_TIMEOUT)
            .build()
            .context("build mail relay client")?;
        Ok(Self { client, url, from })
    }

    async fn post(&self, to: &str, subject: &str, text: &str) -> anyhow::Result<()> {
        let message = MailMessage {
            from: &self.from,
            to,
            subject,
            text,
        };
        self.client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .context("send to mail relay")?
            .error_for_status()
            .context("mail relay rejected message")?;
        Ok(())
    }
}

/// Notifier used by the service binary.
#[derive(Clone)]
pub enum MailNotifier {
    Relay(MailRelay),
    /// No relay configured; messages are dropped.
    Disabled,
}

impl MailNotifier {
    pub fn from_relay_url(
        url: Option<String>,
        from: String,
    ) -> Result<Self, OtpServiceError> {
        match url {
            Some(url) if !url.trim().is_empty() => Ok(Self::Relay(MailRelay::new(url, from)?)),
            _ => Ok(Self::Disabled),
        }
    }
}

impl Notifier for MailNotifier {
    async fn send(
        &self,
        destination: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), OtpServiceError> {
        match self {
            Self::Relay(relay) => relay
                .post(destination, subject, body)
                .await
                .map_err(OtpServiceError::Delivery),
            Self::Disabled => {
                // Never log `body`; it carries the code.
                tracing::warn!(subject, "mail relay not configured, notification dropped");
                Ok(())
            }
        }
    }
}
