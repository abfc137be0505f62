//! Operator alert channel. The pipeline decides when to alert and what to
//! say; delivery belongs to the implementation.
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, warn};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Writes alerts to the log only.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        warn!(alert = subject, "{body}");
        Ok(())
    }
}

/// POSTs `{"subject": .., "body": ..}` to a webhook (mail gateway, chat bridge).
#[derive(Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    pub fn with_client(http: Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        #[derive(Serialize)]
        struct Alert<'a> {
            subject: &'a str,
            body: &'a str,
        }

        let res = self
            .http
            .post(&self.url)
            .json(&Alert { subject, body })
            .send()
            .await?;
        if !res.status().is_success() {
            anyhow::bail!("alert webhook failed with {}", res.status());
        }
        Ok(())
    }
}

/// Deliver an alert; a failed delivery is logged and otherwise ignored.
pub async fn alert(notifier: &dyn Notifier, subject: &str, body: &str) {
    if let Err(e) = notifier.notify(subject, body).await {
        error!(alert = subject, "failed to deliver alert: {e:#}");
    }
}
