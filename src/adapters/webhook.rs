//! Report delivery
//!
//! Sends run reports to a chat webhook (Feishu/Lark text message format),
//! or to the log when no webhook is configured.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SnipeError};

/// Delivers a serialized report under a subject line
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<()>;
}

/// Webhook notification client
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
}

#[derive(Serialize)]
struct WebhookMessage {
    msg_type: String,
    content: WebhookContent,
}

#[derive(Serialize)]
struct WebhookContent {
    text: String,
}

/// Upper bound on one webhook delivery
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

impl WebhookNotifier {
    /// Create a new webhook notifier with explicit URL
    pub fn new(webhook_url: String) -> Result<Arc<Self>> {
        Self::with_timeout(webhook_url, DELIVERY_TIMEOUT)
    }

    pub fn with_timeout(webhook_url: String, timeout: Duration) -> Result<Arc<Self>> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Arc::new(Self {
            client,
            webhook_url,
        }))
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let message = WebhookMessage {
            msg_type: "text".to_string(),
            content: WebhookContent {
                text: format!("{}\n\n{}", subject, body),
            },
        };

        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await?;

        if resp.status().is_success() {
            debug!("Report delivered: {}", subject);
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!("Webhook notification failed: {} - {}", status, body);
            Err(SnipeError::Notification(format!("HTTP {}: {}", status, body)))
        }
    }
}

/// Writes reports to the log instead of delivering them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        info!("{}\n{}", subject, body);
        Ok(())
    }
}

/// Pick the notifier for the configured webhook, if any
pub fn build_notifier(webhook_url: Option<&str>) -> Arc<dyn Notifier> {
    match webhook_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => match WebhookNotifier::new(url.to_string()) {
            Ok(notifier) => {
                info!("Webhook notifications enabled");
                notifier
            }
            Err(e) => {
                warn!("Webhook client unavailable, reports go to the log: {}", e);
                Arc::new(LogNotifier)
            }
        },
        None => {
            info!("No webhook configured, reports go to the log");
            Arc::new(LogNotifier)
        }
    }
}
