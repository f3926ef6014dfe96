//! Transactional email to operations, customers and couriers.
//!
//! Sends are fire-and-forget from the caller's point of view: failures and
//! timeouts are logged and counted, never propagated.

pub mod templates;

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::config::MailerConfig;
use crate::error::GatewayError;
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), GatewayError>;
}

/// Sends `email`, bounded by `timeout`. Returns whether it went out.
pub async fn deliver(
    notifier: &dyn Notifier,
    metrics: &Metrics,
    email: Email,
    timeout: Duration,
) -> bool {
    let outcome = match tokio::time::timeout(timeout, notifier.send(&email)).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout(timeout)),
    };

    match outcome {
        Ok(()) => {
            metrics.notifications_total.with_label_values(&["sent"]).inc();
            true
        }
        Err(err) => {
            metrics
                .notifications_total
                .with_label_values(&["failed"])
                .inc();
            warn!(to = %email.to, subject = %email.subject, error = %err, "email not sent");
            false
        }
    }
}

/// MailerSend HTTP API client.
pub struct MailerSendNotifier {
    client: Client,
    base_url: String,
    api_key: String,
    sender_email: String,
    sender_name: String,
}

impl MailerSendNotifier {
    pub fn new(config: &MailerConfig, timeout: Duration) -> Result<Self, GatewayError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| GatewayError::NotConfigured("MAILERSEND_API_KEY not set".to_string()))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key,
            sender_email: config.sender_email.clone(),
            sender_name: config.sender_name.clone(),
        })
    }
}

#[async_trait]
impl Notifier for MailerSendNotifier {
    async fn send(&self, email: &Email) -> Result<(), GatewayError> {
        let body = json!({
            "from": { "email": self.sender_email, "name": self.sender_name },
            "to": [{ "email": email.to }],
            "subject": email.subject,
            "html": email.html,
        });

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// Emails kept by an [`OutboxNotifier`] unless configured otherwise.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Keeps the most recent emails in memory and logs them instead of sending.
/// Used when no mail provider is configured and by tests. Once `capacity`
/// emails are held the oldest is dropped.
pub struct OutboxNotifier {
    sent: Mutex<VecDeque<Email>>,
    capacity: usize,
    failing: AtomicBool,
}

impl Default for OutboxNotifier {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_OUTBOX_CAPACITY)
    }
}

impl OutboxNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sent: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_OUTBOX_CAPACITY))),
            capacity,
            failing: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent send fail after recording the attempt.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent
            .lock()
            .map(|sent| sent.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn sent_to(&self, to: &str) -> Vec<Email> {
        self.sent()
            .into_iter()
            .filter(|email| email.to == to)
            .collect()
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn send(&self, email: &Email) -> Result<(), GatewayError> {
        if let Ok(mut sent) = self.sent.lock() {
            if self.capacity > 0 {
                while sent.len() >= self.capacity {
                    sent.pop_front();
                }
                sent.push_back(email.clone());
            }
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Status {
                status: 503,
                body: "outbox configured to fail".to_string(),
            });
        }

        info!(to = %email.to, subject = %email.subject, "email queued to outbox");
        Ok(())
    }
}
