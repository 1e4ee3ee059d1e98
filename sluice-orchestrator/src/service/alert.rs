//! Alert channel
//!
//! A pub/sub sink for operator alerts. Publishing fans one message out to
//! every subscriber concurrently, so a slow subscriber never holds back the
//! others. A subscriber failing to deliver is logged and never reaches the
//! publisher.

use async_trait::async_trait;
use sluice_core::domain::alert::AlertMessage;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Upper bound on a single webhook delivery
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned status {0}")]
    Status(u16),
}

/// A destination for alert messages
#[async_trait]
pub trait AlertSubscriber: Send + Sync {
    /// Identity used in logs
    fn name(&self) -> &str;

    async fn deliver(&self, alert: &AlertMessage) -> Result<(), AlertError>;
}

/// Named topic with any number of subscribers
pub struct AlertChannel {
    topic: String,
    subscribers: RwLock<Vec<Arc<dyn AlertSubscriber>>>,
}

impl AlertChannel {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn subscribe(&self, subscriber: Arc<dyn AlertSubscriber>) {
        info!(
            "Subscriber '{}' added to alert topic '{}'",
            subscriber.name(),
            self.topic
        );
        self.subscribers.write().unwrap().push(subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap().len()
    }

    /// Delivers `alert` to every subscriber
    ///
    /// Resolves once every delivery has finished or failed.
    pub async fn publish(&self, alert: AlertMessage) {
        let subscribers = self.subscribers.read().unwrap().clone();

        if subscribers.is_empty() {
            warn!(
                "Alert on topic '{}' has no subscribers: {}",
                self.topic,
                alert.render()
            );
            return;
        }

        let alert = Arc::new(alert);
        let mut deliveries = JoinSet::new();
        for subscriber in subscribers {
            let alert = Arc::clone(&alert);
            deliveries.spawn(async move {
                let result = subscriber.deliver(&alert).await;
                (subscriber, result)
            });
        }

        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((subscriber, Err(e))) => error!(
                    "Failed to deliver alert to '{}' on topic '{}': {}",
                    subscriber.name(),
                    self.topic,
                    e
                ),
                Err(e) => error!("Alert delivery task on topic '{}' panicked: {}", self.topic, e),
            }
        }
    }
}

/// Writes alerts to the tracing log
pub struct LogSubscriber {}

impl LogSubscriber {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for LogSubscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertSubscriber for LogSubscriber {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, alert: &AlertMessage) -> Result<(), AlertError> {
        error!(target: "sluice::alerts", "{}", alert.render());
        Ok(())
    }
}

/// POSTs alerts as JSON to a webhook
pub struct WebhookSubscriber {
    url: String,
    client: reqwest::Client,
}

impl WebhookSubscriber {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, reqwest::Client::new())
    }

    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl AlertSubscriber for WebhookSubscriber {
    fn name(&self) -> &str {
        &self.url
    }

    async fn deliver(&self, alert: &AlertMessage) -> Result<(), AlertError> {
        let body = serde_json::json!({
            "message": alert.render(),
            "alert": alert,
        });

        let response = self
            .client
            .post(&self.url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AlertError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Keeps the most recent alerts in memory
pub struct MemorySubscriber {
    capacity: usize,
    messages: Mutex<VecDeque<AlertMessage>>,
}

impl MemorySubscriber {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: Mutex::new(VecDeque::new()),
        }
    }

    /// Retained alerts, oldest first
    pub fn messages(&self) -> Vec<AlertMessage> {
        self.messages.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl AlertSubscriber for MemorySubscriber {
    fn name(&self) -> &str {
        "memory"
    }

    async fn deliver(&self, alert: &AlertMessage) -> Result<(), AlertError> {
        let mut messages = self.messages.lock().unwrap();
        if messages.len() == self.capacity {
            messages.pop_front();
        }
        messages.push_back(alert.clone());
        Ok(())
    }
}
