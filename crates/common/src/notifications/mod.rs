//! Best-effort notification dispatch
//!
//! Provides:
//! - Notification events raised by the lifecycle engine
//! - Sink abstraction (log, webhook, recording)
//! - A bounded queue drained by a background worker
//!
//! `Dispatcher::notify` never blocks and never fails its caller. A full
//! queue, a failing sink, or a slow sink is logged and counted, then the
//! notification is dropped. There are no retries.

use crate::config::{NotificationConfig, NotificationSinkKind};
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    Assigned,
    Completed,
    StatusChanged,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::Assigned => "assigned",
            NotificationEvent::Completed => "completed",
            NotificationEvent::StatusChanged => "status_changed",
        }
    }
}

/// A message for one actor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub event: NotificationEvent,
    pub recipient_id: Uuid,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Trait for notification delivery
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification
    async fn deliver(&self, notification: &Notification) -> Result<()>;

    /// Get the sink name
    fn name(&self) -> &str;
}

/// Writes notifications to the log
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        info!(
            notification_id = %notification.id,
            event = notification.event.as_str(),
            recipient_id = %notification.recipient_id,
            payload = %notification.payload,
            "Notification"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// POSTs notifications as JSON to a fixed endpoint
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Internal {
                message: format!("Webhook returned {}: {}", status, body),
            });
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

#[cfg(test)]
pub(crate) use recording::RecordingSink;

#[cfg(test)]
mod recording {
    use super::*;
    use std::sync::Mutex;

    /// Keeps delivered notifications in memory, for testing
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        delivered: Mutex<Vec<Notification>>,
        fail: bool,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// A sink whose every delivery fails
        pub fn failing() -> Self {
            Self {
                delivered: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn delivered(&self) -> Vec<Notification> {
            self.delivered
                .lock()
                .map(|d| d.clone())
                .unwrap_or_default()
        }

        /// Wait until at least `count` notifications arrived or `timeout` elapsed
        pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Notification> {
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                let delivered = self.delivered();
                if delivered.len() >= count || tokio::time::Instant::now() >= deadline {
                    return delivered;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn deliver(&self, notification: &Notification) -> Result<()> {
            if self.fail {
                return Err(AppError::Internal {
                    message: "recording sink configured to fail".to_string(),
                });
            }
            if let Ok(mut delivered) = self.delivered.lock() {
                delivered.push(notification.clone());
            }
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }
}

/// Fire-and-forget front of the notification queue
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<Notification>,
}

impl Dispatcher {
    /// Start a background worker delivering to `sink`
    pub fn spawn(sink: Arc<dyn NotificationSink>, capacity: usize, timeout: Duration) -> Self {
        let (tx, mut rx) = mpsc::channel::<Notification>(capacity.max(1));

        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                let outcome = tokio::time::timeout(timeout, sink.deliver(&notification)).await;
                match outcome {
                    Ok(Ok(())) => {
                        debug!(
                            notification_id = %notification.id,
                            sink = sink.name(),
                            "Notification delivered"
                        );
                        metrics::record_notification(notification.event.as_str(), "delivered");
                    }
                    Ok(Err(e)) => {
                        warn!(
                            notification_id = %notification.id,
                            event = notification.event.as_str(),
                            recipient_id = %notification.recipient_id,
                            sink = sink.name(),
                            error = %e,
                            "Notification delivery failed; dropped"
                        );
                        metrics::record_notification(notification.event.as_str(), "failed");
                    }
                    Err(_) => {
                        warn!(
                            notification_id = %notification.id,
                            event = notification.event.as_str(),
                            sink = sink.name(),
                            timeout_ms = timeout.as_millis() as u64,
                            "Notification delivery timed out; dropped"
                        );
                        metrics::record_notification(notification.event.as_str(), "timeout");
                    }
                }
            }
            debug!("Notification worker stopped");
        });

        Self { tx }
    }

    /// Queue a notification without waiting
    pub fn notify(&self, event: NotificationEvent, recipient_id: Uuid, payload: serde_json::Value) {
        let notification = Notification {
            id: Uuid::new_v4(),
            event,
            recipient_id,
            payload,
            created_at: Utc::now(),
        };

        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                warn!(
                    notification_id = %dropped.id,
                    event = event.as_str(),
                    recipient_id = %recipient_id,
                    "Notification queue full; dropped"
                );
                metrics::record_notification(event.as_str(), "queue_full");
            }
            Err(TrySendError::Closed(dropped)) => {
                warn!(
                    notification_id = %dropped.id,
                    event = event.as_str(),
                    "Notification worker gone; dropped"
                );
                metrics::record_notification(event.as_str(), "closed");
            }
        }
    }
}

/// Create a notification sink based on configuration
pub fn create_sink(config: &NotificationConfig) -> Result<Arc<dyn NotificationSink>> {
    match config.sink {
        NotificationSinkKind::Log => Ok(Arc::new(LogSink)),
        NotificationSinkKind::Webhook => {
            let url = config
                .webhook_url
                .clone()
                .ok_or_else(|| AppError::Configuration {
                    message: "notifications.webhook_url is required for the webhook sink"
                        .to_string(),
                })?;
            Ok(Arc::new(WebhookSink::new(
                url,
                Duration::from_secs(config.timeout_secs),
            )?))
        }
    }
}

/// Build a running dispatcher from configuration
pub fn create_dispatcher(config: &NotificationConfig) -> Result<Dispatcher> {
    let sink = create_sink(config)?;
    info!(sink = sink.name(), capacity = config.queue_capacity, "Notification dispatcher started");
    Ok(Dispatcher::spawn(
        sink,
        config.queue_capacity,
        Duration::from_secs(config.timeout_secs),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Never finishes a delivery
    struct StuckSink;

    #[async_trait]
    impl NotificationSink for StuckSink {
        async fn deliver(&self, _notification: &Notification) -> Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }

        fn name(&self) -> &str {
            "stuck"
        }
    }

    #[tokio::test]
    async fn test_notifications_reach_the_sink() {
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = Dispatcher::spawn(sink.clone(), 8, Duration::from_secs(1));
        let recipient = Uuid::new_v4();

        dispatcher.notify(
            NotificationEvent::Assigned,
            recipient,
            serde_json::json!({ "submission_id": "s-1" }),
        );

        let delivered = sink.wait_for(1, Duration::from_secs(2)).await;
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].event, NotificationEvent::Assigned);
        assert_eq!(delivered[0].recipient_id, recipient);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let dispatcher = Dispatcher::spawn(Arc::new(StuckSink), 1, Duration::from_secs(60));

        let started = std::time::Instant::now();
        for _ in 0..50 {
            dispatcher.notify(
                NotificationEvent::StatusChanged,
                Uuid::new_v4(),
                serde_json::Value::Null,
            );
        }
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_failing_sink_is_swallowed() {
        let sink = Arc::new(RecordingSink::failing());
        let dispatcher = Dispatcher::spawn(sink.clone(), 4, Duration::from_secs(1));
        dispatcher.notify(NotificationEvent::Completed, Uuid::new_v4(), serde_json::Value::Null);

        let delivered = sink.wait_for(1, Duration::from_millis(100)).await;
        assert!(delivered.is_empty());
    }

    #[test]
    fn test_webhook_sink_requires_url() {
        let config = NotificationConfig {
            sink: NotificationSinkKind::Webhook,
            webhook_url: None,
            ..NotificationConfig::default()
        };
        assert!(matches!(
            create_sink(&config),
            Err(AppError::Configuration { .. })
        ));
    }
}
