//! Notification side effects.
//!
//! The engine only triggers notifications. Delivery belongs to whatever
//! implements [`NotificationDispatcher`]; dispatch runs on its own task with a
//! timeout and failures are logged, never propagated.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, RoutingError};

/// Downstream messaging collaborator
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, channel: &str, message: &str) -> Result<()>;
}

/// Default dispatcher: writes notifications to the log
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationDispatcher for TracingNotifier {
    async fn dispatch(&self, channel: &str, message: &str) -> Result<()> {
        info!(channel, "Notification: {}", message);
        Ok(())
    }
}

/// In-memory dispatcher that records every delivery
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records attempts but reports every delivery as failed
    pub fn failing() -> Self {
        Self { sent: Mutex::new(Vec::new()), fail: true }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    /// Poll until at least `count` notifications arrived or `timeout` elapsed
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<(String, String)> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent();
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingNotifier {
    async fn dispatch(&self, channel: &str, message: &str) -> Result<()> {
        self.sent.lock().push((channel.to_string(), message.to_string()));
        if self.fail {
            return Err(RoutingError::NotificationDelivery(format!("channel {} rejected", channel)));
        }
        Ok(())
    }
}

/// Fire-and-forget front for a dispatcher
#[derive(Clone)]
pub struct Notifier {
    dispatcher: Arc<dyn NotificationDispatcher>,
    timeout: Duration,
}

impl Notifier {
    pub fn new(dispatcher: Arc<dyn NotificationDispatcher>, timeout: Duration) -> Self {
        Self { dispatcher, timeout }
    }

    /// Dispatch on a separate task; the caller never waits on delivery
    pub fn fire(&self, channel: impl Into<String>, message: impl Into<String>) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        let timeout = self.timeout;
        let channel = channel.into();
        let message = message.into();

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, dispatcher.dispatch(&channel, &message)).await {
                Ok(Ok(())) => debug!(channel = %channel, "Notification dispatched"),
                Ok(Err(e)) => warn!(channel = %channel, "Notification delivery failed: {}", e),
                Err(_) => warn!(channel = %channel, "Notification delivery timed out after {:?}", timeout),
            }
        })
    }
}
