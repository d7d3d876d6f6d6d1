//! Outbound alerts. One destination, one message per call.
//!
//! [`NotifySink`] wraps a [`Notifier`] transport and owns the failure policy:
//! a timeout-class error is retried once, anything else is logged and dropped.
//! Callers never see a notification error.

pub mod telegram;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::NotifyError;

pub use telegram::TelegramNotifier;

/// Markup flavor of a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Plain,
    Html,
}

impl ParseMode {
    /// Value of the Bot API `parse_mode` field (`None` = plain text).
    pub fn as_api_str(self) -> Option<&'static str> {
        match self {
            ParseMode::Plain => None,
            ParseMode::Html => Some("HTML"),
        }
    }
}

/// A transport that makes exactly one delivery attempt per call.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str, mode: ParseMode) -> Result<(), NotifyError>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Dropped,
}

pub struct NotifySink {
    inner: Box<dyn Notifier>,
    retry_delay: Duration,
}

impl NotifySink {
    pub fn new<N: Notifier + 'static>(inner: N) -> Self {
        Self {
            inner: Box::new(inner),
            retry_delay: Duration::from_millis(500),
        }
    }

    /// Pause before the single retry (default 500 ms).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub async fn notify(&self, text: &str, mode: ParseMode) -> Delivery {
        let mut retried = false;
        loop {
            match self.inner.send(text, mode).await {
                Ok(()) => {
                    tracing::debug!(notifier = self.inner.name(), chars = text.chars().count(), "alert sent");
                    return Delivery::Sent;
                }
                Err(e) if e.is_transient() && !retried => {
                    tracing::warn!(notifier = self.inner.name(), error = %e, "send failed, retrying once");
                    retried = true;
                    if !self.retry_delay.is_zero() {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
                Err(e) => {
                    tracing::error!(notifier = self.inner.name(), error = %e, text, "alert dropped");
                    return Delivery::Dropped;
                }
            }
        }
    }
}
