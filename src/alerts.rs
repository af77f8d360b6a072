//! Outbound alert dispatch.
//!
//! The control loop fires an alert when a new abort reason appears, never
//! once per tick. The trait is the seam for external notifiers (chat
//! webhooks, pagers); the built-in implementation records alerts on the
//! log stream.

use async_trait::async_trait;
use chrono::Utc;

use crate::config::AlertsConfig;

#[async_trait]
pub trait Alerter: Send {
    async fn send(&self, message: &str);
}

/// Alert sink that writes to the tracing output. Disabled, it is a no-op.
pub struct LogAlerter {
    enabled: bool,
}

impl LogAlerter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[async_trait]
impl Alerter for LogAlerter {
    async fn send(&self, message: &str) {
        if self.enabled {
            tracing::warn!(target: "kiln_alert", "[{}] {}", Utc::now().to_rfc3339(), message);
        }
    }
}

pub fn make_alerter(config: &AlertsConfig) -> Box<dyn Alerter> {
    Box::new(LogAlerter::new(config.enabled))
}
