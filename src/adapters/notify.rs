//! Notification sink that renders messages as log events.

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::{Notification, NotificationSink, Severity};

/// Writes every notification to the tracing subscriber
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, notification: Notification) {
        let scenario = notification.scenario;
        match notification.severity {
            Severity::Info | Severity::Success => {
                info!(?scenario, "{}", notification.message)
            }
            Severity::Warning => warn!(?scenario, "{}", notification.message),
            Severity::Error => error!(?scenario, "{}", notification.message),
        }
    }
}
