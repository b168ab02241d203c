//! Streaming progress and logging notifications.
//!
//! The server side emits through any [`NotificationSink`]; the client side
//! correlates what arrives with [`NotificationRouter`].

pub mod logging;
pub mod progress;
pub mod router;

pub use logging::{LevelFilter, LogEmitter};
pub use progress::ProgressReporter;
pub use router::{LogCallback, NotificationRouter, ProgressCallback, ProgressRouter};

use crate::error::Result;
use crate::protocol::methods;
use crate::protocol::transport::NotificationSink;
use crate::protocol::types::{JsonRpcNotification, LogMessageParams, ProgressParams};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Sink that keeps every notification in memory.
///
/// Useful where no peer is listening and for inspecting emitted traffic.
#[derive(Debug, Default)]
pub struct MemorySink {
    notifications: Mutex<Vec<JsonRpcNotification>>,
}

impl MemorySink {
    pub fn notifications(&self) -> Vec<JsonRpcNotification> {
        self.notifications.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.notifications.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.lock().is_empty()
    }

    /// Decoded `notifications/progress` params, in emission order.
    pub fn progress(&self) -> Vec<ProgressParams> {
        self.decoded(methods::NOTIFICATION_PROGRESS)
    }

    /// Decoded `notifications/message` params, in emission order.
    pub fn logs(&self) -> Vec<LogMessageParams> {
        self.decoded(methods::NOTIFICATION_MESSAGE)
    }

    fn decoded<T: serde::de::DeserializeOwned>(&self, method: &str) -> Vec<T> {
        self.notifications
            .lock()
            .iter()
            .filter(|n| n.method == method)
            .filter_map(|n| n.params.clone())
            .filter_map(|p| serde_json::from_value(p).ok())
            .collect()
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    async fn notify(&self, notification: JsonRpcNotification) -> Result<()> {
        self.notifications.lock().push(notification);
        Ok(())
    }
}
