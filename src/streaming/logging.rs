//! Protocol-level log messages (`notifications/message`).

use crate::protocol::methods;
use crate::protocol::transport::NotificationSink;
use crate::protocol::types::{JsonRpcNotification, LogLevel, LogMessageParams};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{trace, warn};

/// Minimum level a client wants to receive. Shared with `logging/setLevel`.
#[derive(Debug)]
pub struct LevelFilter {
    level: AtomicU8,
}

impl LevelFilter {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level: AtomicU8::new(level as u8),
        }
    }

    pub fn get(&self) -> LogLevel {
        match self.level.load(Ordering::Relaxed) {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warning,
            _ => LogLevel::Error,
        }
    }

    pub fn set(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.get()
    }
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

/// Fire-and-forget emitter of log notifications.
#[derive(Clone)]
pub struct LogEmitter {
    sink: Arc<dyn NotificationSink>,
    filter: Arc<LevelFilter>,
    logger: Option<String>,
}

impl LogEmitter {
    pub fn new(sink: Arc<dyn NotificationSink>, filter: Arc<LevelFilter>) -> Self {
        Self {
            sink,
            filter,
            logger: None,
        }
    }

    /// Same sink and filter, different logger name.
    pub fn named(&self, logger: impl Into<String>) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            filter: Arc::clone(&self.filter),
            logger: Some(logger.into()),
        }
    }

    pub async fn log(&self, level: LogLevel, message: impl Into<String>, data: Option<Value>) {
        if !self.filter.enabled(level) {
            trace!(level = level.as_str(), "Log message below client level");
            return;
        }

        let mut payload = json!({ "message": message.into() });
        if let Some(data) = data {
            payload["data"] = data;
        }

        let params = LogMessageParams {
            level,
            logger: self.logger.clone(),
            data: payload,
        };

        let notification =
            match JsonRpcNotification::with_payload(methods::NOTIFICATION_MESSAGE, &params) {
                Ok(n) => n,
                Err(e) => {
                    warn!("Failed to encode log notification: {}", e);
                    return;
                }
            };

        if let Err(e) = self.sink.notify(notification).await {
            warn!("Failed to emit log notification: {}", e);
        }
    }

    pub async fn debug(&self, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Debug, message, data).await;
    }

    pub async fn info(&self, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Info, message, data).await;
    }

    pub async fn warning(&self, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Warning, message, data).await;
    }

    pub async fn error(&self, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Error, message, data).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::MemorySink;

    #[tokio::test]
    async fn test_one_notification_per_call() {
        let sink = Arc::new(MemorySink::default());
        let filter = Arc::new(LevelFilter::new(LogLevel::Debug));
        let log = LogEmitter::new(sink.clone(), filter).named("relicta.plan");

        log.debug("scanning", None).await;
        log.info("found commits", Some(json!({"count": 3}))).await;
        log.warning("breaking change", None).await;
        log.error("failed", None).await;

        let messages = sink.logs();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].level, LogLevel::Debug);
        assert_eq!(messages[1].logger.as_deref(), Some("relicta.plan"));
        assert_eq!(messages[1].data["message"], "found commits");
        assert_eq!(messages[1].data["data"]["count"], 3);
        assert_eq!(messages[3].level, LogLevel::Error);
    }

    #[tokio::test]
    async fn test_filter_drops_lower_levels() {
        let sink = Arc::new(MemorySink::default());
        let filter = Arc::new(LevelFilter::new(LogLevel::Warning));
        let log = LogEmitter::new(sink.clone(), Arc::clone(&filter));

        log.info("hidden", None).await;
        log.error("shown", None).await;
        assert_eq!(sink.logs().len(), 1);

        filter.set(LogLevel::Debug);
        log.debug("now shown", None).await;
        assert_eq!(sink.logs().len(), 2);
    }

    #[test]
    fn test_level_filter_roundtrip() {
        let filter = LevelFilter::default();
        assert_eq!(filter.get(), LogLevel::Info);
        for level in [
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warning,
            LogLevel::Error,
        ] {
            filter.set(level);
            assert_eq!(filter.get(), level);
        }
    }
}
