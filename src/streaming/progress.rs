//! Server-side progress sequences.
//!
//! A sequence is one `start` (kind `begin`, 0%), any number of `update`s
//! (kind `report`, linear percentage) and one `complete` (kind `end`, 100%).
//! The token is retired by `complete`; later updates are silently dropped.

use crate::protocol::methods;
use crate::protocol::transport::NotificationSink;
use crate::protocol::types::{JsonRpcNotification, ProgressKind, ProgressParams, ProgressToken};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct ActiveProgress {
    total: u64,
}

/// Emits `notifications/progress` for concurrently running sequences.
pub struct ProgressReporter {
    sink: Arc<dyn NotificationSink>,
    // Held across emission so a report can never follow its own end.
    active: Mutex<HashMap<ProgressToken, ActiveProgress>>,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Begin a sequence of `total` steps and return its fresh token.
    pub async fn start(&self, total: u64, message: impl Into<String>) -> ProgressToken {
        let token = ProgressToken::String(Uuid::new_v4().to_string());
        let mut active = self.active.lock().await;
        active.insert(token.clone(), ActiveProgress { total });
        debug!(token = %token, total, "Progress started");

        self.emit(ProgressParams {
            progress_token: token.clone(),
            kind: ProgressKind::Begin,
            progress: 0,
            total: Some(total),
            percentage: 0.0,
            message: Some(message.into()),
        })
        .await;

        token
    }

    /// Report `current` of the sequence's steps. Unknown or retired tokens are ignored.
    pub async fn update(&self, token: &ProgressToken, current: u64, message: impl Into<String>) {
        let active = self.active.lock().await;
        let Some(progress) = active.get(token).copied() else {
            trace!(token = %token, "Ignoring update for inactive progress token");
            return;
        };

        self.emit(ProgressParams {
            progress_token: token.clone(),
            kind: ProgressKind::Report,
            progress: current,
            total: Some(progress.total),
            percentage: percentage(current, progress.total),
            message: Some(message.into()),
        })
        .await;
    }

    /// End the sequence at 100% and retire the token. Repeated completions are ignored.
    pub async fn complete(&self, token: &ProgressToken, message: impl Into<String>) {
        let mut active = self.active.lock().await;
        let Some(progress) = active.remove(token) else {
            trace!(token = %token, "Ignoring completion for inactive progress token");
            return;
        };
        debug!(token = %token, "Progress complete");

        self.emit(ProgressParams {
            progress_token: token.clone(),
            kind: ProgressKind::End,
            progress: progress.total,
            total: Some(progress.total),
            percentage: 100.0,
            message: Some(message.into()),
        })
        .await;
    }

    pub async fn is_active(&self, token: &ProgressToken) -> bool {
        self.active.lock().await.contains_key(token)
    }

    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    async fn emit(&self, params: ProgressParams) {
        let notification =
            match JsonRpcNotification::with_payload(methods::NOTIFICATION_PROGRESS, &params) {
                Ok(n) => n,
                Err(e) => {
                    warn!("Failed to encode progress notification: {}", e);
                    return;
                }
            };

        if let Err(e) = self.sink.notify(notification).await {
            warn!("Failed to emit progress notification: {}", e);
        }
    }
}

/// Linear percentage, capped at 100. A sequence with no steps is already done.
fn percentage(current: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (current as f64 / total as f64 * 100.0).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::MemorySink;

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 4), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
        assert_eq!(percentage(3, 4), 75.0);
        assert_eq!(percentage(9, 4), 100.0);
        assert_eq!(percentage(0, 0), 100.0);
    }

    #[tokio::test]
    async fn test_full_sequence() {
        let sink = Arc::new(MemorySink::default());
        let reporter = ProgressReporter::new(sink.clone());

        let token = reporter.start(4, "bumping").await;
        for step in 1..=4 {
            reporter.update(&token, step, format!("step {step}")).await;
        }
        reporter.complete(&token, "done").await;

        let progress = sink.progress();
        let percentages: Vec<f64> = progress.iter().map(|p| p.percentage).collect();
        assert_eq!(percentages, vec![0.0, 25.0, 50.0, 75.0, 100.0, 100.0]);
        assert_eq!(progress.first().unwrap().kind, ProgressKind::Begin);
        assert_eq!(progress.last().unwrap().kind, ProgressKind::End);
        assert!(progress.iter().all(|p| p.progress_token == token));
        assert!(!reporter.is_active(&token).await);
    }

    #[tokio::test]
    async fn test_end_is_always_100() {
        let sink = Arc::new(MemorySink::default());
        let reporter = ProgressReporter::new(sink.clone());

        let token = reporter.start(10, "work").await;
        reporter.update(&token, 1, "barely started").await;
        reporter.complete(&token, "cut short").await;

        let last = sink.progress().pop().unwrap();
        assert_eq!(last.kind, ProgressKind::End);
        assert_eq!(last.percentage, 100.0);
    }

    #[tokio::test]
    async fn test_unknown_and_retired_tokens_are_silent() {
        let sink = Arc::new(MemorySink::default());
        let reporter = ProgressReporter::new(sink.clone());

        reporter.update(&"never-issued".into(), 1, "nope").await;
        assert!(sink.is_empty());

        let token = reporter.start(2, "work").await;
        reporter.complete(&token, "done").await;
        reporter.update(&token, 1, "late").await;
        reporter.complete(&token, "again").await;

        assert_eq!(sink.progress().len(), 2);
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let sink = Arc::new(MemorySink::default());
        let reporter = ProgressReporter::new(sink);

        let mut tokens = std::collections::HashSet::new();
        for _ in 0..500 {
            assert!(tokens.insert(reporter.start(1, "x").await));
        }
        assert_eq!(reporter.active_count().await, 500);
    }
}
