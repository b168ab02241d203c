//! Client-side correlation of server notifications.

use crate::client::NotificationHandler;
use crate::protocol::methods;
use crate::protocol::types::{
    JsonRpcNotification, LogMessageParams, ProgressKind, ProgressParams, ProgressToken,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

pub type ProgressCallback = Arc<dyn Fn(&ProgressParams) + Send + Sync>;
pub type LogCallback = Arc<dyn Fn(&LogMessageParams) + Send + Sync>;

/// Per-token progress callbacks.
#[derive(Default)]
pub struct ProgressRouter {
    callbacks: RwLock<HashMap<ProgressToken, ProgressCallback>>,
}

impl ProgressRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, token: ProgressToken, callback: F)
    where
        F: Fn(&ProgressParams) + Send + Sync + 'static,
    {
        self.callbacks.write().insert(token, Arc::new(callback));
    }

    /// Remove a callback; takes effect for the very next notification.
    pub fn unregister(&self, token: &ProgressToken) -> bool {
        self.callbacks.write().remove(token).is_some()
    }

    pub fn is_registered(&self, token: &ProgressToken) -> bool {
        self.callbacks.read().contains_key(token)
    }

    /// Deliver one progress update. Returns whether a callback received it.
    ///
    /// An `end` update retires the token's callback.
    pub fn route(&self, params: &ProgressParams) -> bool {
        // Clone out of the lock so a callback may unregister itself.
        let callback = self.callbacks.read().get(&params.progress_token).cloned();
        let Some(callback) = callback else {
            trace!(token = %params.progress_token, "No callback for progress token");
            return false;
        };

        callback(params);

        if params.kind == ProgressKind::End {
            self.unregister(&params.progress_token);
        }
        true
    }
}

/// Routes progress and log notifications arriving at a client.
#[derive(Default)]
pub struct NotificationRouter {
    progress: ProgressRouter,
    log: RwLock<Option<LogCallback>>,
}

impl NotificationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> &ProgressRouter {
        &self.progress
    }

    pub fn on_log<F>(&self, callback: F)
    where
        F: Fn(&LogMessageParams) + Send + Sync + 'static,
    {
        *self.log.write() = Some(Arc::new(callback));
    }
}

fn decode_params<T: DeserializeOwned>(notification: &JsonRpcNotification) -> Option<T> {
    let params = notification.params.clone()?;
    match serde_json::from_value(params) {
        Ok(p) => Some(p),
        Err(e) => {
            debug!(method = %notification.method, "Dropping malformed notification: {}", e);
            None
        }
    }
}

impl NotificationHandler for NotificationRouter {
    fn handle_notification(&self, notification: &JsonRpcNotification) {
        match notification.method.as_str() {
            methods::NOTIFICATION_PROGRESS => {
                if let Some(params) = decode_params::<ProgressParams>(notification) {
                    self.progress.route(&params);
                }
            }
            methods::NOTIFICATION_MESSAGE => {
                let callback = self.log.read().clone();
                if let Some(callback) = callback
                    && let Some(params) = decode_params::<LogMessageParams>(notification)
                {
                    callback(&params);
                }
            }
            other => trace!("Ignoring notification: {}", other),
        }
    }
}
