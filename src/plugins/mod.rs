//! Plugin lifecycle hooks.
//!
//! Plugin loading and the hook implementations live behind [`PluginManager`].
//! This module owns the closed set of hook names, the aggregate result shape,
//! and [`PluginExtension`], which adds the plugin tools to a running registry.

pub mod extension;

pub use extension::PluginExtension;

use crate::error::{PluginError, PluginResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Release lifecycle hook points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Hook {
    PrePlan,
    PostPlan,
    PreVersion,
    PostVersion,
    PreNotes,
    PostNotes,
    PreApprove,
    PostApprove,
    PrePublish,
    PostPublish,
    OnSuccess,
    OnError,
}

impl Hook {
    pub const ALL: [Hook; 12] = [
        Self::PrePlan,
        Self::PostPlan,
        Self::PreVersion,
        Self::PostVersion,
        Self::PreNotes,
        Self::PostNotes,
        Self::PreApprove,
        Self::PostApprove,
        Self::PrePublish,
        Self::PostPublish,
        Self::OnSuccess,
        Self::OnError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrePlan => "pre-plan",
            Self::PostPlan => "post-plan",
            Self::PreVersion => "pre-version",
            Self::PostVersion => "post-version",
            Self::PreNotes => "pre-notes",
            Self::PostNotes => "post-notes",
            Self::PreApprove => "pre-approve",
            Self::PostApprove => "post-approve",
            Self::PrePublish => "pre-publish",
            Self::PostPublish => "post-publish",
            Self::OnSuccess => "on-success",
            Self::OnError => "on-error",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Hook {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|hook| hook.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(Hook::as_str).collect();
                PluginError::InvalidHook(format!(
                    "'{}'; valid hooks: {}",
                    s,
                    valid.join(", ")
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub hooks: Vec<Hook>,
}

/// What a hook gets to see about the release it runs for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

/// One plugin's result for one hook invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookOutcome {
    pub plugin: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
}

#[async_trait]
pub trait PluginManager: Send + Sync {
    async fn list_plugins(&self) -> PluginResult<Vec<PluginInfo>>;
    async fn get_plugin_info(&self, name: &str) -> PluginResult<PluginInfo>;

    /// Run `hook` on every plugin that handles it. Outcomes keep plugin order.
    async fn execute_hook(
        &self,
        hook: Hook,
        context: &ReleaseContext,
    ) -> PluginResult<Vec<HookOutcome>>;
}

/// Aggregate of one hook execution across plugins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookExecutionSummary {
    pub hook: Hook,
    pub executed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<HookOutcome>,
    pub executed_at: DateTime<Utc>,
}

impl HookExecutionSummary {
    pub fn new(hook: Hook, results: Vec<HookOutcome>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            hook,
            executed: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
            executed_at: Utc::now(),
        }
    }
}
