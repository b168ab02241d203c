//! Release adapter capability.
//!
//! The release domain (commit analysis, version calculation, changelog
//! rendering, risk scoring) lives behind [`Adapter`]. Tools call these
//! operations and re-serialize the outputs; they never inspect adapter state.

pub mod memory;

pub use memory::MemoryAdapter;

use crate::error::{AdapterError, AdapterResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[async_trait]
pub trait Adapter: Send + Sync {
    async fn status(&self) -> AdapterResult<ReleaseStatus>;
    async fn plan(&self, input: PlanInput) -> AdapterResult<PlanOutput>;
    async fn bump(&self, input: BumpInput) -> AdapterResult<BumpOutput>;
    async fn notes(&self, input: NotesInput) -> AdapterResult<NotesOutput>;
    async fn evaluate(&self, input: EvaluateInput) -> AdapterResult<EvaluateOutput>;
    async fn approve(&self, input: ApproveInput) -> AdapterResult<ApproveOutput>;
    async fn publish(&self, input: PublishInput) -> AdapterResult<PublishOutput>;
}

/// Requested version bump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
    Major,
    Minor,
    Patch,
    /// Let the adapter derive the bump from the change set.
    #[default]
    Auto,
}

impl BumpKind {
    pub const ALL: [BumpKind; 4] = [Self::Major, Self::Minor, Self::Patch, Self::Auto];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BumpKind {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            "auto" | "" => Ok(Self::Auto),
            other => Err(AdapterError::InvalidInput(format!(
                "invalid bump type '{}'; expected one of major, minor, patch, auto",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseState {
    Idle,
    Planned,
    Versioned,
    NotesReady,
    Approved,
    Published,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseStatus {
    pub state: ReleaseState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_id: Option<String>,
    pub current_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_version: Option<String>,
    pub approved: bool,
    /// Current release notes, once generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanInput {
    /// Starting reference; the adapter picks the last release when absent.
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub analyze: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOutput {
    pub release_id: String,
    pub current_version: String,
    pub next_version: String,
    pub release_type: BumpKind,
    pub commit_count: usize,
    pub has_breaking: bool,
    pub has_features: bool,
    pub has_fixes: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BumpInput {
    #[serde(default)]
    pub bump: BumpKind,
    #[serde(default)]
    pub prerelease: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BumpOutput {
    pub current_version: String,
    pub new_version: String,
    pub bump_type: BumpKind,
    pub tag_name: String,
    pub auto_detected: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotesInput {
    #[serde(default)]
    pub ai: bool,
    #[serde(default)]
    pub include_all: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotesOutput {
    pub summary: String,
    pub changelog: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluateInput {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateOutput {
    pub decision: String,
    pub risk_score: f64,
    pub severity: String,
    pub can_auto_approve: bool,
    pub required_actions: Vec<String>,
    pub risk_factors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApproveInput {
    #[serde(default)]
    pub approver: Option<String>,
    /// Replacement release notes, if the approver edited them.
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproveOutput {
    pub approved: bool,
    pub version: String,
    pub approved_by: String,
    pub approved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishInput {
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishOutput {
    pub version: String,
    pub tag_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_url: Option<String>,
    pub dry_run: bool,
}
