//! In-process adapter holding one release in memory.
//!
//! Walks the release flow plan → bump → notes → evaluate → approve → publish
//! over a fixed change set. Useful for embedding, demos and tests; real
//! deployments plug in an adapter backed by the release tooling.

use crate::adapter::*;
use crate::error::{AdapterError, AdapterResult};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Summary of the changes since the last release.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub breaking: usize,
    pub features: usize,
    pub fixes: usize,
}

impl ChangeSet {
    pub fn total(&self) -> usize {
        self.breaking + self.features + self.fixes
    }

    fn implied_bump(&self) -> BumpKind {
        if self.breaking > 0 {
            BumpKind::Major
        } else if self.features > 0 {
            BumpKind::Minor
        } else {
            BumpKind::Patch
        }
    }
}

#[derive(Debug)]
struct Release {
    id: String,
    state: ReleaseState,
    next_version: Option<String>,
    notes: Option<String>,
    approved: bool,
}

#[derive(Debug)]
struct Inner {
    current_version: String,
    release: Option<Release>,
    updated_at: Option<chrono::DateTime<Utc>>,
}

pub struct MemoryAdapter {
    changes: ChangeSet,
    tag_prefix: String,
    inner: Mutex<Inner>,
}

impl MemoryAdapter {
    pub fn new(current_version: impl Into<String>, changes: ChangeSet) -> Self {
        Self {
            changes,
            tag_prefix: "v".into(),
            inner: Mutex::new(Inner {
                current_version: current_version.into(),
                release: None,
                updated_at: None,
            }),
        }
    }

    pub fn with_tag_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tag_prefix = prefix.into();
        self
    }

    fn risk_score(&self) -> f64 {
        let score = self.changes.breaking as f64 * 0.4
            + self.changes.features as f64 * 0.05
            + self.changes.fixes as f64 * 0.01;
        score.min(1.0)
    }

    fn with_release<T>(
        &self,
        f: impl FnOnce(&mut Release, &mut String) -> AdapterResult<T>,
    ) -> AdapterResult<T> {
        let mut inner = self.inner.lock();
        let Inner {
            current_version,
            release,
            updated_at,
        } = &mut *inner;
        let release = release.as_mut().ok_or(AdapterError::NoActiveRelease)?;
        let out = f(release, current_version)?;
        *updated_at = Some(Utc::now());
        Ok(out)
    }
}

/// `major.minor.patch`, ignoring any pre-release or build suffix.
fn parse_version(version: &str) -> AdapterResult<(u64, u64, u64)> {
    let core = version
        .trim_start_matches('v')
        .split(['-', '+'])
        .next()
        .unwrap_or_default();
    let parts: Vec<u64> = core
        .split('.')
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|_| AdapterError::InvalidInput(format!("invalid version '{}'", version)))?;
    match parts.as_slice() {
        [major, minor, patch] => Ok((*major, *minor, *patch)),
        _ => Err(AdapterError::InvalidInput(format!(
            "invalid version '{}'",
            version
        ))),
    }
}

fn next_version(current: &str, bump: BumpKind, prerelease: Option<&str>) -> AdapterResult<String> {
    let (major, minor, patch) = parse_version(current)?;
    let core = match bump {
        BumpKind::Major => format!("{}.0.0", major + 1),
        BumpKind::Minor => format!("{}.{}.0", major, minor + 1),
        BumpKind::Patch | BumpKind::Auto => format!("{}.{}.{}", major, minor, patch + 1),
    };
    Ok(match prerelease {
        Some(pre) if !pre.is_empty() => format!("{}-{}", core, pre),
        _ => core,
    })
}

fn require(release: &Release, at_least: ReleaseState, step: &str) -> AdapterResult<()> {
    if (release.state as u8) < (at_least as u8) {
        return Err(AdapterError::Rejected(format!(
            "cannot {} a release in state {:?}",
            step, release.state
        )));
    }
    Ok(())
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn status(&self) -> AdapterResult<ReleaseStatus> {
        let inner = self.inner.lock();
        Ok(match &inner.release {
            Some(release) => ReleaseStatus {
                state: release.state,
                release_id: Some(release.id.clone()),
                current_version: inner.current_version.clone(),
                next_version: release.next_version.clone(),
                approved: release.approved,
                notes: release.notes.clone(),
                updated_at: inner.updated_at,
            },
            None => ReleaseStatus {
                state: ReleaseState::Idle,
                release_id: None,
                current_version: inner.current_version.clone(),
                next_version: None,
                approved: false,
                notes: None,
                updated_at: inner.updated_at,
            },
        })
    }

    async fn plan(&self, input: PlanInput) -> AdapterResult<PlanOutput> {
        let mut inner = self.inner.lock();
        let release_type = self.changes.implied_bump();
        let next = next_version(&inner.current_version, release_type, None)?;
        let id = Uuid::new_v4().to_string();
        debug!(release_id = %id, from = ?input.from, "Planned release");

        inner.release = Some(Release {
            id: id.clone(),
            state: ReleaseState::Planned,
            next_version: Some(next.clone()),
            notes: None,
            approved: false,
        });
        inner.updated_at = Some(Utc::now());

        Ok(PlanOutput {
            release_id: id,
            current_version: inner.current_version.clone(),
            next_version: next,
            release_type,
            commit_count: self.changes.total(),
            has_breaking: self.changes.breaking > 0,
            has_features: self.changes.features > 0,
            has_fixes: self.changes.fixes > 0,
        })
    }

    async fn bump(&self, input: BumpInput) -> AdapterResult<BumpOutput> {
        let implied = self.changes.implied_bump();
        let tag_prefix = self.tag_prefix.clone();
        self.with_release(|release, current| {
            require(release, ReleaseState::Planned, "bump")?;
            let bump_type = match input.bump {
                BumpKind::Auto => implied,
                explicit => explicit,
            };
            let new_version = next_version(current, bump_type, input.prerelease.as_deref())?;
            if !input.dry_run {
                release.next_version = Some(new_version.clone());
                release.state = ReleaseState::Versioned;
            }
            Ok(BumpOutput {
                current_version: current.clone(),
                tag_name: format!("{}{}", tag_prefix, new_version),
                new_version,
                bump_type,
                auto_detected: input.bump == BumpKind::Auto,
                dry_run: input.dry_run,
            })
        })
    }

    async fn notes(&self, input: NotesInput) -> AdapterResult<NotesOutput> {
        let changes = self.changes.clone();
        self.with_release(|release, _| {
            require(release, ReleaseState::Versioned, "write notes for")?;
            let version = release.next_version.clone().unwrap_or_default();
            let mut changelog = format!("## {}\n", version);
            for (label, count) in [
                ("Breaking changes", changes.breaking),
                ("Features", changes.features),
                ("Fixes", changes.fixes),
            ] {
                if count > 0 || input.include_all {
                    changelog.push_str(&format!("\n### {}\n\n{} change(s)\n", label, count));
                }
            }
            let summary = format!("{} changes in {}", changes.total(), version);
            release.notes = Some(changelog.clone());
            release.state = ReleaseState::NotesReady;
            Ok(NotesOutput { summary, changelog })
        })
    }

    async fn evaluate(&self, _input: EvaluateInput) -> AdapterResult<EvaluateOutput> {
        let risk_score = self.risk_score();
        let breaking = self.changes.breaking;
        self.with_release(|release, _| {
            require(release, ReleaseState::NotesReady, "evaluate")?;
            let (severity, decision) = match risk_score {
                s if s >= 0.7 => ("high", "require_review"),
                s if s >= 0.3 => ("medium", "require_approval"),
                _ => ("low", "approve"),
            };
            let mut risk_factors = Vec::new();
            let mut required_actions = Vec::new();
            if breaking > 0 {
                risk_factors.push(format!("{} breaking change(s)", breaking));
                required_actions.push("document migration steps".to_string());
            }
            Ok(EvaluateOutput {
                decision: decision.into(),
                risk_score,
                severity: severity.into(),
                can_auto_approve: decision == "approve",
                required_actions,
                risk_factors,
            })
        })
    }

    async fn approve(&self, input: ApproveInput) -> AdapterResult<ApproveOutput> {
        self.with_release(|release, _| {
            require(release, ReleaseState::NotesReady, "approve")?;
            if let Some(notes) = input.notes {
                release.notes = Some(notes);
            }
            release.approved = true;
            release.state = ReleaseState::Approved;
            Ok(ApproveOutput {
                approved: true,
                version: release.next_version.clone().unwrap_or_default(),
                approved_by: input.approver.unwrap_or_else(|| "mcp".into()),
                approved_at: Utc::now(),
            })
        })
    }

    async fn publish(&self, input: PublishInput) -> AdapterResult<PublishOutput> {
        let tag_prefix = self.tag_prefix.clone();
        let mut inner = self.inner.lock();
        let release = inner.release.as_mut().ok_or(AdapterError::NoActiveRelease)?;
        if release.state == ReleaseState::Published {
            return Err(AdapterError::Rejected("release already published".into()));
        }
        if !release.approved {
            return Err(AdapterError::Rejected(
                "release must be approved before publishing".into(),
            ));
        }
        let version = release.next_version.clone().unwrap_or_default();
        let output = PublishOutput {
            tag_name: format!("{}{}", tag_prefix, version),
            version: version.clone(),
            release_url: None,
            dry_run: input.dry_run,
        };

        if !input.dry_run {
            release.state = ReleaseState::Published;
            inner.current_version = version;
            inner.updated_at = Some(Utc::now());
        }
        Ok(output)
    }
}
