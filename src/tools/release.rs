//! Tools: relicta.status, relicta.plan, relicta.bump, relicta.notes,
//! relicta.evaluate, relicta.approve, relicta.publish

use crate::adapter::{
    ApproveInput, BumpInput, BumpKind, EvaluateInput, NotesInput, PlanInput, PublishInput,
};
use crate::error::Result;
use crate::protocol::handler::RequestContext;
use crate::protocol::{CallToolResult, Tool};
use crate::registry::ToolHandler;
use crate::tools::{AdapterSlot, adapter_result, parse_args};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

pub struct StatusTool {
    adapter: AdapterSlot,
}

impl StatusTool {
    pub fn new(adapter: AdapterSlot) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl ToolHandler for StatusTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "relicta.status".into(),
            description: Some("Show the state of the current release.".into()),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    #[instrument(skip(self, _arguments, _ctx), fields(tool = "relicta.status"))]
    async fn execute(&self, _arguments: Value, _ctx: &RequestContext) -> Result<CallToolResult> {
        let adapter = match self.adapter.get() {
            Ok(adapter) => adapter,
            Err(result) => return Ok(result),
        };
        Ok(adapter_result(adapter.status().await))
    }
}

pub struct PlanTool {
    adapter: AdapterSlot,
}

impl PlanTool {
    pub fn new(adapter: AdapterSlot) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl ToolHandler for PlanTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "relicta.plan".into(),
            description: Some(
                "Analyze changes since the last release and plan the next one.".into(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "from": {
                        "type": "string",
                        "description": "Reference to analyze from (default: last release tag)"
                    },
                    "analyze": {
                        "type": "boolean",
                        "description": "Include a detailed change analysis"
                    }
                }
            }),
        }
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "relicta.plan"))]
    async fn execute(&self, arguments: Value, ctx: &RequestContext) -> Result<CallToolResult> {
        let input: PlanInput = match parse_args(arguments) {
            Ok(input) => input,
            Err(result) => return Ok(result),
        };
        let adapter = match self.adapter.get() {
            Ok(adapter) => adapter,
            Err(result) => return Ok(result),
        };

        let result = adapter.plan(input).await;
        if let Ok(plan) = &result {
            ctx.log()
                .info(
                    format!("Planned {} release {}", plan.release_type, plan.next_version),
                    None,
                )
                .await;
        }
        Ok(adapter_result(result))
    }
}

#[derive(Debug, Default, Deserialize)]
struct BumpArgs {
    #[serde(default)]
    bump: Option<String>,
    #[serde(default)]
    prerelease: Option<String>,
    #[serde(default)]
    dry_run: bool,
}

pub struct BumpTool {
    adapter: AdapterSlot,
}

impl BumpTool {
    pub fn new(adapter: AdapterSlot) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl ToolHandler for BumpTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "relicta.bump".into(),
            description: Some(
                "Compute and apply the next version. 'auto' derives the bump from the planned changes."
                    .into(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "bump": {
                        "type": "string",
                        "description": "Bump type",
                        "enum": ["major", "minor", "patch", "auto"],
                        "default": "auto"
                    },
                    "prerelease": {
                        "type": "string",
                        "description": "Pre-release identifier, e.g. 'rc.1'"
                    },
                    "dry_run": {
                        "type": "boolean",
                        "description": "Compute the version without applying it"
                    }
                }
            }),
        }
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "relicta.bump"))]
    async fn execute(&self, arguments: Value, ctx: &RequestContext) -> Result<CallToolResult> {
        let args: BumpArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return Ok(result),
        };

        // Validated before the adapter is consulted.
        let bump = match args.bump.as_deref().unwrap_or_default().parse::<BumpKind>() {
            Ok(bump) => bump,
            Err(e) => return Ok(CallToolResult::error(e.to_string())),
        };

        let adapter = match self.adapter.get() {
            Ok(adapter) => adapter,
            Err(result) => return Ok(result),
        };

        let progress = ctx.progress();
        let token = progress.start(1, format!("Bumping version ({})", bump)).await;
        let result = adapter
            .bump(BumpInput {
                bump,
                prerelease: args.prerelease,
                dry_run: args.dry_run,
            })
            .await;
        let message = match &result {
            Ok(out) => format!("Version {}", out.new_version),
            Err(_) => "Bump failed".to_string(),
        };
        progress.complete(&token, message).await;

        Ok(adapter_result(result))
    }
}

pub struct NotesTool {
    adapter: AdapterSlot,
}

impl NotesTool {
    pub fn new(adapter: AdapterSlot) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl ToolHandler for NotesTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "relicta.notes".into(),
            description: Some("Generate release notes and changelog for the planned release.".into()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "ai": {
                        "type": "boolean",
                        "description": "Use AI-assisted summarization if the adapter supports it"
                    },
                    "include_all": {
                        "type": "boolean",
                        "description": "Include empty changelog sections"
                    }
                }
            }),
        }
    }

    #[instrument(skip(self, arguments, _ctx), fields(tool = "relicta.notes"))]
    async fn execute(&self, arguments: Value, _ctx: &RequestContext) -> Result<CallToolResult> {
        let input: NotesInput = match parse_args(arguments) {
            Ok(input) => input,
            Err(result) => return Ok(result),
        };
        let adapter = match self.adapter.get() {
            Ok(adapter) => adapter,
            Err(result) => return Ok(result),
        };
        Ok(adapter_result(adapter.notes(input).await))
    }
}

pub struct EvaluateTool {
    adapter: AdapterSlot,
}

impl EvaluateTool {
    pub fn new(adapter: AdapterSlot) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl ToolHandler for EvaluateTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "relicta.evaluate".into(),
            description: Some("Assess the risk of the planned release.".into()),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "relicta.evaluate"))]
    async fn execute(&self, arguments: Value, ctx: &RequestContext) -> Result<CallToolResult> {
        let input: EvaluateInput = match parse_args(arguments) {
            Ok(input) => input,
            Err(result) => return Ok(result),
        };
        let adapter = match self.adapter.get() {
            Ok(adapter) => adapter,
            Err(result) => return Ok(result),
        };

        let result = adapter.evaluate(input).await;
        if let Ok(eval) = &result
            && !eval.can_auto_approve
        {
            ctx.log()
                .warning(
                    format!("Release needs review: {} risk", eval.severity),
                    Some(json!({ "risk_score": eval.risk_score })),
                )
                .await;
        }
        Ok(adapter_result(result))
    }
}

pub struct ApproveTool {
    adapter: AdapterSlot,
}

impl ApproveTool {
    pub fn new(adapter: AdapterSlot) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl ToolHandler for ApproveTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "relicta.approve".into(),
            description: Some("Approve the planned release for publishing.".into()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "approver": {
                        "type": "string",
                        "description": "Who approves the release"
                    },
                    "notes": {
                        "type": "string",
                        "description": "Edited release notes to publish instead of the generated ones"
                    }
                }
            }),
        }
    }

    #[instrument(skip(self, arguments, _ctx), fields(tool = "relicta.approve"))]
    async fn execute(&self, arguments: Value, _ctx: &RequestContext) -> Result<CallToolResult> {
        let input: ApproveInput = match parse_args(arguments) {
            Ok(input) => input,
            Err(result) => return Ok(result),
        };
        let adapter = match self.adapter.get() {
            Ok(adapter) => adapter,
            Err(result) => return Ok(result),
        };
        Ok(adapter_result(adapter.approve(input).await))
    }
}

pub struct PublishTool {
    adapter: AdapterSlot,
}

impl PublishTool {
    pub fn new(adapter: AdapterSlot) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl ToolHandler for PublishTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "relicta.publish".into(),
            description: Some("Publish the approved release: tag, changelog and release.".into()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "dry_run": {
                        "type": "boolean",
                        "description": "Show what would be published without doing it"
                    }
                }
            }),
        }
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "relicta.publish"))]
    async fn execute(&self, arguments: Value, ctx: &RequestContext) -> Result<CallToolResult> {
        let input: PublishInput = match parse_args(arguments) {
            Ok(input) => input,
            Err(result) => return Ok(result),
        };
        let adapter = match self.adapter.get() {
            Ok(adapter) => adapter,
            Err(result) => return Ok(result),
        };

        let progress = ctx.progress();
        let token = progress.start(1, "Publishing release").await;
        let result = adapter.publish(input).await;
        progress.complete(&token, "Publish finished").await;

        match &result {
            Ok(out) => {
                ctx.log()
                    .info(format!("Published {}", out.tag_name), None)
                    .await
            }
            Err(e) => ctx.log().error(format!("Publish failed: {}", e), None).await,
        }
        Ok(adapter_result(result))
    }
}
