//! Release-management tools, resources and prompts.

pub mod prompts;
pub mod release;
pub mod resources;

pub use prompts::{ReleaseSummaryPrompt, RiskReviewPrompt};
pub use release::{
    ApproveTool, BumpTool, EvaluateTool, NotesTool, PlanTool, PublishTool, StatusTool,
};
pub use resources::{NotesResource, StatusResource};

use crate::adapter::Adapter;
use crate::error::{AdapterError, AdapterResult, Result};
use crate::protocol::CallToolResult;
use crate::registry::Registry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// The adapter the release tools call into, if one is configured.
#[derive(Clone, Default)]
pub struct AdapterSlot(Option<Arc<dyn Adapter>>);

impl AdapterSlot {
    pub fn new(adapter: Option<Arc<dyn Adapter>>) -> Self {
        Self(adapter)
    }

    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }

    pub fn adapter(&self) -> Option<&Arc<dyn Adapter>> {
        self.0.as_ref()
    }

    /// The adapter, or the business failure a tool answers with when absent.
    pub fn get(&self) -> std::result::Result<&Arc<dyn Adapter>, CallToolResult> {
        self.0
            .as_ref()
            .ok_or_else(|| CallToolResult::error(AdapterError::NotConfigured.to_string()))
    }
}

/// Decode tool arguments. Absent arguments decode as the default value.
pub(crate) fn parse_args<T: DeserializeOwned + Default>(
    arguments: Value,
) -> std::result::Result<T, CallToolResult> {
    if arguments.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(arguments)
        .map_err(|e| CallToolResult::error(format!("invalid arguments: {}", e)))
}

/// Adapter outcome as a tool result: output as JSON, or the failure message.
pub(crate) fn adapter_result<T: Serialize>(result: AdapterResult<T>) -> CallToolResult {
    match result {
        Ok(output) => CallToolResult::json(&output),
        Err(e) => CallToolResult::error(e.to_string()),
    }
}

/// Register every release tool, resource and prompt.
pub fn register_all(registry: &Registry, adapter: Option<Arc<dyn Adapter>>) -> Result<()> {
    let slot = AdapterSlot::new(adapter);

    registry.tools.register(StatusTool::new(slot.clone()))?;
    registry.tools.register(PlanTool::new(slot.clone()))?;
    registry.tools.register(BumpTool::new(slot.clone()))?;
    registry.tools.register(NotesTool::new(slot.clone()))?;
    registry.tools.register(EvaluateTool::new(slot.clone()))?;
    registry.tools.register(ApproveTool::new(slot.clone()))?;
    registry.tools.register(PublishTool::new(slot.clone()))?;

    registry.resources.register(StatusResource::new(slot.clone()))?;
    registry.resources.register(NotesResource::new(slot))?;

    registry.prompts.register(ReleaseSummaryPrompt)?;
    registry.prompts.register(RiskReviewPrompt)?;

    Ok(())
}
