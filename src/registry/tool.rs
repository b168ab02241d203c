//! Tool registry for dynamic tool registration.

use crate::error::{ConfigError, Result};
use crate::protocol::handler::RequestContext;
use crate::protocol::{CallToolResult, Tool};
use crate::registry::validate::validate_name;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// A callable tool.
///
/// `Err` is reserved for local faults and becomes an internal-error response.
/// Business failures are returned as `Ok(CallToolResult::error(..))`.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> Tool;
    async fn execute(&self, arguments: Value, ctx: &RequestContext) -> Result<CallToolResult>;
}

pub struct ToolRegistry {
    tools: DashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: DashMap::new(),
        }
    }

    /// Register a tool. Names are validated and cannot be rebound.
    pub fn register<T: ToolHandler + 'static>(&self, tool: T) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&self, tool: Arc<dyn ToolHandler>) -> Result<()> {
        let name = tool.definition().name;
        validate_name("tool", &name)?;

        match self.tools.entry(name.clone()) {
            Entry::Occupied(_) => Err(ConfigError::InvalidValue {
                field: "tool".into(),
                message: format!("tool '{}' is already registered", name).into(),
            }
            .into()),
            Entry::Vacant(slot) => {
                debug!("Registering tool: {}", name);
                slot.insert(tool);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).map(|r| Arc::clone(&*r))
    }

    /// Tool definitions sorted by name.
    pub fn list(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = self.tools.iter().map(|r| r.value().definition()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[macro_export]
macro_rules! define_tool {
    (
        name: $name:expr,
        description: $desc:expr,
        schema: $schema:tt
    ) => {
        $crate::protocol::Tool {
            name: $name.into(),
            description: Some($desc.into()),
            input_schema: serde_json::json!($schema),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestTool(&'static str);

    #[async_trait]
    impl ToolHandler for TestTool {
        fn definition(&self) -> Tool {
            define_tool!(
                name: self.0,
                description: "A test tool",
                schema: { "type": "object", "properties": {} }
            )
        }

        async fn execute(&self, _arguments: Value, _ctx: &RequestContext) -> Result<CallToolResult> {
            Ok(CallToolResult::text("test result"))
        }
    }

    #[test]
    fn test_registry() {
        let registry = ToolRegistry::new();
        registry.register(TestTool("test.tool")).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get("test.tool").is_some());
        assert!(registry.get("unknown").is_none());

        let tools = registry.list();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "test.tool");
    }

    #[test]
    fn test_rejects_duplicates_and_bad_names() {
        let registry = ToolRegistry::new();
        registry.register(TestTool("a.b")).unwrap();
        assert!(registry.register(TestTool("a.b")).is_err());
        assert!(registry.register(TestTool("not valid")).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_list_is_sorted() {
        let registry = ToolRegistry::new();
        for name in ["z.last", "a.first", "m.middle"] {
            registry.register(TestTool(name)).unwrap();
        }
        let names: Vec<String> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["a.first", "m.middle", "z.last"]);
    }

    #[tokio::test]
    async fn test_execute() {
        let registry = ToolRegistry::new();
        registry.register(TestTool("test.tool")).unwrap();

        let tool = registry.get("test.tool").unwrap();
        let result = tool
            .execute(serde_json::json!({}), &RequestContext::detached())
            .await
            .unwrap();
        assert!(!result.is_error);
    }
}
