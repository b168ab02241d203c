//! Runtime plugin surface added on top of an existing registry.
//!
//! The manager lives in a swappable slot. Every tool call holds the read
//! guard for the whole manager call, so `set_manager` waits for in-flight
//! hook executions and a call never sees a half-swapped manager.

use crate::error::{PluginError, PluginResult, Result};
use crate::plugins::{Hook, HookExecutionSummary, PluginInfo, PluginManager, ReleaseContext};
use crate::protocol::handler::RequestContext;
use crate::protocol::{CallToolResult, ReadResourceResult, Resource, ResourceContents, Tool};
use crate::registry::{Registry, ResourceHandler, ToolHandler};
use crate::tools::parse_args;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

pub const PLUGINS_URI: &str = "relicta://plugins";

#[derive(Default)]
pub struct PluginExtension {
    manager: RwLock<Option<Arc<dyn PluginManager>>>,
}

impl PluginExtension {
    pub fn new(manager: Option<Arc<dyn PluginManager>>) -> Self {
        Self {
            manager: RwLock::new(manager),
        }
    }

    /// Swap the manager. Waits until no plugin call is in flight.
    pub async fn set_manager(&self, manager: Option<Arc<dyn PluginManager>>) {
        let mut slot = self.manager.write().await;
        info!(configured = manager.is_some(), "Plugin manager replaced");
        *slot = manager;
    }

    pub async fn is_configured(&self) -> bool {
        self.manager.read().await.is_some()
    }

    /// Add the plugin tools and resource to `registry`.
    pub fn install(self: &Arc<Self>, registry: &Registry) -> Result<()> {
        registry.tools.register(ListPluginsTool {
            ext: Arc::clone(self),
        })?;
        registry.tools.register(PluginInfoTool {
            ext: Arc::clone(self),
        })?;
        registry.tools.register(ExecuteHookTool {
            ext: Arc::clone(self),
        })?;
        registry.resources.register(PluginsResource {
            ext: Arc::clone(self),
        })?;
        debug!("Plugin extension installed");
        Ok(())
    }

    pub async fn list_plugins(&self) -> PluginResult<Vec<PluginInfo>> {
        let guard = self.manager.read().await;
        let manager = guard.as_ref().ok_or(PluginError::NotConfigured)?;
        manager.list_plugins().await
    }

    pub async fn plugin_info(&self, name: &str) -> PluginResult<PluginInfo> {
        let guard = self.manager.read().await;
        let manager = guard.as_ref().ok_or(PluginError::NotConfigured)?;
        manager.get_plugin_info(name).await
    }

    /// Run a hook and aggregate the outcomes. Individual plugin failures are
    /// counted in the summary; only a manager-level failure is an `Err`.
    pub async fn execute_hook(
        &self,
        hook: Hook,
        context: &ReleaseContext,
    ) -> PluginResult<HookExecutionSummary> {
        let guard = self.manager.read().await;
        let manager = guard.as_ref().ok_or(PluginError::NotConfigured)?;
        let outcomes = manager.execute_hook(hook, context).await?;
        Ok(HookExecutionSummary::new(hook, outcomes))
    }
}

struct ListPluginsTool {
    ext: Arc<PluginExtension>,
}

#[async_trait]
impl ToolHandler for ListPluginsTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "relicta.plugins.list".into(),
            description: Some("List installed plugins and the hooks they handle.".into()),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    #[instrument(skip(self, _arguments, _ctx), fields(tool = "relicta.plugins.list"))]
    async fn execute(&self, _arguments: Value, _ctx: &RequestContext) -> Result<CallToolResult> {
        Ok(match self.ext.list_plugins().await {
            Ok(plugins) => CallToolResult::json(&json!({
                "count": plugins.len(),
                "plugins": plugins,
            })),
            Err(e) => CallToolResult::error(e.to_string()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct InfoArgs {
    #[serde(default)]
    name: String,
}

struct PluginInfoTool {
    ext: Arc<PluginExtension>,
}

#[async_trait]
impl ToolHandler for PluginInfoTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "relicta.plugins.info".into(),
            description: Some("Show details for one plugin.".into()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Plugin name"
                    }
                },
                "required": ["name"]
            }),
        }
    }

    #[instrument(skip(self, arguments, _ctx), fields(tool = "relicta.plugins.info"))]
    async fn execute(&self, arguments: Value, _ctx: &RequestContext) -> Result<CallToolResult> {
        let args: InfoArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return Ok(result),
        };
        if args.name.trim().is_empty() {
            return Ok(CallToolResult::error("missing required argument: name"));
        }

        Ok(match self.ext.plugin_info(&args.name).await {
            Ok(info) => CallToolResult::json(&info),
            Err(e) => CallToolResult::error(e.to_string()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct ExecuteHookArgs {
    #[serde(default)]
    hook: String,
    #[serde(default)]
    context: ReleaseContext,
}

struct ExecuteHookTool {
    ext: Arc<PluginExtension>,
}

#[async_trait]
impl ToolHandler for ExecuteHookTool {
    fn definition(&self) -> Tool {
        let hooks: Vec<&str> = Hook::ALL.iter().map(Hook::as_str).collect();
        Tool {
            name: "relicta.plugins.execute_hook".into(),
            description: Some(
                "Run a lifecycle hook on every plugin that handles it and report each outcome."
                    .into(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "hook": {
                        "type": "string",
                        "description": "Hook to run",
                        "enum": hooks
                    },
                    "context": {
                        "type": "object",
                        "description": "Release context passed to the plugins",
                        "properties": {
                            "release_id": { "type": "string" },
                            "version": { "type": "string" },
                            "previous_version": { "type": "string" },
                            "tag_name": { "type": "string" },
                            "notes": { "type": "string" },
                            "dry_run": { "type": "boolean" }
                        }
                    }
                },
                "required": ["hook"]
            }),
        }
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "relicta.plugins.execute_hook"))]
    async fn execute(&self, arguments: Value, ctx: &RequestContext) -> Result<CallToolResult> {
        let args: ExecuteHookArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return Ok(result),
        };

        // Unknown hooks never reach the manager.
        let hook = match args.hook.parse::<Hook>() {
            Ok(hook) => hook,
            Err(e) => return Ok(CallToolResult::error(e.to_string())),
        };

        let summary = match self.ext.execute_hook(hook, &args.context).await {
            Ok(summary) => summary,
            Err(e) => return Ok(CallToolResult::error(e.to_string())),
        };

        debug!(
            hook = %hook,
            executed = summary.executed,
            failed = summary.failed,
            "Hook executed"
        );
        if summary.failed > 0 {
            ctx.log()
                .warning(
                    format!(
                        "{} of {} plugin(s) failed on {}",
                        summary.failed, summary.executed, hook
                    ),
                    None,
                )
                .await;
        }

        Ok(CallToolResult::json(&summary))
    }
}

struct PluginsResource {
    ext: Arc<PluginExtension>,
}

#[async_trait]
impl ResourceHandler for PluginsResource {
    fn definition(&self) -> Resource {
        Resource {
            uri: PLUGINS_URI.into(),
            name: "Plugins".into(),
            description: Some("Installed plugins as JSON".into()),
            mime_type: Some("application/json".into()),
        }
    }

    async fn read(&self, _ctx: &RequestContext) -> Result<ReadResourceResult> {
        match self.ext.list_plugins().await {
            Ok(plugins) => Ok(ReadResourceResult::new(vec![ResourceContents::json(
                PLUGINS_URI,
                &plugins,
            )?])),
            Err(e) => Ok(ReadResourceResult::error(PLUGINS_URI, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::HookOutcome;

    struct Fixed(Vec<PluginInfo>);

    #[async_trait]
    impl PluginManager for Fixed {
        async fn list_plugins(&self) -> PluginResult<Vec<PluginInfo>> {
            Ok(self.0.clone())
        }

        async fn get_plugin_info(&self, name: &str) -> PluginResult<PluginInfo> {
            self.0
                .iter()
                .find(|p| p.name == name)
                .cloned()
                .ok_or_else(|| PluginError::NotFound(name.into()))
        }

        async fn execute_hook(
            &self,
            _hook: Hook,
            _context: &ReleaseContext,
        ) -> PluginResult<Vec<HookOutcome>> {
            Err(PluginError::ExecutionFailed("runner offline".into()))
        }
    }

    fn slack() -> PluginInfo {
        PluginInfo {
            name: "slack".into(),
            version: "1.0.0".into(),
            description: None,
            enabled: true,
            hooks: vec![Hook::PostPublish],
        }
    }

    fn installed(manager: Option<Arc<dyn PluginManager>>) -> (Arc<PluginExtension>, Registry) {
        let ext = Arc::new(PluginExtension::new(manager));
        let registry = Registry::new();
        ext.install(&registry).unwrap();
        (ext, registry)
    }

    #[tokio::test]
    async fn test_install_registers_surface() {
        let (_, registry) = installed(None);
        assert!(registry.tools.get("relicta.plugins.list").is_some());
        assert!(registry.tools.get("relicta.plugins.info").is_some());
        assert!(registry.tools.get("relicta.plugins.execute_hook").is_some());
        assert!(registry.resources.get(PLUGINS_URI).is_some());
    }

    #[tokio::test]
    async fn test_unconfigured_is_business_failure() {
        let (_, registry) = installed(None);
        let ctx = RequestContext::detached();
        let tool = registry.tools.get("relicta.plugins.list").unwrap();
        let result = tool.execute(Value::Null, &ctx).await.unwrap();
        assert!(result.is_error);
        assert_eq!(result.first_text(), Some("plugin manager not configured"));
    }

    #[tokio::test]
    async fn test_invalid_hook_checked_first() {
        let (_, registry) = installed(None);
        let ctx = RequestContext::detached();
        let tool = registry.tools.get("relicta.plugins.execute_hook").unwrap();
        let result = tool
            .execute(json!({"hook": "pre-deploy"}), &ctx)
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.first_text().unwrap().starts_with("invalid hook"));
    }

    #[tokio::test]
    async fn test_swap_manager() {
        let (ext, registry) = installed(None);
        let ctx = RequestContext::detached();
        let info = registry.tools.get("relicta.plugins.info").unwrap();

        ext.set_manager(Some(Arc::new(Fixed(vec![slack()])))).await;
        assert!(ext.is_configured().await);

        let result = info.execute(json!({"name": "slack"}), &ctx).await.unwrap();
        assert!(!result.is_error);
        let plugin: PluginInfo = serde_json::from_str(result.first_text().unwrap()).unwrap();
        assert_eq!(plugin, slack());

        let result = info.execute(json!({"name": "jira"}), &ctx).await.unwrap();
        assert_eq!(result.first_text(), Some("plugin not found: jira"));

        let result = info.execute(json!({}), &ctx).await.unwrap();
        assert!(result.is_error);

        ext.set_manager(None).await;
        let result = info.execute(json!({"name": "slack"}), &ctx).await.unwrap();
        assert_eq!(result.first_text(), Some("plugin manager not configured"));
    }

    #[tokio::test]
    async fn test_manager_failure_and_resource() {
        let (_, registry) = installed(Some(Arc::new(Fixed(vec![slack()]))));
        let ctx = RequestContext::detached();

        let tool = registry.tools.get("relicta.plugins.execute_hook").unwrap();
        let result = tool
            .execute(json!({"hook": "post-publish"}), &ctx)
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(
            result.first_text(),
            Some("hook execution failed: runner offline")
        );

        let resource = registry.resources.get(PLUGINS_URI).unwrap();
        let read = resource.read(&ctx).await.unwrap();
        let plugins: Vec<PluginInfo> = serde_json::from_str(read.first_text().unwrap()).unwrap();
        assert_eq!(plugins.len(), 1);
    }
}
