//! Method dispatcher and per-request context.

use crate::error::{McpError, ProtocolError, ProtocolResult};
use crate::protocol::transport::NotificationSink;
use crate::protocol::types::*;
use crate::registry::Registry;
use crate::registry::prompt::missing_arguments;
use crate::streaming::{LevelFilter, LogEmitter, MemorySink, ProgressReporter};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Context handed to every tool, resource and prompt handler.
///
/// Carries the request identity and the server's notification emitters, so
/// handlers can report progress and log without any process-wide state.
#[derive(Clone)]
pub struct RequestContext {
    pub request_id: Option<RequestId>,
    pub method: String,
    progress: Arc<ProgressReporter>,
    log: LogEmitter,
}

impl RequestContext {
    pub fn new(
        request_id: Option<RequestId>,
        method: impl Into<String>,
        progress: Arc<ProgressReporter>,
        log: LogEmitter,
    ) -> Self {
        Self {
            request_id,
            method: method.into(),
            progress,
            log,
        }
    }

    /// A context with no peer attached. Notifications are kept in memory and dropped.
    pub fn detached() -> Self {
        let sink: Arc<dyn NotificationSink> = Arc::new(MemorySink::default());
        Self::new(
            None,
            "",
            Arc::new(ProgressReporter::new(Arc::clone(&sink))),
            LogEmitter::new(sink, Arc::new(LevelFilter::default())),
        )
    }

    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    pub fn log(&self) -> &LogEmitter {
        &self.log
    }
}

/// Routes requests to the built-in MCP methods and the handler registry.
pub struct Dispatcher {
    info: ServerInfo,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
    registry: Arc<Registry>,
    level: Arc<LevelFilter>,
    progress: Arc<ProgressReporter>,
    log: LogEmitter,
}

impl Dispatcher {
    pub fn new(
        info: ServerInfo,
        capabilities: ServerCapabilities,
        instructions: Option<String>,
        registry: Arc<Registry>,
        level: Arc<LevelFilter>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let progress = Arc::new(ProgressReporter::new(Arc::clone(&sink)));
        let log = LogEmitter::new(sink, Arc::clone(&level)).named(info.name.clone());
        Self {
            info,
            capabilities,
            instructions,
            registry,
            level,
            progress,
            log,
        }
    }

    /// Dispatch one request. Returns `None` for notifications, whatever their outcome.
    #[instrument(skip(self, request), fields(method = %request.method))]
    pub async fn dispatch(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        let ctx = RequestContext::new(
            id.clone(),
            method.as_str(),
            Arc::clone(&self.progress),
            self.log.clone(),
        );
        let result = self.route(&method, params, &ctx).await;

        let Some(id) = id else {
            if let Err(e) = result {
                debug!("Notification {} failed: {}", method, e);
            }
            return None;
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(Some(id), value),
            Err(e) => {
                warn!("Request {} failed: {}", method, e);
                JsonRpcResponse::error(Some(id), rpc_error(&e))
            }
        })
    }

    async fn route(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: &RequestContext,
    ) -> ProtocolResult<Value> {
        match method {
            methods::INITIALIZE => self.handle_initialize(params),
            methods::INITIALIZED | methods::NOTIFICATION_INITIALIZED => Ok(json!({})),
            methods::PING => Ok(json!({})),
            methods::TOOLS_LIST => to_value(ListToolsResult {
                tools: self.registry.tools.list(),
                next_cursor: None,
            }),
            methods::TOOLS_CALL => self.handle_call_tool(params, ctx).await,
            methods::RESOURCES_LIST => to_value(ListResourcesResult {
                resources: self.registry.resources.list(),
                next_cursor: None,
            }),
            methods::RESOURCES_READ => self.handle_read_resource(params, ctx).await,
            methods::PROMPTS_LIST => to_value(ListPromptsResult {
                prompts: self.registry.prompts.list(),
                next_cursor: None,
            }),
            methods::PROMPTS_GET => self.handle_get_prompt(params, ctx).await,
            methods::LOGGING_SET_LEVEL if self.capabilities.logging.is_some() => {
                self.handle_set_level(params)
            }
            other => Err(ProtocolError::MethodNotFound(other.to_string())),
        }
    }

    fn handle_initialize(&self, params: Option<Value>) -> ProtocolResult<Value> {
        let params: InitializeParams = parse_params(params)?;
        info!(
            client = %params.client_info.name,
            client_version = %params.client_info.version,
            protocol_version = %params.protocol_version,
            "Initialize request"
        );
        if params.protocol_version != MCP_VERSION {
            debug!(
                "Client requested protocol {}, answering with {}",
                params.protocol_version, MCP_VERSION
            );
        }

        to_value(InitializeResult {
            protocol_version: MCP_VERSION.into(),
            capabilities: self.capabilities.clone(),
            server_info: self.info.clone(),
            instructions: self.instructions.clone(),
        })
    }

    #[instrument(skip_all)]
    async fn handle_call_tool(
        &self,
        params: Option<Value>,
        ctx: &RequestContext,
    ) -> ProtocolResult<Value> {
        let params: CallToolParams = parse_params(params)?;
        let tool = self
            .registry
            .tools
            .get(&params.name)
            .ok_or_else(|| ProtocolError::MethodNotFound(params.name.clone()))?;

        debug!("Calling tool: {}", params.name);
        let result = tool
            .execute(params.arguments, ctx)
            .await
            .map_err(handler_fault)?;
        to_value(result)
    }

    async fn handle_read_resource(
        &self,
        params: Option<Value>,
        ctx: &RequestContext,
    ) -> ProtocolResult<Value> {
        let params: ReadResourceParams = parse_params(params)?;
        let resource = self
            .registry
            .resources
            .get(&params.uri)
            .ok_or_else(|| ProtocolError::MethodNotFound(params.uri.clone()))?;

        let result = resource.read(ctx).await.map_err(handler_fault)?;
        to_value(result)
    }

    async fn handle_get_prompt(
        &self,
        params: Option<Value>,
        ctx: &RequestContext,
    ) -> ProtocolResult<Value> {
        let params: GetPromptParams = parse_params(params)?;
        let prompt = self
            .registry
            .prompts
            .get(&params.name)
            .ok_or_else(|| ProtocolError::MethodNotFound(params.name.clone()))?;

        let missing = missing_arguments(&prompt.definition(), &params.arguments);
        if !missing.is_empty() {
            return Err(ProtocolError::InvalidParams(
                format!("missing required arguments: {}", missing.join(", ")).into(),
            ));
        }

        let result = prompt
            .get(params.arguments, ctx)
            .await
            .map_err(handler_fault)?;
        to_value(result)
    }

    fn handle_set_level(&self, params: Option<Value>) -> ProtocolResult<Value> {
        let params: SetLevelParams = parse_params(params)?;
        info!("Client log level set to {}", params.level.as_str());
        self.level.set(params.level);
        Ok(json!({}))
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> ProtocolResult<T> {
    let params = params.ok_or_else(|| ProtocolError::InvalidParams("Missing params".into()))?;
    serde_json::from_value(params).map_err(|e| ProtocolError::InvalidParams(e.to_string().into()))
}

fn to_value<T: Serialize>(result: T) -> ProtocolResult<Value> {
    serde_json::to_value(result).map_err(|e| ProtocolError::InternalError(e.to_string().into()))
}

/// A handler's local fault, whatever its kind, is an internal error on the wire.
fn handler_fault(e: McpError) -> ProtocolError {
    ProtocolError::InternalError(e.to_string().into())
}

/// Wire form of a protocol error.
pub fn rpc_error(e: &ProtocolError) -> JsonRpcError {
    match e {
        ProtocolError::ParseError => JsonRpcError::parse_error(),
        ProtocolError::MethodNotFound(name) => JsonRpcError::method_not_found(name),
        other => JsonRpcError::new(other.code(), other.to_string()),
    }
}
