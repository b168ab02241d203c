//! MCP server with lifecycle management.

use crate::error::{McpError, Result};
use crate::protocol::handler::{Dispatcher, rpc_error};
use crate::protocol::transport::{NotificationSink, StdioTransport, Transport};
use crate::protocol::types::*;
use crate::registry::Registry;
use crate::streaming::LevelFilter;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

/// Server state enumeration. Observed, not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Server created but not initialized.
    Created,
    /// Initialize request received, awaiting initialized notification.
    Initializing,
    /// Server is fully operational.
    Running,
    /// The message loop has returned.
    Stopped,
}

/// MCP Server. Drives one session at a time, strictly sequentially.
pub struct McpServer {
    info: ServerInfo,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
    registry: Arc<Registry>,
    level: Arc<LevelFilter>,
    state: RwLock<ServerState>,
    running: AtomicBool,
    // Set by `stop`, cleared when a loop observes it. A stop issued before `run` is honored.
    stop_requested: AtomicBool,
}

impl McpServer {
    pub fn builder() -> McpServerBuilder {
        McpServerBuilder::new()
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// The live lookup tables. Handlers registered here are visible to the next dispatch.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn level_filter(&self) -> &Arc<LevelFilter> {
        &self.level
    }

    /// Get current server state.
    pub async fn state(&self) -> ServerState {
        *self.state.read().await
    }

    /// Check if server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the server with stdio transport.
    #[instrument(skip(self), fields(server = %self.info.name))]
    pub async fn run(&self) -> Result<()> {
        let transport = Arc::new(StdioTransport::stdio());
        self.run_with_transport(transport).await
    }

    /// Run the message loop until end of stream, [`McpServer::stop`], or a fatal write failure.
    pub async fn run_with_transport<T: Transport + 'static>(&self, transport: Arc<T>) -> Result<()> {
        info!(
            "Starting MCP server: {} v{}",
            self.info.name, self.info.version
        );
        self.running.store(true, Ordering::SeqCst);
        *self.state.write().await = ServerState::Created;

        let sink: Arc<dyn NotificationSink> = transport.clone();
        let dispatcher = Dispatcher::new(
            self.info.clone(),
            self.capabilities.clone(),
            self.instructions.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.level),
            sink,
        );

        let outcome = self.serve(transport.as_ref(), &dispatcher).await;

        self.running.store(false, Ordering::SeqCst);
        *self.state.write().await = ServerState::Stopped;
        match &outcome {
            Ok(()) => info!("Server stopped"),
            Err(e) => error!("Server stopped on error: {}", e),
        }
        outcome
    }

    async fn serve<T: Transport>(&self, transport: &T, dispatcher: &Dispatcher) -> Result<()> {
        loop {
            // Cancellation is only observed between messages.
            if self.stop_requested.swap(false, Ordering::SeqCst) {
                info!("Server stopping...");
                return Ok(());
            }

            let request = match transport.read_message().await {
                Ok(Some(request)) => request,
                Ok(None) => {
                    debug!("EOF received, shutting down");
                    return Ok(());
                }
                Err(McpError::Protocol(e)) => {
                    warn!("Rejecting malformed message: {}", e);
                    let response = JsonRpcResponse::error(None, rpc_error(&e));
                    transport.write_response(&response).await?;
                    continue;
                }
                Err(e) if e.is_closed() => {
                    debug!("Transport closed");
                    return Ok(());
                }
                Err(e) => {
                    error!("Transport error: {}", e);
                    return Err(e);
                }
            };

            self.update_state_for_method(&request.method).await;

            if let Some(response) = dispatcher.dispatch(request).await {
                transport.write_response(&response).await?;
            }
        }
    }

    async fn update_state_for_method(&self, method: &str) {
        let mut state = self.state.write().await;
        match method {
            methods::INITIALIZE => {
                if *state == ServerState::Created {
                    *state = ServerState::Initializing;
                }
            }
            methods::INITIALIZED | methods::NOTIFICATION_INITIALIZED => {
                if *state == ServerState::Initializing {
                    *state = ServerState::Running;
                    info!("Server initialized and running");
                }
            }
            _ => {}
        }
    }

    /// Request the loop to stop. Takes effect before the next blocking read.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }
}

/// Builder for MCP Server.
pub struct McpServerBuilder {
    name: String,
    version: String,
    instructions: Option<String>,
    capabilities: ServerCapabilities,
    log_level: LogLevel,
    registry: Option<Arc<Registry>>,
}

impl McpServerBuilder {
    pub fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
            instructions: None,
            capabilities: ServerCapabilities::default(),
            log_level: LogLevel::Info,
            registry: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_tools(mut self) -> Self {
        self.capabilities.tools = Some(ToolsCapability {
            list_changed: Some(true),
        });
        self
    }

    pub fn with_resources(mut self) -> Self {
        self.capabilities.resources = Some(ResourcesCapability {
            subscribe: Some(false),
            list_changed: Some(true),
        });
        self
    }

    pub fn with_prompts(mut self) -> Self {
        self.capabilities.prompts = Some(PromptsCapability {
            list_changed: Some(false),
        });
        self
    }

    pub fn with_logging(mut self) -> Self {
        self.capabilities.logging = Some(LoggingCapability {});
        self
    }

    /// Initial minimum level for protocol log notifications.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Serve an existing registry instead of a fresh empty one.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> McpServer {
        McpServer {
            info: ServerInfo::new(self.name, self.version),
            capabilities: self.capabilities,
            instructions: self.instructions,
            registry: self.registry.unwrap_or_default(),
            level: Arc::new(LevelFilter::new(self.log_level)),
            state: RwLock::new(ServerState::Created),
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
        }
    }
}

impl Default for McpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
