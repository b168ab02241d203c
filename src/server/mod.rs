//! Release-management server: config, adapter and plugin manager wired into one MCP server.

use crate::adapter::Adapter;
use crate::config::{ServerConfig, TransportKind};
use crate::error::{ConfigError, Result};
use crate::plugins::{PluginExtension, PluginManager};
use crate::protocol::{HttpTransport, McpServer, McpServerBuilder, Transport};
use crate::registry::Registry;
use crate::tools;
use std::sync::Arc;
use tracing::info;

pub struct ReleaseServer {
    config: ServerConfig,
    server: McpServer,
    plugins: Arc<PluginExtension>,
}

impl ReleaseServer {
    pub fn builder() -> ReleaseServerBuilder {
        ReleaseServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn server(&self) -> &McpServer {
        &self.server
    }

    /// Plugin slot; the manager can be swapped while the server runs.
    pub fn plugins(&self) -> &Arc<PluginExtension> {
        &self.plugins
    }

    /// Serve on the configured binding until the peer goes away or [`ReleaseServer::stop`].
    pub async fn run(&self) -> Result<()> {
        match self.config.transport {
            TransportKind::Stdio => self.server.run().await,
            TransportKind::Http => {
                let transport =
                    Arc::new(HttpTransport::bind(self.config.http.addr, &self.config.http.path).await?);
                info!(
                    "Listening on http://{}{}",
                    transport.local_addr(),
                    self.config.http.path
                );
                let outcome = self.server.run_with_transport(Arc::clone(&transport)).await;
                transport.close().await?;
                outcome
            }
        }
    }

    pub fn stop(&self) {
        self.server.stop();
    }
}

#[derive(Default)]
pub struct ReleaseServerBuilder {
    config: Option<ServerConfig>,
    adapter: Option<Arc<dyn Adapter>>,
    plugin_manager: Option<Arc<dyn PluginManager>>,
}

impl ReleaseServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn plugin_manager(mut self, manager: Arc<dyn PluginManager>) -> Self {
        self.plugin_manager = Some(manager);
        self
    }

    pub fn build(self) -> Result<ReleaseServer> {
        let config = self
            .config
            .ok_or(ConfigError::MissingField("config".into()))?;

        let registry = Arc::new(Registry::new());
        tools::register_all(&registry, self.adapter)?;

        let plugins = Arc::new(PluginExtension::new(self.plugin_manager));
        plugins.install(&registry)?;

        info!(
            tools = registry.tools.len(),
            resources = registry.resources.len(),
            prompts = registry.prompts.len(),
            "Release server assembled"
        );

        let mut builder = McpServerBuilder::new()
            .name(config.name.to_string())
            .version(config.version.to_string())
            .with_tools()
            .with_resources()
            .with_prompts()
            .with_logging()
            .log_level(config.log_level)
            .registry(registry);
        if let Some(instructions) = &config.instructions {
            builder = builder.instructions(instructions.as_str());
        }

        Ok(ReleaseServer {
            server: builder.build(),
            config,
            plugins,
        })
    }
}
