//! Configuration types and builders.

use crate::error::{ConfigError, McpError, Result};
use crate::protocol::LogLevel;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::net::SocketAddr;

pub const DEFAULT_INSTRUCTIONS: &str = "Release management over MCP. Typical flow: \
relicta.plan, relicta.bump, relicta.notes, relicta.evaluate, relicta.approve, relicta.publish. \
Read relicta://status at any time to see where the release stands.";

/// Which binding the server listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Stdio,
    Http,
}

impl TransportKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "stdio" => Some(Self::Stdio),
            "http" => Some(Self::Http),
            _ => None,
        }
    }
}

impl TryFrom<&str> for TransportKind {
    type Error = ConfigError;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        Self::parse(s).ok_or_else(|| ConfigError::InvalidValue {
            field: "transport".into(),
            message: format!("Unknown transport: '{}'. Valid transports: stdio, http", s).into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub addr: SocketAddr,
    pub path: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8808)),
            path: "/mcp".into(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: Cow<'static, str>,
    pub version: Cow<'static, str>,
    pub instructions: Option<String>,
    pub transport: TransportKind,
    /// Minimum level for protocol log notifications.
    pub log_level: LogLevel,
    pub http: HttpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
            instructions: Some(DEFAULT_INSTRUCTIONS.into()),
            transport: TransportKind::default(),
            log_level: LogLevel::Info,
            http: HttpConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Defaults overridden by `RELICTA_MCP_*` environment variables.
    pub fn from_env() -> Result<Self> {
        ServerConfigBuilder::default().from_env()?.build()
    }
}

/// Builder for ServerConfig.
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<Cow<'static, str>>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn instructions(mut self, instructions: Option<String>) -> Self {
        self.config.instructions = instructions;
        self
    }

    pub fn transport(mut self, transport: TransportKind) -> Self {
        self.config.transport = transport;
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log_level = level;
        self
    }

    pub fn http_addr(mut self, addr: SocketAddr) -> Self {
        self.config.http.addr = addr;
        self
    }

    pub fn http_path(mut self, path: impl Into<String>) -> Self {
        self.config.http.path = path.into();
        self
    }

    /// Read overrides from the process environment.
    pub fn from_env(self) -> Result<Self> {
        self.from_lookup(|key| env::var(key).ok())
    }

    /// Read overrides through `lookup`, keyed by environment variable name.
    pub fn from_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(transport) = lookup("RELICTA_MCP_TRANSPORT") {
            self.config.transport = TransportKind::parse(&transport).ok_or_else(|| {
                McpError::Config(ConfigError::InvalidValue {
                    field: "RELICTA_MCP_TRANSPORT".into(),
                    message: format!("Unknown transport: {}", transport).into(),
                })
            })?;
        }

        if let Some(addr) = lookup("RELICTA_MCP_HTTP_ADDR") {
            self.config.http.addr = addr.trim().parse().map_err(|_| {
                McpError::Config(ConfigError::InvalidValue {
                    field: "RELICTA_MCP_HTTP_ADDR".into(),
                    message: format!("Invalid socket address: {}", addr).into(),
                })
            })?;
        }

        if let Some(path) = lookup("RELICTA_MCP_HTTP_PATH") {
            self.config.http.path = path;
        }

        if let Some(level) = lookup("RELICTA_MCP_LOG_LEVEL") {
            self.config.log_level = LogLevel::parse(&level).ok_or_else(|| {
                McpError::Config(ConfigError::InvalidValue {
                    field: "RELICTA_MCP_LOG_LEVEL".into(),
                    message: format!("Unknown log level: {}", level).into(),
                })
            })?;
        }

        if let Some(instructions) = lookup("RELICTA_MCP_INSTRUCTIONS") {
            self.config.instructions = Some(instructions).filter(|i| !i.trim().is_empty());
        }

        Ok(self)
    }

    pub fn build(self) -> Result<ServerConfig> {
        self.validate()?;
        Ok(self.config)
    }

    fn validate(&self) -> Result<()> {
        if self.config.name.is_empty() {
            return Err(ConfigError::MissingField("name".into()).into());
        }
        if self.config.version.is_empty() {
            return Err(ConfigError::MissingField("version".into()).into());
        }
        if !self.config.http.path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "http.path".into(),
                message: "Path must start with '/'".into(),
            }
            .into());
        }
        Ok(())
    }
}
