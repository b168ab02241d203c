//! Model Context Protocol engine for release management.
//!
//! JSON-RPC 2.0 over newline-delimited streams or HTTP, a dispatcher backed by
//! tool/resource/prompt registries, a synchronous RPC client with typed call
//! helpers, and streaming progress and log notifications. The release domain
//! itself is consumed through the [`adapter::Adapter`] capability.
//!
//! # Example
//!
//! ```no_run
//! use relicta_mcp::adapter::{MemoryAdapter, memory::ChangeSet};
//! use relicta_mcp::config::ServerConfig;
//! use relicta_mcp::server::ReleaseServer;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let adapter = Arc::new(MemoryAdapter::new("1.0.0", ChangeSet::default()));
//!
//!     let server = ReleaseServer::builder()
//!         .config(ServerConfig::from_env()?)
//!         .adapter(adapter)
//!         .build()?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod client;
pub mod config;
pub mod error;
pub mod plugins;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod streaming;
pub mod tools;

pub use client::McpClient;
pub use config::{ServerConfig, ServerConfigBuilder, TransportKind};
pub use error::{McpError, Result};
pub use protocol::{McpServer, McpServerBuilder};
pub use registry::Registry;
pub use server::{ReleaseServer, ReleaseServerBuilder};
