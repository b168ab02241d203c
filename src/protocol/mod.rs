//! MCP protocol implementation over JSON-RPC 2.0.

pub mod handler;
pub mod http;
pub mod server;
pub mod transport;
pub mod types;

pub use handler::{Dispatcher, RequestContext};
pub use http::HttpTransport;
pub use server::{McpServer, McpServerBuilder, ServerState};
pub use transport::{NotificationSink, StdioTransport, StreamTransport, Transport};
pub use types::*;
