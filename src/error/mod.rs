//! Error types for the MCP engine.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `From` conversions.
//!
//! Three kinds of failure are kept apart:
//! - protocol failures ([`ProtocolError`]) travel on the JSON-RPC error channel;
//! - business failures are *successful* results carrying a failure flag and are
//!   never represented here on the server side;
//! - client-local failures ([`ClientError`]) never reached the peer, or describe
//!   how the peer answered.

use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Main error type for the server side of the engine.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: Cow<'static, str> },
}

impl McpError {
    /// True when the error means the transport was shut down on purpose.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Closed))
    }
}

/// JSON-RPC 2.0 and MCP protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Parse error: invalid JSON")]
    ParseError,

    #[error("Invalid request: {0}")]
    InvalidRequest(Cow<'static, str>),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(Cow<'static, str>),

    #[error("Internal error: {0}")]
    InternalError(Cow<'static, str>),
}

impl ProtocolError {
    /// Returns the JSON-RPC 2.0 error code.
    pub fn code(&self) -> i32 {
        match self {
            Self::ParseError => crate::protocol::PARSE_ERROR,
            Self::InvalidRequest(_) => crate::protocol::INVALID_REQUEST,
            Self::MethodNotFound(_) => crate::protocol::METHOD_NOT_FOUND,
            Self::InvalidParams(_) => crate::protocol::INVALID_PARAMS,
            Self::InternalError(_) => crate::protocol::INTERNAL_ERROR,
        }
    }
}

/// Transport-level failures, shared by the server and client bindings.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Local failures raised by a tool, resource or prompt handler.
///
/// Any of these turns into an internal-error protocol response. Business
/// failures must be reported through a result's failure flag instead.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Handler not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Missing required argument: {0}")]
    MissingArgument(Cow<'static, str>),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(Cow<'static, str>),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        field: Cow<'static, str>,
        message: Cow<'static, str>,
    },
}

/// A JSON-RPC error object returned by the peer.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<Value>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC error {}: {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, " (data: {})", data)?;
        }
        Ok(())
    }
}

impl std::error::Error for RpcError {}

/// A business-level failure reported by a tool or resource (failure flag set).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ToolError {
    pub message: String,
}

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors seen by the RPC client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The client was closed; no I/O was attempted.
    #[error("client is closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The peer answered on the protocol error channel.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// The peer executed the call and reported a business failure.
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("result contained no text content")]
    NoContent,

    #[error("failed to decode result: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(Cow<'static, str>),
}

/// Failures reported by the release adapter.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("relicta adapter not configured")]
    NotConfigured,

    #[error("no active release; run relicta.plan first")]
    NoActiveRelease,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Rejected(String),
}

/// Failures reported by the plugin manager.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    #[error("plugin manager not configured")]
    NotConfigured,

    #[error("plugin not found: {0}")]
    NotFound(String),

    #[error("invalid hook: {0}")]
    InvalidHook(String),

    #[error("hook execution failed: {0}")]
    ExecutionFailed(String),
}

/// Result type alias for McpError.
pub type Result<T> = std::result::Result<T, McpError>;

/// Result type alias for ProtocolError.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Result type alias for TransportError.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Result type alias for ClientError.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Result type alias for AdapterError.
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// Result type alias for PluginError.
pub type PluginResult<T> = std::result::Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_codes() {
        assert_eq!(ProtocolError::ParseError.code(), -32700);
        assert_eq!(ProtocolError::InvalidRequest("test".into()).code(), -32600);
        assert_eq!(ProtocolError::MethodNotFound("test".into()).code(), -32601);
        assert_eq!(ProtocolError::InvalidParams("test".into()).code(), -32602);
        assert_eq!(ProtocolError::InternalError("test".into()).code(), -32603);
    }

    #[test]
    fn test_rpc_error_display() {
        let err = RpcError {
            code: -32601,
            message: "Method not found".into(),
            data: None,
        };
        assert_eq!(err.to_string(), "RPC error -32601: Method not found");

        let err = RpcError {
            code: -32601,
            message: "Method not found".into(),
            data: Some(serde_json::json!("foo/bar")),
        };
        assert_eq!(
            err.to_string(),
            "RPC error -32601: Method not found (data: \"foo/bar\")"
        );
    }

    #[test]
    fn test_tool_error_shows_only_message() {
        let err = ClientError::from(ToolError::new("no active release"));
        assert!(matches!(err, ClientError::Tool(ref t) if t.to_string() == "no active release"));
    }

    #[test]
    fn test_error_conversion() {
        let err: McpError = TransportError::Closed.into();
        assert!(err.is_closed());

        let err: McpError = HandlerError::InvalidArguments("x".into()).into();
        assert!(!err.is_closed());
    }
}
