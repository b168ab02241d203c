//! MCP client: request/response correlation and typed calls.
//!
//! # Example
//!
//! ```no_run
//! use relicta_mcp::client::{McpClient, StreamClientTransport};
//! use relicta_mcp::protocol::ClientInfo;
//!
//! # async fn run() -> relicta_mcp::error::ClientResult<()> {
//! let transport = StreamClientTransport::spawn("relicta-mcp", &[])?;
//! let client = McpClient::new(transport, ClientInfo::new("example", "0.1.0"));
//! client.initialize().await?;
//! let status: serde_json::Value = client
//!     .call_tool_typed("relicta.status", serde_json::json!({}))
//!     .await?;
//! println!("{status}");
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod transport;
pub mod typed;

pub use transport::{ClientTransport, HttpClientTransport, StreamClientTransport};
pub use typed::{decode_resource_result, decode_tool_result};

use crate::error::{ClientError, ClientResult, RpcError};
use crate::protocol::types::*;
use crate::streaming::{NotificationRouter, ProgressRouter};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tracing::{debug, info};

/// Receives server notifications on the client side.
pub trait NotificationHandler: Send + Sync {
    fn handle_notification(&self, notification: &JsonRpcNotification);
}

pub struct McpClient<T> {
    transport: T,
    next_id: AtomicI64,
    closed: AtomicBool,
    client_info: ClientInfo,
    router: Arc<NotificationRouter>,
    server: RwLock<Option<InitializeResult>>,
}

impl<T: ClientTransport> McpClient<T> {
    pub fn new(transport: T, client_info: ClientInfo) -> Self {
        let router = Arc::new(NotificationRouter::new());
        transport.set_notification_handler(router.clone());
        Self {
            transport,
            next_id: AtomicI64::new(1),
            closed: AtomicBool::new(false),
            client_info,
            router,
            server: RwLock::new(None),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> ClientResult<()> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        Ok(())
    }

    /// Server identity and capabilities from the last successful `initialize`.
    pub fn server(&self) -> Option<InitializeResult> {
        self.server.read().clone()
    }

    /// Routes progress and log notifications that arrive during calls.
    pub fn notifications(&self) -> &NotificationRouter {
        &self.router
    }

    pub fn progress(&self) -> &ProgressRouter {
        self.router.progress()
    }

    /// One raw round trip. A server error becomes [`ClientError::Rpc`].
    pub async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> ClientResult<R> {
        self.ensure_open()?;

        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut request = JsonRpcRequest::new(method).with_id(id.clone());
        request.params = params;

        debug!("Sending request {}: {}", id, method);
        let response = self.transport.send_request(&request).await?;

        if response.id.as_ref() != Some(&id) {
            return Err(ClientError::UnexpectedResponse(
                format!("expected id {}, got {:?}", id, response.id).into(),
            ));
        }

        if let Some(error) = response.error {
            return Err(RpcError {
                code: error.code,
                message: error.message,
                data: error.data,
            }
            .into());
        }

        let result = response
            .result
            .ok_or(ClientError::UnexpectedResponse("response has no result".into()))?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> ClientResult<()> {
        self.ensure_open()?;
        self.transport
            .send_notification(&JsonRpcNotification::new(method, params))
            .await?;
        Ok(())
    }

    /// Handshake, then announce `notifications/initialized`.
    pub async fn initialize(&self) -> ClientResult<InitializeResult> {
        self.ensure_open()?;

        let params = InitializeParams {
            protocol_version: MCP_VERSION.into(),
            capabilities: ClientCapabilities::default(),
            client_info: self.client_info.clone(),
        };
        let result: InitializeResult = self
            .request(methods::INITIALIZE, Some(serde_json::to_value(params)?))
            .await?;

        info!(
            "Connected to {} v{} (protocol {})",
            result.server_info.name, result.server_info.version, result.protocol_version
        );
        self.notify(methods::NOTIFICATION_INITIALIZED, None).await?;
        *self.server.write() = Some(result.clone());
        Ok(result)
    }

    pub async fn ping(&self) -> ClientResult<()> {
        let _: Value = self.request(methods::PING, None).await?;
        Ok(())
    }

    pub async fn list_tools(&self) -> ClientResult<Vec<Tool>> {
        let result: ListToolsResult = self.request(methods::TOOLS_LIST, Some(json!({}))).await?;
        Ok(result.tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> ClientResult<CallToolResult> {
        self.request(
            methods::TOOLS_CALL,
            Some(json!({ "name": name, "arguments": arguments })),
        )
        .await
    }

    pub async fn list_resources(&self) -> ClientResult<Vec<Resource>> {
        let result: ListResourcesResult = self
            .request(methods::RESOURCES_LIST, Some(json!({})))
            .await?;
        Ok(result.resources)
    }

    pub async fn read_resource(&self, uri: &str) -> ClientResult<ReadResourceResult> {
        self.request(methods::RESOURCES_READ, Some(json!({ "uri": uri })))
            .await
    }

    pub async fn list_prompts(&self) -> ClientResult<Vec<Prompt>> {
        let result: ListPromptsResult = self.request(methods::PROMPTS_LIST, Some(json!({}))).await?;
        Ok(result.prompts)
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: HashMap<String, String>,
    ) -> ClientResult<GetPromptResult> {
        self.request(
            methods::PROMPTS_GET,
            Some(json!({ "name": name, "arguments": arguments })),
        )
        .await
    }

    pub async fn set_log_level(&self, level: LogLevel) -> ClientResult<()> {
        let _: Value = self
            .request(methods::LOGGING_SET_LEVEL, Some(json!({ "level": level })))
            .await?;
        Ok(())
    }

    /// Close the client and its transport. Idempotent.
    pub async fn close(&self) -> ClientResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!("Closing MCP client");
        self.transport.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TransportError, TransportResult};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Answers every request from a canned table and counts I/O attempts.
    #[derive(Default)]
    struct Canned {
        calls: AtomicUsize,
        sent: Mutex<Vec<JsonRpcRequest>>,
        error: Option<JsonRpcError>,
        result: Value,
    }

    #[async_trait]
    impl ClientTransport for Canned {
        async fn send_request(&self, request: &JsonRpcRequest) -> TransportResult<JsonRpcResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sent.lock().push(request.clone());
            Ok(match &self.error {
                Some(e) => JsonRpcResponse::error(request.id.clone(), e.clone()),
                None => JsonRpcResponse::success(request.id.clone(), self.result.clone()),
            })
        }

        async fn send_notification(&self, notification: &JsonRpcNotification) -> TransportResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sent.lock().push(notification.clone().into());
            Ok(())
        }

        async fn close(&self) -> TransportResult<()> {
            Ok(())
        }
    }

    fn client(transport: Canned) -> McpClient<Canned> {
        McpClient::new(transport, ClientInfo::new("test-client", "1.0"))
    }

    #[tokio::test]
    async fn test_ids_increase() {
        let c = client(Canned {
            result: json!({}),
            ..Default::default()
        });
        c.ping().await.unwrap();
        c.ping().await.unwrap();

        let ids: Vec<Option<RequestId>> =
            c.transport().sent.lock().iter().map(|r| r.id.clone()).collect();
        assert_eq!(
            ids,
            vec![Some(RequestId::Number(1)), Some(RequestId::Number(2))]
        );
    }

    #[tokio::test]
    async fn test_rpc_error_is_structured() {
        let c = client(Canned {
            error: Some(JsonRpcError::method_not_found("nope")),
            ..Default::default()
        });

        let err = c.call_tool("nope", json!({})).await.unwrap_err();
        let rpc = match err {
            ClientError::Rpc(rpc) => rpc,
            other => panic!("expected rpc error, got {other:?}"),
        };
        assert_eq!(rpc.code, METHOD_NOT_FOUND);
        assert_eq!(
            rpc.to_string(),
            r#"RPC error -32601: Method not found: nope (data: "nope")"#
        );
    }

    #[tokio::test]
    async fn test_initialize_sends_initialized() {
        let c = client(Canned {
            result: json!({
                "protocolVersion": MCP_VERSION,
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "srv", "version": "2"}
            }),
            ..Default::default()
        });

        let result = c.initialize().await.unwrap();
        assert_eq!(result.server_info.name, "srv");
        assert_eq!(c.server().unwrap().server_info.version, "2");

        let sent = c.transport().sent.lock().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].method, "initialize");
        assert_eq!(sent[0].params.as_ref().unwrap()["clientInfo"]["name"], "test-client");
        assert_eq!(sent[1].method, "notifications/initialized");
        assert!(sent[1].is_notification());
    }

    #[tokio::test]
    async fn test_closed_client_does_no_io() {
        let c = client(Canned::default());
        c.close().await.unwrap();
        c.close().await.unwrap();

        assert!(matches!(c.initialize().await, Err(ClientError::Closed)));
        assert!(matches!(c.ping().await, Err(ClientError::Closed)));
        assert!(matches!(c.list_tools().await, Err(ClientError::Closed)));
        assert!(matches!(
            c.call_tool("relicta.status", json!({})).await,
            Err(ClientError::Closed)
        ));
        assert!(matches!(
            c.notify("notifications/initialized", None).await,
            Err(ClientError::Closed)
        ));
        assert_eq!(c.transport().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transport_error_passes_through() {
        struct Down;

        #[async_trait]
        impl ClientTransport for Down {
            async fn send_request(&self, _: &JsonRpcRequest) -> TransportResult<JsonRpcResponse> {
                Err(TransportError::HttpStatus(503))
            }
            async fn send_notification(&self, _: &JsonRpcNotification) -> TransportResult<()> {
                Err(TransportError::HttpStatus(503))
            }
            async fn close(&self) -> TransportResult<()> {
                Ok(())
            }
        }

        let c = McpClient::new(Down, ClientInfo::new("x", "1"));
        assert!(matches!(
            c.ping().await,
            Err(ClientError::Transport(TransportError::HttpStatus(503)))
        ));
    }
}
