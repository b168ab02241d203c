//! Client-side transports: one synchronous call at a time.

use crate::client::NotificationHandler;
use crate::error::{TransportError, TransportResult};
use crate::protocol::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, Message};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

/// How long a child server gets to exit on its own after its stdin closes.
const CHILD_EXIT_GRACE: Duration = Duration::from_secs(2);

/// Client-side transport contract.
///
/// `send_request` writes one request and blocks until the response carrying
/// the same id arrives. There is no pipelining: callers serialize access or
/// use one transport each. After `close`, every call fails with
/// [`TransportError::Closed`] without attempting I/O.
#[async_trait]
pub trait ClientTransport: Send + Sync {
    async fn send_request(&self, request: &JsonRpcRequest) -> TransportResult<JsonRpcResponse>;

    async fn send_notification(&self, notification: &JsonRpcNotification) -> TransportResult<()>;

    /// Receive server notifications that arrive while a call is in flight.
    fn set_notification_handler(&self, _handler: Arc<dyn NotificationHandler>) {}

    /// Close the transport. Idempotent.
    async fn close(&self) -> TransportResult<()>;
}

struct StreamIo<R, W> {
    reader: BufReader<R>,
    writer: BufWriter<W>,
}

/// Client over a pair of byte streams, such as a child process's stdio.
pub struct StreamClientTransport<R, W> {
    // One lock for both halves: a call owns the stream until its response is in.
    io: Mutex<StreamIo<R, W>>,
    handler: RwLock<Option<Arc<dyn NotificationHandler>>>,
    closed: AtomicBool,
    child: Mutex<Option<Child>>,
}

impl<R, W> StreamClientTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new(StreamIo {
                reader: BufReader::new(reader),
                writer: BufWriter::new(writer),
            }),
            handler: RwLock::new(None),
            closed: AtomicBool::new(false),
            child: Mutex::new(None),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn deliver(&self, notification: &JsonRpcNotification) {
        let handler = self.handler.read().clone();
        match handler {
            Some(handler) => handler.handle_notification(notification),
            None => trace!("No notification handler for {}", notification.method),
        }
    }
}

impl StreamClientTransport<ChildStdout, ChildStdin> {
    /// Start `program` and talk to it over its stdin and stdout.
    ///
    /// The child inherits stderr and is killed if the transport is dropped.
    pub fn spawn(program: &str, args: &[String]) -> TransportResult<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| {
            TransportError::Io(std::io::Error::other("child stdout not captured"))
        })?;
        let stdin = child.stdin.take().ok_or_else(|| {
            TransportError::Io(std::io::Error::other("child stdin not captured"))
        })?;

        debug!("Spawned MCP server: {} {:?}", program, args);
        let mut transport = Self::new(stdout, stdin);
        *transport.child.get_mut() = Some(child);
        Ok(transport)
    }
}

async fn write_line<W: AsyncWrite + Unpin>(
    writer: &mut BufWriter<W>,
    mut line: String,
) -> TransportResult<()> {
    line.push('\n');
    trace!("Sending line: {}", line.trim_end());
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[async_trait]
impl<R, W> ClientTransport for StreamClientTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send_request(&self, request: &JsonRpcRequest) -> TransportResult<JsonRpcResponse> {
        self.ensure_open()?;

        let json = serde_json::to_string(request)?;
        let mut io = self.io.lock().await;
        write_line(&mut io.writer, json).await?;

        let mut buf = Vec::new();
        loop {
            buf.clear();
            if io.reader.read_until(b'\n', &mut buf).await? == 0 {
                return Err(TransportError::ConnectionClosed);
            }
            let Ok(line) = std::str::from_utf8(&buf) else {
                warn!("Discarding non-UTF-8 line from server");
                continue;
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            trace!("Received line: {}", trimmed);

            match serde_json::from_str::<Message>(trimmed) {
                Ok(Message::Response(response)) if response.id == request.id => {
                    return Ok(response);
                }
                Ok(Message::Response(response)) => {
                    warn!(
                        "Discarding response for {:?} while waiting for {:?}",
                        response.id, request.id
                    );
                }
                Ok(Message::Request(incoming)) if incoming.is_notification() => {
                    self.deliver(&JsonRpcNotification::new(incoming.method, incoming.params));
                }
                Ok(Message::Request(incoming)) => {
                    warn!("Ignoring server-initiated request: {}", incoming.method);
                }
                Err(e) => warn!("Discarding malformed line from server: {}", e),
            }
        }
    }

    async fn send_notification(&self, notification: &JsonRpcNotification) -> TransportResult<()> {
        self.ensure_open()?;

        let json = serde_json::to_string(notification)?;
        let mut io = self.io.lock().await;
        write_line(&mut io.writer, json).await
    }

    fn set_notification_handler(&self, handler: Arc<dyn NotificationHandler>) {
        *self.handler.write() = Some(handler);
    }

    async fn close(&self) -> TransportResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        debug!("Closing stream client transport");
        {
            let mut io = self.io.lock().await;
            if let Err(e) = io.writer.shutdown().await
                && e.kind() != std::io::ErrorKind::BrokenPipe
            {
                return Err(e.into());
            }
        }

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(CHILD_EXIT_GRACE, child.wait()).await {
                Ok(Ok(status)) => debug!("MCP server exited: {}", status),
                Ok(Err(e)) => warn!("Failed to wait for MCP server: {}", e),
                Err(_) => {
                    warn!("MCP server did not exit, killing it");
                    child.kill().await?;
                }
            }
        }
        Ok(())
    }
}

/// Client over HTTP: one POST per message.
pub struct HttpClientTransport {
    client: reqwest::Client,
    url: String,
    closed: AtomicBool,
}

impl HttpClientTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    /// Use a preconfigured client, e.g. one with timeouts set.
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn post<B: serde::Serialize + Sync>(&self, body: &B) -> TransportResult<reqwest::Response> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let response = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus(status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl ClientTransport for HttpClientTransport {
    async fn send_request(&self, request: &JsonRpcRequest) -> TransportResult<JsonRpcResponse> {
        let response = self.post(request).await?;
        response
            .json::<JsonRpcResponse>()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))
    }

    async fn send_notification(&self, notification: &JsonRpcNotification) -> TransportResult<()> {
        self.post(notification).await?;
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::RequestId;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, DuplexStream, duplex};

    struct Recorder(parking_lot::Mutex<Vec<String>>);

    impl NotificationHandler for Recorder {
        fn handle_notification(&self, notification: &JsonRpcNotification) {
            self.0.lock().push(notification.method.clone());
        }
    }

    fn pair() -> (
        StreamClientTransport<DuplexStream, DuplexStream>,
        BufReader<DuplexStream>,
        DuplexStream,
    ) {
        let (client_in, server_out) = duplex(1 << 16);
        let (server_in, client_out) = duplex(1 << 16);
        (
            StreamClientTransport::new(client_in, client_out),
            BufReader::new(server_in),
            server_out,
        )
    }

    #[tokio::test]
    async fn test_skips_foreign_ids_and_routes_notifications() {
        let (transport, mut server_in, mut server_out) = pair();
        let recorder = Arc::new(Recorder(parking_lot::Mutex::new(Vec::new())));
        transport.set_notification_handler(recorder.clone());

        let server = tokio::spawn(async move {
            let mut line = String::new();
            server_in.read_line(&mut line).await.unwrap();
            let request: JsonRpcRequest = serde_json::from_str(&line).unwrap();
            assert_eq!(request.method, "ping");

            let lines = [
                json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {"level": "info", "data": {}}}),
                json!({"jsonrpc": "2.0", "id": 999, "result": {}}),
                json!({"jsonrpc": "2.0", "id": 1, "result": {"ok": true}}),
            ];
            for l in lines {
                server_out
                    .write_all(format!("{}\n", l).as_bytes())
                    .await
                    .unwrap();
            }
        });

        let response = transport
            .send_request(&JsonRpcRequest::new("ping").with_id(1))
            .await
            .unwrap();
        server.await.unwrap();

        assert_eq!(response.id, Some(RequestId::Number(1)));
        assert_eq!(response.result, Some(json!({"ok": true})));
        assert_eq!(*recorder.0.lock(), vec!["notifications/message"]);
    }

    #[tokio::test]
    async fn test_skips_non_utf8_lines() {
        let (transport, mut server_in, mut server_out) = pair();

        let server = tokio::spawn(async move {
            let mut line = String::new();
            server_in.read_line(&mut line).await.unwrap();
            server_out.write_all(b"\xff\xfe garbage\n").await.unwrap();
            server_out
                .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n")
                .await
                .unwrap();
        });

        let response = transport
            .send_request(&JsonRpcRequest::new("ping").with_id(1))
            .await
            .unwrap();
        server.await.unwrap();
        assert_eq!(response.result, Some(json!({})));
    }

    #[tokio::test]
    async fn test_eof_is_connection_closed() {
        let (transport, _server_in, server_out) = pair();
        drop(server_out);

        let err = transport
            .send_request(&JsonRpcRequest::new("ping").with_id(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_closed_fails_fast() {
        let (transport, _server_in, _server_out) = pair();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport
            .send_request(&JsonRpcRequest::new("ping").with_id(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
        assert!(matches!(
            transport
                .send_notification(&JsonRpcNotification::new("x", None))
                .await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_http_closed_fails_fast() {
        // Nothing listens here; a closed transport must not even try.
        let transport = HttpClientTransport::new("http://127.0.0.1:9/mcp");
        transport.close().await.unwrap();
        let err = transport
            .send_request(&JsonRpcRequest::new("ping").with_id(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }
}
