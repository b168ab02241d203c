//! Newline-delimited JSON transport for JSON-RPC messages.
//!
//! One JSON document per line. Writes go through a single lock so concurrent
//! notifications and responses never interleave partial lines.

use crate::error::{McpError, ProtocolError, Result, TransportError};
use crate::protocol::types::{
    JSONRPC_VERSION, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, Stdin, Stdout,
};
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, trace};

/// Server-side transport contract.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Read the next request. `Ok(None)` means the peer closed the stream.
    ///
    /// Malformed input is reported as [`ProtocolError`] and leaves the
    /// transport usable. After [`Transport::close`] this returns
    /// [`TransportError::Closed`] without touching the stream.
    async fn read_message(&self) -> Result<Option<JsonRpcRequest>>;

    async fn write_response(&self, response: &JsonRpcResponse) -> Result<()>;

    async fn write_notification(&self, notification: &JsonRpcNotification) -> Result<()>;

    /// Close the transport. Idempotent.
    async fn close(&self) -> Result<()>;
}

/// Anything that can emit server notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: JsonRpcNotification) -> Result<()>;
}

#[async_trait]
impl<T: Transport> NotificationSink for T {
    async fn notify(&self, notification: JsonRpcNotification) -> Result<()> {
        self.write_notification(&notification).await
    }
}

/// Decode one line into a request envelope.
pub fn decode_request(line: &str) -> Result<JsonRpcRequest> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        debug!("Failed to parse message: {}", e);
        ProtocolError::ParseError
    })?;

    let request: JsonRpcRequest = serde_json::from_value(value)
        .map_err(|e| ProtocolError::InvalidRequest(e.to_string().into()))?;

    if request.jsonrpc != JSONRPC_VERSION {
        return Err(ProtocolError::InvalidRequest(
            format!("unsupported jsonrpc version '{}'", request.jsonrpc).into(),
        )
        .into());
    }

    Ok(request)
}

/// Resolves once the watched flag becomes `true` or its sender is gone.
pub(crate) async fn wait_closed(mut closed: watch::Receiver<bool>) {
    loop {
        let is_closed = *closed.borrow_and_update();
        if is_closed {
            return;
        }
        if closed.changed().await.is_err() {
            return;
        }
    }
}

/// Transport over a pair of byte streams (stdio, pipes, sockets).
pub struct StreamTransport<R, W> {
    reader: Mutex<BufReader<R>>,
    writer: Mutex<BufWriter<W>>,
    closed: watch::Sender<bool>,
}

/// Transport over the process's standard input and output.
pub type StdioTransport = StreamTransport<Stdin, Stdout>;

impl StreamTransport<Stdin, Stdout> {
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            reader: Mutex::new(BufReader::new(reader)),
            writer: Mutex::new(BufWriter::new(writer)),
            closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Read one non-empty line. `Ok(None)` on EOF.
    async fn read_line(&self) -> Result<Option<String>> {
        if self.is_closed() {
            return Err(TransportError::Closed.into());
        }

        let closed = self.closed.subscribe();
        let mut reader = self.reader.lock().await;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = tokio::select! {
                read = reader.read_until(b'\n', &mut buf) => read,
                _ = wait_closed(closed.clone()) => return Err(TransportError::Closed.into()),
            };

            match read {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    // The whole line is consumed either way, so the next read starts clean.
                    let line = String::from_utf8(std::mem::take(&mut buf)).map_err(|e| {
                        debug!("Discarding non-UTF-8 line: {}", e);
                        ProtocolError::ParseError
                    })?;
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        trace!("Skipping empty line");
                        continue;
                    }
                    trace!("Received line: {}", trimmed);
                    return Ok(Some(trimmed.to_string()));
                }
                Err(e) => {
                    error!("Error reading from transport: {}", e);
                    return Err(TransportError::Io(e).into());
                }
            }
        }
    }

    /// Write one line while holding the write lock.
    async fn write_line(&self, mut content: String) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Closed.into());
        }

        content.push('\n');
        let mut writer = self.writer.lock().await;
        trace!("Sending line: {}", content.trim_end());
        writer
            .write_all(content.as_bytes())
            .await
            .map_err(TransportError::from)?;
        writer.flush().await.map_err(TransportError::from)?;
        Ok(())
    }
}

#[async_trait]
impl<R, W> Transport for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn read_message(&self) -> Result<Option<JsonRpcRequest>> {
        let Some(line) = self.read_line().await? else {
            return Ok(None);
        };

        let request = decode_request(&line)?;
        debug!("Received request: method={}", request.method);
        Ok(Some(request))
    }

    async fn write_response(&self, response: &JsonRpcResponse) -> Result<()> {
        let json = serde_json::to_string(response)?;
        debug!("Sending response: id={:?}", response.id);
        self.write_line(json).await
    }

    async fn write_notification(&self, notification: &JsonRpcNotification) -> Result<()> {
        let json = serde_json::to_string(notification)?;
        self.write_line(json).await
    }

    async fn close(&self) -> Result<()> {
        if self.closed.send_replace(true) {
            return Ok(());
        }

        debug!("Closing stream transport");
        let mut writer = self.writer.lock().await;
        match writer.shutdown().await {
            Ok(()) => Ok(()),
            // Closing a peer that already went away is not an error.
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
            Err(e) => Err(McpError::from(TransportError::Io(e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::RequestId;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, DuplexStream, duplex};

    fn pair() -> (
        Arc<StreamTransport<DuplexStream, DuplexStream>>,
        DuplexStream,
        DuplexStream,
    ) {
        let (server_in, client_out) = duplex(1 << 20);
        let (client_in, server_out) = duplex(1 << 20);
        (
            Arc::new(StreamTransport::new(server_in, server_out)),
            client_out,
            client_in,
        )
    }

    #[test]
    fn test_request_parsing() {
        let json = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#;
        let request = decode_request(json).unwrap();
        assert_eq!(request.method, "initialize");
        assert_eq!(request.id, Some(RequestId::Number(1)));
    }

    #[test]
    fn test_decode_rejects_garbage_and_non_requests() {
        let err = decode_request("{not json").unwrap_err();
        assert!(matches!(err, McpError::Protocol(ProtocolError::ParseError)));

        let err = decode_request(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#).unwrap_err();
        assert!(matches!(
            err,
            McpError::Protocol(ProtocolError::InvalidRequest(_))
        ));

        let err = decode_request(r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#).unwrap_err();
        assert!(matches!(
            err,
            McpError::Protocol(ProtocolError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_read_messages_until_eof() {
        let (transport, mut client_out, _client_in) = pair();
        client_out
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n\n{\"jsonrpc\":\"2.0\",\"method\":\"initialized\"}\n")
            .await
            .unwrap();
        drop(client_out);

        let first = transport.read_message().await.unwrap().unwrap();
        assert_eq!(first.method, "ping");
        let second = transport.read_message().await.unwrap().unwrap();
        assert!(second.is_notification());
        assert!(transport.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_line_does_not_poison_stream() {
        let (transport, mut client_out, _client_in) = pair();
        client_out
            .write_all(b"garbage\n{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n")
            .await
            .unwrap();

        let err = transport.read_message().await.unwrap_err();
        assert!(matches!(err, McpError::Protocol(ProtocolError::ParseError)));

        let request = transport.read_message().await.unwrap().unwrap();
        assert_eq!(request.id, Some(RequestId::Number(2)));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_a_parse_error() {
        let (transport, mut client_out, _client_in) = pair();
        client_out
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"\xff\xfe\"}\n{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n")
            .await
            .unwrap();

        let err = transport.read_message().await.unwrap_err();
        assert!(matches!(err, McpError::Protocol(ProtocolError::ParseError)));

        let request = transport.read_message().await.unwrap().unwrap();
        assert_eq!(request.id, Some(RequestId::Number(2)));
    }

    #[tokio::test]
    async fn test_closed_transport_fails_fast() {
        let (transport, _client_out, _client_in) = pair();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        assert!(transport.read_message().await.unwrap_err().is_closed());
        let n = JsonRpcNotification::new("notifications/message", None);
        assert!(transport.write_notification(&n).await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_close_releases_blocked_read() {
        let (transport, _client_out, _client_in) = pair();
        let reader = Arc::clone(&transport);
        let pending = tokio::spawn(async move { reader.read_message().await });

        tokio::task::yield_now().await;
        transport.close().await.unwrap();

        let result = pending.await.unwrap();
        assert!(result.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_concurrent_writers_produce_whole_lines() {
        let (transport, _client_out, mut client_in) = pair();
        let writers = 64;

        let mut tasks = Vec::new();
        for i in 0..writers {
            let t = Arc::clone(&transport);
            tasks.push(tokio::spawn(async move {
                let payload = serde_json::json!({ "index": i, "padding": "x".repeat(512) });
                let n = JsonRpcNotification::new("notifications/message", Some(payload));
                t.write_notification(&n).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        transport.close().await.unwrap();

        let mut output = String::new();
        client_in.read_to_string(&mut output).await.unwrap();

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), writers);
        let mut seen: Vec<i64> = lines
            .iter()
            .map(|line| {
                let n: JsonRpcNotification = serde_json::from_str(line).unwrap();
                n.params.unwrap()["index"].as_i64().unwrap()
            })
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..writers as i64).collect::<Vec<_>>());
    }
}
