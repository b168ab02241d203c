//! HTTP binding for the server: one JSON-RPC message per POST body.
//!
//! The axum route hands each request to the message loop through a channel
//! and waits for the loop's response. The loop still sees a plain
//! [`Transport`], so dispatch stays strictly sequential. There is no push
//! channel back to the client, so server notifications are dropped.

use crate::error::{McpError, Result, TransportError};
use crate::protocol::handler::rpc_error;
use crate::protocol::transport::{Transport, decode_request, wait_closed};
use crate::protocol::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tracing::{debug, error, info, trace, warn};

const INBOUND_CAPACITY: usize = 32;

/// One POST waiting for the loop. Notifications carry no reply slot.
struct Exchange {
    request: JsonRpcRequest,
    reply: Option<oneshot::Sender<JsonRpcResponse>>,
}

#[derive(Clone)]
struct HttpState {
    inbound: mpsc::Sender<Exchange>,
}

pub struct HttpTransport {
    inbound: Mutex<mpsc::Receiver<Exchange>>,
    pending: Mutex<Option<oneshot::Sender<JsonRpcResponse>>>,
    closed: watch::Sender<bool>,
    local_addr: SocketAddr,
}

impl HttpTransport {
    /// Bind `addr` and serve POSTs on `path` until the transport is closed.
    pub async fn bind(addr: SocketAddr, path: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(TransportError::from)?;
        let local_addr = listener.local_addr().map_err(TransportError::from)?;

        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
        let (closed, _) = watch::channel(false);

        let app = Router::new()
            .route(path, post(handle_post))
            .with_state(HttpState { inbound: tx });

        let shutdown = wait_closed(closed.subscribe());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("HTTP server error: {}", e);
            }
        });

        info!("Listening for MCP over HTTP on http://{}{}", local_addr, path);
        Ok(Self {
            inbound: Mutex::new(rx),
            pending: Mutex::new(None),
            closed,
            local_addr,
        })
    }

    /// The bound address, useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

async fn handle_post(State(state): State<HttpState>, body: String) -> Response {
    let request = match decode_request(&body) {
        Ok(request) => request,
        Err(McpError::Protocol(e)) => {
            debug!("Rejecting malformed HTTP body: {}", e);
            return Json(JsonRpcResponse::error(None, rpc_error(&e))).into_response();
        }
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    if request.is_notification() {
        let exchange = Exchange {
            request,
            reply: None,
        };
        if state.inbound.send(exchange).await.is_err() {
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
        return StatusCode::ACCEPTED.into_response();
    }

    let (reply, response) = oneshot::channel();
    let exchange = Exchange {
        request,
        reply: Some(reply),
    };
    if state.inbound.send(exchange).await.is_err() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    match response.await {
        Ok(response) => Json(response).into_response(),
        Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn read_message(&self) -> Result<Option<JsonRpcRequest>> {
        if self.is_closed() {
            return Err(TransportError::Closed.into());
        }

        let mut inbound = self.inbound.lock().await;
        let exchange = tokio::select! {
            exchange = inbound.recv() => exchange,
            _ = wait_closed(self.closed.subscribe()) => return Err(TransportError::Closed.into()),
        };

        let Some(exchange) = exchange else {
            return Ok(None);
        };

        let mut pending = self.pending.lock().await;
        if pending.is_some() {
            warn!("Previous HTTP request was never answered");
        }
        *pending = exchange.reply;
        Ok(Some(exchange.request))
    }

    async fn write_response(&self, response: &JsonRpcResponse) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Closed.into());
        }

        match self.pending.lock().await.take() {
            Some(reply) => {
                if reply.send(response.clone()).is_err() {
                    debug!("HTTP client went away before response {:?}", response.id);
                }
            }
            None => warn!("No HTTP request waiting for response {:?}", response.id),
        }
        Ok(())
    }

    async fn write_notification(&self, notification: &JsonRpcNotification) -> Result<()> {
        trace!("Dropping notification over HTTP: {}", notification.method);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.send_replace(true) {
            return Ok(());
        }
        debug!("Closing HTTP transport");
        self.pending.lock().await.take();
        Ok(())
    }
}
