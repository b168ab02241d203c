//! Client against a live server, over a paired stream and over HTTP.

use parking_lot::Mutex;
use relicta_mcp::adapter::memory::ChangeSet;
use relicta_mcp::adapter::{
    ApproveOutput, BumpOutput, EvaluateOutput, MemoryAdapter, PlanOutput, PublishOutput,
    ReleaseStatus,
};
use relicta_mcp::client::{HttpClientTransport, McpClient, StreamClientTransport};
use relicta_mcp::config::ServerConfig;
use relicta_mcp::error::{ClientError, TransportError};
use relicta_mcp::protocol::{ClientInfo, HttpTransport, LogLevel, StreamTransport};
use relicta_mcp::server::ReleaseServer;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

fn release_server(changes: ChangeSet) -> ReleaseServer {
    ReleaseServer::builder()
        .config(ServerConfig::default())
        .adapter(Arc::new(MemoryAdapter::new("2.3.1", changes)))
        .build()
        .unwrap()
}

type DuplexClient = McpClient<
    StreamClientTransport<
        tokio::io::ReadHalf<tokio::io::DuplexStream>,
        tokio::io::WriteHalf<tokio::io::DuplexStream>,
    >,
>;

fn connect(server: ReleaseServer) -> (DuplexClient, tokio::task::JoinHandle<relicta_mcp::Result<()>>) {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_io);
    let transport = Arc::new(StreamTransport::new(server_read, server_write));
    let handle = tokio::spawn(async move { server.server().run_with_transport(transport).await });

    let (client_read, client_write) = tokio::io::split(client_io);
    let client = McpClient::new(
        StreamClientTransport::new(client_read, client_write),
        ClientInfo::new("integration", "0.1.0"),
    );
    (client, handle)
}

#[tokio::test]
async fn typed_release_flow() {
    let (client, handle) = connect(release_server(ChangeSet {
        breaking: 1,
        features: 4,
        fixes: 0,
    }));

    let init = client.initialize().await.unwrap();
    assert_eq!(init.protocol_version, "2024-11-05");
    assert!(init.instructions.is_some());

    let logs = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&logs);
    client.notifications().on_log(move |params| {
        sink.lock().push((params.level, params.data["message"].clone()));
    });

    let plan: PlanOutput = client
        .call_tool_typed("relicta.plan", json!({}))
        .await
        .unwrap();
    assert_eq!(plan.next_version, "3.0.0");
    assert!(plan.has_breaking);

    let bump: BumpOutput = client
        .call_tool_typed("relicta.bump", json!({"bump": "minor", "prerelease": "rc.1"}))
        .await
        .unwrap();
    assert_eq!(bump.new_version, "2.4.0-rc.1");
    assert!(!bump.auto_detected);

    let _: Value = client
        .call_tool_typed("relicta.notes", json!({}))
        .await
        .unwrap();

    let eval: EvaluateOutput = client
        .call_tool_typed("relicta.evaluate", json!({}))
        .await
        .unwrap();
    assert!(!eval.can_auto_approve);

    let approved: ApproveOutput = client
        .call_tool_typed("relicta.approve", json!({"approver": "release-captain"}))
        .await
        .unwrap();
    assert_eq!(approved.approved_by, "release-captain");

    let published: PublishOutput = client
        .call_tool_typed("relicta.publish", json!({}))
        .await
        .unwrap();
    assert_eq!(published.tag_name, "v2.4.0-rc.1");

    let status: ReleaseStatus = client.read_resource_typed("relicta://status").await.unwrap();
    assert_eq!(status.current_version, "2.4.0-rc.1");

    // The evaluate warning and the publish info were routed while waiting for results.
    let seen = logs.lock().clone();
    assert!(seen.contains(&(LogLevel::Warning, json!("Release needs review: medium risk"))));
    assert!(seen.contains(&(LogLevel::Info, json!("Published v2.4.0-rc.1"))));

    client.close().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn failures_arrive_on_the_right_channel() {
    let (client, _handle) = connect(release_server(ChangeSet::default()));
    client.initialize().await.unwrap();

    // Business failure: the tool ran and said no.
    match client
        .call_tool_typed::<Value>("relicta.publish", json!({}))
        .await
    {
        Err(ClientError::Tool(e)) => assert!(e.message.contains("no active release")),
        other => panic!("expected tool error, got {other:?}"),
    }

    // Protocol failure: the tool does not exist.
    match client.call_tool("relicta.rollback", json!({})).await {
        Err(ClientError::Rpc(e)) => assert_eq!(e.code, -32601),
        other => panic!("expected rpc error, got {other:?}"),
    }

    let prompt = client
        .get_prompt(
            "release-summary",
            HashMap::from([("version".to_string(), "2.3.2".to_string())]),
        )
        .await
        .unwrap();
    assert_eq!(prompt.messages.len(), 1);

    let tools = client.list_tools().await.unwrap();
    assert!(tools.iter().any(|t| t.name == "relicta.plugins.execute_hook"));

    client.set_log_level(LogLevel::Error).await.unwrap();
    client.close().await.unwrap();
    assert!(matches!(client.ping().await, Err(ClientError::Closed)));
}

#[tokio::test]
async fn http_binding_round_trip() {
    let server = Arc::new(release_server(ChangeSet {
        breaking: 0,
        features: 0,
        fixes: 3,
    }));
    let transport = Arc::new(
        HttpTransport::bind(SocketAddr::from(([127, 0, 0, 1], 0)), "/mcp")
            .await
            .unwrap(),
    );
    let url = format!("http://{}/mcp", transport.local_addr());

    let running = Arc::clone(&server);
    let handle = tokio::spawn(async move { running.server().run_with_transport(transport).await });

    let client = McpClient::new(
        HttpClientTransport::new(url),
        ClientInfo::new("http-client", "0.1.0"),
    );
    let init = client.initialize().await.unwrap();
    assert_eq!(init.server_info.name, "relicta-mcp");
    client.ping().await.unwrap();

    let plan: PlanOutput = client
        .call_tool_typed("relicta.plan", json!({}))
        .await
        .unwrap();
    assert_eq!(plan.next_version, "2.3.2");

    let resources = client.list_resources().await.unwrap();
    let uris: Vec<&str> = resources.iter().map(|r| r.uri.as_str()).collect();
    assert_eq!(
        uris,
        vec!["relicta://notes", "relicta://plugins", "relicta://status"]
    );

    client.close().await.unwrap();
    server.stop();
    handle.abort();
}

#[tokio::test]
async fn http_status_failure_is_a_transport_error() {
    let server = Arc::new(release_server(ChangeSet::default()));
    let transport = Arc::new(
        HttpTransport::bind(SocketAddr::from(([127, 0, 0, 1], 0)), "/mcp")
            .await
            .unwrap(),
    );
    let url = format!("http://{}/wrong", transport.local_addr());

    let running = Arc::clone(&server);
    let handle = tokio::spawn(async move { running.server().run_with_transport(transport).await });

    let client = McpClient::new(
        HttpClientTransport::new(url),
        ClientInfo::new("http-client", "0.1.0"),
    );
    match client.ping().await {
        Err(ClientError::Transport(TransportError::HttpStatus(404))) => {}
        other => panic!("expected http 404, got {other:?}"),
    }

    server.stop();
    handle.abort();
}
