use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use gully_server::server::bind_ephemeral;
use gully_shared::net::{EventConn, ServerEvent};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn http_get(addr: SocketAddr, path: &str) -> anyhow::Result<(String, String)> {
    let mut stream = TcpStream::connect(addr).await?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await?;
    let text = String::from_utf8(raw)?;
    let (head, body) = text
        .split_once("\r\n\r\n")
        .context("response without header terminator")?;
    Ok((head.to_string(), body.to_string()))
}

/// Smoke test: every accepted connection is welcomed with its id.
#[tokio::test]
async fn server_welcomes_new_connections() -> anyhow::Result<()> {
    let (server, _cfg) = bind_ephemeral().await?;
    let addr = server.local_addr()?;
    tokio::spawn(server.run());

    let mut conn = EventConn::connect(addr).await?;
    let welcome: ServerEvent = conn.recv().await?;
    assert!(matches!(welcome, ServerEvent::Welcome { .. }));
    Ok(())
}

/// Smoke test: the query interface answers world snapshots and 404s.
#[tokio::test]
async fn query_interface_serves_world_snapshots() -> anyhow::Result<()> {
    let (server, _cfg) = bind_ephemeral().await?;
    let query_addr = server.query_local_addr()?;
    tokio::spawn(server.run());

    let (head, body) = http_get(query_addr, "/api/players").await?;
    assert!(head.starts_with("HTTP/1.1 200"), "head: {head}");
    let players: serde_json::Value = serde_json::from_str(&body)?;
    assert_eq!(players, serde_json::json!([]));

    let (_, body) = http_get(query_addr, "/api/vehicles").await?;
    let vehicles: serde_json::Value = serde_json::from_str(&body)?;
    assert_eq!(vehicles[0]["id"], "rick1");
    assert_eq!(vehicles[0]["x"], 8.0);
    assert_eq!(vehicles[0]["ownerId"], serde_json::Value::Null);

    let (head, _) = http_get(query_addr, "/api/scores").await?;
    assert!(head.starts_with("HTTP/1.1 404"), "head: {head}");
    Ok(())
}

/// Smoke test: a malformed frame drops that connection and nothing else.
#[tokio::test]
async fn malformed_frame_drops_only_that_connection() -> anyhow::Result<()> {
    let (server, _cfg) = bind_ephemeral().await?;
    let addr = server.local_addr()?;
    tokio::spawn(server.run());

    let mut stream = TcpStream::connect(addr).await?;
    let mut raw = 7u32.to_be_bytes().to_vec();
    raw.extend_from_slice(b"garbage");
    stream.write_all(&raw).await?;

    // The welcome frame may already be in flight; keep reading until the
    // server closes its side.
    let mut buf = [0u8; 128];
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break true,
                Ok(_) => continue,
            }
        }
    })
    .await
    .context("connection not closed")?;
    assert!(closed);

    // Fresh connections are still served.
    let mut conn = EventConn::connect(addr).await?;
    let welcome: ServerEvent = conn.recv().await?;
    assert!(matches!(welcome, ServerEvent::Welcome { .. }));
    Ok(())
}
