//! Read-only query interface.
//!
//! A minimal HTTP/1.1 GET responder on its own listener:
//!   GET /api/players   -> JSON array of player records
//!   GET /api/vehicles  -> JSON array of vehicle records
//!
//! Requests resolve through the worker queue, so every response is a
//! consistent snapshot taken between events. There are no write endpoints;
//! all mutation goes through the event channel.

use anyhow::Context;
use std::net::SocketAddr;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::{mpsc, oneshot},
};
use tracing::{debug, warn};

use crate::server::ServerMessage;

/// Which snapshot a query wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Players,
    Vehicles,
}

/// One in-flight query, answered by the worker with a JSON body.
#[derive(Debug)]
pub struct QueryRequest {
    pub kind: QueryKind,
    pub reply: oneshot::Sender<String>,
}

/// TCP listener for the query interface.
pub struct QueryListener {
    listener: TcpListener,
}

impl QueryListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("query bind")?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop; one short-lived task per request.
    pub async fn serve(self, tx: mpsc::UnboundedSender<ServerMessage>) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "Query connection");
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_request(stream, tx).await {
                            debug!(error = %e, "Query request failed");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "Query accept failed"),
            }
        }
    }
}

async fn handle_request(
    mut stream: TcpStream,
    tx: mpsc::UnboundedSender<ServerMessage>,
) -> anyhow::Result<()> {
    let (method, path) = read_request_line(&mut stream).await?;
    let kind = match (method.as_str(), path.as_str()) {
        ("GET", "/api/players") => Some(QueryKind::Players),
        ("GET", "/api/vehicles") => Some(QueryKind::Vehicles),
        _ => None,
    };
    let Some(kind) = kind else {
        return write_response(&mut stream, "404 Not Found", "{\"error\":\"not found\"}").await;
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    tx.send(ServerMessage::Query(QueryRequest {
        kind,
        reply: reply_tx,
    }))
    .map_err(|_| anyhow::anyhow!("worker queue closed"))?;
    let body = reply_rx.await.context("query reply dropped")?;
    write_response(&mut stream, "200 OK", &body).await
}

/// Reads up to the blank line ending the request head; returns method and
/// path from the request line.
async fn read_request_line(stream: &mut TcpStream) -> anyhow::Result<(String, String)> {
    let mut head = Vec::new();
    let mut buf = [0u8; 512];
    loop {
        let n = stream.read(&mut buf).await.context("query read")?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
        if head.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if head.len() > 8 * 1024 {
            anyhow::bail!("request head too large");
        }
    }
    let text = String::from_utf8_lossy(&head);
    let mut parts = text.lines().next().unwrap_or("").split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("").to_string();
    Ok((method, path))
}

async fn write_response(
    stream: &mut TcpStream,
    status: &str,
    body: &str,
) -> anyhow::Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream
        .write_all(response.as_bytes())
        .await
        .context("query write")?;
    let _ = stream.shutdown().await;
    Ok(())
}
