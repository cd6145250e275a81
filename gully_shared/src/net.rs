//! Wire protocol and framing.
//!
//! Goals:
//! - One persistent TCP connection per client carrying tagged JSON events.
//! - Event names and payload keys are wire-stable (`join`, `vehicleMove`,
//!   `itemId`, ...); every message reads as
//!   `{"event": <name>, "data": <payload>}`.
//! - Keep serialization explicit; framing is a 4-byte big-endian length
//!   prefix followed by the JSON body.

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
};

use crate::catalog::CatalogItem;
use crate::entity::{Appearance, Player, PlayerId, Vehicle, VehicleId};

/// Upper bound on a single frame body. Anything larger is a protocol error,
/// not a legitimate event.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Events a connection sends to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    Join {
        #[serde(default)]
        name: String,
    },
    Move {
        x: f32,
        z: f32,
    },
    OpenShop,
    #[serde(rename_all = "camelCase")]
    BuyItem {
        item_id: String,
    },
    #[serde(rename_all = "camelCase")]
    StartJob {
        job_type: String,
    },
    #[serde(rename_all = "camelCase")]
    EnterVehicle {
        vehicle_id: VehicleId,
    },
    #[serde(rename_all = "camelCase")]
    ExitVehicle {
        vehicle_id: VehicleId,
    },
    VehicleMove {
        id: VehicleId,
        x: f32,
        z: f32,
        rot: f32,
    },
    Interact,
}

/// Events the server sends to one, some, or all connections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// First event on every connection; tells the client its id.
    #[serde(rename_all = "camelCase")]
    Welcome {
        player_id: PlayerId,
    },
    CurrentPlayers(HashMap<PlayerId, Player>),
    VehiclesSnapshot(Vec<Vehicle>),
    PlayerJoined(Player),
    PlayerMoved {
        id: PlayerId,
        x: f32,
        z: f32,
    },
    PlayerLeft {
        id: PlayerId,
    },
    PlayerUpdate {
        id: PlayerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clothing: Option<Appearance>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        money: Option<u32>,
    },
    ShopOpened {
        items: Vec<CatalogItem>,
    },
    Error(String),
    #[serde(rename_all = "camelCase")]
    JobStarted {
        job_type: String,
    },
    JobFinished {
        earned: u32,
    },
    VehicleUpdate(Vehicle),
    #[serde(rename_all = "camelCase")]
    EnteredVehicleAck {
        vehicle_id: VehicleId,
        player_id: PlayerId,
    },
    #[serde(rename_all = "camelCase")]
    ExitedVehicleAck {
        vehicle_id: VehicleId,
        player_id: PlayerId,
        x: f32,
        z: f32,
    },
    VehicleMoved {
        id: VehicleId,
        x: f32,
        z: f32,
        rot: f32,
    },
    InteractAck,
}

async fn write_frame<T: Serialize>(
    stream: &mut (impl AsyncWriteExt + Unpin),
    event: &T,
) -> anyhow::Result<()> {
    let payload = serde_json::to_vec(event).context("serialize event")?;
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);
    stream.write_all(&buf).await.context("tcp write")?;
    Ok(())
}

async fn read_frame<T: DeserializeOwned>(
    stream: &mut (impl AsyncReadExt + Unpin),
) -> anyhow::Result<T> {
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .await
        .context("tcp read len")?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        anyhow::bail!("frame of {len} bytes exceeds limit");
    }
    let mut payload = vec![0u8; len];
    stream
        .read_exact(&mut payload)
        .await
        .context("tcp read payload")?;
    let event = serde_json::from_slice(&payload).context("deserialize event")?;
    Ok(event)
}

/// Bidirectional event connection over TCP with length-prefixed frames.
#[derive(Debug)]
pub struct EventConn {
    stream: TcpStream,
}

impl EventConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await.context("tcp connect")?;
        Ok(Self::new(stream))
    }

    pub async fn send<T: Serialize>(&mut self, event: &T) -> anyhow::Result<()> {
        write_frame(&mut self.stream, event).await
    }

    pub async fn recv<T: DeserializeOwned>(&mut self) -> anyhow::Result<T> {
        read_frame(&mut self.stream).await
    }

    /// Split into reader and writer halves so receive and send can run on
    /// separate tasks. `read_frame` consumes the prefix and body in two
    /// awaits, so a receive must never be raced against a timeout; anyone
    /// who needs timed polling splits off the reader into its own task and
    /// times out on a channel instead.
    pub fn into_split(self) -> (EventReader, EventWriter) {
        let (read, write) = self.stream.into_split();
        (EventReader { half: read }, EventWriter { half: write })
    }

    pub fn peer_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }
}

/// Receive half of a split [`EventConn`].
#[derive(Debug)]
pub struct EventReader {
    half: OwnedReadHalf,
}

impl EventReader {
    pub async fn recv<T: DeserializeOwned>(&mut self) -> anyhow::Result<T> {
        read_frame(&mut self.half).await
    }
}

/// Send half of a split [`EventConn`].
#[derive(Debug)]
pub struct EventWriter {
    half: OwnedWriteHalf,
}

impl EventWriter {
    pub async fn send<T: Serialize>(&mut self, event: &T) -> anyhow::Result<()> {
        write_frame(&mut self.half, event).await
    }
}

/// TCP listener producing event connections.
pub struct EventListener {
    listener: TcpListener,
}

impl EventListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(EventConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        Ok((EventConn::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Convenience codec helpers.
pub fn encode_to_bytes<T: Serialize>(event: &T) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(event).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes<T: DeserializeOwned>(b: &[u8]) -> anyhow::Result<T> {
    serde_json::from_slice(b).context("deserialize")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_event_wire_names() {
        let join = serde_json::to_value(&ClientEvent::Join {
            name: "Ada".to_string(),
        })
        .unwrap();
        assert_eq!(join, json!({"event": "join", "data": {"name": "Ada"}}));

        let buy = serde_json::to_value(&ClientEvent::BuyItem {
            item_id: "shirt-red".to_string(),
        })
        .unwrap();
        assert_eq!(buy["event"], "buyItem");
        assert_eq!(buy["data"]["itemId"], "shirt-red");

        let interact = serde_json::to_value(&ClientEvent::Interact).unwrap();
        assert_eq!(interact, json!({"event": "interact"}));
    }

    #[test]
    fn vehicle_move_parses_flat_wire_shape() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "vehicleMove",
            "data": {"id": "rick1", "x": 9.5, "z": 8.0, "rot": 1.2}
        }))
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::VehicleMove {
                id: VehicleId::new("rick1"),
                x: 9.5,
                z: 8.0,
                rot: 1.2,
            }
        );
    }

    #[test]
    fn error_event_carries_bare_string() {
        let e = serde_json::to_value(&ServerEvent::Error("vehicle occupied".to_string())).unwrap();
        assert_eq!(e, json!({"event": "error", "data": "vehicle occupied"}));
    }

    #[test]
    fn player_update_omits_absent_fields() {
        let e = serde_json::to_value(&ServerEvent::PlayerUpdate {
            id: PlayerId(4),
            clothing: None,
            money: Some(200),
        })
        .unwrap();
        assert_eq!(e["data"]["money"], 200);
        assert!(e["data"].get("clothing").is_none());
    }

    #[test]
    fn current_players_keys_are_stringified_ids() {
        use crate::math::Vec2;
        let mut map = HashMap::new();
        map.insert(
            PlayerId(7),
            Player::new(PlayerId(7), "Ada".to_string(), Vec2::ZERO, 100),
        );
        let e = serde_json::to_value(&ServerEvent::CurrentPlayers(map)).unwrap();
        assert_eq!(e["data"]["7"]["name"], "Ada");
    }

    #[test]
    fn event_roundtrip_bytes() {
        let event = ServerEvent::Welcome {
            player_id: PlayerId(3),
        };
        let bytes = encode_to_bytes(&event).unwrap();
        let back: ServerEvent = decode_from_bytes(&bytes).unwrap();
        assert_eq!(event, back);
    }
}
