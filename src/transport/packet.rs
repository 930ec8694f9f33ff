//! Engine.IO v3 / Socket.IO v2 text packet codec
//!
//! Engine packet: `<type>[data]`. A message packet (type 4) carries a socket
//! packet: `<type>[<nsp>,][<id>][<json>]`. Binary attachments are not supported.

use serde::Deserialize;
use serde_json::Value;

use crate::core::{Error, Result};

/// Client heartbeat (EIO v3 pings come from the client)
pub const PING: &str = "2";

/// Leave the default namespace
pub const SOCKET_DISCONNECT: &str = "41";

pub const DEFAULT_NAMESPACE: &str = "/";

/// Server handshake carried by the open packet
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect { namespace: String },
    Disconnect { namespace: String },
    Event { namespace: String, id: Option<u64>, name: String, args: Vec<Value> },
    Ack { namespace: String, id: Option<u64>, args: Vec<Value> },
    Error { namespace: String, data: Value },
}

fn protocol(msg: impl Into<String>) -> Error {
    Error::Protocol(msg.into())
}

fn split_kind(text: &str) -> Result<(u32, &str)> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| protocol("empty packet"))?
        .to_digit(10)
        .ok_or_else(|| protocol(format!("bad packet type in {:?}", text)))?;
    Ok((kind, chars.as_str()))
}

/// Decode one websocket text frame.
pub fn decode(text: &str) -> Result<EnginePacket> {
    let (kind, rest) = split_kind(text)?;
    match kind {
        0 => {
            let handshake = serde_json::from_str(rest)
                .map_err(|e| protocol(format!("bad handshake: {}", e)))?;
            Ok(EnginePacket::Open(handshake))
        }
        1 => Ok(EnginePacket::Close),
        2 => Ok(EnginePacket::Ping(rest.to_string())),
        3 => Ok(EnginePacket::Pong(rest.to_string())),
        4 => Ok(EnginePacket::Message(SocketPacket::decode(rest)?)),
        5 => Ok(EnginePacket::Upgrade),
        6 => Ok(EnginePacket::Noop),
        other => Err(protocol(format!("unknown engine packet type {}", other))),
    }
}

impl SocketPacket {
    pub fn decode(text: &str) -> Result<Self> {
        let (kind, mut rest) = split_kind(text)?;
        if kind == 5 || kind == 6 {
            return Err(protocol("binary packets are not supported"));
        }

        let namespace = if rest.starts_with('/') {
            let end = rest.find(',').unwrap_or(rest.len());
            let ns = rest[..end].to_string();
            rest = rest.get(end + 1..).unwrap_or("");
            ns
        } else {
            DEFAULT_NAMESPACE.to_string()
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let id = if digits > 0 {
            Some(rest[..digits].parse::<u64>().map_err(|e| protocol(e.to_string()))?)
        } else {
            None
        };
        rest = &rest[digits..];

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(rest).map_err(|e| protocol(format!("bad payload: {}", e)))?)
        };

        match kind {
            0 => Ok(SocketPacket::Connect { namespace }),
            1 => Ok(SocketPacket::Disconnect { namespace }),
            2 => {
                let mut args = match data {
                    Some(Value::Array(args)) => args,
                    _ => return Err(protocol("event payload must be an array")),
                };
                if args.is_empty() {
                    return Err(protocol("event without a name"));
                }
                let name = match args.remove(0) {
                    Value::String(name) => name,
                    other => return Err(protocol(format!("event name must be a string, got {}", other))),
                };
                Ok(SocketPacket::Event { namespace, id, name, args })
            }
            3 => {
                let args = match data {
                    Some(Value::Array(args)) => args,
                    None => vec![],
                    Some(other) => vec![other],
                };
                Ok(SocketPacket::Ack { namespace, id, args })
            }
            4 => Ok(SocketPacket::Error { namespace, data: data.unwrap_or(Value::Null) }),
            other => Err(protocol(format!("unknown socket packet type {}", other))),
        }
    }
}

/// Encode an event on the default namespace: `42["topic",payload]`.
pub fn encode_event(name: &str, payload: &Value) -> Result<String> {
    let frame = serde_json::to_string(&(name, payload))?;
    Ok(format!("42{}", frame))
}

/// Answer a server ping, echoing its probe data.
pub fn encode_pong(data: &str) -> String {
    format!("3{}", data)
}
