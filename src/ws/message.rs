//! Wire messages exchanged with the TzKT SignalR hub (JSON protocol).

use crate::block::RawBlock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MSG_INVOCATION: u64 = 1;
pub const MSG_PING: u64 = 6;
pub const MSG_CLOSE: u64 = 7;

pub const SUBSCRIBE_BLOCKS: &str = "SubscribeToBlocks";
pub const BLOCKS_TARGET: &str = "blocks";

/// First message on every connection.
#[derive(Debug, Clone, Serialize)]
pub struct HandshakeRequest {
    pub protocol: &'static str,
    pub version: u32,
}

impl Default for HandshakeRequest {
    fn default() -> Self {
        Self {
            protocol: "json",
            version: 1,
        }
    }
}

/// Client-to-hub method call. Fire-and-forget: no invocation id is sent,
/// so the hub never replies with a completion.
#[derive(Debug, Clone, Serialize)]
pub struct Invocation {
    #[serde(rename = "type")]
    pub msg_type: u64,
    pub target: String,
    pub arguments: Vec<Value>,
}

impl Invocation {
    pub fn subscribe_blocks() -> Self {
        Self {
            msg_type: MSG_INVOCATION,
            target: SUBSCRIBE_BLOCKS.to_string(),
            arguments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Ping {
    #[serde(rename = "type")]
    pub msg_type: u64,
}

impl Default for Ping {
    fn default() -> Self {
        Self { msg_type: MSG_PING }
    }
}

/// Envelope in `arguments[0]` of a `blocks` invocation.
#[derive(Debug, Clone, Default, Deserialize)]
struct UpdateEnvelope {
    #[serde(default)]
    data: Vec<Value>,
}

/// Every inbound shape the session cares about.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// Handshake response: `{}` on success, `{"error": ...}` on rejection.
    HandshakeAck { error: Option<String> },
    KeepAlive,
    /// `blocks` invocation; `block` is the first element of `data`, if any.
    BlockUpdate { block: Option<RawBlock> },
    Close { error: Option<String> },
    Unknown,
}

fn error_field(obj: &serde_json::Map<String, Value>) -> Option<String> {
    obj.get("error").and_then(Value::as_str).map(str::to_string)
}

/// Classify one frame. Only malformed JSON (or a malformed block payload)
/// is an error; any other unrecognized shape is `Inbound::Unknown`.
pub fn parse_inbound(frame: &str) -> Result<Inbound, serde_json::Error> {
    let val: Value = serde_json::from_str(frame)?;

    let Value::Object(obj) = val else {
        return Ok(Inbound::Unknown);
    };

    let msg_type = obj.get("type").and_then(Value::as_u64);

    let inbound = match msg_type {
        None if obj.is_empty() => Inbound::HandshakeAck { error: None },
        None if obj.contains_key("error") => Inbound::HandshakeAck {
            error: error_field(&obj),
        },
        Some(MSG_PING) => Inbound::KeepAlive,
        Some(MSG_CLOSE) => Inbound::Close {
            error: error_field(&obj),
        },
        Some(MSG_INVOCATION)
            if obj.get("target").and_then(Value::as_str) == Some(BLOCKS_TARGET) =>
        {
            let envelope = match obj
                .get("arguments")
                .and_then(Value::as_array)
                .and_then(|args| args.first())
            {
                Some(arg) => UpdateEnvelope::deserialize(arg)?,
                None => UpdateEnvelope::default(),
            };
            let block = match envelope.data.into_iter().next() {
                Some(first) => Some(serde_json::from_value::<RawBlock>(first)?),
                None => None,
            };
            Inbound::BlockUpdate { block }
        }
        _ => Inbound::Unknown,
    };

    Ok(inbound)
}
