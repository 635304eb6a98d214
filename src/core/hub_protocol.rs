//! JSON hub protocol, version 1.
//!
//! Every message is a JSON document terminated by the record separator
//! `0x1E`. A single poll response may carry several messages.

use crate::utils::error::{Result, SqmError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const RECORD_SEPARATOR: char = '\u{1e}';
pub const PROTOCOL_NAME: &str = "json";
pub const PROTOCOL_VERSION: u32 = 1;

const TYPE_INVOCATION: u8 = 1;
const TYPE_PING: u8 = 6;
const TYPE_CLOSE: u8 = 7;

#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    Invocation {
        target: String,
        arguments: Vec<Value>,
    },
    Ping,
    Close {
        error: Option<String>,
        allow_reconnect: bool,
    },
    /// Stream items, completions and anything newer than this client.
    Ignored(u8),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    r#type: u8,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    allow_reconnect: bool,
}

#[derive(Debug, Serialize)]
struct OutgoingInvocation<'a> {
    r#type: u8,
    target: &'a str,
    arguments: &'a [Value],
}

#[derive(Debug, Serialize, Deserialize)]
struct Handshake {
    protocol: String,
    version: u32,
}

#[derive(Debug, Deserialize)]
struct HandshakeResponse {
    #[serde(default)]
    error: Option<String>,
}

fn frame<T: Serialize>(value: &T) -> Result<String> {
    let mut text = serde_json::to_string(value)?;
    text.push(RECORD_SEPARATOR);
    Ok(text)
}

pub fn handshake_request() -> Result<String> {
    frame(&Handshake {
        protocol: PROTOCOL_NAME.to_string(),
        version: PROTOCOL_VERSION,
    })
}

/// Non-blocking invocation: no invocation id, so the server sends no completion.
pub fn invocation(target: &str, arguments: &[Value]) -> Result<String> {
    frame(&OutgoingInvocation {
        r#type: TYPE_INVOCATION,
        target,
        arguments,
    })
}

/// Splits the handshake response off the front of `raw`.
///
/// Returns `Ok(None)` when no complete frame has arrived yet, otherwise the
/// remaining text after the handshake frame.
pub fn parse_handshake_response(raw: &str) -> Result<Option<&str>> {
    let Some(end) = raw.find(RECORD_SEPARATOR) else {
        return Ok(None);
    };

    let response: HandshakeResponse = serde_json::from_str(&raw[..end])?;
    if let Some(error) = response.error {
        return Err(SqmError::hub(format!("Handshake rejected: {}", error)));
    }

    Ok(Some(&raw[end + RECORD_SEPARATOR.len_utf8()..]))
}

/// Parses every framed message in `raw`.
///
/// Records are independent: a malformed one is logged and skipped so the
/// rest of the batch is still delivered.
pub fn parse_messages(raw: &str) -> Vec<HubMessage> {
    raw.split(RECORD_SEPARATOR)
        .filter(|chunk| !chunk.trim().is_empty())
        .filter_map(|chunk| match parse_message(chunk) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!("Dropping malformed hub message: {}", e);
                None
            }
        })
        .collect()
}

fn parse_message(chunk: &str) -> Result<HubMessage> {
    let message: RawMessage = serde_json::from_str(chunk)?;
    Ok(match message.r#type {
        TYPE_INVOCATION => HubMessage::Invocation {
            target: message
                .target
                .ok_or_else(|| SqmError::hub("Invocation without a target"))?,
            arguments: message.arguments,
        },
        TYPE_PING => HubMessage::Ping,
        TYPE_CLOSE => HubMessage::Close {
            error: message.error,
            allow_reconnect: message.allow_reconnect,
        },
        other => HubMessage::Ignored(other),
    })
}
