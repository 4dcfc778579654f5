//! Session message wire format.
//!
//! Session messages are transport-agnostic key-value maps. Three shapes exist:
//!
//! | action  | fields                | meaning                                   |
//! |---------|-----------------------|-------------------------------------------|
//! | `start` | `elapsedTime: number` | peer should begin running from the value  |
//! | `end`   | -                     | peer should stop running                  |
//! | `sync`  | `elapsedTime: number` | periodic elapsed-time broadcast (~1 Hz)   |
//!
//! `elapsedTime` is a number of seconds and may be fractional.
//!
//! ## Datagram Envelope
//!
//! Over UDP each datagram is a JSON [`Envelope`]:
//!
//! ```json
//! {
//!   "protocol": "pulsesync",
//!   "version": "1.0",
//!   "device_id": "uuid-v4",
//!   "device_name": "Wrist",
//!   "kind": "message",
//!   "message": { "action": "sync", "elapsedTime": 12.0 }
//! }
//! ```
//!
//! `kind = "presence"` datagrams carry no message and only keep the peer
//! marked reachable.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Opaque key-value message exchanged with the peer.
pub type MessageMap = Map<String, Value>;

/// Key holding the message action.
pub const ACTION_KEY: &str = "action";

/// Key holding the elapsed time in seconds.
pub const ELAPSED_TIME_KEY: &str = "elapsedTime";

/// Maximum datagram size accepted or produced.
pub const MAX_DATAGRAM_SIZE: usize = 2048;

/// A recognized session message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionMessage {
    /// Peer started (or restarted) the session
    Start {
        /// Elapsed time to adopt, if the peer sent one
        elapsed_time: Option<Duration>,
    },
    /// Peer stopped the session
    End,
    /// Periodic elapsed-time broadcast
    Sync {
        /// Elapsed time to adopt
        elapsed_time: Duration,
    },
}

impl SessionMessage {
    /// The `action` string for this message.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::End => "end",
            Self::Sync { .. } => "sync",
        }
    }

    /// Encode into the wire key-value map.
    #[must_use]
    pub fn to_map(&self) -> MessageMap {
        let mut map = MessageMap::new();
        map.insert(ACTION_KEY.to_string(), Value::from(self.action()));
        let elapsed = match self {
            Self::Start { elapsed_time } => *elapsed_time,
            Self::Sync { elapsed_time } => Some(*elapsed_time),
            Self::End => None,
        };
        if let Some(elapsed) = elapsed {
            map.insert(
                ELAPSED_TIME_KEY.to_string(),
                Value::from(elapsed.as_secs_f64()),
            );
        }
        map
    }
}

/// Decode a key-value map into a [`SessionMessage`].
///
/// # Errors
///
/// Returns [`Error::ProtocolError`] when the action is missing or unknown,
/// or when `elapsedTime` is required but absent, not a number, negative or
/// not finite. Callers treat every error here as "ignore the message".
pub fn decode_message(map: &MessageMap) -> Result<SessionMessage> {
    let action = map
        .get(ACTION_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::ProtocolError("missing action".to_string()))?;

    match action {
        "start" => {
            let elapsed_time = match map.get(ELAPSED_TIME_KEY) {
                Some(value) => Some(elapsed_from_value(value)?),
                None => None,
            };
            Ok(SessionMessage::Start { elapsed_time })
        }
        "end" => Ok(SessionMessage::End),
        "sync" => {
            let value = map
                .get(ELAPSED_TIME_KEY)
                .ok_or_else(|| Error::ProtocolError("sync without elapsedTime".to_string()))?;
            Ok(SessionMessage::Sync {
                elapsed_time: elapsed_from_value(value)?,
            })
        }
        other => Err(Error::ProtocolError(format!("unknown action: {other}"))),
    }
}

fn elapsed_from_value(value: &Value) -> Result<Duration> {
    let secs = value
        .as_f64()
        .ok_or_else(|| Error::ProtocolError(format!("elapsedTime is not a number: {value}")))?;
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::ProtocolError(format!("invalid elapsedTime {secs}: {e}")))
}

/// Kind of datagram carried by an [`Envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    /// Liveness announcement, no payload
    Presence,
    /// Carries a session message
    Message,
}

/// Datagram wrapper used by the UDP transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol identifier
    pub protocol: String,
    /// Protocol version
    pub version: String,
    /// Sender device identifier
    pub device_id: Uuid,
    /// Sender display name
    pub device_name: String,
    /// Datagram kind
    pub kind: EnvelopeKind,
    /// Session message for `kind = "message"`
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<MessageMap>,
}

impl Envelope {
    /// Create a presence announcement.
    #[must_use]
    pub fn presence(device_id: Uuid, device_name: &str) -> Self {
        Self {
            protocol: crate::PROTOCOL_NAME.to_string(),
            version: crate::PROTOCOL_VERSION.to_string(),
            device_id,
            device_name: device_name.to_string(),
            kind: EnvelopeKind::Presence,
            message: None,
        }
    }

    /// Wrap a session message.
    #[must_use]
    pub fn message(device_id: Uuid, device_name: &str, message: MessageMap) -> Self {
        Self {
            kind: EnvelopeKind::Message,
            message: Some(message),
            ..Self::presence(device_id, device_name)
        }
    }

    /// Check if this is a valid PulseSync envelope.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.protocol == crate::PROTOCOL_NAME
            && self.version == crate::PROTOCOL_VERSION
            && (self.kind == EnvelopeKind::Presence || self.message.is_some())
    }
}

/// Encode an envelope to datagram bytes.
///
/// # Errors
///
/// Returns an error if serialization fails or the datagram would exceed
/// [`MAX_DATAGRAM_SIZE`].
pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec(envelope)?;
    if bytes.len() > MAX_DATAGRAM_SIZE {
        return Err(Error::DatagramTooLarge(bytes.len()));
    }
    Ok(bytes)
}

/// Decode datagram bytes into a valid envelope.
///
/// # Errors
///
/// Returns an error if the bytes are not a valid PulseSync envelope.
pub fn decode_envelope(data: &[u8]) -> Result<Envelope> {
    if data.len() > MAX_DATAGRAM_SIZE {
        return Err(Error::DatagramTooLarge(data.len()));
    }
    let envelope: Envelope = serde_json::from_slice(data)?;
    if !envelope.is_valid() {
        return Err(Error::ProtocolError(format!(
            "foreign or incomplete envelope: {}/{}",
            envelope.protocol, envelope.version
        )));
    }
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> MessageMap {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn test_start_message_shape() {
        let message = SessionMessage::Start {
            elapsed_time: Some(Duration::ZERO),
        };
        assert_eq!(
            Value::Object(message.to_map()),
            json!({"action": "start", "elapsedTime": 0.0})
        );
    }

    #[test]
    fn test_end_message_has_no_elapsed() {
        let encoded = SessionMessage::End.to_map();
        assert_eq!(Value::Object(encoded), json!({"action": "end"}));
    }

    #[test]
    fn test_sync_message_shape() {
        let message = SessionMessage::Sync {
            elapsed_time: Duration::from_millis(12_500),
        };
        assert_eq!(
            Value::Object(message.to_map()),
            json!({"action": "sync", "elapsedTime": 12.5})
        );
    }

    #[test]
    fn test_decode_start_with_and_without_elapsed() {
        let with = decode_message(&map(json!({"action": "start", "elapsedTime": 5}))).unwrap();
        assert_eq!(
            with,
            SessionMessage::Start {
                elapsed_time: Some(Duration::from_secs(5))
            }
        );

        let without = decode_message(&map(json!({"action": "start"}))).unwrap();
        assert_eq!(without, SessionMessage::Start { elapsed_time: None });
    }

    #[test]
    fn test_decode_accepts_integer_and_fractional_seconds() {
        let msg = decode_message(&map(json!({"action": "sync", "elapsedTime": 42}))).unwrap();
        assert_eq!(
            msg,
            SessionMessage::Sync {
                elapsed_time: Duration::from_secs(42)
            }
        );

        let msg = decode_message(&map(json!({"action": "sync", "elapsedTime": 1.25}))).unwrap();
        assert_eq!(
            msg,
            SessionMessage::Sync {
                elapsed_time: Duration::from_millis(1250)
            }
        );
    }

    #[test]
    fn test_decode_ignores_extra_keys() {
        let msg = decode_message(&map(json!({"action": "end", "elapsedTime": 3, "x": true})));
        assert_eq!(msg.unwrap(), SessionMessage::End);
    }

    #[test]
    fn test_decode_rejects_unknown_and_malformed() {
        let cases = [
            json!({"action": "ping"}),
            json!({"elapsedTime": 3}),
            json!({"action": 7}),
            json!({"action": "sync"}),
            json!({"action": "sync", "elapsedTime": "ten"}),
            json!({"action": "sync", "elapsedTime": -1.0}),
            json!({"action": "start", "elapsedTime": null}),
        ];

        for case in cases {
            let result = decode_message(&map(case.clone()));
            assert!(
                matches!(result, Err(Error::ProtocolError(_))),
                "expected rejection for {case}"
            );
        }
    }

    #[test]
    fn test_envelope_roundtrip() {
        let device_id = Uuid::new_v4();
        let envelope = Envelope::message(
            device_id,
            "Phone",
            SessionMessage::End.to_map(),
        );

        let bytes = encode_envelope(&envelope).expect("encode");
        let decoded = decode_envelope(&bytes).expect("decode");

        assert_eq!(decoded.device_id, device_id);
        assert_eq!(decoded.kind, EnvelopeKind::Message);
        assert_eq!(
            decode_message(decoded.message.as_ref().unwrap()).unwrap(),
            SessionMessage::End
        );
    }

    #[test]
    fn test_presence_envelope_omits_message() {
        let envelope = Envelope::presence(Uuid::new_v4(), "Wrist");
        let json = String::from_utf8(encode_envelope(&envelope).unwrap()).unwrap();

        assert!(json.contains("\"kind\":\"presence\""));
        assert!(!json.contains("message"));
    }

    #[test]
    fn test_decode_envelope_rejects_foreign_packets() {
        let foreign = json!({
            "protocol": "otherapp",
            "version": "1.0",
            "device_id": Uuid::new_v4(),
            "device_name": "Laptop",
            "kind": "presence"
        });
        let bytes = serde_json::to_vec(&foreign).unwrap();
        assert!(decode_envelope(&bytes).is_err());

        assert!(decode_envelope(b"not json").is_err());
    }

    #[test]
    fn test_message_envelope_requires_payload() {
        let mut envelope = Envelope::presence(Uuid::new_v4(), "Wrist");
        envelope.kind = EnvelopeKind::Message;
        assert!(!envelope.is_valid());
    }
}
