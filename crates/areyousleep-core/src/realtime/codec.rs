//! Text framing for the backend's realtime server (Engine.IO v4 carrying
//! Socket.IO v5 packets over a WebSocket).
//!
//! | frame              | meaning                              |
//! |--------------------|--------------------------------------|
//! | `0{..}`            | engine open, carries ping settings   |
//! | `1`                | engine close                         |
//! | `2` / `3`          | ping / pong                          |
//! | `40` / `40{..}`    | namespace connect (request / ack)    |
//! | `41`               | namespace disconnect                 |
//! | `42["name", ..]`   | event                                |
//! | `44{..}`           | namespace connect refused            |
//! | `6`                | noop                                 |

use serde::Deserialize;
use serde_json::Value;

use super::RealtimeError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(OpenInfo),
    Close,
    Ping,
    Pong,
    Noop,
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, args: Vec<Value> },
    ConnectError(Value),
}

impl Packet {
    pub fn event(name: &str, args: Vec<Value>) -> Self {
        Packet::Event {
            name: name.to_string(),
            args,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Packet::Open(info) => format!(
                "0{}",
                serde_json::json!({
                    "sid": info.sid,
                    "pingInterval": info.ping_interval,
                    "pingTimeout": info.ping_timeout,
                })
            ),
            Packet::Close => "1".to_string(),
            Packet::Ping => "2".to_string(),
            Packet::Pong => "3".to_string(),
            Packet::Noop => "6".to_string(),
            Packet::Connect(None) => "40".to_string(),
            Packet::Connect(Some(data)) => format!("40{}", data),
            Packet::Disconnect => "41".to_string(),
            Packet::Event { name, args } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                format!("42{}", Value::Array(items))
            }
            Packet::ConnectError(data) => format!("44{}", data),
        }
    }

    pub fn decode(frame: &str) -> Result<Self, RealtimeError> {
        let mut chars = frame.chars();
        let engine_type = chars
            .next()
            .ok_or_else(|| RealtimeError::Protocol("empty frame".to_string()))?;
        let rest = &frame[engine_type.len_utf8()..];

        match engine_type {
            '0' => serde_json::from_str(rest)
                .map(Packet::Open)
                .map_err(|e| RealtimeError::Protocol(format!("bad open packet: {}", e))),
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping),
            '3' => Ok(Packet::Pong),
            '6' => Ok(Packet::Noop),
            '4' => Self::decode_socket(rest),
            other => Err(RealtimeError::Protocol(format!(
                "unsupported engine packet type '{}'",
                other
            ))),
        }
    }

    fn decode_socket(frame: &str) -> Result<Self, RealtimeError> {
        let packet_type = frame
            .chars()
            .next()
            .ok_or_else(|| RealtimeError::Protocol("empty socket packet".to_string()))?;
        let body = strip_namespace(&frame[packet_type.len_utf8()..]);

        match packet_type {
            '0' => {
                if body.is_empty() {
                    Ok(Packet::Connect(None))
                } else {
                    Ok(Packet::Connect(Some(parse_json(body)?)))
                }
            }
            '1' => Ok(Packet::Disconnect),
            '2' => {
                // skip the optional ack id
                let body = body.trim_start_matches(|c: char| c.is_ascii_digit());
                let mut items = match parse_json(body)? {
                    Value::Array(items) => items,
                    other => {
                        return Err(RealtimeError::Protocol(format!(
                            "event payload is not an array: {}",
                            other
                        )))
                    }
                };
                if items.is_empty() {
                    return Err(RealtimeError::Protocol("event without a name".to_string()));
                }
                let name = match items.remove(0) {
                    Value::String(name) => name,
                    other => {
                        return Err(RealtimeError::Protocol(format!(
                            "event name is not a string: {}",
                            other
                        )))
                    }
                };
                Ok(Packet::Event { name, args: items })
            }
            '4' => Ok(Packet::ConnectError(if body.is_empty() {
                Value::Null
            } else {
                parse_json(body)?
            })),
            other => Err(RealtimeError::Protocol(format!(
                "unsupported socket packet type '{}'",
                other
            ))),
        }
    }
}

/// Drop a leading `/namespace,` if present.
fn strip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        match body.find(',') {
            Some(idx) => &body[idx + 1..],
            None => "",
        }
    } else {
        body
    }
}

fn parse_json(body: &str) -> Result<Value, RealtimeError> {
    serde_json::from_str(body).map_err(|e| RealtimeError::Protocol(format!("bad json: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_open() {
        let packet =
            Packet::decode(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":5000}"#)
                .unwrap();
        assert_eq!(
            packet,
            Packet::Open(OpenInfo {
                sid: "abc".to_string(),
                ping_interval: 25000,
                ping_timeout: 5000,
            })
        );
    }

    #[test]
    fn test_decode_control_packets() {
        assert_eq!(Packet::decode("2").unwrap(), Packet::Ping);
        assert_eq!(Packet::decode("3").unwrap(), Packet::Pong);
        assert_eq!(Packet::decode("1").unwrap(), Packet::Close);
        assert_eq!(Packet::decode("41").unwrap(), Packet::Disconnect);
        assert_eq!(
            Packet::decode(r#"40{"sid":"x"}"#).unwrap(),
            Packet::Connect(Some(json!({"sid": "x"})))
        );
        assert_eq!(
            Packet::decode(r#"44{"message":"nope"}"#).unwrap(),
            Packet::ConnectError(json!({"message": "nope"}))
        );
    }

    #[test]
    fn test_decode_event() {
        let packet = Packet::decode(r#"42["statusChanged",{"userId":2,"status":"awake"}]"#).unwrap();
        assert_eq!(
            packet,
            Packet::event("statusChanged", vec![json!({"userId": 2, "status": "awake"})])
        );
    }

    #[test]
    fn test_decode_event_with_namespace_and_ack_id() {
        let packet = Packet::decode(r#"42/presence,17["friendRequestAccepted"]"#).unwrap();
        assert_eq!(packet, Packet::event("friendRequestAccepted", vec![]));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Packet::decode("").is_err());
        assert!(Packet::decode("9").is_err());
        assert!(Packet::decode("42{}").is_err());
        assert!(Packet::decode("42[]").is_err());
        assert!(Packet::decode("42[1]").is_err());
        assert!(Packet::decode("45[]").is_err());
    }

    #[test]
    fn test_encode_outbound() {
        assert_eq!(Packet::Connect(None).encode(), "40");
        assert_eq!(Packet::Pong.encode(), "3");
        assert_eq!(
            Packet::event("authenticate", vec![json!(1)]).encode(),
            r#"42["authenticate",1]"#
        );
    }
}
