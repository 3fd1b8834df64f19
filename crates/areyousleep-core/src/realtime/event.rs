use serde::Deserialize;
use serde_json::Value;

use crate::models::{Mood, Status, UserId};

use super::codec::Packet;
use super::RealtimeError;

/// Client -> server: bind this socket to a user.
const AUTHENTICATE: &str = "authenticate";

const STATUS_CHANGED: &str = "statusChanged";
const MOOD_CHANGED: &str = "moodChanged";
const POKE: &str = "poke";
const FRIEND_REQUEST_ACCEPTED: &str = "friendRequestAccepted";

/// Who sent a poke, as carried in the event.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PokeSender {
    #[serde(default)]
    pub id: Option<UserId>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
}

impl PokeSender {
    pub fn display_name(&self) -> &str {
        self.nickname
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.username.as_deref())
            .unwrap_or("Someone")
    }
}

/// Server -> client presence events.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    StatusChanged { user_id: UserId, status: Status },
    MoodChanged { user_id: UserId, mood: Option<Mood> },
    /// `kind` is the raw tag; it is resolved against the poke table when
    /// the notice is built.
    Poke { from: PokeSender, kind: Option<String> },
    FriendRequestAccepted,
}

#[derive(Deserialize)]
struct StatusChangedPayload {
    #[serde(rename = "userId")]
    user_id: UserId,
    status: Status,
}

#[derive(Deserialize)]
struct MoodChangedPayload {
    #[serde(rename = "userId")]
    user_id: UserId,
    #[serde(default)]
    mood: Option<Mood>,
}

#[derive(Deserialize)]
struct PokePayload {
    #[serde(default)]
    from: PokeSender,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl RealtimeEvent {
    /// Decode a named socket event. Events this client does not handle map to
    /// `Ok(None)`.
    pub fn from_socket(name: &str, args: &[Value]) -> Result<Option<Self>, RealtimeError> {
        let payload = args.first().cloned().unwrap_or(Value::Null);
        let event = match name {
            STATUS_CHANGED => {
                let p: StatusChangedPayload = parse(name, payload)?;
                RealtimeEvent::StatusChanged {
                    user_id: p.user_id,
                    status: p.status,
                }
            }
            MOOD_CHANGED => {
                let p: MoodChangedPayload = parse(name, payload)?;
                RealtimeEvent::MoodChanged {
                    user_id: p.user_id,
                    mood: p.mood,
                }
            }
            POKE => {
                let p: PokePayload = parse(name, payload)?;
                RealtimeEvent::Poke {
                    from: p.from,
                    kind: p.kind,
                }
            }
            FRIEND_REQUEST_ACCEPTED => RealtimeEvent::FriendRequestAccepted,
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    pub fn name(&self) -> &'static str {
        match self {
            RealtimeEvent::StatusChanged { .. } => STATUS_CHANGED,
            RealtimeEvent::MoodChanged { .. } => MOOD_CHANGED,
            RealtimeEvent::Poke { .. } => POKE,
            RealtimeEvent::FriendRequestAccepted => FRIEND_REQUEST_ACCEPTED,
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(name: &str, payload: Value) -> Result<T, RealtimeError> {
    serde_json::from_value(payload)
        .map_err(|e| RealtimeError::Protocol(format!("bad {} payload: {}", name, e)))
}

/// The packet that authenticates a freshly connected socket.
pub fn authenticate_packet(user_id: &UserId) -> Packet {
    let id = serde_json::to_value(user_id).unwrap_or_else(|_| Value::String(user_id.to_string()));
    Packet::event(AUTHENTICATE, vec![id])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_changed() {
        let event = RealtimeEvent::from_socket(STATUS_CHANGED, &[json!({"userId": 2, "status": "asleep"})])
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            RealtimeEvent::StatusChanged {
                user_id: UserId::new("2"),
                status: Status::Asleep,
            }
        );
    }

    #[test]
    fn test_mood_changed_null_clears() {
        let event = RealtimeEvent::from_socket(MOOD_CHANGED, &[json!({"userId": "2", "mood": null})])
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            RealtimeEvent::MoodChanged {
                user_id: UserId::new("2"),
                mood: None,
            }
        );
    }

    #[test]
    fn test_poke_payload() {
        let event = RealtimeEvent::from_socket(
            POKE,
            &[json!({"from": {"id": 5, "nickname": "Eve"}, "type": "coffee"})],
        )
        .unwrap()
        .unwrap();
        match event {
            RealtimeEvent::Poke { from, kind } => {
                assert_eq!(from.display_name(), "Eve");
                assert_eq!(kind.as_deref(), Some("coffee"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_friend_request_accepted_ignores_payload() {
        let event = RealtimeEvent::from_socket(FRIEND_REQUEST_ACCEPTED, &[]).unwrap();
        assert_eq!(event, Some(RealtimeEvent::FriendRequestAccepted));
    }

    #[test]
    fn test_unknown_event_and_bad_payload() {
        assert_eq!(RealtimeEvent::from_socket("typing", &[json!({})]).unwrap(), None);
        assert!(RealtimeEvent::from_socket(STATUS_CHANGED, &[json!({"status": "awake"})]).is_err());
        assert!(RealtimeEvent::from_socket(STATUS_CHANGED, &[json!({"userId": 1, "status": "sideways"})]).is_err());
    }

    #[test]
    fn test_authenticate_packet_keeps_numeric_id() {
        let packet = authenticate_packet(&UserId::from(9_i64));
        assert_eq!(packet.encode(), r#"42["authenticate",9]"#);
    }
}
