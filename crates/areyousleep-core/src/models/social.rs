use serde::{Deserialize, Serialize};

use super::{Mood, RequestId, Status, UserId};

/// A friend as mirrored locally: identity plus presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friend {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub mood: Option<Mood>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Friend {
    /// Nickname when set, otherwise username.
    pub fn display_name(&self) -> &str {
        self.nickname
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
    }

    /// Pokes are only offered to friends who are awake.
    pub fn can_be_poked(&self) -> bool {
        self.status == Status::Awake
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Accepted,
    #[serde(other)]
    Unknown,
}

/// An incoming friend request, as listed by `/friends/requests`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: RequestId,
    #[serde(default, alias = "userId", alias = "user_id", alias = "senderId")]
    pub sender_id: Option<UserId>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub status: RequestStatus,
}

impl FriendRequest {
    pub fn display_name(&self) -> &str {
        self.nickname
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.username.as_deref())
            .unwrap_or("unknown user")
    }
}

/// Body returned by social actions. Only the optional message is used.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActionAck {
    #[serde(default)]
    pub message: Option<String>,
}

/// Kinds of poke a user can send. Unrecognized tags fall back to `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PokeKind {
    #[default]
    Default,
    Coffee,
    Sleep,
    WakeUp,
}

impl PokeKind {
    pub const ALL: [PokeKind; 4] = [
        PokeKind::Default,
        PokeKind::Coffee,
        PokeKind::Sleep,
        PokeKind::WakeUp,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            PokeKind::Default => "default",
            PokeKind::Coffee => "coffee",
            PokeKind::Sleep => "sleep",
            PokeKind::WakeUp => "wake_up",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PokeKind::Default => "Poked you!",
            PokeKind::Coffee => "Sent you a coffee",
            PokeKind::Sleep => "Time to sleep",
            PokeKind::WakeUp => "Wake up!",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            PokeKind::Default => "👉",
            PokeKind::Coffee => "☕️",
            PokeKind::Sleep => "😴",
            PokeKind::WakeUp => "☀️",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == key)
    }

    /// Resolve a wire tag, falling back to the default poke.
    pub fn resolve(key: Option<&str>) -> Self {
        key.and_then(Self::from_key).unwrap_or_default()
    }
}
