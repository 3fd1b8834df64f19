use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Whether a user is currently up or in bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Awake,
    Asleep,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Awake => "awake",
            Status::Asleep => "asleep",
        }
    }

    /// The opposite status, as flipped by the status switch.
    pub fn toggled(&self) -> Self {
        match self {
            Status::Awake => Status::Asleep,
            Status::Asleep => Status::Awake,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "awake" => Ok(Status::Awake),
            "asleep" => Ok(Status::Asleep),
            other => Err(format!("unknown status '{}' (expected awake or asleep)", other)),
        }
    }
}

/// A user's mood. Values the client does not know are carried through as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mood {
    Happy,
    Studying,
    Gaming,
    Working,
    Chilling,
    Other(String),
}

impl Mood {
    /// Moods offered by the mood picker, in display order.
    pub const KNOWN: &'static [Mood] = &[
        Mood::Happy,
        Mood::Studying,
        Mood::Gaming,
        Mood::Working,
        Mood::Chilling,
    ];

    pub fn key(&self) -> &str {
        match self {
            Mood::Happy => "happy",
            Mood::Studying => "studying",
            Mood::Gaming => "gaming",
            Mood::Working => "working",
            Mood::Chilling => "chilling",
            Mood::Other(value) => value,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Mood::Happy => "Happy",
            Mood::Studying => "Studying",
            Mood::Gaming => "Gaming",
            Mood::Working => "Working",
            Mood::Chilling => "Chilling",
            Mood::Other(value) => value,
        }
    }

    pub fn emoji(&self) -> Option<&'static str> {
        match self {
            Mood::Happy => Some("😊"),
            Mood::Studying => Some("📚"),
            Mood::Gaming => Some("🎮"),
            Mood::Working => Some("💻"),
            Mood::Chilling => Some("🛋️"),
            Mood::Other(_) => None,
        }
    }
}

impl From<String> for Mood {
    fn from(value: String) -> Self {
        match value.as_str() {
            "happy" => Mood::Happy,
            "studying" => Mood::Studying,
            "gaming" => Mood::Gaming,
            "working" => Mood::Working,
            "chilling" => Mood::Chilling,
            _ => Mood::Other(value),
        }
    }
}

impl From<Mood> for String {
    fn from(mood: Mood) -> Self {
        match mood {
            Mood::Other(value) => value,
            known => known.key().to_string(),
        }
    }
}

impl FromStr for Mood {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Mood::from(s.trim().to_string()))
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Profile of the logged-in user, as returned by `/auth/login` and `/users/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub nickname: Option<String>,
    /// Server-relative path, e.g. `/uploads/avatar_1.png`
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub mood: Option<Mood>,
}

impl User {
    /// Shallow-merge a partial update. Fields absent from the patch are kept.
    pub fn merge(&mut self, patch: UserPatch) {
        if let Some(nickname) = patch.nickname {
            self.nickname = Some(nickname);
        }
        if let Some(avatar_url) = patch.avatar_url {
            self.avatar_url = Some(avatar_url);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(mood) = patch.mood {
            self.mood = mood;
        }
    }
}

/// Partial profile update. `mood: Some(None)` clears the mood.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
    pub status: Option<Status>,
    pub mood: Option<Option<Mood>>,
}

impl UserPatch {
    pub fn avatar(url: impl Into<String>) -> Self {
        Self {
            avatar_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn mood(mood: Option<Mood>) -> Self {
        Self {
            mood: Some(mood),
            ..Self::default()
        }
    }
}

/// Entry returned by the username search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvatarResponse {
    #[serde(rename = "avatarUrl")]
    pub avatar_url: String,
}

/// An image ready to be sent as the `avatar` part of a multipart upload.
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl AvatarUpload {
    /// Name the upload `avatar_<user id>.<ext>` with an `image/<ext>` content type.
    pub fn for_user(user_id: &UserId, extension: &str, bytes: Vec<u8>) -> Self {
        let ext = extension.trim_start_matches('.').to_lowercase();
        let ext = if ext.is_empty() { "png".to_string() } else { ext };
        let content_type = match ext.as_str() {
            "jpg" => "image/jpeg".to_string(),
            other => format!("image/{}", other),
        };
        Self {
            file_name: format!("avatar_{}.{}", user_id, ext),
            content_type,
            bytes,
        }
    }

    /// Read an image from disk.
    pub fn from_path(user_id: &UserId, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read avatar image {}", path.display()))?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Ok(Self::for_user(user_id, extension, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User {
            id: UserId::from(1_i64),
            username: "alice".to_string(),
            nickname: Some("Alice".to_string()),
            avatar_url: None,
            status: Status::Awake,
            mood: Some(Mood::Happy),
        }
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&Status::Asleep).unwrap(), "\"asleep\"");
        let status: Status = serde_json::from_str("\"awake\"").unwrap();
        assert_eq!(status, Status::Awake);
        assert_eq!(Status::Awake.toggled(), Status::Asleep);
        assert!("sideways".parse::<Status>().is_err());
    }

    #[test]
    fn test_mood_round_trips_unknown_values() {
        let mood: Mood = serde_json::from_str("\"gaming\"").unwrap();
        assert_eq!(mood, Mood::Gaming);
        assert_eq!(mood.emoji(), Some("🎮"));

        let mood: Mood = serde_json::from_str("\"baking\"").unwrap();
        assert_eq!(mood, Mood::Other("baking".to_string()));
        assert_eq!(mood.emoji(), None);
        assert_eq!(serde_json::to_string(&mood).unwrap(), "\"baking\"");
    }

    #[test]
    fn test_user_parses_with_missing_optional_fields() {
        let json = r#"{"id": 7, "username": "bob"}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, UserId::from(7_i64));
        assert_eq!(user.nickname, None);
        assert_eq!(user.status, Status::Awake);
        assert_eq!(user.mood, None);
    }

    #[test]
    fn test_merge_only_touches_patched_fields() {
        let mut user = alice();
        user.merge(UserPatch::avatar("/uploads/avatar_1.png"));

        assert_eq!(user.avatar_url.as_deref(), Some("/uploads/avatar_1.png"));
        assert_eq!(user.nickname.as_deref(), Some("Alice"));
        assert_eq!(user.status, Status::Awake);
        assert_eq!(user.mood, Some(Mood::Happy));

        user.merge(UserPatch::mood(None));
        assert_eq!(user.mood, None);
        assert_eq!(user.avatar_url.as_deref(), Some("/uploads/avatar_1.png"));
    }

    #[test]
    fn test_avatar_upload_naming() {
        let upload = AvatarUpload::for_user(&UserId::from(3_i64), ".JPG", vec![1, 2, 3]);
        assert_eq!(upload.file_name, "avatar_3.jpg");
        assert_eq!(upload.content_type, "image/jpeg");

        let upload = AvatarUpload::for_user(&UserId::from(3_i64), "png", vec![]);
        assert_eq!(upload.content_type, "image/png");
    }
}
