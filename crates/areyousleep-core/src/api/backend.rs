use async_trait::async_trait;

use crate::models::{
    ActionAck, AvatarResponse, AvatarUpload, Friend, FriendRequest, LoginResponse, Mood, PokeKind,
    RequestId, Status, User, UserId, UserSummary,
};

use super::ApiError;

/// Typed operations offered by the backend.
///
/// Implementations attach the current bearer token, if any, to every request
/// and never retry: a failure is reported once and the caller decides what to do.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Replace (or clear) the bearer token attached to subsequent calls.
    fn set_token(&self, token: Option<String>);

    fn token(&self) -> Option<String>;

    async fn register(&self, username: &str, password: &str, nickname: &str) -> Result<(), ApiError>;

    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError>;

    async fn fetch_current_user(&self) -> Result<User, ApiError>;

    async fn update_status(&self, status: Status) -> Result<(), ApiError>;

    async fn update_mood(&self, mood: &Mood) -> Result<(), ApiError>;

    async fn update_avatar(&self, upload: AvatarUpload) -> Result<AvatarResponse, ApiError>;

    async fn list_friends(&self) -> Result<Vec<Friend>, ApiError>;

    async fn list_friend_requests(&self) -> Result<Vec<FriendRequest>, ApiError>;

    async fn search_users(&self, username: &str) -> Result<Vec<UserSummary>, ApiError>;

    async fn send_friend_request(&self, friend_id: &UserId) -> Result<ActionAck, ApiError>;

    async fn accept_friend_request(&self, request_id: &RequestId) -> Result<ActionAck, ApiError>;

    async fn poke(&self, friend_id: &UserId, kind: PokeKind) -> Result<ActionAck, ApiError>;

    /// Heartbeat telling the backend the user is still up.
    async fn confirm_awake(&self) -> Result<(), ApiError>;

    async fn register_push_token(&self, token: &str) -> Result<(), ApiError>;
}
