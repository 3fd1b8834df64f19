//! In-memory fakes shared by unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::api::{ApiError, Backend};
use crate::models::{
    ActionAck, AvatarResponse, AvatarUpload, Friend, FriendRequest, LoginResponse, Mood, PokeKind,
    RequestId, Status, User, UserId, UserSummary,
};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Failure {
    Network,
    Rejected(u16),
}

impl Failure {
    fn to_error(self) -> ApiError {
        match self {
            Failure::Network => ApiError::Network("connection refused".to_string()),
            Failure::Rejected(401) => ApiError::Unauthorized,
            Failure::Rejected(status) => ApiError::Rejected {
                status,
                message: Some(format!("rejected with {}", status)),
            },
        }
    }
}

pub(crate) fn user(id: i64, username: &str) -> User {
    User {
        id: UserId::from(id),
        username: username.to_string(),
        nickname: Some(format!("{}-nick", username)),
        avatar_url: None,
        status: Status::Awake,
        mood: None,
    }
}

pub(crate) fn friend(id: &str, username: &str, status: Status) -> Friend {
    Friend {
        id: UserId::new(id),
        username: username.to_string(),
        nickname: Some(username.to_uppercase()),
        status,
        mood: None,
        avatar_url: Some(format!("/uploads/avatar_{}.png", id)),
    }
}

/// Scriptable stand-in for the HTTP backend.
#[derive(Default)]
pub(crate) struct FakeBackend {
    token: Mutex<Option<String>>,
    accounts: Mutex<HashMap<String, (String, User)>>,
    tokens: Mutex<HashMap<String, User>>,
    friends: Mutex<Vec<Friend>>,
    failures: Mutex<HashMap<&'static str, Failure>>,
    calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register an account; its token is `token-<username>`.
    pub(crate) fn add_account(&self, password: &str, user: User) -> String {
        let token = format!("token-{}", user.username);
        self.tokens
            .lock()
            .unwrap()
            .insert(token.clone(), user.clone());
        self.accounts
            .lock()
            .unwrap()
            .insert(user.username.clone(), (password.to_string(), user));
        token
    }

    pub(crate) fn set_friends(&self, friends: Vec<Friend>) {
        *self.friends.lock().unwrap() = friends;
    }

    pub(crate) fn fail(&self, op: &'static str, failure: Failure) {
        self.failures.lock().unwrap().insert(op, failure);
    }

    pub(crate) fn clear_failure(&self, op: &'static str) {
        self.failures.lock().unwrap().remove(op);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self, op: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.split(':').next() == Some(op))
            .count()
    }

    fn record(&self, op: &'static str, detail: &str) -> Result<(), ApiError> {
        let entry = if detail.is_empty() {
            op.to_string()
        } else {
            format!("{}:{}", op, detail)
        };
        self.calls.lock().unwrap().push(entry);
        match self.failures.lock().unwrap().get(op) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    fn current_user(&self) -> Result<User, ApiError> {
        let token = self.token.lock().unwrap().clone();
        token
            .and_then(|t| self.tokens.lock().unwrap().get(&t).cloned())
            .ok_or(ApiError::Unauthorized)
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn set_token(&self, token: Option<String>) {
        *self.token.lock().unwrap() = token;
    }

    fn token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    async fn register(&self, username: &str, password: &str, nickname: &str) -> Result<(), ApiError> {
        self.record("register", username)?;
        let mut account = user(100, username);
        account.nickname = Some(nickname.to_string());
        self.add_account(password, account);
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.record("login", username)?;
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(username) {
            Some((expected, user)) if expected == password => Ok(LoginResponse {
                token: format!("token-{}", username),
                user: user.clone(),
            }),
            _ => Err(ApiError::Rejected {
                status: 400,
                message: Some("Invalid credentials".to_string()),
            }),
        }
    }

    async fn fetch_current_user(&self) -> Result<User, ApiError> {
        self.record("fetch_current_user", "")?;
        self.current_user()
    }

    async fn update_status(&self, status: Status) -> Result<(), ApiError> {
        self.record("update_status", status.as_str())?;
        self.current_user().map(|_| ())
    }

    async fn update_mood(&self, mood: &Mood) -> Result<(), ApiError> {
        self.record("update_mood", mood.key())?;
        self.current_user().map(|_| ())
    }

    async fn update_avatar(&self, upload: AvatarUpload) -> Result<AvatarResponse, ApiError> {
        self.record("update_avatar", &upload.file_name)?;
        Ok(AvatarResponse {
            avatar_url: format!("/uploads/{}", upload.file_name),
        })
    }

    async fn list_friends(&self) -> Result<Vec<Friend>, ApiError> {
        self.record("list_friends", "")?;
        Ok(self.friends.lock().unwrap().clone())
    }

    async fn list_friend_requests(&self) -> Result<Vec<FriendRequest>, ApiError> {
        self.record("list_friend_requests", "")?;
        Ok(Vec::new())
    }

    async fn search_users(&self, username: &str) -> Result<Vec<UserSummary>, ApiError> {
        self.record("search_users", username)?;
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts
            .values()
            .filter(|(_, u)| u.username.contains(username))
            .map(|(_, u)| UserSummary {
                id: u.id.clone(),
                username: u.username.clone(),
                nickname: u.nickname.clone(),
                avatar_url: u.avatar_url.clone(),
            })
            .collect())
    }

    async fn send_friend_request(&self, friend_id: &UserId) -> Result<ActionAck, ApiError> {
        self.record("send_friend_request", friend_id.as_str())?;
        Ok(ActionAck::default())
    }

    async fn accept_friend_request(&self, request_id: &RequestId) -> Result<ActionAck, ApiError> {
        self.record("accept_friend_request", request_id.as_str())?;
        Ok(ActionAck::default())
    }

    async fn poke(&self, friend_id: &UserId, kind: PokeKind) -> Result<ActionAck, ApiError> {
        self.record("poke", &format!("{}/{}", friend_id, kind.key()))?;
        Ok(ActionAck {
            message: Some("Poked!".to_string()),
        })
    }

    async fn confirm_awake(&self) -> Result<(), ApiError> {
        self.record("confirm_awake", "")
    }

    async fn register_push_token(&self, token: &str) -> Result<(), ApiError> {
        self.record("register_push_token", token)
    }
}
