//! API client for communicating with the Are You Sleep REST API.
//!
//! Auth endpoints (`/auth/*`) live at the server root, everything else under
//! `/api`. The bearer token is shared between clones of the client so that a
//! login performed through one handle is seen by all of them.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::models::{
    ActionAck, AvatarResponse, AvatarUpload, Friend, FriendRequest, LoginResponse, Mood, PokeKind,
    RequestId, Status, User, UserId, UserSummary,
};

use super::{ApiError, Backend};

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Path prefix for data endpoints.
const API_PREFIX: &str = "/api";

/// API client for the Are You Sleep backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    server_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    /// Create a new API client for the server at `server_url`
    /// (e.g. `http://localhost:3001`).
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}{}", self.server_url, API_PREFIX, path)
    }

    /// Attach the bearer token (if any) and send.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        Self::check_response(response).await
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let url = response.url().path().to_string();
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_status(status, &body);
            debug!(url = %url, status = status.as_u16(), error = %err, "Request rejected");
            Err(err)
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let url = response.url().path().to_string();
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            warn!(url = %url, error = %e, "Failed to parse response body");
            ApiError::InvalidResponse(format!("{}: {}", url, e))
        })
    }

    /// Social actions answer with an optional `{message}`; anything else is
    /// treated as an empty acknowledgement.
    async fn read_ack(response: Response) -> Result<ActionAck, ApiError> {
        let text = response.text().await?;
        Ok(serde_json::from_str(&text).unwrap_or_default())
    }
}

#[async_trait]
impl Backend for ApiClient {
    fn set_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    fn token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn register(&self, username: &str, password: &str, nickname: &str) -> Result<(), ApiError> {
        let body = json!({ "username": username, "password": password, "nickname": nickname });
        self.send(self.client.post(self.auth_url("/auth/register")).json(&body))
            .await?;
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = json!({ "username": username, "password": password });
        let response = self
            .send(self.client.post(self.auth_url("/auth/login")).json(&body))
            .await?;
        Self::read_json(response).await
    }

    async fn fetch_current_user(&self) -> Result<User, ApiError> {
        let response = self.send(self.client.get(self.api_url("/users/me"))).await?;
        Self::read_json(response).await
    }

    async fn update_status(&self, status: Status) -> Result<(), ApiError> {
        let body = json!({ "status": status });
        self.send(self.client.put(self.api_url("/status")).json(&body))
            .await?;
        Ok(())
    }

    async fn update_mood(&self, mood: &Mood) -> Result<(), ApiError> {
        let body = json!({ "mood": mood });
        self.send(self.client.put(self.api_url("/users/mood")).json(&body))
            .await?;
        Ok(())
    }

    async fn update_avatar(&self, upload: AvatarUpload) -> Result<AvatarResponse, ApiError> {
        let part = multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)
            .map_err(|e| ApiError::InvalidInput(format!("bad content type: {}", e)))?;
        let form = multipart::Form::new().part("avatar", part);
        let response = self
            .send(self.client.put(self.api_url("/users/avatar")).multipart(form))
            .await?;
        Self::read_json(response).await
    }

    async fn list_friends(&self) -> Result<Vec<Friend>, ApiError> {
        let response = self.send(self.client.get(self.api_url("/friends"))).await?;
        Self::read_json(response).await
    }

    async fn list_friend_requests(&self) -> Result<Vec<FriendRequest>, ApiError> {
        let response = self
            .send(self.client.get(self.api_url("/friends/requests")))
            .await?;
        Self::read_json(response).await
    }

    async fn search_users(&self, username: &str) -> Result<Vec<UserSummary>, ApiError> {
        let request = self
            .client
            .get(self.api_url("/users/search"))
            .query(&[("username", username)]);
        let response = self.send(request).await?;
        Self::read_json(response).await
    }

    async fn send_friend_request(&self, friend_id: &UserId) -> Result<ActionAck, ApiError> {
        let body = json!({ "friendId": friend_id });
        let response = self
            .send(self.client.post(self.api_url("/friends/request")).json(&body))
            .await?;
        Self::read_ack(response).await
    }

    async fn accept_friend_request(&self, request_id: &RequestId) -> Result<ActionAck, ApiError> {
        let url = self.api_url(&format!("/friends/accept/{}", request_id));
        let response = self.send(self.client.put(url)).await?;
        Self::read_ack(response).await
    }

    async fn poke(&self, friend_id: &UserId, kind: PokeKind) -> Result<ActionAck, ApiError> {
        let url = self.api_url(&format!("/friends/{}/poke", friend_id));
        let body = json!({ "pokeType": kind });
        let response = self.send(self.client.post(url).json(&body)).await?;
        Self::read_ack(response).await
    }

    async fn confirm_awake(&self) -> Result<(), ApiError> {
        self.send(self.client.post(self.api_url("/users/confirm-awake")))
            .await?;
        Ok(())
    }

    async fn register_push_token(&self, token: &str) -> Result<(), ApiError> {
        let body = json!({ "token": token });
        self.send(self.client.post(self.api_url("/users/push-token")).json(&body))
            .await?;
        Ok(())
    }
}
