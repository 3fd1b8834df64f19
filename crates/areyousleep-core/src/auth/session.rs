//! Authentication state machine.
//!
//! ```text
//!   Hydrating ──(stored token accepted)──▶ Authenticated
//!       │                                    ▲     │
//!       └──(no token / token refused)──▶ Unauthenticated
//!                                  login ─┘     └─ logout
//! ```
//!
//! `SessionManager` is the only writer of the session and of the persisted
//! token. Consumers observe changes through [`SessionManager::subscribe`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, Backend};
use crate::models::{AvatarUpload, Mood, Status, User, UserPatch};

use super::credentials::{CredentialStore, TOKEN_KEY};

/// The authenticated identity held by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: User,
    pub token: String,
    pub established_at: DateTime<Utc>,
}

impl Session {
    fn new(user: User, token: String) -> Self {
        Self {
            user,
            token,
            established_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Boot-time token restore has not finished yet.
    Hydrating,
    Authenticated(Session),
    /// Definitively logged out.
    Unauthenticated,
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Hydrating)
    }
}

pub struct SessionManager {
    api: Arc<dyn Backend>,
    store: Arc<dyn CredentialStore>,
    state: SessionState,
    tx: watch::Sender<Option<Session>>,
}

impl SessionManager {
    pub fn new(api: Arc<dyn Backend>, store: Arc<dyn CredentialStore>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            api,
            store,
            state: SessionState::Hydrating,
            tx,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.state.session()
    }

    pub fn user(&self) -> Option<&User> {
        self.session().map(|s| &s.user)
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn api(&self) -> &Arc<dyn Backend> {
        &self.api
    }

    /// Watch the current session. `None` means nobody is logged in.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }

    fn transition(&mut self, state: SessionState) {
        debug!(
            from = state_name(&self.state),
            to = state_name(&state),
            "Session transition"
        );
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        self.tx.send_replace(self.state.session().cloned());
    }

    fn user_mut(&mut self) -> Result<&mut User, ApiError> {
        match &mut self.state {
            SessionState::Authenticated(session) => Ok(&mut session.user),
            _ => Err(ApiError::InvalidSession),
        }
    }

    /// Forget the persisted and attached token. Failures are logged only.
    fn purge_token(&self) {
        if let Err(e) = self.store.delete(TOKEN_KEY) {
            error!(error = %e, "Failed to erase stored token");
        }
        self.api.set_token(None);
    }

    /// Restore a session from the persisted token.
    ///
    /// A token the backend refuses (for any reason) is erased and never retried.
    pub async fn hydrate(&mut self) -> &SessionState {
        self.state = SessionState::Hydrating;
        info!("Attempting to restore session");

        let token = match self.store.get(TOKEN_KEY) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read stored token");
                None
            }
        };

        let Some(token) = token else {
            info!("No stored token");
            self.transition(SessionState::Unauthenticated);
            return &self.state;
        };

        self.api.set_token(Some(token.clone()));
        match self.api.fetch_current_user().await {
            Ok(user) => {
                info!(user = %user.username, "Session restored");
                self.transition(SessionState::Authenticated(Session::new(user, token)));
            }
            Err(e) => {
                warn!(error = %e, "Stored token rejected, discarding it");
                self.purge_token();
                self.transition(SessionState::Unauthenticated);
            }
        }
        &self.state
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<Session, ApiError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ApiError::InvalidInput(
                "Username and password required".to_string(),
            ));
        }

        let response = match self.api.login(username, password).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Login failed");
                return Err(e);
            }
        };

        if let Err(e) = self.store.set(TOKEN_KEY, &response.token) {
            warn!(error = %e, "Failed to persist token");
        }
        self.api.set_token(Some(response.token.clone()));

        let session = Session::new(response.user, response.token);
        info!(user = %session.user.username, "Login successful");
        self.transition(SessionState::Authenticated(session.clone()));
        Ok(session)
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, username: &str, password: &str, nickname: &str) -> Result<(), ApiError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ApiError::InvalidInput(
                "Username and password required".to_string(),
            ));
        }
        self.api.register(username, password, nickname.trim()).await?;
        info!(user = %username, "Account registered");
        Ok(())
    }

    /// Always ends Unauthenticated; telling the backend we went to sleep is
    /// best effort.
    pub async fn logout(&mut self) {
        info!("Logging out");
        if self.session().is_some() {
            if let Err(e) = self.api.update_status(Status::Asleep).await {
                error!(error = %e, "Failed to update status on logout");
            }
        }
        self.purge_token();
        self.transition(SessionState::Unauthenticated);
    }

    /// Shallow-merge fields into the current user. No-op when logged out.
    pub fn merge_user(&mut self, patch: UserPatch) -> Option<&User> {
        debug!(?patch, "Updating user data");
        let user = self.user_mut().ok()?;
        user.merge(patch);
        self.publish();
        self.user()
    }

    /// Set own status optimistically; the previous value is restored if the
    /// backend does not confirm.
    pub async fn set_status(&mut self, status: Status) -> Result<Status, ApiError> {
        let previous = std::mem::replace(&mut self.user_mut()?.status, status);
        self.publish();

        match self.api.update_status(status).await {
            Ok(()) => Ok(status),
            Err(e) => {
                error!(error = %e, "Failed to update status");
                if let Ok(user) = self.user_mut() {
                    user.status = previous;
                }
                self.publish();
                Err(e)
            }
        }
    }

    pub async fn toggle_status(&mut self) -> Result<Status, ApiError> {
        let next = self.user_mut()?.status.toggled();
        self.set_status(next).await
    }

    /// Set own mood optimistically, reverting on failure.
    pub async fn set_mood(&mut self, mood: Mood) -> Result<(), ApiError> {
        let previous = self.user_mut()?.mood.replace(mood.clone());
        self.publish();

        match self.api.update_mood(&mood).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(error = %e, "Failed to update mood");
                if let Ok(user) = self.user_mut() {
                    user.mood = previous;
                }
                self.publish();
                Err(e)
            }
        }
    }

    /// Upload a new avatar and merge the returned url. Returns the url.
    pub async fn update_avatar(&mut self, upload: AvatarUpload) -> Result<String, ApiError> {
        self.user_mut()?;
        let response = self.api.update_avatar(upload).await.map_err(|e| {
            error!(error = %e, "Failed to upload avatar");
            e
        })?;
        self.merge_user(UserPatch::avatar(response.avatar_url.clone()));
        Ok(response.avatar_url)
    }

    /// Heartbeat: tell the backend we are up. Sent on login and whenever the
    /// client comes back to the foreground.
    pub async fn confirm_awake(&self) -> Result<(), ApiError> {
        if self.session().is_none() {
            return Err(ApiError::InvalidSession);
        }
        self.api.confirm_awake().await
    }
}

fn state_name(state: &SessionState) -> &'static str {
    match state {
        SessionState::Hydrating => "hydrating",
        SessionState::Authenticated(_) => "authenticated",
        SessionState::Unauthenticated => "unauthenticated",
    }
}
