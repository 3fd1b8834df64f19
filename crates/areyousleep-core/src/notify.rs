//! Push-notification token forwarding.
//!
//! Obtaining a device token is platform specific, so it sits behind
//! [`PushRegistrar`]. Whatever token comes back is handed to the backend once
//! per login.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::api::{ApiError, Backend};

#[async_trait]
pub trait PushRegistrar: Send + Sync {
    /// A device token, `Ok(None)` when the platform has none to give, or
    /// `ApiError::PermissionDenied` when the user refused notifications.
    async fn obtain_token(&self) -> Result<Option<String>, ApiError>;
}

/// Registrar for hosts without push support.
pub struct NoPush;

#[async_trait]
impl PushRegistrar for NoPush {
    async fn obtain_token(&self) -> Result<Option<String>, ApiError> {
        Ok(None)
    }
}

/// What became of a push-token forwarding attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// A token was obtained and registered with the backend.
    Forwarded,
    /// The platform had no token to give.
    NoToken,
    /// The user refused notifications.
    Denied(String),
}

/// Obtain a token and register it with the backend.
///
/// A refused permission is not an error; it comes back as
/// [`PushOutcome::Denied`] so the caller can tell the user.
pub async fn forward_push_token(
    registrar: &dyn PushRegistrar,
    backend: &dyn Backend,
) -> Result<PushOutcome, ApiError> {
    let token = match registrar.obtain_token().await {
        Ok(Some(token)) if !token.is_empty() => token,
        Ok(_) => {
            debug!("No push token available");
            return Ok(PushOutcome::NoToken);
        }
        Err(ApiError::PermissionDenied(reason)) => {
            debug!(%reason, "Push notifications not permitted");
            return Ok(PushOutcome::Denied(reason));
        }
        Err(e) => return Err(e),
    };

    backend.register_push_token(&token).await?;
    info!("Push token registered");
    Ok(PushOutcome::Forwarded)
}
