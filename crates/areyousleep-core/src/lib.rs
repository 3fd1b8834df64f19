//! Client core for Are You Sleep.
//!
//! Keeps an authenticated session against the backend and a live mirror of
//! which friends are awake. Front ends drive [`auth::SessionManager`] and
//! [`realtime::SyncEngine`] and render what they publish.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod notify;
pub mod realtime;
pub mod utils;

#[cfg(test)]
mod testing;

pub use api::{ApiClient, ApiError, Backend};
pub use auth::{Session, SessionManager, SessionState};
pub use config::Config;
pub use realtime::{FriendMirror, PokeNotice, ReconnectPolicy, SyncEngine, WsConnector};
