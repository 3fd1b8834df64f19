//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `SessionManager`: the authentication state machine (hydrate, login, logout)
//! - `CredentialStore`: where the bearer token is persisted between runs

pub mod credentials;
pub mod session;

pub use credentials::{
    open_store, CredentialBackend, CredentialStore, FileStore, KeyringStore, MemoryStore, TOKEN_KEY,
};
pub use session::{Session, SessionManager, SessionState};
