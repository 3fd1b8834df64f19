//! Realtime presence sync.
//!
//! One connection per authenticated session carries presence deltas
//! (`statusChanged`, `moodChanged`), pokes and friend-request acceptances.
//! The full friend list is only ever obtained over HTTP; the channel never
//! sends a snapshot.
//!
//! - `codec`: Engine.IO / Socket.IO text framing
//! - `event`: typed events and the authenticate packet
//! - `mirror`: the friend presence mirror and its pure reducer
//! - `subscription`: cancellable event stream for one user
//! - `transport`: the WebSocket connector
//! - `engine`: ties the above to the session lifecycle

pub mod codec;
pub mod engine;
pub mod event;
pub mod mirror;
pub mod subscription;
pub mod transport;

use thiserror::Error;

pub use engine::{EngineHandles, ReconnectPolicy, SyncEngine};
pub use event::{PokeSender, RealtimeEvent};
pub use mirror::{apply, Effect, FriendMirror, PokeNotice};
pub use subscription::Subscription;
pub use transport::{Connector, WsConnector};

#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection closed")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;
        match err {
            Error::ConnectionClosed | Error::AlreadyClosed => RealtimeError::Closed,
            other => RealtimeError::Connect(other.to_string()),
        }
    }
}
