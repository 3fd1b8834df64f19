//! Presence sync engine.
//!
//! Owns the friend mirror. While a session is active it keeps one realtime
//! subscription open, applies events in arrival order, and replaces the whole
//! mirror whenever the channel cannot describe a change (new friend, reconnect).

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{ApiError, Backend};
use crate::auth::Session;
use crate::models::UserId;

use super::event::RealtimeEvent;
use super::mirror::{apply, Effect, FriendMirror, PokeNotice};
use super::subscription::Subscription;
use super::transport::Connector;
use super::RealtimeError;

/// Buffer size for pending poke notices.
/// Pokes are rare; 32 covers a burst while the consumer is busy.
const NOTICE_BUFFER_SIZE: usize = 32;

/// Reconnect schedule after the realtime channel drops.
///
/// Attempt `n` (1-based) waits `base_delay_ms * 2^(n-1)`, capped at
/// `max_delay_ms`. `max_attempts = 0` disables reconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt`, or `None` when attempts are exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Some(Duration::from_millis(delay))
    }
}

#[derive(Debug, Clone, Copy)]
struct Retry {
    attempt: u32,
    at: Instant,
}

/// Read side of the engine, handed to the presentation layer.
pub struct EngineHandles {
    /// Latest mirror snapshot.
    pub friends: watch::Receiver<FriendMirror>,
    /// One entry per received poke.
    pub notices: mpsc::Receiver<PokeNotice>,
}

pub struct SyncEngine {
    api: Arc<dyn Backend>,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    mirror: FriendMirror,
    user: Option<UserId>,
    subscription: Option<Subscription>,
    retry: Option<Retry>,
    friends_tx: watch::Sender<FriendMirror>,
    notices_tx: mpsc::Sender<PokeNotice>,
}

impl SyncEngine {
    pub fn new(
        api: Arc<dyn Backend>,
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
    ) -> (Self, EngineHandles) {
        let (friends_tx, friends) = watch::channel(FriendMirror::new());
        let (notices_tx, notices) = mpsc::channel(NOTICE_BUFFER_SIZE);
        let engine = Self {
            api,
            connector,
            policy,
            mirror: FriendMirror::new(),
            user: None,
            subscription: None,
            retry: None,
            friends_tx,
            notices_tx,
        };
        (engine, EngineHandles { friends, notices })
    }

    pub fn mirror(&self) -> &FriendMirror {
        &self.mirror
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.subscription
            .as_ref()
            .map(|s| !s.is_closed())
            .unwrap_or(false)
    }

    /// True while a reconnect attempt is scheduled.
    pub fn is_reconnecting(&self) -> bool {
        self.retry.is_some()
    }

    fn publish(&self) {
        self.friends_tx.send_replace(self.mirror.clone());
    }

    /// Bind to `session`: seed the mirror with a full fetch and open the
    /// realtime connection. Any previous connection is closed first.
    pub async fn start(&mut self, session: &Session) -> Result<(), RealtimeError> {
        self.stop();
        self.user = Some(session.user.id.clone());
        if let Err(e) = self.refetch().await {
            warn!(error = %e, "Failed to fetch friends");
        }
        self.connect().await
    }

    async fn connect(&mut self) -> Result<(), RealtimeError> {
        let Some(user_id) = self.user.clone() else {
            return Err(RealtimeError::Closed);
        };
        let subscription = self.connector.subscribe(&user_id).await?;
        self.subscription = Some(subscription);
        self.retry = None;
        Ok(())
    }

    /// Close the connection. Idempotent; no event is applied afterwards.
    /// The mirror and bound user are kept.
    pub fn disconnect(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
            debug!(user = %subscription.user_id(), "Realtime subscription closed");
        }
        self.retry = None;
    }

    /// Session ended: disconnect, forget the user and empty the mirror.
    pub fn stop(&mut self) {
        self.disconnect();
        self.user = None;
        if !self.mirror.is_empty() {
            self.mirror.clear();
            self.publish();
        }
    }

    /// Replace the whole mirror with the backend's friend list. On failure
    /// the mirror is left as it was.
    pub async fn refetch(&mut self) -> Result<(), ApiError> {
        let friends = self.api.list_friends().await?;
        debug!(count = friends.len(), "Friend list fetched");
        self.mirror.replace_all(friends);
        self.publish();
        Ok(())
    }

    /// Next event from the open subscription, `None` when there is none or it
    /// has ended.
    pub async fn next_event(&mut self) -> Option<RealtimeEvent> {
        recv(&mut self.subscription, self.user.as_ref()).await
    }

    /// Apply one event and carry out its side effect.
    pub async fn handle_event(&mut self, event: RealtimeEvent) -> Effect {
        debug!(event = event.name(), "Applying realtime event");
        let effect = apply(&mut self.mirror, event);
        match &effect {
            Effect::Updated(_) => self.publish(),
            Effect::Ignored => {}
            Effect::Notify(notice) => {
                if let Err(e) = self.notices_tx.try_send(notice.clone()) {
                    debug!(error = %e, "Dropping poke notice");
                }
            }
            Effect::Refetch => {
                if let Err(e) = self.refetch().await {
                    warn!(error = %e, "Failed to refetch friends");
                }
            }
        }
        effect
    }

    /// The subscription ended without being asked to. Schedules a reconnect
    /// if the policy allows one.
    pub fn handle_disconnect(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
        }
        if self.user.is_some() {
            warn!("Realtime channel dropped");
            self.schedule_retry(1);
        }
    }

    fn schedule_retry(&mut self, attempt: u32) {
        match self.policy.delay_for(attempt) {
            Some(delay) => {
                info!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling realtime reconnect");
                self.retry = Some(Retry {
                    attempt,
                    at: Instant::now() + delay,
                });
            }
            None => {
                warn!(attempts = attempt.saturating_sub(1), "Giving up on realtime channel");
                self.retry = None;
            }
        }
    }

    /// Reopen the connection for the bound user and resync the mirror, since
    /// deltas sent while disconnected are lost.
    pub async fn reconnect(&mut self) -> Result<(), RealtimeError> {
        self.connect().await?;
        info!("Realtime channel reconnected");
        if let Err(e) = self.refetch().await {
            warn!(error = %e, "Failed to refetch friends after reconnect");
        }
        Ok(())
    }

    async fn follow(&mut self, session: Option<Session>) {
        match session {
            Some(session) => {
                if self.user.as_ref() == Some(&session.user.id) {
                    // profile edits on the same session do not reconnect
                    return;
                }
                info!(user = %session.user.username, "Starting presence sync");
                if let Err(e) = self.start(&session).await {
                    warn!(error = %e, "Failed to open realtime channel");
                    self.schedule_retry(1);
                }
            }
            None => {
                if self.user.is_some() {
                    info!("Session ended, stopping presence sync");
                    self.stop();
                }
            }
        }
    }

    /// Drive the engine from session changes until the session source is
    /// dropped.
    pub async fn run(mut self, mut sessions: watch::Receiver<Option<Session>>) {
        let initial = sessions.borrow_and_update().clone();
        self.follow(initial).await;

        loop {
            tokio::select! {
                changed = sessions.changed() => {
                    if changed.is_err() {
                        debug!("Session source dropped");
                        break;
                    }
                    let session = sessions.borrow_and_update().clone();
                    self.follow(session).await;
                }

                event = recv(&mut self.subscription, self.user.as_ref()), if self.subscription.is_some() => {
                    match event {
                        Some(event) => {
                            self.handle_event(event).await;
                        }
                        None => self.handle_disconnect(),
                    }
                }

                _ = sleep_until(self.retry.map(|r| r.at)), if self.retry.is_some() => {
                    let attempt = self.retry.take().map(|r| r.attempt).unwrap_or(1);
                    if let Err(e) = self.reconnect().await {
                        warn!(attempt, error = %e, "Reconnect failed");
                        self.schedule_retry(attempt + 1);
                    }
                }
            }
        }

        self.stop();
        debug!("Presence sync stopped");
    }
}

/// Receive from `subscription`, refusing events from a socket that was
/// authenticated as someone other than `user`.
async fn recv(subscription: &mut Option<Subscription>, user: Option<&UserId>) -> Option<RealtimeEvent> {
    let sub = subscription.as_mut()?;
    let event = sub.next_event().await?;
    if user != Some(sub.user_id()) {
        warn!(socket_user = %sub.user_id(), "Closing subscription for a different user");
        sub.close();
        return None;
    }
    Some(event)
}

async fn sleep_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
