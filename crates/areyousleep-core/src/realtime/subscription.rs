use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::models::UserId;

use super::event::RealtimeEvent;

/// Default queue depth between a transport and its subscription.
pub const EVENT_BUFFER_SIZE: usize = 64;

/// A live, cancellable sequence of events for one authenticated user.
///
/// Closing is idempotent. Once closed, queued events are discarded and the
/// transport behind the subscription is told to shut down.
pub struct Subscription {
    user_id: UserId,
    rx: mpsc::Receiver<RealtimeEvent>,
    shutdown: CancellationToken,
    closed: bool,
}

impl Subscription {
    pub fn new(user_id: UserId, rx: mpsc::Receiver<RealtimeEvent>, shutdown: CancellationToken) -> Self {
        Self {
            user_id,
            rx,
            shutdown,
            closed: false,
        }
    }

    /// A subscription fed by hand. The returned token is cancelled when the
    /// subscription closes.
    pub fn channel(user_id: UserId) -> (mpsc::Sender<RealtimeEvent>, CancellationToken, Self) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER_SIZE);
        let shutdown = CancellationToken::new();
        let subscription = Self::new(user_id, rx, shutdown.clone());
        (tx, shutdown, subscription)
    }

    /// The user this socket authenticated as.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.shutdown.cancel();
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }

    /// Next event in arrival order, or `None` once the subscription is closed
    /// or the transport has gone away.
    pub async fn next_event(&mut self) -> Option<RealtimeEvent> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = RealtimeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.closed {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
