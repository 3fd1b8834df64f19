//! Local mirror of friend presence and the reducer that applies realtime
//! events to it.
//!
//! The reducer is pure: it never performs I/O. Events that need the backend
//! (a newly accepted friend) are reported back as [`Effect::Refetch`].

use chrono::{DateTime, Utc};

use crate::models::{Friend, PokeKind, UserId};
use crate::utils::format::poke_message;

use super::event::{PokeSender, RealtimeEvent};

/// Friend presence records keyed by user id, in the order the backend
/// listed them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FriendMirror {
    friends: Vec<Friend>,
}

impl FriendMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_friends(friends: Vec<Friend>) -> Self {
        let mut mirror = Self::new();
        mirror.replace_all(friends);
        mirror
    }

    /// Replace every record. A later duplicate id overwrites the earlier one
    /// in place, so ids stay unique.
    pub fn replace_all(&mut self, friends: Vec<Friend>) {
        self.friends.clear();
        for friend in friends {
            match self.get_mut(&friend.id) {
                Some(existing) => *existing = friend,
                None => self.friends.push(friend),
            }
        }
    }

    pub fn clear(&mut self) {
        self.friends.clear();
    }

    pub fn get(&self, id: &UserId) -> Option<&Friend> {
        self.friends.iter().find(|f| &f.id == id)
    }

    fn get_mut(&mut self, id: &UserId) -> Option<&mut Friend> {
        self.friends.iter_mut().find(|f| &f.id == id)
    }

    pub fn friends(&self) -> &[Friend] {
        &self.friends
    }

    pub fn len(&self) -> usize {
        self.friends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.friends.is_empty()
    }

    pub fn awake_count(&self) -> usize {
        self.friends.iter().filter(|f| f.can_be_poked()).count()
    }
}

/// A poke to surface once as a transient notification.
#[derive(Debug, Clone, PartialEq)]
pub struct PokeNotice {
    pub from: PokeSender,
    pub kind: PokeKind,
    pub message: String,
    pub received_at: DateTime<Utc>,
}

impl PokeNotice {
    pub const TITLE: &'static str = "Poke!";

    pub fn new(from: PokeSender, kind: Option<&str>) -> Self {
        let kind = PokeKind::resolve(kind);
        let message = poke_message(from.display_name(), kind);
        Self {
            from,
            kind,
            message,
            received_at: Utc::now(),
        }
    }
}

/// What applying an event did.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// A record changed.
    Updated(UserId),
    /// The event referenced an unknown friend or changed nothing.
    Ignored,
    /// Not a mirror change: show this to the user once.
    Notify(PokeNotice),
    /// The mirror must be replaced by a full friend-list fetch.
    Refetch,
}

/// Apply one event. Fields are overwritten, so for each field the last event
/// received wins.
pub fn apply(mirror: &mut FriendMirror, event: RealtimeEvent) -> Effect {
    match event {
        RealtimeEvent::StatusChanged { user_id, status } => match mirror.get_mut(&user_id) {
            Some(friend) => {
                friend.status = status;
                Effect::Updated(user_id)
            }
            None => Effect::Ignored,
        },
        RealtimeEvent::MoodChanged { user_id, mood } => match mirror.get_mut(&user_id) {
            Some(friend) => {
                friend.mood = mood;
                Effect::Updated(user_id)
            }
            None => Effect::Ignored,
        },
        RealtimeEvent::Poke { from, kind } => Effect::Notify(PokeNotice::new(from, kind.as_deref())),
        RealtimeEvent::FriendRequestAccepted => Effect::Refetch,
    }
}
