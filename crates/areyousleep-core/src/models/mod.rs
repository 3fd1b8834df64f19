//! Data models for Are You Sleep entities.
//!
//! This module contains the data structures exchanged with the backend:
//!
//! - `User`, `UserPatch`, `UserSummary`: the logged-in profile and search results
//! - `Status`, `Mood`: presence fields shared by users and friends
//! - `Friend`, `FriendRequest`: the friend graph as seen by the client
//! - `PokeKind`: the fixed table of poke kinds

pub mod id;
pub mod social;
pub mod user;

pub use id::{Id, RequestId, UserId};
pub use social::{ActionAck, Friend, FriendRequest, PokeKind, RequestStatus};
pub use user::{AvatarResponse, AvatarUpload, LoginResponse, Mood, Status, User, UserPatch, UserSummary};
