//! Display helpers shared by front ends.

pub mod format;

pub use format::{avatar_url, friend_line, mood_display, poke_message, status_label, truncate_string};
