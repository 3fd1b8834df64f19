use crate::models::{Friend, Mood, PokeKind, Status};

/// Text of a received poke: sender name followed by the kind's label, ending
/// in exactly one "!".
pub fn poke_message(sender: &str, kind: PokeKind) -> String {
    let label = kind.label();
    if label.ends_with('!') {
        format!("{} {}", sender, label)
    } else {
        format!("{} {}!", sender, label)
    }
}

/// Status as shown next to a name.
pub fn status_label(status: Status) -> &'static str {
    match status {
        Status::Awake => "😴 Awake",
        Status::Asleep => "🤫 Asleep",
    }
}

/// Mood as an emoji, the raw key for moods without one, or "Not set".
pub fn mood_display(mood: Option<&Mood>) -> String {
    match mood {
        Some(mood) => match mood.emoji() {
            Some(emoji) => emoji.to_string(),
            None => mood.key().to_string(),
        },
        None => "Not set".to_string(),
    }
}

/// One line per friend, e.g. `BEN (ben)  🤫 Asleep  📚`
pub fn friend_line(friend: &Friend) -> String {
    let name = match &friend.nickname {
        Some(nickname) if !nickname.is_empty() && nickname != &friend.username => {
            format!("{} ({})", nickname, friend.username)
        }
        _ => friend.username.clone(),
    };
    format!(
        "{}  {}  {}",
        name,
        status_label(friend.status),
        mood_display(friend.mood.as_ref())
    )
}

/// Resolve an avatar path returned by the backend against the server root.
/// Absolute URLs pass through.
pub fn avatar_url(server_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        server_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
