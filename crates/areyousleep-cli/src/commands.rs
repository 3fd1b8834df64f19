//! Command handlers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use tokio::sync::watch;
use tracing::{debug, warn};

use areyousleep_core::auth::Session;
use areyousleep_core::models::{AvatarUpload, Mood, PokeKind, RequestId, UserId};
use areyousleep_core::notify::{forward_push_token, NoPush, PushOutcome};
use areyousleep_core::realtime::{EngineHandles, FriendMirror, PokeNotice};
use areyousleep_core::utils::{avatar_url, friend_line, mood_display, status_label, truncate_string};
use areyousleep_core::{Backend as _, Config, SessionManager, SyncEngine, WsConnector};

use crate::{Command, StatusChange};

/// How long `watch` waits for the sync engine to wind down on exit.
const SHUTDOWN_TIMEOUT_SECS: u64 = 2;

/// Longest nickname shown in search results.
const NICKNAME_WIDTH: usize = 24;

pub struct Context {
    pub config: Config,
    pub session: SessionManager,
}

impl Context {
    fn require_session(&self) -> Result<&Session> {
        match self.session.session() {
            Some(session) => Ok(session),
            None => bail!("Not logged in. Run `ays login` first."),
        }
    }
}

pub async fn run(ctx: &mut Context, command: Command) -> Result<()> {
    match command {
        Command::Login { username } => login(ctx, username).await,
        Command::Register { username, nickname } => register(ctx, &username, nickname).await,
        Command::Logout => logout(ctx).await,
        Command::WhoAmI => whoami(ctx),
        Command::Status(change) => status(ctx, change).await,
        Command::Mood(mood) => set_mood(ctx, &mood).await,
        Command::Avatar(path) => avatar(ctx, Path::new(&path)).await,
        Command::Friends => friends(ctx).await,
        Command::Requests => requests(ctx).await,
        Command::Search(query) => search(ctx, &query).await,
        Command::Add(id) => add(ctx, &id).await,
        Command::Accept(id) => accept(ctx, &id).await,
        Command::Poke { user_id, kind } => poke(ctx, &user_id, kind).await,
        Command::Watch => watch_friends(ctx).await,
        Command::Help => Ok(()),
    }
}

fn prompt(label: &str, default: Option<&str>) -> Result<String> {
    use std::io::Write;

    match default {
        Some(default) => print!("{} [{}]: ", label, default),
        None => print!("{}: ", label),
    }
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let line = line.trim();
    Ok(match (line.is_empty(), default) {
        (true, Some(default)) => default.to_string(),
        _ => line.to_string(),
    })
}

async fn login(ctx: &mut Context, username: Option<String>) -> Result<()> {
    let username = match username {
        Some(username) => username,
        None => prompt("Username", ctx.config.last_username.as_deref())?,
    };
    let password = rpassword::prompt_password("Password: ")?;

    let session = ctx.session.login(&username, &password).await?;
    println!("Logged in as {}", session.user.username);

    ctx.config.last_username = Some(session.user.username.clone());
    if let Err(e) = ctx.config.save() {
        warn!(error = %e, "Failed to save config");
    }

    if let Err(e) = ctx.session.confirm_awake().await {
        warn!(error = %e, "Failed to confirm awake");
    }
    match forward_push_token(&NoPush, &**ctx.session.api()).await {
        Ok(PushOutcome::Forwarded) => debug!("Push token forwarded"),
        Ok(PushOutcome::NoToken) => {}
        Ok(PushOutcome::Denied(reason)) => {
            warn!(%reason, "Push notifications not permitted");
            println!("Notifications are off: {}", reason);
        }
        Err(e) => warn!(error = %e, "Failed to register push token"),
    }
    Ok(())
}

async fn register(ctx: &mut Context, username: &str, nickname: Option<String>) -> Result<()> {
    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    let nickname = nickname.unwrap_or_else(|| username.to_string());

    ctx.session.register(username, &password, &nickname).await?;
    println!("Account created. Run `ays login {}` to sign in.", username);
    Ok(())
}

async fn logout(ctx: &mut Context) -> Result<()> {
    let was_logged_in = ctx.session.session().is_some();
    ctx.session.logout().await;
    if was_logged_in {
        println!("Logged out. Good night.");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

fn whoami(ctx: &Context) -> Result<()> {
    let session = ctx.require_session()?;
    let user = &session.user;

    println!("{} (id {})", user.username, user.id);
    if let Some(nickname) = &user.nickname {
        println!("  Nickname: {}", nickname);
    }
    println!("  Status:   {}", status_label(user.status));
    println!("  Mood:     {}", mood_display(user.mood.as_ref()));
    if let Some(path) = &user.avatar_url {
        println!("  Avatar:   {}", avatar_url(&ctx.config.api_url, path));
    }
    println!(
        "  Since:    {}",
        session.established_at.format("%Y-%m-%d %H:%M")
    );
    Ok(())
}

async fn status(ctx: &mut Context, change: Option<StatusChange>) -> Result<()> {
    ctx.require_session()?;
    let status = match change {
        None => match ctx.session.user() {
            Some(user) => user.status,
            None => bail!("Not logged in"),
        },
        Some(StatusChange::Toggle) => ctx.session.toggle_status().await?,
        Some(StatusChange::Set(status)) => ctx.session.set_status(status).await?,
    };
    println!("{}", status_label(status));
    Ok(())
}

async fn set_mood(ctx: &mut Context, value: &str) -> Result<()> {
    ctx.require_session()?;
    let mood = Mood::from(value.trim().to_lowercase());
    if let Mood::Other(other) = &mood {
        bail!(
            "Unknown mood '{}'. Choose one of: {}",
            other,
            Mood::KNOWN
                .iter()
                .map(|m| m.key())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    ctx.session.set_mood(mood.clone()).await?;
    println!("Mood set to {} {}", mood_display(Some(&mood)), mood.label());
    Ok(())
}

async fn avatar(ctx: &mut Context, path: &Path) -> Result<()> {
    let user_id = ctx.require_session()?.user.id.clone();
    let upload = AvatarUpload::from_path(&user_id, path)?;
    let url = ctx.session.update_avatar(upload).await?;
    println!("Avatar updated: {}", avatar_url(&ctx.config.api_url, &url));
    Ok(())
}

async fn friends(ctx: &Context) -> Result<()> {
    ctx.require_session()?;
    let friends = ctx.session.api().list_friends().await?;
    print_roster(&FriendMirror::from_friends(friends));
    Ok(())
}

async fn requests(ctx: &Context) -> Result<()> {
    ctx.require_session()?;
    let requests = ctx.session.api().list_friend_requests().await?;
    if requests.is_empty() {
        println!("No pending friend requests.");
        return Ok(());
    }
    for request in requests {
        println!("#{}  {}", request.id, request.display_name());
    }
    Ok(())
}

async fn search(ctx: &Context, query: &str) -> Result<()> {
    ctx.require_session()?;
    let query = query.trim();
    if query.is_empty() {
        bail!("Search needs a username");
    }
    let users = ctx.session.api().search_users(query).await?;
    if users.is_empty() {
        println!("No users found.");
        return Ok(());
    }
    for user in users {
        match &user.nickname {
            Some(nickname) => println!(
                "{:>6}  {}  ({})",
                user.id,
                user.username,
                truncate_string(nickname, NICKNAME_WIDTH)
            ),
            None => println!("{:>6}  {}", user.id, user.username),
        }
    }
    Ok(())
}

async fn add(ctx: &Context, id: &str) -> Result<()> {
    ctx.require_session()?;
    let ack = ctx
        .session
        .api()
        .send_friend_request(&UserId::new(id))
        .await?;
    println!("{}", ack.message.as_deref().unwrap_or("Friend request sent"));
    Ok(())
}

async fn accept(ctx: &Context, id: &str) -> Result<()> {
    ctx.require_session()?;
    let ack = ctx
        .session
        .api()
        .accept_friend_request(&RequestId::new(id.trim_start_matches('#')))
        .await?;
    println!("{}", ack.message.as_deref().unwrap_or("Friend request accepted"));
    Ok(())
}

async fn poke(ctx: &Context, id: &str, kind: PokeKind) -> Result<()> {
    ctx.require_session()?;
    let api = ctx.session.api();
    let user_id = UserId::new(id);

    let friends = api.list_friends().await?;
    let Some(friend) = friends.iter().find(|f| f.id == user_id) else {
        bail!("User {} is not in your friends list", id);
    };
    if !friend.can_be_poked() {
        bail!("{} is asleep", friend.display_name());
    }

    let ack = api.poke(&user_id, kind).await?;
    println!(
        "{} {}",
        kind.emoji(),
        ack.message
            .unwrap_or_else(|| format!("Poked {}", friend.display_name()))
    );
    Ok(())
}

fn print_roster(mirror: &FriendMirror) {
    if mirror.is_empty() {
        println!("No friends yet. Try `ays search <username>`.");
        return;
    }
    println!("{} of {} friends awake", mirror.awake_count(), mirror.len());
    for friend in mirror.friends() {
        println!("  {:>6}  {}", friend.id, friend_line(friend));
    }
}

fn print_notice(notice: &PokeNotice) {
    println!(
        "{} {} {}  ({})",
        PokeNotice::TITLE,
        notice.kind.emoji(),
        notice.message,
        notice.received_at.format("%H:%M:%S")
    );
}

async fn watch_friends(ctx: &mut Context) -> Result<()> {
    ctx.require_session()?;
    if let Err(e) = ctx.session.confirm_awake().await {
        warn!(error = %e, "Failed to confirm awake");
    }

    let connector = Arc::new(WsConnector::new(&ctx.config.api_url)?);
    let (engine, handles) = SyncEngine::new(
        Arc::clone(ctx.session.api()),
        connector,
        ctx.config.reconnect,
    );

    // The engine follows its own copy of the session so it stops on exit
    // without logging the user out.
    let (session_tx, session_rx) = watch::channel(ctx.session.session().cloned());
    let task = tokio::spawn(engine.run(session_rx));

    println!("Watching friends. Press Ctrl-C to stop.");
    let result = follow(handles).await;

    drop(session_tx);
    match tokio::time::timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), task).await {
        Ok(Ok(())) => debug!("Sync engine stopped"),
        Ok(Err(e)) => warn!(error = %e, "Sync engine task failed"),
        Err(_) => warn!("Sync engine did not stop in time"),
    }
    result
}

async fn follow(handles: EngineHandles) -> Result<()> {
    let EngineHandles {
        mut friends,
        mut notices,
    } = handles;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                println!();
                return Ok(());
            }
            changed = friends.changed() => {
                if changed.is_err() {
                    bail!("Sync engine stopped unexpectedly");
                }
                let mirror = friends.borrow_and_update().clone();
                print_roster(&mirror);
            }
            Some(notice) = notices.recv() => print_notice(&notice),
        }
    }
}
