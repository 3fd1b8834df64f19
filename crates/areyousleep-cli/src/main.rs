//! Are You Sleep - terminal client.
//!
//! Share whether you are awake or asleep with friends, poke the ones who are
//! up, and watch their status change live.

mod commands;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use areyousleep_core::auth::open_store;
use areyousleep_core::models::{PokeKind, Status};
use areyousleep_core::{ApiClient, Backend, Config, SessionManager};

const USAGE: &str = "\
Usage: ays <command> [args]

Account:
  login [username]              Log in (password is prompted)
  register <username> [nick]    Create an account
  logout                        Log out and mark yourself asleep
  whoami                        Show your profile

Status:
  status [awake|asleep|toggle]  Show or change your status
  mood <mood>                   Set your mood (happy, studying, gaming, working, chilling)
  avatar <image>                Upload a new avatar

Friends:
  friends                       List friends and their status
  requests                      List pending friend requests
  search <username>             Find users
  add <user-id>                 Send a friend request
  accept <request-id>           Accept a friend request
  poke <user-id> [kind]         Poke an awake friend (default, coffee, sleep, wake_up)
  watch                         Follow friends live until Ctrl-C

Environment:
  AYS_API_URL                   Backend address (default http://localhost:3001)
  RUST_LOG                      Log filter (default warn)";

/// A parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login { username: Option<String> },
    Register { username: String, nickname: Option<String> },
    Logout,
    WhoAmI,
    Status(Option<StatusChange>),
    Mood(String),
    Avatar(String),
    Friends,
    Requests,
    Search(String),
    Add(String),
    Accept(String),
    Poke { user_id: String, kind: PokeKind },
    Watch,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusChange {
    Set(Status),
    Toggle,
}

fn parse_args(args: &[String]) -> Result<Command> {
    let Some(name) = args.first() else {
        return Ok(Command::Help);
    };
    let arg = |i: usize, what: &str| -> Result<String> {
        args.get(i)
            .cloned()
            .with_context(|| format!("`{}` needs {}", name, what))
    };

    let command = match name.as_str() {
        "login" => Command::Login {
            username: args.get(1).cloned(),
        },
        "register" => Command::Register {
            username: arg(1, "a username")?,
            nickname: args.get(2).cloned(),
        },
        "logout" => Command::Logout,
        "whoami" => Command::WhoAmI,
        "status" => Command::Status(match args.get(1).map(String::as_str) {
            None => None,
            Some("toggle") => Some(StatusChange::Toggle),
            Some(value) => Some(StatusChange::Set(
                value.parse().map_err(|e| anyhow::anyhow!("{}", e))?,
            )),
        }),
        "mood" => Command::Mood(arg(1, "a mood")?),
        "avatar" => Command::Avatar(arg(1, "an image path")?),
        "friends" => Command::Friends,
        "requests" => Command::Requests,
        "search" => Command::Search(arg(1, "a username")?),
        "add" => Command::Add(arg(1, "a user id")?),
        "accept" => Command::Accept(arg(1, "a request id")?),
        "poke" => {
            let user_id = arg(1, "a user id")?;
            let kind = match args.get(2) {
                Some(key) => match PokeKind::from_key(key) {
                    Some(kind) => kind,
                    None => bail!("Unknown poke kind '{}'", key),
                },
                None => PokeKind::Default,
            };
            Command::Poke { user_id, kind }
        }
        "watch" => Command::Watch,
        "help" | "-h" | "--help" => Command::Help,
        other => bail!("Unknown command '{}'", other),
    };
    Ok(command)
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // RUST_LOG controls the level (e.g. RUST_LOG=areyousleep_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(Command::Help) => {
            println!("{}", USAGE);
            return Ok(());
        }
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let config = Config::load().context("Failed to load configuration")?;
    info!(api_url = %config.api_url, ?command, "ays starting");

    let cache_dir = config.cache_dir()?;
    let store = open_store(config.credential_backend, &cache_dir);
    let api: Arc<dyn Backend> = Arc::new(ApiClient::new(
        &config.api_url,
        Duration::from_secs(config.request_timeout_secs),
    )?);
    let mut session = SessionManager::new(api, store);
    session.hydrate().await;

    let mut ctx = commands::Context { config, session };
    if let Err(e) = commands::run(&mut ctx, command).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
