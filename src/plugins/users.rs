//! Users plugin: the local stand-in for the identity directory.
//!
//! In a full deployment users come from an external identity subsystem and
//! are read-only here. Locally, `dmreg user add` seeds the directory so the
//! registry has someone to resolve.

use crate::core::error::DmregError;
use crate::core::store::{ThreadStore, User};
use crate::core::time;
use crate::plugins::dm::auth::{AuthGate, Request};
use crate::plugins::dm::view::OtherUser;
use colored::Colorize;
use regex::Regex;
use std::sync::OnceLock;

fn username_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]{1,32}$").expect("valid username regex"))
}

pub fn validate_username(username: &str) -> Result<(), DmregError> {
    if username_re().is_match(username) {
        Ok(())
    } else {
        Err(DmregError::ValidationError(format!(
            "invalid username {:?}: use 1-32 of [A-Za-z0-9_.-]",
            username
        )))
    }
}

pub fn register_user<S: ThreadStore + ?Sized>(
    store: &S,
    username: &str,
    image: Option<&str>,
) -> Result<User, DmregError> {
    validate_username(username)?;
    let user = store.insert_user(username, image)?;
    tracing::info!(user = %user.id, username = %user.username, "registered user");
    Ok(user)
}

/// Public profile of a user by username.
pub fn lookup<S: ThreadStore + ?Sized>(store: &S, username: &str) -> Result<OtherUser, DmregError> {
    store
        .user_by_username(username)?
        .map(OtherUser::from)
        .ok_or_else(|| DmregError::UserNotFound(username.to_string()))
}

/// The caller's own record, as the auth gate resolves it.
pub fn whoami<A: AuthGate + ?Sized>(auth: &A, request: &Request) -> Result<User, DmregError> {
    auth.current_user(request)
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "user",
        "version": "0.1.0",
        "description": "Local user directory used to resolve callers and message targets",
        "commands": [
            { "name": "add", "description": "Register a user", "parameters": ["username", "image?"] },
            { "name": "whoami", "description": "Show the calling user" },
            { "name": "get", "description": "Show a user's public profile", "parameters": ["username"] }
        ],
        "storage": ["dmreg.db"]
    })
}

// CLI types for clap integration
#[derive(clap::Args, Debug)]
pub struct UserCli {
    #[clap(subcommand)]
    pub command: UserCommand,
}

#[derive(clap::Subcommand, Debug)]
pub enum UserCommand {
    /// Register a user
    Add {
        /// Unique username
        username: String,
        /// Profile image URL
        #[clap(long)]
        image: Option<String>,
        /// Output format: 'text' or 'json'
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Show the calling user
    Whoami {
        /// Output format: 'text' or 'json'
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Show a user's public profile
    Get {
        /// Username to look up
        username: String,
        /// Output format: 'text' or 'json'
        #[clap(long, default_value = "text")]
        format: String,
    },
}

impl UserCommand {
    pub fn op_name(&self) -> &'static str {
        match self {
            UserCommand::Add { .. } => "user.add",
            UserCommand::Whoami { .. } => "user.whoami",
            UserCommand::Get { .. } => "user.get",
        }
    }

    fn format(&self) -> &str {
        match self {
            UserCommand::Add { format, .. }
            | UserCommand::Whoami { format }
            | UserCommand::Get { format, .. } => format,
        }
    }
}

fn emit(cmd: &str, json: bool, key: &str, value: serde_json::Value, text: String) {
    if json {
        let envelope = time::command_envelope(cmd, "ok", serde_json::json!({ (key): value }));
        println!(
            "{}",
            serde_json::to_string_pretty(&envelope).unwrap_or_else(|_| envelope.to_string())
        );
    } else {
        println!("{}", text);
    }
}

fn profile_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, DmregError> {
    serde_json::to_value(value).map_err(|e| DmregError::ValidationError(format!("json encode: {e}")))
}

pub fn run_user_cli<S: ThreadStore + ?Sized, A: AuthGate + ?Sized>(
    store: &S,
    auth: &A,
    request: &Request,
    cli: UserCli,
) -> Result<(), DmregError> {
    let op = cli.command.op_name();
    let json = cli.command.format() == "json";

    let result = dispatch(store, auth, request, cli.command, op);
    if let (true, Err(e)) = (json, &result) {
        let envelope = time::error_envelope(op, e);
        println!(
            "{}",
            serde_json::to_string_pretty(&envelope).unwrap_or_else(|_| envelope.to_string())
        );
    }
    result
}

fn dispatch<S: ThreadStore + ?Sized, A: AuthGate + ?Sized>(
    store: &S,
    auth: &A,
    request: &Request,
    command: UserCommand,
    op: &str,
) -> Result<(), DmregError> {
    match command {
        UserCommand::Add {
            username,
            image,
            format,
        } => {
            let user = register_user(store, &username, image.as_deref())?;
            let text = format!("{} {} (id: {})", "✓ Registered".green(), user.username, user.id);
            emit(op, format == "json", "user", profile_json(&user)?, text);
        }
        UserCommand::Whoami { format } => {
            let user = whoami(auth, request)?;
            let text = format!("{} (id: {})", user.username.bold(), user.id);
            emit(op, format == "json", "user", profile_json(&user)?, text);
        }
        UserCommand::Get { username, format } => {
            let profile = lookup(store, &username)?;
            let text = format!(
                "{} (id: {}) image: {}",
                profile.username.bold(),
                profile.id,
                profile.profile_image.as_deref().unwrap_or("-")
            );
            emit(op, format == "json", "user", profile_json(&profile)?, text);
        }
    }
    Ok(())
}
