//! dmreg: a local-first direct-message thread registry.
//!
//! **One canonical private thread per unordered pair of users.** Only the two
//! participants can see or resolve it, and asking to start a conversation
//! with the same person twice (from either side, concurrently or not) always
//! lands on the same thread.
//!
//! # Architecture
//!
//! ## The store seam
//!
//! Registry logic is written against [`core::store::ThreadStore`], a typed
//! index interface with one transactional unit (`create_pair_thread`). Two
//! backends ship:
//!
//! - [`core::sqlite_store::SqliteStore`]: WAL-mode SQLite; duplicate creation
//!   is stopped by `UNIQUE(user_low, user_high)` on the threads table
//! - [`core::memory_store::MemoryStore`]: mutex-guarded maps, used in tests
//!
//! ## Request path
//!
//! Every command resolves its caller through an
//! [`plugins::dm::auth::AuthGate`], runs one unit of work, and is recorded by
//! the [`core::broker::DbBroker`] in `.dmreg/broker.events.jsonl`.
//!
//! # Examples
//!
//! ```bash
//! dmreg init
//! dmreg user add alice
//! dmreg user add bob
//! dmreg --as alice dm create bob
//! dmreg --as bob dm list --format json
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: errors, config, logging, SQLite plumbing, the store seam
//! - [`plugins`]: the `dm` registry and the `user` directory surface

mod cli;
pub mod core;
pub mod plugins;

use crate::cli::{Cli, Command};
use crate::core::broker::DbBroker;
use crate::core::config::{self, RegistryConfig};
use crate::core::error::DmregError;
use crate::core::sqlite_store::SqliteStore;
use crate::core::{db, logging};
use crate::plugins::dm::auth::{DirectoryAuth, Request};
use crate::plugins::dm::{self, ThreadRegistry};
use crate::plugins::users;

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directory under the project root that holds all registry state.
pub const STORE_DIR: &str = ".dmreg";
/// Environment variable naming the calling user when `--as` is absent.
pub const USER_ENV: &str = "DMREG_USER";

fn find_store_root(start_dir: &Path) -> Result<PathBuf, DmregError> {
    let mut current_dir = PathBuf::from(start_dir);
    loop {
        let candidate = current_dir.join(STORE_DIR);
        if candidate.is_dir() {
            return Ok(candidate);
        }
        if !current_dir.pop() {
            return Err(DmregError::ConfigError(
                "'.dmreg' directory not found in current or parent directories. Run `dmreg init` first.".to_string(),
            ));
        }
    }
}

/// Create the store directory, default config, and database. Safe to re-run.
pub fn init_store(store_root: &Path) -> Result<RegistryConfig, DmregError> {
    std::fs::create_dir_all(store_root)?;
    config::write_default_config(store_root)?;
    let cfg = config::load_config(store_root)?;
    db::initialize_registry_db(
        &db::registry_db_path(store_root, &cfg.db_name),
        cfg.busy_timeout_secs,
    )?;
    Ok(cfg)
}

/// Open the SQLite-backed store for an initialized store root.
pub fn open_store(store_root: &Path) -> Result<(RegistryConfig, Arc<SqliteStore>), DmregError> {
    let cfg = config::load_config(store_root)?;
    let store = SqliteStore::open(
        &db::registry_db_path(store_root, &cfg.db_name),
        cfg.busy_timeout_secs,
    )?;
    Ok((cfg, Arc::new(store)))
}

fn schema_document() -> serde_json::Value {
    serde_json::json!({
        "name": "dmreg",
        "version": env!("CARGO_PKG_VERSION"),
        "subsystems": [dm::schema(), users::schema()]
    })
}

pub fn run() -> Result<(), DmregError> {
    let Cli {
        root,
        as_user,
        command,
    } = Cli::parse();
    let current_dir = std::env::current_dir()?;

    match command {
        Command::Version => {
            println!("v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Schema => {
            let doc = serde_json::to_string_pretty(&schema_document())
                .map_err(|e| DmregError::ValidationError(e.to_string()))?;
            println!("{}", doc);
            Ok(())
        }
        Command::Init => {
            let store_root = root.unwrap_or(current_dir).join(STORE_DIR);
            let cfg = init_store(&store_root)?;
            logging::init_logging(cfg.log_format)?;
            tracing::info!(root = %store_root.display(), "initialized store");
            println!("Registry initialized at {}", store_root.display());
            Ok(())
        }
        Command::User(user_cli) => {
            let store_root = resolve_store_root(root, &current_dir)?;
            let (cfg, store) = open_store(&store_root)?;
            logging::init_logging(cfg.log_format)?;
            let request = caller_request(as_user);
            let auth = DirectoryAuth::new(Arc::clone(&store));
            let broker = DbBroker::new(&store_root, &cfg.db_name);
            let op = user_cli.command.op_name();
            broker.audited(actor(&request), op, || {
                users::run_user_cli(store.as_ref(), &auth, &request, user_cli)
            })
        }
        Command::Dm(dm_cli) => {
            let store_root = resolve_store_root(root, &current_dir)?;
            let (cfg, store) = open_store(&store_root)?;
            logging::init_logging(cfg.log_format)?;
            let request = caller_request(as_user);
            let registry = ThreadRegistry::new(Arc::clone(&store), DirectoryAuth::new(store))
                .with_config(&cfg);
            let broker = DbBroker::new(&store_root, &cfg.db_name);
            let op = dm_cli.command.op_name();
            broker.audited(actor(&request), op, || {
                dm::run_dm_cli(&registry, &request, dm_cli)
            })
        }
    }
}

fn resolve_store_root(root: Option<PathBuf>, current_dir: &Path) -> Result<PathBuf, DmregError> {
    match root {
        Some(project) => {
            let store_root = project.join(STORE_DIR);
            if store_root.is_dir() {
                Ok(store_root)
            } else {
                Err(DmregError::ConfigError(format!(
                    "{} does not exist. Run `dmreg init --root {}` first.",
                    store_root.display(),
                    project.display()
                )))
            }
        }
        None => find_store_root(current_dir),
    }
}

fn caller_request(as_user: Option<String>) -> Request {
    match as_user.or_else(|| std::env::var(USER_ENV).ok()) {
        Some(name) => Request::as_user(name),
        None => Request::anonymous(),
    }
}

fn actor(request: &Request) -> &str {
    request.principal().unwrap_or("anonymous")
}
