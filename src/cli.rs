//! CLI struct definitions for the dmreg command-line interface.
//!
//! All clap-derived top-level types live here. Subsystem command trees live
//! next to their subsystem (`plugins::dm::DmCli`, `plugins::users::UserCli`).

use crate::plugins::{dm, users};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "dmreg",
    version = env!("CARGO_PKG_VERSION"),
    about = "Direct-message thread registry: one private thread per pair of users."
)]
pub(crate) struct Cli {
    /// Project directory holding `.dmreg/` (default: search upward from cwd)
    #[clap(long, global = true)]
    pub root: Option<PathBuf>,
    /// Act as this user (default: $DMREG_USER)
    #[clap(long = "as", global = true, value_name = "USERNAME")]
    pub as_user: Option<String>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Create `.dmreg/` with a database and default config
    Init,
    /// Manage the local user directory
    User(users::UserCli),
    /// Direct-message threads
    Dm(dm::DmCli),
    /// Print the JSON command schema
    Schema,
    /// Print the version
    Version,
}
