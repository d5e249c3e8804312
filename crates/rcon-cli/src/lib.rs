//! # rcon-cli
//!
//! `rconctl`, a command-line client for game server consoles.
//!
//! Every command runs on top of [`rcon_supervisor::Console`], so a server
//! restart in the middle of a `shell` session costs a reconnect, not the
//! session.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
pub mod settings;

pub use cli::{Cli, Commands, Format};
pub use error::CliError;
pub use output::OutputFormat;

/// Log filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "rconctl=info,rcon_cli=info,rcon_supervisor=info";
