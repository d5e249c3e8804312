//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// rconctl - talk to a game server console over RCON.
#[derive(Parser, Debug, Clone)]
#[command(name = "rconctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// JSON configuration file.
    #[arg(short, long, env = "RCONCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// RCON host, overrides the config file.
    #[arg(long, env = "FACTORIO_RCON_HOST")]
    pub host: Option<String>,

    /// RCON port, overrides the config file.
    #[arg(long, env = "FACTORIO_RCON_PORT")]
    pub port: Option<u16>,

    /// RCON password, overrides the config file.
    #[arg(long, env = "FACTORIO_RCON_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Raw console text.
    #[default]
    Text,
    /// JSON objects for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run one console command and print the reply.
    Exec(ExecArgs),

    /// Read commands from stdin, one per line.
    ///
    /// Keeps the connection alive across server restarts. `exit` or end of
    /// input ends the session.
    Shell(ShellArgs),

    /// Report whether the console is reachable.
    Status(StatusArgs),

    /// Write a configuration file with default values.
    InitConfig(InitConfigArgs),
}

/// Arguments for the exec command.
#[derive(Args, Debug, Clone)]
pub struct ExecArgs {
    /// Command and its arguments, joined with spaces.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Give up after this many seconds.
    #[arg(short, long)]
    pub timeout_secs: Option<u64>,
}

impl ExecArgs {
    /// The console command line.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Arguments for the shell command.
#[derive(Args, Debug, Clone)]
pub struct ShellArgs {
    /// Per-command timeout in seconds.
    #[arg(short, long)]
    pub timeout_secs: Option<u64>,
}

/// Arguments for the status command.
#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// How long to wait for the connection to come up.
    #[arg(short, long, default_value_t = 5)]
    pub wait_secs: u64,
}

/// Arguments for the init-config command.
#[derive(Args, Debug, Clone)]
pub struct InitConfigArgs {
    /// Where to write the file; stdout if omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}
