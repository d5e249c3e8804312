//! CLI command implementations.
//!
//! - [`exec`] - Run one command
//! - [`shell`] - Line-by-line interactive session
//! - [`status`] - Connection status
//! - [`init_config`] - Default configuration file

pub mod exec;
pub mod init_config;
pub mod shell;
pub mod status;

pub use exec::ExecCommand;
pub use init_config::InitConfigCommand;
pub use shell::{ShellCommand, ShellSummary};
pub use status::StatusCommand;
