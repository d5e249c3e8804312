//! Writes a default configuration file.

use std::io::Write;
use std::path::PathBuf;

use rcon_supervisor::ConsoleConfig;
use tracing::info;

use crate::error::CliError;

/// Init-config command executor.
pub struct InitConfigCommand {
    output: Option<PathBuf>,
    force: bool,
}

impl InitConfigCommand {
    /// Write to `output`, or to the writer passed to `execute` if `None`.
    #[must_use]
    pub const fn new(output: Option<PathBuf>, force: bool) -> Self {
        Self { output, force }
    }

    /// Render the default configuration.
    pub fn execute<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let json = ConsoleConfig::default().to_json()?;

        match &self.output {
            Some(path) => {
                if path.exists() && !self.force {
                    return Err(CliError::FileExists(path.display().to_string()));
                }
                std::fs::write(path, format!("{json}\n"))?;
                info!(path = %path.display(), "wrote default configuration");
            }
            None => writeln!(writer, "{json}")?,
        }
        Ok(())
    }
}
