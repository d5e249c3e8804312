//! Output formatting for CLI commands.
//!
//! Text output prints console replies verbatim; JSON output wraps each
//! result in an object for scripting.

use std::io::Write;

use serde::Serialize;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both text and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a value in the selected format.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TextDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Text => value.write_text(writer)?,
        }
        writer.flush()?;
        Ok(())
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Text)
    }
}

/// Types with a human-readable rendering.
pub trait TextDisplay {
    /// Write the value as text.
    fn write_text<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// Reply to one console command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    /// Command as sent.
    pub command: String,
    /// Raw console reply.
    pub response: String,
}

impl TextDisplay for CommandOutput {
    fn write_text<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.response.ends_with('\n') || self.response.is_empty() {
            write!(writer, "{}", self.response)?;
        } else {
            writeln!(writer, "{}", self.response)?;
        }
        Ok(())
    }
}

/// A command that failed inside an interactive session.
#[derive(Debug, Clone, Serialize)]
pub struct CommandFailure {
    /// Command as sent.
    pub command: String,
    /// Rendered error.
    pub error: String,
}

impl TextDisplay for CommandFailure {
    fn write_text<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "error: {}", self.error)?;
        Ok(())
    }
}

/// Connection status.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// `host:port` of the console.
    pub endpoint: String,
    /// Connection state name.
    pub state: String,
    /// Whether commands can run right now.
    pub ready: bool,
    /// Number of successful connects.
    pub epoch: u64,
}

impl TextDisplay for StatusReport {
    fn write_text<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Endpoint:  {}", self.endpoint)?;
        writeln!(writer, "State:     {}", self.state)?;
        writeln!(writer, "Ready:     {}", if self.ready { "yes" } else { "no" })?;
        writeln!(writer, "Epoch:     {}", self.epoch)?;
        Ok(())
    }
}
