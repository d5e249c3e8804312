//! Console configuration.
//!
//! Loaded from a JSON file in which every section is optional:
//! - `rcon`: where the console lives and its password
//! - `reconnect`: backoff between failed connection attempts
//! - probe command and timeouts

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConsoleError;
use crate::reconnect::ReconnectConfig;
use crate::supervisor::SupervisorConfig;
use crate::tcp::RconConnector;
use crate::transport::Endpoint;

/// RCON endpoint settings.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RconSection {
    /// Hostname or IP address of the server.
    pub host: String,
    /// RCON port.
    pub port: u16,
    /// RCON password.
    pub password: String,
}

impl Default for RconSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 27015,
            password: "123456".to_string(),
        }
    }
}

impl fmt::Debug for RconSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RconSection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Backoff settings, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconnectSection {
    /// Delay after the first failed attempt.
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
    /// Growth factor between delays.
    pub multiplier: f64,
    /// Random spread in `[0, 1]`.
    pub jitter: f64,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            jitter: 0.0,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Endpoint settings.
    pub rcon: RconSection,
    /// Backoff settings.
    pub reconnect: ReconnectSection,
    /// Command used to health-check fresh connections.
    pub probe_command: String,
    /// TCP connect timeout in seconds.
    pub dial_timeout_secs: u64,
    /// Per-exchange timeout in seconds.
    pub io_timeout_secs: u64,
    /// Default caller deadline in seconds.
    pub command_timeout_secs: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            rcon: RconSection::default(),
            reconnect: ReconnectSection::default(),
            probe_command: "/help".to_string(),
            dial_timeout_secs: 5,
            io_timeout_secs: 10,
            command_timeout_secs: 15,
        }
    }
}

impl ConsoleConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConsoleError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConsoleError::Config(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;

        Self::from_json(&content)
    }

    /// Parse and validate configuration from a JSON string.
    pub fn from_json(content: &str) -> Result<Self, ConsoleError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| ConsoleError::Config(format!("invalid JSON: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Render as pretty JSON.
    pub fn to_json(&self) -> Result<String, ConsoleError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ConsoleError::Config(format!("failed to serialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConsoleError> {
        if self.rcon.host.trim().is_empty() {
            return Err(ConsoleError::Config("rcon.host cannot be empty".to_string()));
        }

        if self.rcon.port == 0 {
            return Err(ConsoleError::Config(
                "rcon.port must be greater than 0".to_string(),
            ));
        }

        if self.reconnect.initial_delay_ms == 0 {
            return Err(ConsoleError::Config(
                "reconnect.initial_delay_ms must be greater than 0".to_string(),
            ));
        }

        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            return Err(ConsoleError::Config(
                "reconnect.initial_delay_ms cannot exceed reconnect.max_delay_ms".to_string(),
            ));
        }

        if !(self.reconnect.multiplier >= 1.0 && self.reconnect.multiplier.is_finite()) {
            return Err(ConsoleError::Config(
                "reconnect.multiplier must be at least 1.0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.reconnect.jitter) {
            return Err(ConsoleError::Config(
                "reconnect.jitter must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.probe_command.trim().is_empty() {
            return Err(ConsoleError::Config(
                "probe_command cannot be empty".to_string(),
            ));
        }

        for (name, value) in [
            ("dial_timeout_secs", self.dial_timeout_secs),
            ("io_timeout_secs", self.io_timeout_secs),
            ("command_timeout_secs", self.command_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConsoleError::Config(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        Ok(())
    }

    /// Endpoint to dial.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(
            self.rcon.host.clone(),
            self.rcon.port,
            self.rcon.password.clone(),
        )
    }

    /// Backoff policy.
    #[must_use]
    pub fn reconnect(&self) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(self.reconnect.initial_delay_ms),
            max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
            backoff_multiplier: self.reconnect.multiplier,
            jitter: self.reconnect.jitter,
        }
    }

    /// Supervisor tuning.
    ///
    /// One attempt covers connect, authentication and the probe, so it is
    /// bounded by the connect timeout plus two exchanges.
    #[must_use]
    pub fn supervisor_config(&self) -> SupervisorConfig {
        let attempt = self
            .dial_timeout_secs
            .saturating_add(self.io_timeout_secs.saturating_mul(2));
        SupervisorConfig {
            reconnect: self.reconnect(),
            probe_command: self.probe_command.clone(),
            dial_timeout: Duration::from_secs(attempt),
        }
    }

    /// TCP connector with the configured timeouts.
    #[must_use]
    pub fn connector(&self) -> RconConnector {
        RconConnector::new()
            .with_dial_timeout(Duration::from_secs(self.dial_timeout_secs))
            .with_io_timeout(Duration::from_secs(self.io_timeout_secs))
    }

    /// Default caller deadline.
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}
