//! Effective configuration: file (or defaults) overlaid with flags and
//! environment variables.

use rcon_supervisor::ConsoleConfig;

use crate::cli::Cli;
use crate::error::CliError;

/// Build the configuration the command should run with.
pub fn resolve(cli: &Cli) -> Result<ConsoleConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => ConsoleConfig::from_file(path)?,
        None => ConsoleConfig::default(),
    };

    if let Some(host) = &cli.host {
        config.rcon.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        config.rcon.port = port;
    }
    if let Some(password) = &cli.password {
        config.rcon.password.clone_from(password);
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_without_file() {
        let cli = Cli::parse_from(["rconctl", "--host", "127.0.0.1", "status"]);
        let config = resolve(&cli).expect("resolve");
        assert_eq!(config.rcon.port, 27015);
        assert_eq!(config.probe_command, "/help");
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(br#"{"rcon": {"host": "10.0.0.5", "port": 25575, "password": "file"}}"#)
            .expect("write");

        let path = file.path().to_string_lossy().into_owned();
        let cli = Cli::parse_from([
            "rconctl",
            "--config",
            path.as_str(),
            "--password",
            "flag",
            "status",
        ]);
        let config = resolve(&cli).expect("resolve");

        assert_eq!(config.rcon.host, "10.0.0.5");
        assert_eq!(config.rcon.port, 25575);
        assert_eq!(config.rcon.password, "flag");
    }

    #[test]
    fn test_invalid_override_rejected() {
        let cli = Cli::parse_from(["rconctl", "--host", "  ", "status"]);
        let err = resolve(&cli).expect_err("blank host");
        assert!(err.to_string().contains("rcon.host cannot be empty"));
    }
}
