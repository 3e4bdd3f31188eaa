//! Server configuration.
//!
//! Settings come from command line flags (or their environment variables) and an optional TOML
//! file. Flags win over the file, the file wins over the defaults. Configuration is resolved once,
//! before the server starts accepting connections.

use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error as ThisError;
use tracing::Level;

use crate::codec::DEFAULT_MAX_FRAME_SIZE;

const HOST: &str = "127.0.0.1";
const PORT: u16 = 6380;
const LOG_LEVEL: &str = "info";

#[derive(Parser, Debug, Default)]
#[command(name = "respd", version, about = "A RESP request/reply front end")]
pub struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "RESPD_CONFIG")]
    pub config: Option<PathBuf>,

    /// The address to listen on
    #[arg(long, env = "RESPD_HOST")]
    pub host: Option<String>,

    /// The port to listen on
    #[arg(short, long, env = "RESPD_PORT")]
    pub port: Option<u16>,

    /// Largest request, in bytes, a client may send
    #[arg(long, env = "RESPD_MAX_FRAME_SIZE")]
    pub max_frame_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RESPD_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Layout of the TOML configuration file.
///
/// ```toml
/// [server]
/// host = "0.0.0.0"
/// port = 6380
/// max_frame_size = 1048576
///
/// [log]
/// level = "debug"
/// ```
#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct File {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_frame_size: Option<usize>,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    pub level: Option<String>,
}

impl File {
    pub fn load(path: &Path) -> Result<File, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid log level '{0}'")]
    LogLevel(String),
    #[error("max frame size must be greater than zero")]
    MaxFrameSize,
}

/// Fully resolved configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_frame_size: usize,
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: HOST.to_string(),
            port: PORT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            log_level: Level::INFO,
        }
    }
}

impl Config {
    /// Parses the process arguments and loads the file they point to, if any.
    pub fn load() -> Result<Config, ConfigError> {
        Config::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Result<Config, ConfigError> {
        let file = match &args.config {
            Some(path) => File::load(path)?,
            None => File::default(),
        };

        Config::resolve(args, file)
    }

    /// Merges `args` over `file` over the defaults.
    pub fn resolve(args: Args, file: File) -> Result<Config, ConfigError> {
        let level = args
            .log_level
            .or(file.log.level)
            .unwrap_or_else(|| LOG_LEVEL.to_string());
        let log_level = Level::from_str(&level).map_err(|_| ConfigError::LogLevel(level))?;

        let max_frame_size = args
            .max_frame_size
            .or(file.server.max_frame_size)
            .unwrap_or(DEFAULT_MAX_FRAME_SIZE);
        if max_frame_size == 0 {
            return Err(ConfigError::MaxFrameSize);
        }

        Ok(Config {
            host: args
                .host
                .or(file.server.host)
                .unwrap_or_else(|| HOST.to_string()),
            port: args.port.or(file.server.port).unwrap_or(PORT),
            max_frame_size,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    fn defaults() {
        let config = Config::resolve(Args::default(), File::default()).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.port, 6380);
    }

    #[test]
    fn parse_file() {
        let file: File = toml::from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 7000
            max_frame_size = 1048576

            [log]
            level = "debug"
            "#,
        )
        .unwrap();

        let config = Config::resolve(Args::default(), file).unwrap();

        assert_eq!(
            config,
            Config {
                host: "0.0.0.0".to_string(),
                port: 7000,
                max_frame_size: 1048576,
                log_level: Level::DEBUG,
            }
        );
    }

    #[test]
    fn parse_file_rejects_unknown_keys() {
        let file = toml::from_str::<File>("[server]\nmysql_host = \"db\"\n");

        assert!(file.is_err());
    }

    #[test]
    #[serial]
    fn args_override_file() {
        let file: File = toml::from_str("[server]\nhost = \"0.0.0.0\"\nport = 7000\n").unwrap();
        let args = Args::parse_from(["respd", "--port", "7001"]);

        let config = Config::resolve(args, file).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 7001);
    }

    #[test]
    #[serial]
    fn invalid_log_level() {
        let args = Args::parse_from(["respd", "--log-level", "loud"]);

        let err = Config::resolve(args, File::default()).unwrap_err();

        assert!(matches!(err, ConfigError::LogLevel(ref level) if level == "loud"));
    }

    #[test]
    #[serial]
    fn zero_max_frame_size() {
        let args = Args::parse_from(["respd", "--max-frame-size", "0"]);

        let err = Config::resolve(args, File::default()).unwrap_err();

        assert!(matches!(err, ConfigError::MaxFrameSize));
    }

    #[test]
    #[serial]
    fn load_file_from_disk() {
        let path = env::temp_dir().join(format!("respd-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[server]\nport = 7002\n").unwrap();

        let args = Args::parse_from(["respd", "--config", path.to_str().unwrap()]);
        let config = Config::from_args(args);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.unwrap().port, 7002);
    }

    #[test]
    #[serial]
    fn missing_file() {
        let args = Args::parse_from(["respd", "--config", "/nonexistent/respd.toml"]);

        let err = Config::from_args(args).unwrap_err();

        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/respd.toml"));
    }

    #[test]
    #[serial]
    fn port_from_environment() {
        env::set_var("RESPD_PORT", "7003");
        let args = Args::parse_from(["respd"]);
        env::remove_var("RESPD_PORT");

        let config = Config::resolve(args, File::default()).unwrap();

        assert_eq!(config.port, 7003);
    }

    #[test]
    #[serial]
    fn flag_wins_over_environment() {
        env::set_var("RESPD_HOST", "10.0.0.1");
        let args = Args::parse_from(["respd", "--host", "10.0.0.2"]);
        env::remove_var("RESPD_HOST");

        assert_eq!(args.host.as_deref(), Some("10.0.0.2"));
    }
}
