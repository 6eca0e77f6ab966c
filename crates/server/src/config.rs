use clap::Parser;
use std::ffi::OsString;
use std::net::{IpAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid HTTP_ADDR_HOST {0:?}")]
    InvalidHost(String),

    #[error("invalid HTTP_ADDR_PORT {0}")]
    InvalidPort(u16),

    #[error("LOG_FILE_PATH {0} not found")]
    PathNotFound(PathBuf),

    #[error("LOG_FILE_PATH {0} is not a directory")]
    PathNotDirectory(PathBuf),

    #[error("SHUTDOWN_TIMEOUT must be positive")]
    NonPositiveDuration,
}

/// Dotenv file read when `ENV_FILE_PATH` is unset
pub const DEFAULT_ENV_FILE: &str = "configs/.env";

/// Location of the dotenv file; an empty `ENV_FILE_PATH` counts as unset
pub fn env_file_path(env_file_path: Option<OsString>) -> PathBuf {
    env_file_path
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE))
}

/// Load `path` into the process environment ahead of [`Config::parse`].
///
/// Variables already set are left alone. Returns `false` when the file does
/// not exist.
pub fn load_env_file(path: &Path) -> Result<bool, dotenvy::Error> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Server configuration, from flags or environment
#[derive(Parser, Debug, Clone)]
#[command(name = "nodescope")]
#[command(about = "MCP tool server reporting node identity", long_about = None)]
pub struct Config {
    /// Host to bind to
    #[arg(long, env = "HTTP_ADDR_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "HTTP_ADDR_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Server name reported to clients
    #[arg(long, env = "SERVER_NAME", default_value = "nodescope")]
    pub server_name: String,

    /// Server version reported to clients
    #[arg(long, env = "SERVER_VERSION", default_value = "1.0.0")]
    pub server_version: String,

    /// Directory holding the request log
    #[arg(long, env = "LOG_FILE_PATH", default_value = "./logs/")]
    pub log_dir: PathBuf,

    /// Graceful shutdown deadline, e.g. "5s" or "500ms"
    #[arg(
        long,
        env = "SHUTDOWN_TIMEOUT",
        default_value = "5s",
        value_parser = humantime::parse_duration
    )]
    pub shutdown_timeout: Duration,

    /// Static node name; discovered from the system when unset
    #[arg(long, env = "NODE_NAME")]
    pub node_name: Option<String>,

    /// Static node IP; discovered from the system when unset
    #[arg(long, env = "NODE_IP")]
    pub node_ip: Option<String>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty()
            || (self.host.as_str(), 0)
                .to_socket_addrs()
                .map(|mut addrs| addrs.next().is_none())
                .unwrap_or(true)
        {
            return Err(ConfigError::InvalidHost(self.host.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if !self.log_dir.exists() {
            return Err(ConfigError::PathNotFound(self.log_dir.clone()));
        }
        if !self.log_dir.is_dir() {
            return Err(ConfigError::PathNotDirectory(self.log_dir.clone()));
        }

        if self.shutdown_timeout.is_zero() {
            return Err(ConfigError::NonPositiveDuration);
        }

        Ok(())
    }

    /// `host:port` to bind, bracketing IPv6 literals
    pub fn listen_addr(&self) -> String {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => format!("[{}]:{}", ip, self.port),
            _ => format!("{}:{}", self.host, self.port),
        }
    }
}
