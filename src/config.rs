use std::env;
use std::time::Duration;

use thiserror::Error as ThisError;

use crate::codec::DEFAULT_MAX_FRAME_SIZE;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(5);

pub const HOST_ENV: &str = "REDIS_HOST";
pub const PORT_ENV: &str = "REDIS_PORT";

#[derive(Debug, ThisError, PartialEq)]
pub enum ConfigError {
    #[error("invalid REDIS_PORT value {0:?}, expected a port number")]
    InvalidPort(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Bound on how long a MULTI/EXEC batch may wait for its replies.
    pub transaction_timeout: Duration,
    /// Largest receive buffer tolerated before the connection is considered broken.
    pub max_frame_size: usize,
}

impl Config {
    pub fn new(host: impl Into<String>, port: u16) -> Config {
        Config {
            host: host.into(),
            port,
            ..Config::default()
        }
    }

    /// Reads `REDIS_HOST` and `REDIS_PORT`, falling back to `localhost:6379`.
    pub fn from_env() -> Result<Config, ConfigError> {
        let host = env::var(HOST_ENV).unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = match env::var(PORT_ENV) {
            Ok(port) => port
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(port))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Config::new(host, port))
    }

    pub fn with_transaction_timeout(mut self, timeout: Duration) -> Config {
        self.transaction_timeout = timeout;
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Config {
        self.max_frame_size = size;
        self
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}
