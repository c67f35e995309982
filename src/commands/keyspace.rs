use tracing::error;

use crate::client::Client;
use crate::command::Command;
use crate::commands::{boolean, integer, string, strings};
use crate::error::ClientError;
use crate::frame::Frame;

impl Client {
    /// Connectivity check: `true` only when the server answers `PING` with `PONG`.
    pub async fn health_check(&self) -> bool {
        match self.execute(Command::new("PING")).await {
            Ok(Frame::Simple(reply)) => reply == "PONG",
            Ok(Frame::Bulk(reply)) => reply == "PONG",
            Ok(reply) => {
                error!("health check got an unexpected reply: {}", reply);
                false
            }
            Err(err) => {
                error!("health check failed: {}", err);
                false
            }
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        match self.execute(Command::new("EXISTS").arg(key)).await.and_then(integer) {
            Ok(count) => count == 1,
            Err(err) => {
                error!(key, "exists failed: {}", err);
                false
            }
        }
    }

    /// Seconds left before `key` expires: `-1` when it has no expiry (or the call failed), `-2`
    /// when it does not exist.
    pub async fn ttl(&self, key: &str) -> i64 {
        match self.execute(Command::new("TTL").arg(key)).await.and_then(integer) {
            Ok(ttl) => ttl,
            Err(err) => {
                error!(key, "ttl failed: {}", err);
                -1
            }
        }
    }

    /// The type name the server reports for `key`, `"none"` when it is missing or the call
    /// failed.
    pub async fn type_of(&self, key: &str) -> String {
        match self.execute(Command::new("TYPE").arg(key)).await.and_then(string) {
            Ok(kind) => kind,
            Err(err) => {
                error!(key, "type failed: {}", err);
                "none".to_string()
            }
        }
    }

    /// Sets a timeout on `key`. Returns `false` when the key does not exist.
    pub async fn expire(&self, key: &str, seconds: u64) -> Result<bool, ClientError> {
        boolean(self.execute(Command::new("EXPIRE").arg(key).arg(seconds)).await?)
    }

    /// Keys matching a glob `pattern`. Walks the whole keyspace server side.
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>, ClientError> {
        strings(self.execute(Command::new("KEYS").arg(pattern)).await?)
    }
}
