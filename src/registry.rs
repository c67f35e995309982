//! Secondary index of every key the client has written.
//!
//! The server has no cheap way to list keys, so each successful write also adds the key to a
//! server side set and each delete removes it. Both steps are separate round trips: if the
//! process dies in between, the registry may name a key that is gone or was changed. Such keys
//! show up from [`Client::enumerate_all`] with no value rather than being reconciled eagerly.

use serde::Serialize;
use std::str::FromStr;
use tracing::{debug, error};

use crate::client::Client;
use crate::command::Command;
use crate::commands::{strings, Value, ValueType};
use crate::error::ClientError;
use crate::frame::Frame;

/// Name of the set holding the registered keys.
pub const REGISTRY_KEY: &str = "__all_keys__";

/// One registered key as seen by [`Client::enumerate_all`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub key: String,
    /// Type name as reported by the server, `"none"` for a stale registration.
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Option<Value>,
}

impl Client {
    pub(crate) async fn register_key(&self, key: &str) -> Result<(), ClientError> {
        if key == REGISTRY_KEY {
            return Ok(());
        }
        self.execute(Command::new("SADD").arg(REGISTRY_KEY).arg(key))
            .await?;
        Ok(())
    }

    pub(crate) async fn unregister_key(&self, key: &str) -> Result<(), ClientError> {
        self.execute(Command::new("SREM").arg(REGISTRY_KEY).arg(key))
            .await?;
        Ok(())
    }

    /// Runs a command that may create `key`, then records the key.
    pub(crate) async fn execute_write(&self, key: &str, command: Command) -> Result<Frame, ClientError> {
        let reply = self.execute(command).await?;
        self.register_key(key).await?;
        Ok(reply)
    }

    /// Every registered key, in no particular order.
    pub async fn registered_keys(&self) -> Result<Vec<String>, ClientError> {
        strings(self.execute(Command::new("SMEMBERS").arg(REGISTRY_KEY)).await?)
    }

    /// Reads every registered key with its type and value.
    ///
    /// Costs two round trips per key, meant for administrative dumps rather than request paths.
    /// Returns an empty list when the registry itself cannot be read.
    pub async fn enumerate_all(&self) -> Vec<Entry> {
        let keys = match self.registered_keys().await {
            Ok(keys) => keys,
            Err(err) => {
                error!("enumerating keys failed: {}", err);
                return Vec::new();
            }
        };

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let kind = self.type_of(&key).await;
            let value = match ValueType::from_str(&kind) {
                Ok(value_type) => self.get(&key, value_type).await,
                Err(_) => {
                    debug!(key = %key, kind = %kind, "registered key has no readable value");
                    None
                }
            };
            entries.push(Entry { key, kind, value });
        }
        entries
    }
}
