use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::Client;
use crate::command::Command;
use crate::commands::{ok, optional_string};
use crate::error::ClientError;
use crate::frame::Frame;

/// `JSON.SET key <text>`, the whole document as one argument.
pub(crate) fn write(key: &str, value: &impl Serialize) -> Result<Command, ClientError> {
    let text = serde_json::to_string(value)?;
    Ok(Command::new("JSON.SET").arg(key).arg(text))
}

pub(crate) fn read(key: &str) -> Command {
    Command::new("JSON.GET").arg(key)
}

pub(crate) fn decode(frame: Frame) -> Result<Option<serde_json::Value>, ClientError> {
    parse(frame)
}

/// Parses a bulk string reply holding JSON text. A null reply is a missing key.
pub(crate) fn parse<T: DeserializeOwned>(frame: Frame) -> Result<Option<T>, ClientError> {
    match optional_string(frame)? {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

impl Client {
    pub async fn json_set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ClientError> {
        ok(self.execute_write(key, write(key, value)?).await?)
    }

    pub async fn json_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ClientError> {
        parse(self.execute(read(key)).await?)
    }

    /// Appends `value` to the array found at `path`. The reply is returned untouched since its
    /// shape depends on the path syntax: an integer for legacy paths, an array for `$` paths.
    pub async fn json_arr_append<T: Serialize>(
        &self,
        key: &str,
        path: &str,
        value: &T,
    ) -> Result<Frame, ClientError> {
        let command = Command::new("JSON.ARRAPPEND")
            .arg(key)
            .arg(path)
            .arg(serde_json::to_string(value)?);
        self.execute_write(key, command).await
    }
}
