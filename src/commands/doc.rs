use serde::Serialize;

use crate::client::Client;
use crate::command::{Command, ToArg};
use crate::commands::{float, integer, json, optional_string, strings};
use crate::error::ClientError;
use crate::frame::Frame;

/// `DOCSET key <json text>`.
pub(crate) fn write(key: &str, doc: &impl Serialize) -> Result<Command, ClientError> {
    let text = serde_json::to_string(doc)?;
    Ok(Command::new("DOCSET").arg(key).arg(text))
}

pub(crate) fn read(key: &str) -> Command {
    Command::new("DOCGET").arg(key)
}

pub(crate) fn decode(frame: Frame) -> Result<Option<serde_json::Value>, ClientError> {
    json::parse(frame)
}

/// Items that are not JSON text are kept as plain JSON strings.
fn lenient(text: String) -> serde_json::Value {
    serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
}

impl Client {
    pub async fn doc_set<T: Serialize>(&self, key: &str, doc: &T) -> Result<(), ClientError> {
        self.execute_write(key, write(key, doc)?).await?;
        Ok(())
    }

    pub async fn doc_get(&self, key: &str) -> Result<Option<serde_json::Value>, ClientError> {
        decode(self.execute(read(key)).await?)
    }

    /// Documents matching `criteria`, passed to the server verbatim (e.g. `["age", ">", "30"]`).
    pub async fn doc_find<I>(&self, criteria: I) -> Result<Vec<serde_json::Value>, ClientError>
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        let reply = self.execute(Command::new("DOCFIND").args_from(criteria)).await?;
        Ok(strings(reply)?.into_iter().map(lenient).collect())
    }

    /// Replaces the value at `path` inside the document.
    pub async fn doc_update(&self, key: &str, path: &str, value: &str) -> Result<(), ClientError> {
        let command = Command::new("DOCUPDATE").arg(key).arg(path).arg(value);
        self.execute_write(key, command).await?;
        Ok(())
    }

    pub async fn doc_arr_push(&self, key: &str, path: &str, value: &str) -> Result<(), ClientError> {
        let command = Command::new("DOCARRPUSH").arg(key).arg(path).arg(value);
        self.execute_write(key, command).await?;
        Ok(())
    }

    /// Removes and returns the last element of the array at `path`.
    pub async fn doc_arr_pop(
        &self,
        key: &str,
        path: &str,
    ) -> Result<Option<serde_json::Value>, ClientError> {
        let reply = self
            .execute(Command::new("DOCARRPOP").arg(key).arg(path))
            .await?;
        Ok(optional_string(reply)?.map(lenient))
    }

    /// Number of documents that have `field`.
    pub async fn doc_count(&self, field: &str) -> Result<i64, ClientError> {
        integer(self.execute(Command::new("DOCCOUNT").arg(field)).await?)
    }

    pub async fn doc_sum(&self, field: &str) -> Result<f64, ClientError> {
        float(self.execute(Command::new("DOCSUM").arg(field)).await?)
    }

    pub async fn doc_avg(&self, field: &str) -> Result<f64, ClientError> {
        float(self.execute(Command::new("DOCAVG").arg(field)).await?)
    }
}
