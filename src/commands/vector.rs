use crate::client::Client;
use crate::command::Command;
use crate::commands::{float, integer, optional_string, strings};
use crate::error::ClientError;
use crate::frame::Frame;

pub const DEFAULT_METRIC: &str = "euclidean";

/// What `VSEARCH` compares stored vectors against.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorQuery {
    Components(Vec<f64>),
    /// A vector already stored under this key.
    Key(String),
}

pub(crate) fn write(key: &str, components: &[f64]) -> Command {
    Command::new("VSET").arg(key).args_from(components)
}

pub(crate) fn read(key: &str) -> Command {
    Command::new("VGET").arg(key)
}

/// `VSEARCH k metric <components...>`, or `VSEARCH k metric QUERYKEY:<key>` to search around a
/// stored vector.
fn search(k: usize, metric: &str, query: &VectorQuery) -> Command {
    let command = Command::new("VSEARCH").arg(k).arg(metric);
    match query {
        VectorQuery::Components(components) => command.args_from(components),
        VectorQuery::Key(key) => command.arg(format!("QUERYKEY:{}", key)),
    }
}

/// Components come back either as an array of numbers or as one space separated string.
pub(crate) fn decode(frame: Frame) -> Result<Option<Vec<f64>>, ClientError> {
    match frame {
        Frame::Null => Ok(None),
        Frame::Array(items) => items
            .into_iter()
            .map(float)
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        frame => {
            let Some(text) = optional_string(frame)? else {
                return Ok(None);
            };
            text.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|part| !part.is_empty())
                .map(|part| {
                    part.parse::<f64>().map_err(|_| {
                        ClientError::Protocol(format!("invalid vector component {:?}", part))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some)
        }
    }
}

impl Client {
    pub async fn vset(&self, key: &str, components: &[f64]) -> Result<(), ClientError> {
        self.execute_write(key, write(key, components)).await?;
        Ok(())
    }

    pub async fn vget(&self, key: &str) -> Result<Option<Vec<f64>>, ClientError> {
        decode(self.execute(read(key)).await?)
    }

    /// Deletes the given vectors and drops them from the registry. Returns how many existed.
    pub async fn vdel(&self, keys: &[&str]) -> Result<i64, ClientError> {
        let reply = self
            .execute(Command::new("VDEL").args_from(keys.iter().copied()))
            .await?;
        let deleted = integer(reply)?;
        for key in keys {
            self.unregister_key(key).await?;
        }
        Ok(deleted)
    }

    /// The `k` stored vectors nearest to `query` under `metric`, as the server lists them.
    pub async fn vsearch(
        &self,
        k: usize,
        metric: &str,
        query: &VectorQuery,
    ) -> Result<Vec<String>, ClientError> {
        strings(self.execute(search(k, metric, query)).await?)
    }

    pub async fn vdot(&self, left: &str, right: &str) -> Result<f64, ClientError> {
        float(self.execute(Command::new("VDOT").arg(left).arg(right)).await?)
    }

    /// Stores `left + right` under `dest`.
    pub async fn vaddv(&self, dest: &str, left: &str, right: &str) -> Result<(), ClientError> {
        let command = Command::new("VADDV").arg(dest).arg(left).arg(right);
        self.execute_write(dest, command).await?;
        Ok(())
    }

    /// Stores `left - right` under `dest`.
    pub async fn vsubv(&self, dest: &str, left: &str, right: &str) -> Result<(), ClientError> {
        let command = Command::new("VSUBV").arg(dest).arg(left).arg(right);
        self.execute_write(dest, command).await?;
        Ok(())
    }
}
