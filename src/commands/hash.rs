use std::collections::BTreeMap;

use crate::client::Client;
use crate::command::{Command, ToArg};
use crate::commands::{boolean, integer, ok, optional_string, pairs};
use crate::error::ClientError;
use crate::frame::Frame;

pub(crate) fn write(key: &str, fields: &BTreeMap<String, String>) -> Command {
    Command::new("HSET").arg(key).args_from(flatten(fields))
}

pub(crate) fn read(key: &str) -> Command {
    Command::new("HGETALL").arg(key)
}

/// `HGETALL` answers with a flat `field, value, field, value...` array.
pub(crate) fn decode(frame: Frame) -> Result<Option<BTreeMap<String, String>>, ClientError> {
    if frame == Frame::Null {
        return Ok(None);
    }
    Ok(Some(pairs(frame, "hash")?.into_iter().collect()))
}

fn flatten<I, F, V>(fields: I) -> impl Iterator<Item = bytes::Bytes>
where
    I: IntoIterator<Item = (F, V)>,
    F: ToArg,
    V: ToArg,
{
    fields
        .into_iter()
        .flat_map(|(field, value)| [field.to_arg(), value.to_arg()])
}

impl Client {
    /// Sets the given fields. Returns how many fields were newly created.
    pub async fn hset<I, F, V>(&self, key: &str, fields: I) -> Result<i64, ClientError>
    where
        I: IntoIterator<Item = (F, V)>,
        F: ToArg,
        V: ToArg,
    {
        let command = Command::new("HSET").arg(key).args_from(flatten(fields));
        integer(self.execute_write(key, command).await?)
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, ClientError> {
        optional_string(self.execute(Command::new("HGET").arg(key).arg(field)).await?)
    }

    pub async fn hmset<I, F, V>(&self, key: &str, fields: I) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = (F, V)>,
        F: ToArg,
        V: ToArg,
    {
        let command = Command::new("HMSET").arg(key).args_from(flatten(fields));
        ok(self.execute_write(key, command).await?)
    }

    pub async fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>, ClientError> {
        let reply = self.execute(read(key)).await?;
        Ok(decode(reply)?.unwrap_or_default())
    }

    /// Removes the given fields. Returns how many existed.
    pub async fn hdel<I>(&self, key: &str, fields: I) -> Result<i64, ClientError>
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        integer(self.execute(Command::new("HDEL").arg(key).args_from(fields)).await?)
    }

    pub async fn hexists(&self, key: &str, field: &str) -> Result<bool, ClientError> {
        boolean(self.execute(Command::new("HEXISTS").arg(key).arg(field)).await?)
    }
}
