use std::collections::BTreeSet;

use crate::client::Client;
use crate::command::{Command, ToArg};
use crate::commands::{boolean, integer, strings};
use crate::error::ClientError;
use crate::frame::Frame;

pub(crate) fn write(key: &str, members: &BTreeSet<String>) -> Command {
    Command::new("SADD").arg(key).args_from(members)
}

pub(crate) fn read(key: &str) -> Command {
    Command::new("SMEMBERS").arg(key)
}

pub(crate) fn decode(frame: Frame) -> Result<Option<BTreeSet<String>>, ClientError> {
    if frame == Frame::Null {
        return Ok(None);
    }
    Ok(Some(strings(frame)?.into_iter().collect()))
}

impl Client {
    /// Adds members to the set at `key`. Returns how many were not already present.
    pub async fn sadd<I>(&self, key: &str, members: I) -> Result<i64, ClientError>
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        let command = Command::new("SADD").arg(key).args_from(members);
        integer(self.execute_write(key, command).await?)
    }

    pub async fn srem<I>(&self, key: &str, members: I) -> Result<i64, ClientError>
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        integer(self.execute(Command::new("SREM").arg(key).args_from(members)).await?)
    }

    pub async fn sismember(&self, key: &str, member: &str) -> Result<bool, ClientError> {
        boolean(self.execute(Command::new("SISMEMBER").arg(key).arg(member)).await?)
    }

    pub async fn smembers(&self, key: &str) -> Result<BTreeSet<String>, ClientError> {
        Ok(decode(self.execute(read(key)).await?)?.unwrap_or_default())
    }

    pub async fn sinter(&self, keys: &[&str]) -> Result<BTreeSet<String>, ClientError> {
        self.set_operation("SINTER", keys).await
    }

    pub async fn sunion(&self, keys: &[&str]) -> Result<BTreeSet<String>, ClientError> {
        self.set_operation("SUNION", keys).await
    }

    /// Members of the first set that are in none of the others.
    pub async fn sdiff(&self, keys: &[&str]) -> Result<BTreeSet<String>, ClientError> {
        self.set_operation("SDIFF", keys).await
    }

    pub async fn scard(&self, key: &str) -> Result<i64, ClientError> {
        integer(self.execute(Command::new("SCARD").arg(key)).await?)
    }

    async fn set_operation(&self, verb: &str, keys: &[&str]) -> Result<BTreeSet<String>, ClientError> {
        let reply = self.execute(Command::new(verb).args_from(keys.iter().copied())).await?;
        Ok(strings(reply)?.into_iter().collect())
    }
}
