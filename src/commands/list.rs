use crate::client::Client;
use crate::command::{Command, ToArg};
use crate::commands::{integer, ok, optional_string, strings};
use crate::error::ClientError;
use crate::frame::Frame;

/// Items are appended with `RPUSH` so that reading the list back yields them in the same order.
pub(crate) fn write(key: &str, items: &[String]) -> Command {
    Command::new("RPUSH").arg(key).args_from(items)
}

pub(crate) fn read(key: &str) -> Command {
    Command::new("LRANGE").arg(key).arg(0).arg(-1)
}

pub(crate) fn decode(frame: Frame) -> Result<Option<Vec<String>>, ClientError> {
    if frame == Frame::Null {
        return Ok(None);
    }
    strings(frame).map(Some)
}

impl Client {
    /// Prepends items, one at a time, so the last one given ends up first. Returns the new length.
    pub async fn lpush<I>(&self, key: &str, items: I) -> Result<i64, ClientError>
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        let command = Command::new("LPUSH").arg(key).args_from(items);
        integer(self.execute_write(key, command).await?)
    }

    pub async fn rpush<I>(&self, key: &str, items: I) -> Result<i64, ClientError>
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        let command = Command::new("RPUSH").arg(key).args_from(items);
        integer(self.execute_write(key, command).await?)
    }

    pub async fn lpop(&self, key: &str) -> Result<Option<String>, ClientError> {
        optional_string(self.execute(Command::new("LPOP").arg(key)).await?)
    }

    pub async fn rpop(&self, key: &str) -> Result<Option<String>, ClientError> {
        optional_string(self.execute(Command::new("RPOP").arg(key)).await?)
    }

    pub async fn lset(&self, key: &str, index: i64, value: &str) -> Result<(), ClientError> {
        ok(self.execute(Command::new("LSET").arg(key).arg(index).arg(value)).await?)
    }

    /// Items between `start` and `stop`, both inclusive. `-1` is the last item.
    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, ClientError> {
        strings(self.execute(Command::new("LRANGE").arg(key).arg(start).arg(stop)).await?)
    }

    pub async fn lindex(&self, key: &str, index: i64) -> Result<Option<String>, ClientError> {
        optional_string(self.execute(Command::new("LINDEX").arg(key).arg(index)).await?)
    }
}
