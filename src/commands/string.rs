use crate::client::Client;
use crate::command::Command;
use crate::commands::{integer, optional_string, string};
use crate::error::ClientError;
use crate::frame::Frame;

pub(crate) fn write(key: &str, value: &str) -> Command {
    Command::new("SET").arg(key).arg(value)
}

pub(crate) fn read(key: &str) -> Command {
    Command::new("GET").arg(key)
}

pub(crate) fn decode(frame: Frame) -> Result<Option<String>, ClientError> {
    optional_string(frame)
}

impl Client {
    /// Appends `value` to the string at `key`, creating it if needed. Returns the new length.
    pub async fn append(&self, key: &str, value: &str) -> Result<i64, ClientError> {
        let reply = self
            .execute_write(key, Command::new("APPEND").arg(key).arg(value))
            .await?;
        integer(reply)
    }

    pub async fn incr(&self, key: &str) -> Result<i64, ClientError> {
        integer(self.execute_write(key, Command::new("INCR").arg(key)).await?)
    }

    pub async fn decr(&self, key: &str) -> Result<i64, ClientError> {
        integer(self.execute_write(key, Command::new("DECR").arg(key)).await?)
    }

    pub async fn incr_by(&self, key: &str, increment: i64) -> Result<i64, ClientError> {
        let command = Command::new("INCRBY").arg(key).arg(increment);
        integer(self.execute_write(key, command).await?)
    }

    pub async fn decr_by(&self, key: &str, decrement: i64) -> Result<i64, ClientError> {
        let command = Command::new("DECRBY").arg(key).arg(decrement);
        integer(self.execute_write(key, command).await?)
    }

    /// Overwrites part of the string at `key` starting at `offset`. Returns the new length.
    pub async fn set_range(&self, key: &str, offset: usize, value: &str) -> Result<i64, ClientError> {
        let command = Command::new("SETRANGE").arg(key).arg(offset).arg(value);
        integer(self.execute_write(key, command).await?)
    }

    /// Substring between `start` and `end`, both inclusive. Negative offsets count from the end.
    pub async fn get_range(&self, key: &str, start: i64, end: i64) -> Result<String, ClientError> {
        let command = Command::new("GETRANGE").arg(key).arg(start).arg(end);
        string(self.execute(command).await?)
    }

    pub async fn strlen(&self, key: &str) -> Result<i64, ClientError> {
        integer(self.execute(Command::new("STRLEN").arg(key)).await?)
    }
}
