use crate::client::Client;
use crate::command::{Command, ToArg};
use crate::commands::{integer, optional_integer, pairs, strings, ScoredMember};
use crate::error::ClientError;
use crate::frame::Frame;

/// `ZADD key score member [score member ...]`.
pub(crate) fn write(key: &str, members: &[ScoredMember]) -> Command {
    Command::new("ZADD").arg(key).args_from(
        members
            .iter()
            .flat_map(|m| [m.score.to_arg(), m.member.to_arg()]),
    )
}

pub(crate) fn read(key: &str) -> Command {
    Command::new("ZRANGE")
        .arg(key)
        .arg(0)
        .arg(-1)
        .arg("WITHSCORES")
}

/// `ZRANGE ... WITHSCORES` answers with `member, score, member, score...` in ascending score
/// order.
pub(crate) fn decode(frame: Frame) -> Result<Option<Vec<ScoredMember>>, ClientError> {
    if frame == Frame::Null {
        return Ok(None);
    }
    pairs(frame, "sorted set")?
        .into_iter()
        .map(|(member, score)| {
            let score = score.parse::<f64>().map_err(|_| {
                ClientError::Protocol(format!("invalid score {:?} for member {:?}", score, member))
            })?;
            Ok::<_, ClientError>(ScoredMember { member, score })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

impl Client {
    /// Adds members or updates their scores. Returns how many members were added.
    pub async fn zadd(&self, key: &str, members: &[ScoredMember]) -> Result<i64, ClientError> {
        integer(self.execute_write(key, write(key, members)).await?)
    }

    /// Members ranked between `start` and `stop`, both inclusive, lowest score first.
    pub async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, ClientError> {
        strings(self.execute(Command::new("ZRANGE").arg(key).arg(start).arg(stop)).await?)
    }

    /// Zero based rank of `member`, `None` when it is not in the set.
    pub async fn zrank(&self, key: &str, member: &str) -> Result<Option<i64>, ClientError> {
        optional_integer(self.execute(Command::new("ZRANK").arg(key).arg(member)).await?)
    }

    pub async fn zrem<I>(&self, key: &str, members: I) -> Result<i64, ClientError>
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        integer(self.execute(Command::new("ZREM").arg(key).args_from(members)).await?)
    }
}
