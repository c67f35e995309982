//! Typed commands: one module per kind of value, each knowing how to write a whole value, how to
//! read it back and how to reshape the reply.
//!
//! The generic [`Client::get`], [`Client::set`] and [`Client::del`] never fail: errors are logged
//! and turned into `None`, `false` or `0`. The kind-specific methods return `Result` so the
//! caller can see the server's message.

pub mod doc;
pub mod hash;
pub mod json;
pub mod keyspace;
pub mod list;
pub mod set;
pub mod string;
pub mod vector;
pub mod zset;

use bytes::Bytes;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strum_macros::{Display, EnumIter, EnumString};
use tracing::error;

use crate::client::Client;
use crate::command::Command;
use crate::error::ClientError;
use crate::frame::Frame;

/// The kinds of value the client knows how to store and read back.
///
/// Parsing accepts the names the server reports from `TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ValueType {
    String,
    Hash,
    Set,
    List,
    ZSet,
    #[strum(to_string = "json", serialize = "ReJSON-RL")]
    Json,
    Vector,
    #[strum(to_string = "doc", serialize = "document")]
    Doc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

impl ScoredMember {
    pub fn new(member: impl Into<String>, score: f64) -> ScoredMember {
        ScoredMember {
            member: member.into(),
            score,
        }
    }
}

/// A whole value of one kind, as written by [`Client::set`] and returned by [`Client::get`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Hash(BTreeMap<String, String>),
    Set(BTreeSet<String>),
    List(Vec<String>),
    ZSet(Vec<ScoredMember>),
    Json(serde_json::Value),
    Vector(Vec<f64>),
    Doc(serde_json::Value),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Hash(_) => ValueType::Hash,
            Value::Set(_) => ValueType::Set,
            Value::List(_) => ValueType::List,
            Value::ZSet(_) => ValueType::ZSet,
            Value::Json(_) => ValueType::Json,
            Value::Vector(_) => ValueType::Vector,
            Value::Doc(_) => ValueType::Doc,
        }
    }

    pub(crate) fn write_command(&self, key: &str) -> Result<Command, ClientError> {
        let command = match self {
            Value::String(value) => string::write(key, value),
            Value::Hash(fields) => hash::write(key, fields),
            Value::Set(members) => set::write(key, members),
            Value::List(items) => list::write(key, items),
            Value::ZSet(members) => zset::write(key, members),
            Value::Json(value) => json::write(key, value)?,
            Value::Vector(components) => vector::write(key, components),
            Value::Doc(value) => doc::write(key, value)?,
        };
        Ok(command)
    }
}

impl ValueType {
    pub(crate) fn read_command(self, key: &str) -> Command {
        match self {
            ValueType::String => string::read(key),
            ValueType::Hash => hash::read(key),
            ValueType::Set => set::read(key),
            ValueType::List => list::read(key),
            ValueType::ZSet => zset::read(key),
            ValueType::Json => json::read(key),
            ValueType::Vector => vector::read(key),
            ValueType::Doc => doc::read(key),
        }
    }

    pub(crate) fn decode(self, frame: Frame) -> Result<Option<Value>, ClientError> {
        let value = match self {
            ValueType::String => string::decode(frame)?.map(Value::String),
            ValueType::Hash => hash::decode(frame)?.map(Value::Hash),
            ValueType::Set => set::decode(frame)?.map(Value::Set),
            ValueType::List => list::decode(frame)?.map(Value::List),
            ValueType::ZSet => zset::decode(frame)?.map(Value::ZSet),
            ValueType::Json => json::decode(frame)?.map(Value::Json),
            ValueType::Vector => vector::decode(frame)?.map(Value::Vector),
            ValueType::Doc => doc::decode(frame)?.map(Value::Doc),
        };
        Ok(value)
    }
}

impl Client {
    /// Reads the whole value at `key` as `kind`. `None` when the key is missing or the read fails.
    pub async fn get(&self, key: &str, kind: ValueType) -> Option<Value> {
        let result = async {
            let reply = self.execute(kind.read_command(key)).await?;
            kind.decode(reply)
        };

        match result.await {
            Ok(value) => value,
            Err(err) => {
                error!(key, %kind, "get failed: {}", err);
                None
            }
        }
    }

    /// Writes `value` at `key` with the command matching its kind and records the key in the
    /// registry. Collection kinds add to an existing value rather than replacing it.
    pub async fn set(&self, key: &str, value: &Value) -> bool {
        let result = async {
            let command = value.write_command(key)?;
            let reply = self.execute(command).await?;
            if !is_write_ack(&reply) {
                return Ok(false);
            }
            self.register_key(key).await?;
            Ok::<_, ClientError>(true)
        };

        match result.await {
            Ok(written) => written,
            Err(err) => {
                error!(key, kind = %value.value_type(), "set failed: {}", err);
                false
            }
        }
    }

    /// Deletes `key` and drops it from the registry. Returns the number of keys removed.
    pub async fn del(&self, key: &str) -> i64 {
        let result = async {
            let deleted = integer(self.execute(Command::new("DEL").arg(key)).await?)?;
            self.unregister_key(key).await?;
            Ok::<_, ClientError>(deleted)
        };

        match result.await {
            Ok(deleted) => deleted,
            Err(err) => {
                error!(key, "del failed: {}", err);
                0
            }
        }
    }
}

/// `+OK` or an integer count, the two ways the server acknowledges a write.
pub(crate) fn is_write_ack(frame: &Frame) -> bool {
    match frame {
        Frame::Simple(s) => s == "OK",
        Frame::Integer(_) => true,
        _ => false,
    }
}

pub(crate) fn ok(frame: Frame) -> Result<(), ClientError> {
    match frame {
        Frame::Simple(ref s) if s == "OK" => Ok(()),
        frame => Err(ClientError::unexpected("OK", frame)),
    }
}

pub(crate) fn integer(frame: Frame) -> Result<i64, ClientError> {
    match frame {
        Frame::Integer(i) => Ok(i),
        frame => Err(ClientError::unexpected("integer", frame)),
    }
}

pub(crate) fn optional_integer(frame: Frame) -> Result<Option<i64>, ClientError> {
    match frame {
        Frame::Null => Ok(None),
        frame => integer(frame).map(Some),
    }
}

pub(crate) fn boolean(frame: Frame) -> Result<bool, ClientError> {
    integer(frame).map(|i| i == 1)
}

/// Accepts integer replies as well as numbers sent as text.
pub(crate) fn float(frame: Frame) -> Result<f64, ClientError> {
    match frame {
        Frame::Integer(i) => Ok(i as f64),
        Frame::Simple(ref s) => parse_float(s).ok_or_else(|| ClientError::unexpected("number", frame)),
        Frame::Bulk(ref bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(parse_float)
            .ok_or_else(|| ClientError::unexpected("number", frame)),
        frame => Err(ClientError::unexpected("number", frame)),
    }
}

fn parse_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

pub(crate) fn optional_string(frame: Frame) -> Result<Option<String>, ClientError> {
    match frame {
        Frame::Null => Ok(None),
        Frame::Simple(s) => Ok(Some(s)),
        Frame::Bulk(bytes) => utf8(bytes).map(Some),
        frame => Err(ClientError::unexpected("bulk string", frame)),
    }
}

pub(crate) fn string(frame: Frame) -> Result<String, ClientError> {
    match optional_string(frame)? {
        Some(s) => Ok(s),
        None => Err(ClientError::unexpected("bulk string", Frame::Null)),
    }
}

/// The items of an array reply. A null array reads as empty and null items are skipped.
pub(crate) fn strings(frame: Frame) -> Result<Vec<String>, ClientError> {
    match frame {
        Frame::Null => Ok(Vec::new()),
        Frame::Array(items) => {
            let mut strings = Vec::with_capacity(items.len());
            for item in items {
                if let Some(s) = optional_string(item)? {
                    strings.push(s);
                }
            }
            Ok(strings)
        }
        frame => Err(ClientError::unexpected("array", frame)),
    }
}

/// A flat `field, value, field, value...` array reply as pairs. A null item is an error rather
/// than skipped, since skipping it would shift every later pair.
pub(crate) fn pairs(frame: Frame, kind: &str) -> Result<Vec<(String, String)>, ClientError> {
    let items = match frame {
        Frame::Null => Vec::new(),
        Frame::Array(items) => items,
        frame => return Err(ClientError::unexpected("array", frame)),
    };
    if items.len() % 2 != 0 {
        return Err(ClientError::Protocol(format!(
            "{} reply has an odd number of items ({})",
            kind,
            items.len()
        )));
    }

    items
        .into_iter()
        .map(string)
        .tuples()
        .map(|(first, second)| Ok::<_, ClientError>((first?, second?)))
        .collect()
}

fn utf8(bytes: Bytes) -> Result<String, ClientError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| ClientError::Protocol("invalid UTF-8 string".to_string()))
}
