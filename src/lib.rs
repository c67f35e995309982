pub mod client;
pub mod codec;
pub mod command;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod registry;

pub use client::Client;
pub use command::Command;
pub use commands::{ScoredMember, Value, ValueType};
pub use config::Config;
pub use error::ClientError;
pub use frame::Frame;
pub use registry::Entry;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;
