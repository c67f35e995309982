use futures::future::join_all;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::{timeout, Instant};
use tracing::{debug, info};

use crate::command::Command;
use crate::config::Config;
use crate::connection::{self, Handle};
use crate::error::ClientError;
use crate::frame::Frame;
use crate::pipeline::ReplyReceiver;

/// A client multiplexing all callers onto one connection.
///
/// Cloning is cheap and every clone shares the connection. The socket is dialed lazily by the
/// first command and redialed once, on demand, after it drops. Commands are queued on the
/// connection as soon as `execute` is first polled, dialing or not, so they reach the socket in
/// call order.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    // The current connection task, possibly still dialing. Every caller that arrives during a
    // dial queues on the same task and therefore sees the same outcome.
    connection: Mutex<Option<Handle>>,
}

impl Client {
    pub fn new(config: Config) -> Client {
        Client {
            inner: Arc::new(Inner {
                config,
                connection: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Dials the server unless already connected.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.connection().ready().await
    }

    pub fn is_connected(&self) -> bool {
        matches!(&*self.state(), Some(handle) if handle.is_open())
    }

    /// Closes the connection and waits for the socket to be released. Calls still waiting for a
    /// reply fail with `ConnectionClosed`; the next command dials again.
    pub async fn disconnect(&self) {
        let previous = self.state().take();
        if let Some(handle) = previous {
            info!(connection_id = %handle.id, "Disconnecting");
            handle.shutdown().await;
        }
    }

    /// Sends one command and waits for its reply. An error reply comes back as
    /// `ClientError::Server`.
    pub async fn execute(&self, command: Command) -> Result<Frame, ClientError> {
        let mut receivers = self.submit(vec![command], None)?;
        let receiver = receivers.pop().ok_or(ClientError::ConnectionClosed)?;
        await_reply(receiver).await
    }

    /// Sends `MULTI`, the commands and `EXEC` as one write. Returns one result per command sent,
    /// `MULTI` and `EXEC` included, and leaves their interpretation to the caller.
    ///
    /// Fails with `ClientError::Timeout` when the replies don't all arrive within the configured
    /// transaction timeout. The slots stay queued so later replies keep their correlation.
    pub async fn exec_transaction(
        &self,
        commands: Vec<Command>,
    ) -> Result<Vec<Result<Frame, ClientError>>, ClientError> {
        let limit = self.inner.config.transaction_timeout;
        let deadline = Instant::now() + limit;

        let mut batch = Vec::with_capacity(commands.len() + 2);
        batch.push(Command::new("MULTI"));
        batch.extend(commands);
        batch.push(Command::new("EXEC"));

        let receivers = self.submit(batch, Some(deadline))?;

        timeout(limit, join_all(receivers.into_iter().map(await_reply)))
            .await
            .map_err(|_| ClientError::Timeout(limit))
    }

    /// Queues `commands` without suspending, so the order of submission is the order in which
    /// callers were first polled.
    fn submit(
        &self,
        commands: Vec<Command>,
        deadline: Option<Instant>,
    ) -> Result<Vec<ReplyReceiver>, ClientError> {
        let handle = self.connection();
        match handle.submit(commands, deadline) {
            Ok(receivers) => Ok(receivers),
            // The connection task stopped between the state check and the send. Redial once.
            Err(commands) => {
                debug!(connection_id = %handle.id, "Connection gone before submit, redialing");
                self.connection()
                    .submit(commands, deadline)
                    .map_err(|_| ClientError::ConnectionClosed)
            }
        }
    }

    /// Returns the current connection task, spawning a new dial when there is none or the last
    /// one has stopped.
    fn connection(&self) -> Handle {
        let mut state = self.state();
        match &*state {
            Some(handle) if !handle.is_closed() => handle.clone(),
            _ => {
                let handle = connection::spawn(&self.inner.config);
                debug!(connection_id = %handle.id, "Dialing {}", self.inner.config.addr());
                *state = Some(handle.clone());
                handle
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, Option<Handle>> {
        // The slot is replaced wholesale, a panic while holding the lock cannot leave it torn.
        self.inner
            .connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for Client {
    fn default() -> Self {
        Client::new(Config::default())
    }
}

async fn await_reply(receiver: ReplyReceiver) -> Result<Frame, ClientError> {
    receiver.await.unwrap_or(Err(ClientError::ConnectionClosed))
}
