use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::command::Command;
use crate::config::Config;
use crate::error::ClientError;
use crate::frame::Frame;
use crate::pipeline::{PendingCall, Pipeline, ReplyReceiver};

pub struct Connection {
    pub id: Uuid,
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    // Data is read from the socket into the read buffer. When a frame is parsed, the corresponding
    // data is removed from the buffer, so it only ever holds the tail of an incomplete frame.
    buffer: BytesMut,
    codec: FrameCodec,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Connection {
        Connection::with_codec(stream, FrameCodec::default())
    }

    pub fn with_codec(stream: TcpStream, codec: FrameCodec) -> Connection {
        Connection::with_id(Uuid::new_v4(), stream, codec)
    }

    fn with_id(id: Uuid, stream: TcpStream, codec: FrameCodec) -> Connection {
        let (reader, writer) = stream.into_split();
        Connection {
            id,
            reader,
            writer,
            // Allocate the buffer with 4kb of capacity.
            buffer: BytesMut::with_capacity(4096),
            codec,
        }
    }

    /// Reads the next reply. Returns `None` when the peer closed the socket on a frame boundary.
    ///
    /// Cancel safe: bytes already read stay in the buffer if the future is dropped.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, ClientError> {
        loop {
            let frame = self
                .codec
                .decode(&mut self.buffer)
                .map_err(|e| ClientError::Protocol(e.to_string()))?;
            if let Some(frame) = frame {
                return Ok(Some(frame));
            }

            if 0 == self.reader.read_buf(&mut self.buffer).await? {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(ClientError::ConnectionClosed);
            }
        }
    }

    /// Writes all commands with a single write so their bytes are contiguous on the wire.
    pub async fn write_commands(&mut self, commands: &[Command]) -> Result<(), ClientError> {
        let mut dst = BytesMut::with_capacity(commands.iter().map(Command::encoded_len).sum());
        for command in commands {
            self.codec
                .encode(command, &mut dst)
                .map_err(|e| ClientError::Protocol(e.to_string()))?;
        }

        self.writer.write_all(&dst).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[derive(Debug)]
enum Message {
    Submit {
        commands: Vec<Command>,
        calls: Vec<PendingCall>,
    },
    Shutdown,
}

/// Lifecycle of a connection task, published to every [`Handle`].
#[derive(Debug, Clone)]
enum Status {
    Dialing,
    Open,
    Failed(ClientError),
    Closed,
}

/// Cheap handle to a connection task. Cloned into every caller.
///
/// The task exists from the moment the dial starts, so submissions made while dialing are queued
/// in the order they were made and written once the socket is up.
#[derive(Clone, Debug)]
pub struct Handle {
    pub id: Uuid,
    sender: mpsc::UnboundedSender<Message>,
    status: watch::Receiver<Status>,
}

impl Handle {
    /// Whether the connection task has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Whether the socket is established and the task still running.
    pub fn is_open(&self) -> bool {
        matches!(*self.status.borrow(), Status::Open) && !self.is_closed()
    }

    /// Waits for the dial to finish.
    pub async fn ready(&self) -> Result<(), ClientError> {
        let mut status = self.status.clone();
        let status = status
            .wait_for(|status| !matches!(status, Status::Dialing))
            .await
            .map_err(|_| ClientError::ConnectionClosed)?;

        match &*status {
            Status::Failed(err) => Err(err.clone()),
            Status::Closed => Err(ClientError::ConnectionClosed),
            Status::Dialing | Status::Open => Ok(()),
        }
    }

    /// Queues `commands` for one contiguous write and returns one receiver per command, in order.
    /// Hands the commands back if the connection task is gone.
    pub fn submit(
        &self,
        commands: Vec<Command>,
        deadline: Option<Instant>,
    ) -> Result<Vec<ReplyReceiver>, Vec<Command>> {
        let (calls, receivers): (Vec<_>, Vec<_>) =
            commands.iter().map(|_| PendingCall::new(deadline)).unzip();

        self.sender
            .send(Message::Submit { commands, calls })
            .map_err(|err| match err.0 {
                Message::Submit { commands, .. } => commands,
                Message::Shutdown => Vec::new(),
            })?;

        Ok(receivers)
    }

    /// Asks the task to stop and waits until its socket is closed. Queued and outstanding calls
    /// fail with `ConnectionClosed`.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(Message::Shutdown);
        self.sender.closed().await;
    }
}

/// Spawns the task owning a new connection and returns its handle right away. The dial happens
/// inside the task.
pub fn spawn(config: &Config) -> Handle {
    let id = Uuid::new_v4();
    let (sender, receiver) = mpsc::unbounded_channel();
    let (status_tx, status) = watch::channel(Status::Dialing);

    tokio::spawn(run(id, config.clone(), receiver, status_tx));

    Handle { id, sender, status }
}

async fn dial(id: Uuid, config: &Config) -> Result<Connection, ClientError> {
    let addr = config.addr();
    let stream = TcpStream::connect(&addr)
        .await
        .map_err(|e| ClientError::Connect {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;
    stream.set_nodelay(true)?;

    info!("Connected to {}", addr);

    Ok(Connection::with_id(
        id,
        stream,
        FrameCodec::new(config.max_frame_size),
    ))
}

/// Single owner of the socket and the pending queue. Writes happen in submission order and every
/// decoded reply completes the oldest pending call, so the two sides never race.
#[instrument(name = "connection", skip_all, fields(connection_id = %id))]
async fn run(
    id: Uuid,
    config: Config,
    mut receiver: mpsc::UnboundedReceiver<Message>,
    status: watch::Sender<Status>,
) {
    let mut pipeline = Pipeline::new();

    let reason = match dial(id, &config).await {
        Ok(conn) => {
            let _ = status.send(Status::Open);
            let reason = serve(conn, &mut receiver, &mut pipeline).await;
            let _ = status.send(Status::Closed);
            reason
        }
        Err(err) => {
            warn!("Connect failed: {}", err);
            let _ = status.send(Status::Failed(err.clone()));
            err
        }
    };

    // The socket is gone by now. Stop accepting submissions before failing the queue, so
    // nothing slips in afterwards.
    receiver.close();
    while let Ok(message) = receiver.try_recv() {
        if let Message::Submit { calls, .. } = message {
            for call in calls {
                pipeline.push(call);
            }
        }
    }
    pipeline.fail_all(&reason);

    info!("Connection closed");
}

/// Runs the socket until it fails or a shutdown is requested. Returns the reason handed to the
/// calls still waiting.
async fn serve(
    mut conn: Connection,
    receiver: &mut mpsc::UnboundedReceiver<Message>,
    pipeline: &mut Pipeline,
) -> ClientError {
    loop {
        tokio::select! {
            frame = conn.read_frame() => match frame {
                Ok(Some(frame)) => {
                    debug!("Received reply: {}", frame);
                    pipeline.resolve(frame);
                }
                Ok(None) => return ClientError::ConnectionClosed,
                Err(err) => {
                    warn!("Read failed: {}", err);
                    return err;
                }
            },
            message = receiver.recv() => match message {
                Some(Message::Submit { commands, calls }) => {
                    for command in &commands {
                        debug!("Sending command: {}", command.name());
                    }
                    for call in calls {
                        pipeline.push(call);
                    }
                    if let Err(err) = conn.write_commands(&commands).await {
                        warn!("Write failed: {}", err);
                        return err;
                    }
                }
                Some(Message::Shutdown) | None => return ClientError::ConnectionClosed,
            },
        }
    }
}
