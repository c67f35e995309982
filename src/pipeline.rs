use std::collections::VecDeque;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::frame::Frame;

pub type ReplySender = oneshot::Sender<Result<Frame, ClientError>>;
pub type ReplyReceiver = oneshot::Receiver<Result<Frame, ClientError>>;

/// A command that has been written (or is about to be) and still waits for its reply.
#[derive(Debug)]
pub struct PendingCall {
    sender: ReplySender,
    deadline: Option<Instant>,
}

impl PendingCall {
    pub fn new(deadline: Option<Instant>) -> (PendingCall, ReplyReceiver) {
        let (sender, receiver) = oneshot::channel();
        (PendingCall { sender, deadline }, receiver)
    }
}

/// Correlates replies with callers purely by arrival order: the nth reply read from the socket
/// belongs to the nth call enqueued.
///
/// There are no request ids. A server that answers out of order silently corrupts the
/// correlation.
#[derive(Debug, Default)]
pub struct Pipeline {
    queue: VecDeque<PendingCall>,
}

impl Pipeline {
    pub fn new() -> Pipeline {
        Pipeline::default()
    }

    pub fn push(&mut self, call: PendingCall) {
        self.queue.push_back(call);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Hands `frame` to the oldest pending call. Error replies complete the call as a failure.
    /// Returns `false` when nobody was waiting for a reply.
    pub fn resolve(&mut self, frame: Frame) -> bool {
        let Some(call) = self.queue.pop_front() else {
            warn!("received a reply with no pending call: {}", frame);
            return false;
        };

        if let Some(deadline) = call.deadline {
            if Instant::now() > deadline {
                debug!("reply arrived after the caller's deadline");
            }
        }

        let result = match frame {
            Frame::Error(message) => Err(ClientError::Server(message)),
            frame => Ok(frame),
        };

        // The caller may have stopped waiting (timeout), the reply is dropped in that case.
        let _ = call.sender.send(result);
        true
    }

    /// Completes every outstanding call with `err`, oldest first.
    pub fn fail_all(&mut self, err: &ClientError) {
        if !self.queue.is_empty() {
            debug!(pending = self.queue.len(), "failing outstanding calls: {}", err);
        }
        for call in self.queue.drain(..) {
            let _ = call.sender.send(Err(err.clone()));
        }
    }
}
