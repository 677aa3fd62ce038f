//! The seam between connection tasks and the shared registry.
//!
//! Each accepted socket is owned by exactly one task.  Other tasks (an admin
//! issuing `cmd`, the broadcaster fanning out a log line) never touch the
//! socket directly.  Instead they hold a [`ConnectionHandle`], which can:
//!
//! - queue a line for the socket's writer task, and
//! - *request* that the connection close.
//!
//! The owning task observes the close request through
//! [`ConnectionHandle::closed`] and performs the real teardown.
//!
//! ```text
//!   admin task ──send_line──►┐
//!   broadcaster ─send_line──►├──► mpsc queue ──► writer task ──► socket
//!   owner task ──send_line──►┘
//!
//!   anyone ──close()──► watch flag ──► owner task + writer task
//! ```
//!
//! The queue is bounded by [`OUTBOUND_CAPACITY`].  A peer that stops reading
//! long enough to fill it is closed instead of buffering without limit, and
//! senders never wait on it.
//!
//! Inbound traffic flows through [`LineSource`], so the state machines can be
//! driven by a real socket or by a scripted test double.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::warn;

/// Lines that may wait in one connection's outbound queue.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Error returned when a line cannot be queued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// Close was requested or the writer task has exited.
    #[error("connection is closed")]
    Closed,

    /// The peer fell [`OUTBOUND_CAPACITY`] lines behind; the line was dropped
    /// and the connection closed.
    #[error("outbound queue is full")]
    Full,
}

/// Cloneable, thread-safe write/close handle for one connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    outbound: mpsc::Sender<String>,
    close_tx: Arc<watch::Sender<bool>>,
}

impl ConnectionHandle {
    /// Creates a handle and the receiving end its writer task drains.
    pub fn new() -> (Self, mpsc::Receiver<String>) {
        Self::with_capacity(OUTBOUND_CAPACITY)
    }

    /// Like [`ConnectionHandle::new`] with a custom queue bound.
    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (outbound, rx) = mpsc::channel(capacity);
        let (close_tx, _) = watch::channel(false);
        let handle = Self {
            outbound,
            close_tx: Arc::new(close_tx),
        };
        (handle, rx)
    }

    /// Queues `line` followed by `\n`.
    ///
    /// Each call is delivered to the socket as one contiguous write, so lines
    /// from concurrent senders never interleave.  Never waits: a full queue
    /// drops `line` and closes the connection.
    pub fn send_line(&self, line: &str) -> Result<(), LinkError> {
        if self.is_closed() {
            return Err(LinkError::Closed);
        }
        let mut framed = String::with_capacity(line.len() + 1);
        framed.push_str(line);
        framed.push('\n');
        match self.outbound.try_send(framed) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                if self.close() {
                    warn!("outbound queue full ({OUTBOUND_CAPACITY} lines); closing connection");
                }
                Err(LinkError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(LinkError::Closed),
        }
    }

    /// `true` while lines can still be queued.
    pub fn is_writable(&self) -> bool {
        !self.is_closed() && !self.outbound.is_closed()
    }

    /// `true` once close has been requested.
    pub fn is_closed(&self) -> bool {
        *self.close_tx.borrow()
    }

    /// Requests that the connection close.  Returns `true` for the call that
    /// flipped the flag; later calls are no-ops.
    pub fn close(&self) -> bool {
        !self.close_tx.send_replace(true)
    }

    /// Resolves once close has been requested (immediately if it already was).
    pub fn closed(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.close_tx.subscribe();
        async move {
            // An error means every sender is gone, which is as closed as it gets.
            let _ = rx.wait_for(|closed| *closed).await;
        }
    }
}

/// A source of inbound text lines for one connection.
///
/// Implementations must be cancel-safe: if the future returned by
/// [`LineSource::next_line`] is dropped before completing (for example
/// because a timeout fired first), no already-received bytes may be lost.
#[async_trait]
pub trait LineSource: Send {
    /// Returns the next line, `Ok(None)` at end of stream.
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
