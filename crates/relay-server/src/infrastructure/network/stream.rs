//! Socket adapter: turns one byte stream into a [`LineSource`] and a writer
//! task, then hands both to the matching application handler.
//!
//! # How a connection is wired (for beginners)
//!
//! ```text
//!           ┌────────── tokio::io::split ──────────┐
//!  socket ──┤                                      ├── socket
//!           │ read half                 write half │
//!           ▼                                      ▲
//!     StreamLines ──► handler (select! loop)       │
//!                         │ send_line / close      │
//!                         ▼                        │
//!                  ConnectionHandle ──► mpsc ──► writer task
//! ```
//!
//! The handler owns the read half.  The writer task owns the write half and is
//! the only code that ever writes to the socket, so each queued line reaches
//! the wire as one uninterrupted `write_all`.
//!
//! Everything here is generic over `AsyncRead`/`AsyncWrite`, so plain TCP and
//! TLS streams go through the same code.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_core::{LineBuffer, Transport};
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::application::admin_handler::run_admin_session;
use crate::application::device_handler::{run_device_session, DeviceTimeouts};
use crate::application::link::{ConnectionHandle, LineSource};
use crate::application::registry::SessionRegistry;

/// Bytes requested per `read()` call.
const READ_CHUNK: usize = 4096;
/// Longest the writer keeps writing once close has been requested.
pub const CLOSE_GRACE: Duration = Duration::from_secs(1);

// ── Reader ────────────────────────────────────────────────────────────────────

/// Line reader over any async byte stream.
pub struct StreamLines<R> {
    reader: R,
    buffer: LineBuffer,
    chunk: Vec<u8>,
    eof: bool,
}

impl<R> StreamLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: LineBuffer::new(),
            chunk: vec![0; READ_CHUNK],
            eof: false,
        }
    }
}

#[async_trait]
impl<R> LineSource for StreamLines<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.buffer.next_line() {
                return Ok(Some(line));
            }
            if self.eof {
                return Ok(self.buffer.finish());
            }

            // `read` is cancel-safe: if this future is dropped mid-await no
            // bytes have been consumed, and completed reads land in `buffer`
            // before the next await point.
            let n = self.reader.read(&mut self.chunk).await?;
            if n == 0 {
                self.eof = true;
            } else {
                self.buffer.extend(&self.chunk[..n]);
            }
        }
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Spawns the task that drains `outbound` into `writer`.
///
/// The task exits when the link is closed, after flushing whatever was queued
/// before the close.  On the first write error it closes the link itself so
/// the owning handler tears down.
///
/// Once close is requested, every remaining write (the one in flight, the
/// final flush, the shutdown) gets at most [`CLOSE_GRACE`], whether or not
/// the peer is still reading.
pub fn spawn_writer<W>(
    mut writer: W,
    mut outbound: mpsc::Receiver<String>,
    link: ConnectionHandle,
    peer: SocketAddr,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let closed = link.closed();
        tokio::pin!(closed);

        loop {
            tokio::select! {
                biased;

                next = outbound.recv() => match next {
                    Some(line) => {
                        let result = tokio::select! {
                            biased;
                            result = write_line(&mut writer, &line) => result,
                            _ = grace_after_close(&link) => Err(stalled()),
                        };
                        if let Err(e) = result {
                            warn!("write to {peer} failed: {e}");
                            link.close();
                            break;
                        }
                    }
                    None => break,
                },

                _ = &mut closed => {
                    let flush = async {
                        while let Ok(line) = outbound.try_recv() {
                            write_line(&mut writer, &line).await?;
                        }
                        Ok::<_, io::Error>(())
                    };
                    match timeout(CLOSE_GRACE, flush).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => debug!("final write to {peer} failed: {e}"),
                        Err(_) => debug!("final flush to {peer} abandoned: {}", stalled()),
                    }
                    break;
                }
            }
        }

        match timeout(CLOSE_GRACE, writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("shutdown of {peer} failed: {e}"),
            Err(_) => debug!("shutdown of {peer} timed out"),
        }
        debug!("writer for {peer} finished");
    })
}

/// Resolves [`CLOSE_GRACE`] after close is requested on `link`.
async fn grace_after_close(link: &ConnectionHandle) {
    link.closed().await;
    sleep(CLOSE_GRACE).await;
}

fn stalled() -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        "peer stopped reading after close was requested",
    )
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

// ── Socket options ────────────────────────────────────────────────────────────

/// Enables TCP keep-alive probes after `idle` without traffic.
pub fn configure_keepalive(stream: &TcpStream, idle: Duration) -> io::Result<()> {
    let keepalive = TcpKeepalive::new().with_time(idle);
    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}

// ── Connection entry points ───────────────────────────────────────────────────

/// Runs a device connection over `stream` until it closes.
pub async fn serve_device<S>(
    stream: S,
    peer: SocketAddr,
    transport: Transport,
    registry: Arc<SessionRegistry>,
    timeouts: DeviceTimeouts,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let (link, outbound) = ConnectionHandle::new();
    let writer_task = spawn_writer(writer, outbound, link.clone(), peer);

    let mut lines = StreamLines::new(reader);
    run_device_session(registry, link, &mut lines, peer, transport, timeouts).await;

    if let Err(e) = writer_task.await {
        warn!("writer task for device {peer} panicked: {e}");
    }
}

/// Runs an admin connection over `stream` until it closes.
pub async fn serve_admin<S>(
    stream: S,
    peer: SocketAddr,
    transport: Transport,
    registry: Arc<SessionRegistry>,
    idle: Duration,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let (link, outbound) = ConnectionHandle::new();
    let writer_task = spawn_writer(writer, outbound, link.clone(), peer);

    let mut lines = StreamLines::new(reader);
    run_admin_session(registry, link, &mut lines, peer, transport, idle).await;

    if let Err(e) = writer_task.await {
        warn!("writer task for admin {peer} panicked: {e}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 5555))
    }

    #[tokio::test]
    async fn test_stream_lines_reassembles_split_reads() {
        // Arrange: one line split over two reads, then a second line
        let mock = Builder::new()
            .read(b"AA:BB:CC")
            .read(b":01:02:03\r\nfw: 1.2\n")
            .build();
        let mut lines = StreamLines::new(mock);

        // Act / Assert
        assert_eq!(
            lines.next_line().await.unwrap().as_deref(),
            Some("AA:BB:CC:01:02:03")
        );
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("fw: 1.2"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stream_lines_delivers_unterminated_tail_at_eof() {
        let mock = Builder::new().read(b"ls\nbye").build();
        let mut lines = StreamLines::new(mock);

        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("ls"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("bye"));
        assert_eq!(lines.next_line().await.unwrap(), None);
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stream_lines_propagates_read_error() {
        let mock = Builder::new()
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut lines = StreamLines::new(mock);

        let err = lines.next_line().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_writer_delivers_queued_lines_then_stops_on_close() {
        // Arrange
        let mock = Builder::new().write(b"SYS \n").write(b"SYS DBG \n").build();
        let (link, outbound) = ConnectionHandle::new();

        // Act
        link.send_line("SYS ").unwrap();
        link.send_line("SYS DBG ").unwrap();
        link.close();
        let task = spawn_writer(mock, outbound, link.clone(), peer());

        // Assert: both lines written (the mock panics otherwise) and the task ends
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_writer_failure_closes_link() {
        // Arrange
        let mock = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let (link, outbound) = ConnectionHandle::new();
        let task = spawn_writer(mock, outbound, link.clone(), peer());

        // Act
        link.send_line("PING").unwrap();
        task.await.unwrap();

        // Assert
        assert!(link.is_closed());
        assert!(!link.is_writable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_tears_down_connection_whose_peer_stopped_reading() {
        // Arrange: a tiny pipe whose device end identifies, then never reads
        let (relay_end, mut device_end) = tokio::io::duplex(64);
        let registry = Arc::new(SessionRegistry::new());
        let task = tokio::spawn(serve_device(
            relay_end,
            peer(),
            Transport::Plain,
            Arc::clone(&registry),
            DeviceTimeouts::default(),
        ));
        device_end.write_all(b"AA:BB:CC:01:02:03\n").await.unwrap();
        let entry = loop {
            let sessions = registry.list_sessions().await;
            match sessions.into_iter().next() {
                Some(entry) if entry.session.is_identified() => break entry,
                _ => sleep(Duration::from_millis(10)).await,
            }
        };

        // Act: back the writer up against the full pipe, then drop the session
        for i in 0..100 {
            let _ = entry.link.send_line(&format!("payload-{i}"));
        }
        entry.link.close();

        // Assert: the connection task ends and the device sees EOF
        timeout(Duration::from_secs(5), task)
            .await
            .expect("connection stayed open after close")
            .unwrap();
        assert_eq!(registry.session_count().await, 0);
        let mut received = Vec::new();
        device_end.read_to_end(&mut received).await.unwrap();
        assert!(received.starts_with(b"SYS \nSYS DBG \n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_writer_gives_up_within_grace_after_close() {
        // Arrange: a writer that never completes a write
        let (relay_end, _never_read) = tokio::io::duplex(8);
        let (link, outbound) = ConnectionHandle::new();
        let task = spawn_writer(relay_end, outbound, link.clone(), peer());
        link.send_line("more than eight bytes").unwrap();
        sleep(Duration::from_millis(10)).await;

        // Act
        let started = tokio::time::Instant::now();
        link.close();
        task.await.unwrap();

        // Assert: bounded by the in-flight grace plus the shutdown grace
        assert!(started.elapsed() <= CLOSE_GRACE * 2);
    }

    #[tokio::test]
    async fn test_configure_keepalive_on_loopback_socket() {
        // Arrange
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();

        // Act
        let result = configure_keepalive(&client, Duration::from_secs(5));

        // Assert
        assert!(result.is_ok());
        assert!(SockRef::from(&client).keepalive().unwrap());
    }
}
