//! Scripted line source for tests.
//!
//! Lets tests play the role of a device or admin without opening a socket:
//! push lines (or an error) into the [`ScriptFeed`], drop it to signal end of
//! stream.  While the feed is alive and empty, `next_line` waits, which is
//! exactly what a silent peer looks like to the idle timer.

use std::io;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::link::LineSource;

/// A [`LineSource`] backed by a channel.
pub struct ScriptedLines {
    rx: mpsc::UnboundedReceiver<io::Result<String>>,
}

/// The test-side handle that feeds a [`ScriptedLines`].
#[derive(Clone)]
pub struct ScriptFeed {
    tx: mpsc::UnboundedSender<io::Result<String>>,
}

impl ScriptedLines {
    pub fn new() -> (Self, ScriptFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, ScriptFeed { tx })
    }
}

impl ScriptFeed {
    /// Delivers one line.
    pub fn line(&self, line: &str) {
        let _ = self.tx.send(Ok(line.to_string()));
    }

    /// Delivers a read error.
    pub fn error(&self, kind: io::ErrorKind) {
        let _ = self.tx.send(Err(io::Error::new(kind, "scripted failure")));
    }
}

#[async_trait]
impl LineSource for ScriptedLines {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        match self.rx.recv().await {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}
