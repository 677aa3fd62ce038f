//! Newline framing for inbound byte streams.
//!
//! TCP is a *stream* protocol: a single `read()` may return half a line, or
//! three lines and the start of a fourth.  [`LineBuffer`] accumulates bytes
//! across reads and hands back complete lines one at a time.
//!
//! # Framing rules
//!
//! - Lines end at `\n`; a `\r` immediately before it is dropped.
//! - Bytes are decoded as UTF-8, replacing invalid sequences.
//! - A line longer than [`MAX_LINE_LEN`] bytes is cut at that length and
//!   delivered; everything up to the next `\n` is then discarded.  This keeps
//!   a peer that never sends a newline from growing the buffer without bound.

use tracing::debug;

/// Longest line delivered intact, in bytes.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Accumulates bytes and yields newline-terminated lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
    /// Set after an overlong line was cut; cleared at the next `\n`.
    discarding: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet returned as a line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Pops the next complete line, if one is buffered.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
                line.pop();
                if self.discarding {
                    // Tail of an overlong line; drop it and look again.
                    self.discarding = false;
                    continue;
                }
                if line.len() > MAX_LINE_LEN {
                    debug!(
                        "line exceeded {MAX_LINE_LEN} bytes; truncating {} bytes",
                        line.len() - MAX_LINE_LEN
                    );
                    line.truncate(MAX_LINE_LEN);
                }
                return Some(decode(line));
            }

            if self.discarding {
                self.buf.clear();
                return None;
            }

            if self.buf.len() >= MAX_LINE_LEN {
                let line: Vec<u8> = self.buf.drain(..MAX_LINE_LEN).collect();
                debug!(
                    "line exceeded {MAX_LINE_LEN} bytes; truncating and discarding {} more",
                    self.buf.len()
                );
                self.buf.clear();
                self.discarding = true;
                return Some(decode(line));
            }

            return None;
        }
    }

    /// Returns the unterminated remainder at end of stream, if any.
    pub fn finish(&mut self) -> Option<String> {
        let discarding = std::mem::take(&mut self.discarding);
        let rest = std::mem::take(&mut self.buf);
        if discarding || rest.is_empty() {
            return None;
        }
        Some(decode(rest))
    }
}

fn decode(mut line: Vec<u8>) -> String {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8_lossy(&line).into_owned()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_line() {
        let mut buf = LineBuffer::new();
        buf.extend(b"hello\n");
        assert_eq!(buf.next_line().as_deref(), Some("hello"));
        assert_eq!(buf.next_line(), None);
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn test_partial_line_is_held_until_newline() {
        // Arrange: the line arrives in two reads
        let mut buf = LineBuffer::new();
        buf.extend(b"AA:BB:CC");

        // Act / Assert: nothing yet
        assert_eq!(buf.next_line(), None);
        assert_eq!(buf.pending(), 8);

        buf.extend(b":01:02:03\n");
        assert_eq!(buf.next_line().as_deref(), Some("AA:BB:CC:01:02:03"));
    }

    #[test]
    fn test_several_lines_in_one_read() {
        let mut buf = LineBuffer::new();
        buf.extend(b"one\ntwo\nthr");
        assert_eq!(buf.next_line().as_deref(), Some("one"));
        assert_eq!(buf.next_line().as_deref(), Some("two"));
        assert_eq!(buf.next_line(), None);
        assert_eq!(buf.pending(), 3);
    }

    #[test]
    fn test_crlf_is_stripped() {
        let mut buf = LineBuffer::new();
        buf.extend(b"ls\r\n");
        assert_eq!(buf.next_line().as_deref(), Some("ls"));
    }

    #[test]
    fn test_empty_lines_are_delivered() {
        let mut buf = LineBuffer::new();
        buf.extend(b"\n\n");
        assert_eq!(buf.next_line().as_deref(), Some(""));
        assert_eq!(buf.next_line().as_deref(), Some(""));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut buf = LineBuffer::new();
        buf.extend(b"ok \xff\n");
        assert_eq!(buf.next_line().as_deref(), Some("ok \u{fffd}"));
    }

    #[test]
    fn test_finish_returns_unterminated_tail() {
        let mut buf = LineBuffer::new();
        buf.extend(b"last words");
        assert_eq!(buf.next_line(), None);
        assert_eq!(buf.finish().as_deref(), Some("last words"));
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn test_overlong_line_is_truncated_then_tail_discarded() {
        // Arrange: one line well past the limit, followed by a normal line
        let mut buf = LineBuffer::new();
        buf.extend(&vec![b'x'; MAX_LINE_LEN + 100]);

        // Act
        let first = buf.next_line().unwrap();

        // Assert: cut at the limit
        assert_eq!(first.len(), MAX_LINE_LEN);

        // More bytes of the same overlong line are discarded...
        buf.extend(b"yyyy");
        assert_eq!(buf.next_line(), None);
        assert_eq!(buf.pending(), 0);

        // ...until the newline, after which framing resumes.
        buf.extend(b"zz\nnext\n");
        assert_eq!(buf.next_line().as_deref(), Some("next"));
    }

    #[test]
    fn test_overlong_line_with_newline_in_same_read_is_truncated() {
        // Arrange: the overflow and its newline arrive together, then a short line
        let mut buf = LineBuffer::new();
        let mut bytes = vec![b'x'; MAX_LINE_LEN + 3000];
        bytes.extend_from_slice(b"\nnext\n");
        buf.extend(&bytes);

        // Act
        let first = buf.next_line().unwrap();

        // Assert: cut at the limit, and the following line is untouched
        assert_eq!(first.len(), MAX_LINE_LEN);
        assert_eq!(buf.next_line().as_deref(), Some("next"));
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn test_line_of_exactly_max_len_is_delivered_whole() {
        let mut buf = LineBuffer::new();
        let mut bytes = vec![b'x'; MAX_LINE_LEN];
        bytes.push(b'\n');
        buf.extend(&bytes);

        assert_eq!(buf.next_line().map(|l| l.len()), Some(MAX_LINE_LEN));
    }
}
