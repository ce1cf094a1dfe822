// Newline framing over a byte stream.

use bytes::BytesMut;
use log::warn;

use ndn_common::wire::MAX_MSG_LEN;

/// Capacity of a per-neighbor receive buffer, sized for one maximum
/// message plus a fragmented successor.
pub const RECV_BUFFER_CAPACITY: usize = MAX_MSG_LEN * 2;

/// Accumulates raw stream bytes and yields complete, newline-terminated
/// lines. An unterminated tail stays buffered for the next read. If a read
/// would overflow the buffer before a newline shows up, the buffer is reset
/// and the fragment dropped; the connection itself survives and any parse
/// error caused by the loss is handled per message.
#[derive(Debug, Default)]
pub struct RecvBuffer {
    buf: BytesMut,
}

impl RecvBuffer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(RECV_BUFFER_CAPACITY),
        }
    }

    /// Appends `chunk` and drains every complete line, newline stripped.
    /// Empty lines are skipped.
    pub fn extend(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.buf.len() + chunk.len() > RECV_BUFFER_CAPACITY {
            warn!(
                "receive buffer overflow ({} buffered + {} incoming), dropping fragment",
                self.buf.len(),
                chunk.len()
            );
            self.buf.clear();
            return Vec::new();
        }
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(pos + 1);
            let line = String::from_utf8_lossy(&line[..pos]);
            if !line.is_empty() {
                lines.push(line.into_owned());
            }
        }
        lines
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_fragmented_lines() {
        let mut buf = RecvBuffer::new();
        assert!(buf.extend(b"ENTRY 1.0.").is_empty());
        let lines = buf.extend(b"0.2 5002\n");
        assert_eq!(lines, vec!["ENTRY 1.0.0.2 5002"]);
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn drains_multiple_lines_from_one_chunk() {
        let mut buf = RecvBuffer::new();
        let lines = buf.extend(b"INTEREST 17 foo\nOBJECT 17 foo\nNOOB");
        assert_eq!(lines, vec!["INTEREST 17 foo", "OBJECT 17 foo"]);
        assert_eq!(buf.pending(), 4);
    }

    #[test]
    fn skips_empty_lines() {
        let mut buf = RecvBuffer::new();
        let lines = buf.extend(b"\n\nLEAVE 1.0.0.1 5001\n\n");
        assert_eq!(lines, vec!["LEAVE 1.0.0.1 5001"]);
    }

    #[test]
    fn overflow_resets_the_buffer() {
        let mut buf = RecvBuffer::new();
        assert!(buf.extend(&[b'a'; RECV_BUFFER_CAPACITY]).is_empty());
        // The next chunk would overflow: the stale fragment and the chunk
        // are both dropped, and the stream keeps working afterwards.
        assert!(buf.extend(b"x").is_empty());
        assert_eq!(buf.pending(), 0);
        let lines = buf.extend(b"INTEREST 1 ok\n");
        assert_eq!(lines, vec!["INTEREST 1 ok"]);
    }
}
