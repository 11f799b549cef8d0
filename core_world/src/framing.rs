use thiserror::Error;

/// Raised when a peer streams more than the configured bound without ever
/// terminating a line. The offending buffer has already been discarded when
/// this surfaces; the transport drops the connection in response.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    #[error("line exceeded {limit} bytes without a terminator")]
    LineTooLong { limit: usize },
}

/// Reassembles newline-delimited messages from arbitrarily fragmented byte
/// chunks. Bytes after the last terminator stay buffered until more data
/// arrives; a message is never surfaced early.
#[derive(Debug)]
pub struct LineFramer {
    buffer: Vec<u8>,
    max_line_bytes: usize,
}

impl LineFramer {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line_bytes,
        }
    }

    /// Append one read chunk. Fails when any single line, terminated or still
    /// accumulating, exceeds the bound; the framer comes out empty so a
    /// caller that keeps the connection anyway starts clean.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), FramingError> {
        self.buffer.extend_from_slice(chunk);
        let mut line_start = 0usize;
        for idx in 0..self.buffer.len() {
            if self.buffer[idx] == b'\n' {
                if idx - line_start > self.max_line_bytes {
                    return self.overflow();
                }
                line_start = idx + 1;
            }
        }
        if self.buffer.len() - line_start > self.max_line_bytes {
            return self.overflow();
        }
        Ok(())
    }

    /// Lazily yield completed lines, trimmed of surrounding whitespace, with
    /// empty lines skipped. Stops at the first unterminated tail and leaves
    /// it buffered.
    pub fn drain_lines(&mut self) -> DrainLines<'_> {
        DrainLines { framer: self }
    }

    /// Discard any partial line, e.g. after a disconnect. The next push
    /// starts a fresh message.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    fn overflow(&mut self) -> Result<(), FramingError> {
        self.buffer.clear();
        Err(FramingError::LineTooLong {
            limit: self.max_line_bytes,
        })
    }
}

pub struct DrainLines<'a> {
    framer: &'a mut LineFramer,
}

impl Iterator for DrainLines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let terminator = self.framer.buffer.iter().position(|&b| b == b'\n')?;
            let raw: Vec<u8> = self.framer.buffer.drain(..=terminator).collect();
            let text = String::from_utf8_lossy(&raw[..terminator]);
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_owned());
            }
        }
    }
}
