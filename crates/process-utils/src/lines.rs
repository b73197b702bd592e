//! Incremental newline splitting for streamed process output.

/// Split `chunk` into complete lines, prefixing it with the `remainder`
/// carried over from the previous chunk.
///
/// Returns the complete lines in order and the new trailing partial line.
/// Splitting happens on raw bytes so a multi-byte UTF-8 sequence cut across
/// two chunks is reassembled before decoding. A trailing `\r` is stripped
/// from each complete line.
pub fn split_lines(remainder: &[u8], chunk: &[u8]) -> (Vec<String>, Vec<u8>) {
    let mut buffer = Vec::with_capacity(remainder.len() + chunk.len());
    buffer.extend_from_slice(remainder);
    buffer.extend_from_slice(chunk);

    let mut lines = Vec::new();
    let mut start = 0;
    while let Some(offset) = buffer[start..].iter().position(|b| *b == b'\n') {
        let end = start + offset;
        lines.push(decode_line(&buffer[start..end]));
        start = end + 1;
    }

    (lines, buffer.split_off(start))
}

fn decode_line(bytes: &[u8]) -> String {
    trim_cr(&String::from_utf8_lossy(bytes)).to_string()
}

fn trim_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

/// Stateful wrapper around [`split_lines`] that keeps the partial trailing
/// line between reads.
#[derive(Debug, Default)]
pub struct LineSplitter {
    remainder: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let (lines, rest) = split_lines(&self.remainder, chunk);
        self.remainder = rest;
        lines
    }

    /// Bytes currently held back as an incomplete line.
    pub fn pending(&self) -> &[u8] {
        &self.remainder
    }

    /// Consume the splitter, returning the unterminated last line if any.
    pub fn finish(self) -> Option<String> {
        if self.remainder.is_empty() {
            return None;
        }
        Some(decode_line(&self.remainder))
    }
}
