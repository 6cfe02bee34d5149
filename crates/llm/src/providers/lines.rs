//! Reassembles newline-delimited payloads from an HTTP byte stream.
//!
//! Chunk boundaries do not respect line or UTF-8 boundaries, and Korean
//! text makes split code points common, so bytes are buffered until a full
//! line is available.

#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append bytes and return every complete, non-blank line.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_split_across_chunks() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"{\"a\":").is_empty());
        assert_eq!(buffer.push(b"1}\n{\"b\":2}\n"), vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn test_split_code_point_is_reassembled() {
        let text = "속초\n".as_bytes();
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(&text[..2]).is_empty());
        assert_eq!(buffer.push(&text[2..]), vec!["속초"]);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut buffer = LineBuffer::default();
        assert_eq!(buffer.push(b"\n\r\ndata: x\n\n"), vec!["data: x"]);
    }
}
