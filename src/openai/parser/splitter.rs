//! Chat completion stream frame splitter
//!
//! Turns raw response body chunks into event records. Chunks arrive with
//! arbitrary alignment relative to logical lines, so an unterminated tail is
//! carried over to the next `feed()` instead of being parsed on its own.
//!
//! ```text
//! chunk: "data: {..}\n\ndata: {.."      chunk: "..}\n\ndata: [DONE]\n\n"
//!          │                  │                   │
//!          ↓                  └──── carry-over ───┘
//!   Payload("{..}")                        Payload("{....}"), Done
//! ```

use super::error::{ParseError, ParseResult};
use bytes::BytesMut;

/// Prefix every data line starts with
pub const DATA_PREFIX: &str = "data:";

/// Payload that terminates the stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Default maximum size of an unterminated line (1 MB)
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Default initial buffer capacity
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// One logical protocol unit extracted from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRecord {
    /// JSON payload of a `data:` line
    Payload(String),
    /// `[DONE]` sentinel
    Done,
}

impl EventRecord {
    /// Whether this record marks the end of the stream
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Classify one line, discarding anything that is not a data line
    pub fn from_line(line: &str) -> Option<Self> {
        let data = line.trim().strip_prefix(DATA_PREFIX)?.trim();
        if data == DONE_SENTINEL {
            Some(Self::Done)
        } else if data.is_empty() {
            None
        } else {
            Some(Self::Payload(data.to_string()))
        }
    }
}

/// Incremental line splitter for `data:`-prefixed event streams
///
/// # Example
///
/// ```rust
/// use codesherpa::openai::parser::{EventRecord, FrameSplitter};
///
/// let mut splitter = FrameSplitter::new();
/// splitter.feed(b"data: {\"a\":1}\n\nda").unwrap();
/// splitter.feed(b"ta: [DONE]\n\n").unwrap();
///
/// let records: Vec<_> = splitter.decode_iter().collect();
/// assert_eq!(records, vec![EventRecord::Payload("{\"a\":1}".into()), EventRecord::Done]);
/// ```
pub struct FrameSplitter {
    /// Bytes not yet terminated by a newline
    buffer: BytesMut,
    /// Buffered bytes already known to hold no newline
    scan_offset: usize,
    /// Maximum size of an unterminated line
    max_line_bytes: usize,
    /// Number of records produced
    records_emitted: usize,
    /// Number of non-data lines dropped
    lines_discarded: usize,
}

impl Default for FrameSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSplitter {
    /// Create new splitter
    pub fn new() -> Self {
        Self::with_max_line_bytes(DEFAULT_MAX_LINE_BYTES)
    }

    /// Create splitter with a custom carry-over limit
    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(DEFAULT_BUFFER_CAPACITY),
            scan_offset: 0,
            max_line_bytes,
            records_emitted: 0,
            lines_discarded: 0,
        }
    }

    /// Feed a raw chunk
    ///
    /// # Returns
    /// - `Ok(())` - Data added to buffer
    /// - `Err(BufferOverflow)` - A single line exceeds the carry-over limit,
    ///   the pending bytes are dropped
    pub fn feed(&mut self, data: &[u8]) -> ParseResult<()> {
        let new_size = self.buffer.len() + data.len();
        if new_size > self.max_line_bytes && !data.contains(&b'\n') {
            self.buffer.clear();
            self.scan_offset = 0;
            return Err(ParseError::BufferOverflow {
                size: new_size,
                max: self.max_line_bytes,
            });
        }

        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Take the next complete record, skipping non-data lines
    ///
    /// Returns `None` once no newline-terminated line is left in the buffer.
    pub fn decode(&mut self) -> Option<EventRecord> {
        while let Some(pos) = self.buffer[self.scan_offset..].iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(self.scan_offset + pos + 1);
            self.scan_offset = 0;
            if let Some(record) = self.classify(&line) {
                return Some(record);
            }
        }
        // the next search resumes after the bytes scanned here
        self.scan_offset = self.buffer.len();
        None
    }

    /// Create decode iterator
    pub fn decode_iter(&mut self) -> DecodeIter<'_> {
        DecodeIter { splitter: self }
    }

    /// Feed a chunk and collect every record it completes
    pub fn split(&mut self, data: &[u8]) -> ParseResult<Vec<EventRecord>> {
        self.feed(data)?;
        Ok(self.decode_iter().collect())
    }

    /// Flush the carried-over tail once the transport reports completion
    ///
    /// Streams that end without a trailing newline still deliver their last line.
    pub fn finish(&mut self) -> Option<EventRecord> {
        if let Some(record) = self.decode() {
            return Some(record);
        }
        if self.buffer.is_empty() {
            return None;
        }
        let tail = self.buffer.split();
        self.scan_offset = 0;
        self.classify(&tail)
    }

    fn classify(&mut self, line: &[u8]) -> Option<EventRecord> {
        let text = String::from_utf8_lossy(line);
        match EventRecord::from_line(&text) {
            Some(record) => {
                self.records_emitted += 1;
                Some(record)
            }
            None => {
                if !text.trim().is_empty() {
                    self.lines_discarded += 1;
                    tracing::trace!(line = %text.trim(), "Discarding non-data line");
                }
                None
            }
        }
    }

    /// Clear buffer and counters
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.scan_offset = 0;
        self.records_emitted = 0;
        self.lines_discarded = 0;
    }

    /// Get number of records produced
    pub fn records_emitted(&self) -> usize {
        self.records_emitted
    }

    /// Get number of discarded non-data lines
    pub fn lines_discarded(&self) -> usize {
        self.lines_discarded
    }

    /// Get number of pending bytes in buffer
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Decode iterator
pub struct DecodeIter<'a> {
    splitter: &'a mut FrameSplitter,
}

impl<'a> Iterator for DecodeIter<'a> {
    type Item = EventRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.splitter.decode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(s: &str) -> EventRecord {
        EventRecord::Payload(s.to_string())
    }

    #[test]
    fn test_split_multi_record_chunk_in_order() {
        let mut splitter = FrameSplitter::new();
        let chunk = b"data: {\"n\":1}\n\n: keep-alive\nevent: ping\ndata: {\"n\":2}\n\ndata: [DONE]\n\n";
        let records = splitter.split(chunk).unwrap();

        assert_eq!(records, vec![payload("{\"n\":1}"), payload("{\"n\":2}"), EventRecord::Done]);
        assert_eq!(splitter.lines_discarded(), 2);
        assert_eq!(splitter.records_emitted(), 3);
    }

    #[test]
    fn test_done_sentinel_is_terminal_marker() {
        assert_eq!(EventRecord::from_line("data: [DONE]"), Some(EventRecord::Done));
        assert!(EventRecord::from_line("data: [DONE]\r").unwrap().is_done());
    }

    #[test]
    fn test_line_split_across_chunks_is_recombined() {
        let mut splitter = FrameSplitter::new();
        assert!(splitter.split(b"data: {\"choi").unwrap().is_empty());
        assert_eq!(splitter.buffer_len(), 12);

        let records = splitter.split(b"ces\":[]}\n\n").unwrap();
        assert_eq!(records, vec![payload("{\"choices\":[]}")]);
        assert_eq!(splitter.buffer_len(), 0);
    }

    #[test]
    fn test_long_line_fed_bytewise_is_scanned_once() {
        let line = format!("data: {{\"content\":\"{}\"}}\n", "x".repeat(4096));
        let mut splitter = FrameSplitter::new();

        let (body, newline) = line.as_bytes().split_at(line.len() - 1);
        for byte in body {
            assert!(splitter.split(std::slice::from_ref(byte)).unwrap().is_empty());
            // every decode resumes where the previous one stopped
            assert_eq!(splitter.scan_offset, splitter.buffer_len());
        }

        let records = splitter.split(newline).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(splitter.scan_offset, 0);
        assert_eq!(splitter.buffer_len(), 0);
    }

    #[test]
    fn test_scan_resumes_with_records_pending_behind_partial_line() {
        let mut splitter = FrameSplitter::new();
        assert!(splitter.split(b"data: {\"a\"").unwrap().is_empty());
        let records = splitter.split(b":1}\n\ndata: {\"b\":2}\n\ndata: [DO").unwrap();
        assert_eq!(records, vec![payload("{\"a\":1}"), payload("{\"b\":2}")]);
        assert_eq!(splitter.scan_offset, b"data: [DO".len());

        assert_eq!(splitter.split(b"NE]\n").unwrap(), vec![EventRecord::Done]);
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let line = "data: {\"c\":\"héllo\"}\n".as_bytes();
        let (first, second) = line.split_at(14);

        let mut splitter = FrameSplitter::new();
        assert!(splitter.split(first).unwrap().is_empty());
        let records = splitter.split(second).unwrap();
        assert_eq!(records, vec![payload("{\"c\":\"héllo\"}")]);
    }

    #[test]
    fn test_crlf_and_missing_space() {
        let mut splitter = FrameSplitter::new();
        let records = splitter.split(b"data:{\"a\":1}\r\n\r\n").unwrap();
        assert_eq!(records, vec![payload("{\"a\":1}")]);
    }

    #[test]
    fn test_finish_flushes_unterminated_tail() {
        let mut splitter = FrameSplitter::new();
        assert!(splitter.split(b"data: [DONE]").unwrap().is_empty());
        assert_eq!(splitter.finish(), Some(EventRecord::Done));
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_buffer_overflow() {
        let mut splitter = FrameSplitter::with_max_line_bytes(16);
        let result = splitter.feed(&[b'x'; 17]);
        assert!(matches!(result, Err(ParseError::BufferOverflow { .. })));
        assert_eq!(splitter.buffer_len(), 0);
    }

    #[test]
    fn test_reset() {
        let mut splitter = FrameSplitter::new();
        splitter.split(b"data: {}\ndata: par").unwrap();
        splitter.reset();
        assert_eq!(splitter.buffer_len(), 0);
        assert_eq!(splitter.records_emitted(), 0);
    }
}
