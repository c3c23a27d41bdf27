//! Splits seed-file text into JSON records.
//!
//! A seed file is a run of JSON objects that are not wrapped in an array and may span
//! several lines. Lines starting with `/` are comments. A line starting with `{` begins a
//! new record when text from the previous one is pending. Lines are joined without a
//! separator.

use bson::oid::ObjectId;
use bson::{Bson, Document};
use std::mem;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Comment,
    RecordStart,
    Continuation,
}

#[must_use]
pub fn classify(line: &str) -> LineKind {
    if line.starts_with('/') {
        LineKind::Comment
    } else if line.starts_with('{') {
        LineKind::RecordStart
    } else {
        LineKind::Continuation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing but whitespace is buffered.
    Accumulating,
    /// A record's text is buffered; it began on `start_line`.
    Flushable { start_line: u64 },
}

/// Raw text of one framed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
    pub text: String,
    /// 1-based line the record's first non-blank text was on.
    pub start_line: u64,
}

#[derive(Debug)]
pub struct RecordFramer {
    state: State,
    buf: String,
    line: u64,
}

impl Default for RecordFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordFramer {
    pub fn new() -> Self {
        Self { state: State::Accumulating, buf: String::new(), line: 0 }
    }

    /// Feed the next line (without its terminator). Returns the previous record when this
    /// line starts a new one.
    pub fn push_line(&mut self, line: &str) -> Option<PendingRecord> {
        self.line += 1;
        let line = if self.line == 1 { line.strip_prefix('\u{FEFF}').unwrap_or(line) } else { line };
        match classify(line) {
            LineKind::Comment => None,
            LineKind::RecordStart => {
                let done = self.take();
                self.append(line);
                done
            }
            LineKind::Continuation => {
                self.append(line);
                None
            }
        }
    }

    /// End of input: the last pending record, if any.
    pub fn finish(&mut self) -> Option<PendingRecord> {
        self.take()
    }

    /// Frame a whole text held in memory.
    pub fn frame_all(text: &str) -> Vec<PendingRecord> {
        let mut framer = Self::new();
        let mut out: Vec<PendingRecord> = text.lines().filter_map(|l| framer.push_line(l)).collect();
        out.extend(framer.finish());
        out
    }

    fn append(&mut self, line: &str) {
        self.buf.push_str(line);
        if self.state == State::Accumulating && !self.buf.trim().is_empty() {
            self.state = State::Flushable { start_line: self.line };
        }
    }

    fn take(&mut self) -> Option<PendingRecord> {
        match mem::replace(&mut self.state, State::Accumulating) {
            State::Accumulating => {
                self.buf.clear();
                None
            }
            State::Flushable { start_line } => {
                Some(PendingRecord { text: mem::take(&mut self.buf), start_line })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Document(Document),
    /// Text that did not parse as a JSON object.
    Malformed { line: u64, source: String, message: String },
}

/// Progress message for a record that could not be parsed.
#[must_use]
pub fn malformed_message(line: u64, source: &str) -> String {
    format!("Error parsing record on or near line {line} in {source}")
}

/// Parse one record as extended JSON. Records without `_id` get a fresh `ObjectId`.
///
/// # Errors
/// Returns a description when the text is not JSON or not an object.
pub fn parse_record(text: &str) -> Result<Document, String> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err("record is not a JSON object".into());
    }
    let Bson::Document(doc) = Bson::try_from(value).map_err(|e| e.to_string())? else {
        return Err("record is not a document".into());
    };
    Ok(with_id(doc))
}

fn with_id(doc: Document) -> Document {
    if doc.contains_key("_id") {
        return doc;
    }
    let mut out = Document::new();
    out.insert("_id", ObjectId::new());
    for (k, v) in doc {
        out.insert(k, v);
    }
    out
}

/// Lazily reads records from a text stream.
pub struct RecordReader<R> {
    lines: Lines<R>,
    framer: RecordFramer,
    source: String,
    done: bool,
}

impl<R: AsyncBufRead + Unpin> RecordReader<R> {
    pub fn new(reader: R, source: impl Into<String>) -> Self {
        Self { lines: reader.lines(), framer: RecordFramer::new(), source: source.into(), done: false }
    }

    /// The next record, or `None` at end of stream.
    ///
    /// # Errors
    /// Read failures and invalid UTF-8 are returned as I/O errors.
    pub async fn next_record(&mut self) -> std::io::Result<Option<Record>> {
        while !self.done {
            match self.lines.next_line().await? {
                Some(line) => {
                    if let Some(pending) = self.framer.push_line(&line) {
                        return Ok(Some(self.decode(pending)));
                    }
                }
                None => {
                    self.done = true;
                    return Ok(self.framer.finish().map(|p| self.decode(p)));
                }
            }
        }
        Ok(None)
    }

    fn decode(&self, pending: PendingRecord) -> Record {
        match parse_record(&pending.text) {
            Ok(doc) => Record::Document(doc),
            Err(message) => {
                Record::Malformed { line: pending.start_line, source: self.source.clone(), message }
            }
        }
    }
}
