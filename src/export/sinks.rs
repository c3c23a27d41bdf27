use bson::{Bson, Document};
use std::io::{self, BufWriter, Write};

/// Writes documents as relaxed extended JSON separated by newlines.
///
/// The separator goes before every document except the first, so the output never
/// ends with a newline.
pub struct JsonLinesSink<W: Write> {
    w: BufWriter<W>,
    pretty: bool,
    written: u64,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(inner: W, pretty: bool) -> Self {
        Self { w: BufWriter::new(inner), pretty, written: 0 }
    }

    /// # Errors
    /// Returns write errors from the underlying writer.
    pub fn write_doc(&mut self, doc: &Document) -> io::Result<()> {
        if self.written > 0 {
            self.w.write_all(b"\n")?;
        }
        let value = Bson::Document(doc.clone()).into_relaxed_extjson();
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.w, &value)?;
        } else {
            serde_json::to_writer(&mut self.w, &value)?;
        }
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Push buffered documents through to the underlying writer.
    ///
    /// # Errors
    /// Returns write errors from the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.w.flush()
    }

    /// # Errors
    /// Returns the error from flushing buffered output.
    pub fn finish(mut self) -> io::Result<W> {
        self.w.flush()?;
        self.w.into_inner().map_err(io::IntoInnerError::into_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use bson::oid::ObjectId;

    #[test]
    fn newline_between_documents_only() {
        let mut sink = JsonLinesSink::new(Vec::new(), false);
        sink.write_doc(&doc! { "_id": 1 }).unwrap();
        sink.write_doc(&doc! { "_id": 2 }).unwrap();
        let out = String::from_utf8(sink.finish().unwrap()).unwrap();
        assert_eq!(out, "{\"_id\":1}\n{\"_id\":2}");
    }

    #[test]
    fn empty_output_for_no_documents() {
        let sink = JsonLinesSink::new(Vec::new(), true);
        assert!(sink.finish().unwrap().is_empty());
    }

    #[test]
    fn pretty_print_spans_lines_and_starts_with_brace() {
        let mut sink = JsonLinesSink::new(Vec::new(), true);
        sink.write_doc(&doc! { "_id": 1, "name": "a" }).unwrap();
        let out = String::from_utf8(sink.finish().unwrap()).unwrap();
        assert!(out.starts_with('{'));
        assert!(out.lines().count() > 1);
        assert!(out.lines().skip(1).all(|l| !l.starts_with('{')));
    }

    #[test]
    fn object_ids_use_extended_json() {
        let oid = ObjectId::parse_str("5f1b2c3d4e5f6a7b8c9d0e1f").unwrap();
        let mut sink = JsonLinesSink::new(Vec::new(), false);
        sink.write_doc(&doc! { "_id": oid }).unwrap();
        let out = String::from_utf8(sink.finish().unwrap()).unwrap();
        assert_eq!(out, "{\"_id\":{\"$oid\":\"5f1b2c3d4e5f6a7b8c9d0e1f\"}}");
    }
}
