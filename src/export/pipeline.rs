use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use bson::{Bson, Document};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

use super::options::{ExportReport, ExportSettings};
use super::sinks::JsonLinesSink;
use crate::errors::SeedError;
use crate::outcome::{Outcome, plural};
use crate::store::{DocumentStore, FindOptions, ReadPreference};

/// Streams a filtered query out as newline-separated JSON.
pub struct Exporter {
    store: Arc<dyn DocumentStore>,
}

/// Parse a query filter written as (extended) JSON.
///
/// # Errors
/// Returns the parse failure message when the text is not a JSON object.
pub fn parse_filter(filter: &str) -> Result<Document, String> {
    let value: serde_json::Value = serde_json::from_str(filter).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err("filter is not a JSON object".into());
    }
    match Bson::try_from(value).map_err(|e| e.to_string())? {
        Bson::Document(doc) => Ok(doc),
        _ => Err("filter is not a document".into()),
    }
}

impl Exporter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Export documents of `database.collection` matching `filter` into `writer`.
    ///
    /// An unparsable filter gives a failure outcome before the store is touched. A
    /// cancelled export returns the "Operation aborted" failure outcome; what was written
    /// before that stays written.
    ///
    /// Output is flushed to `writer` after every cursor batch. Writes run on the calling
    /// task, so `writer` should be a local file or an in-memory buffer, not a slow pipe.
    ///
    /// # Errors
    /// Store and write failures.
    pub async fn export<W: Write>(
        &self,
        database: &str,
        collection: &str,
        filter: &str,
        writer: W,
        settings: &ExportSettings,
        cancel: &CancellationToken,
    ) -> Result<Outcome, SeedError> {
        log::info!("export: {database}.{collection} filter={filter} via {}", self.store.describe());
        let query = match parse_filter(filter) {
            Ok(q) => q,
            Err(e) => {
                log::warn!("export filter rejected: {e}");
                return Ok(Outcome::failure(format!("{filter} could not be parsed")));
            }
        };
        let col = self.store.collection(database, collection);
        let opts = FindOptions { read_preference: ReadPreference::SecondaryPreferred, ..FindOptions::default() };
        let mut cursor = col.find(query, opts).await?;

        let mut sink = JsonLinesSink::new(writer, settings.pretty_print);
        let mut report = ExportReport::default();
        loop {
            if cancel.is_cancelled() {
                sink.finish()?;
                log::warn!("export cancelled after {} document(s)", report.documents);
                return Ok(Outcome::aborted());
            }
            let Some(batch) = cursor.next_batch().await? else { break };
            report.batches += 1;
            for doc in &batch {
                sink.write_doc(doc)?;
            }
            sink.flush()?;
            report.documents = sink.written();
            log::debug!("export batch {}: {} document(s)", report.batches, batch.len());
        }
        sink.finish()?;
        log::info!("export finished: {} document(s) in {} batch(es)", report.documents, report.batches);
        Ok(Outcome::success(format!("Export complete. Exported {}", plural(report.documents, "document"))))
    }

    /// Export into the file at `dest`, replacing it only when the export succeeds.
    ///
    /// Output goes to a temporary file next to `dest` that is renamed into place at the
    /// end; a failed or cancelled export leaves any previous file untouched.
    ///
    /// # Errors
    /// Store failures, and errors creating, writing or persisting the file.
    pub async fn export_file(
        &self,
        database: &str,
        collection: &str,
        filter: &str,
        dest: &Path,
        settings: &ExportSettings,
        cancel: &CancellationToken,
    ) -> Result<Outcome, SeedError> {
        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = NamedTempFile::new_in(parent)?;
        let outcome = self.export(database, collection, filter, tmp.as_file_mut(), settings, cancel).await?;
        if outcome.is_success {
            tmp.persist(dest).map_err(|e| e.error)?;
            log::info!("export written to {}", dest.display());
        }
        Ok(outcome)
    }
}
