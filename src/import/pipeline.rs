use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use super::batch::Batcher;
use super::discover::collection_name;
use super::framing::{Record, RecordReader, malformed_message};
use super::options::{FileReport, ImportReport, ImportSettings};
use super::resolve::{prepare_collection, resolve_batch};
use crate::errors::{FileFailure, SeedError};
use crate::outcome::Outcome;
use crate::progress::ProgressSink;
use crate::store::{DocumentStore, StoreCollection};

/// Loads seed files into collections named after them.
pub struct Importer {
    store: Arc<dyn DocumentStore>,
}

enum FileResult {
    Done(FileReport),
    Failed(FileFailure),
    Cancelled,
}

impl Importer {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Import `files` into `database` and summarize the run.
    ///
    /// Malformed records are reported through `progress` and skipped. A cancelled run
    /// returns the "Operation aborted" failure outcome.
    ///
    /// # Errors
    /// `InvalidSettings` for zero batch size or parallelism, and `Import` listing every
    /// file that failed once all files have finished.
    pub async fn import(
        &self,
        database: &str,
        files: Vec<PathBuf>,
        settings: &ImportSettings,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Outcome, SeedError> {
        let report = self.import_report(database, files, settings, progress, cancel).await?;
        if report.cancelled {
            return Ok(Outcome::aborted());
        }
        Ok(report.outcome())
    }

    /// Like [`Importer::import`] but returns the per-file breakdown.
    ///
    /// # Errors
    /// See [`Importer::import`].
    pub async fn import_report(
        &self,
        database: &str,
        files: Vec<PathBuf>,
        settings: &ImportSettings,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ImportReport, SeedError> {
        settings.validate()?;
        log_shared_collections(&files);
        log::info!(
            "import: {} file(s) into {} via {}, batch_size={}, max_dop={}, behavior={}",
            files.len(),
            database,
            self.store.describe(),
            settings.batch_size,
            settings.max_degree_of_parallelism,
            settings.existing_entry_behavior
        );

        let results: Vec<FileResult> = stream::iter(files)
            .map(|path| self.process_file(database, path, settings, progress, cancel))
            .buffer_unordered(settings.max_degree_of_parallelism)
            .collect()
            .await;

        let mut done = Vec::new();
        let mut failures = Vec::new();
        let mut cancelled = false;
        for result in results {
            match result {
                FileResult::Done(report) => done.push(report),
                FileResult::Failed(failure) => failures.push(failure),
                FileResult::Cancelled => cancelled = true,
            }
        }

        if cancelled {
            log::warn!("import cancelled after {} file(s)", done.len());
            for f in &failures {
                log::error!("{f}");
            }
            let mut report = ImportReport::from_files(done);
            report.cancelled = true;
            return Ok(report);
        }
        if !failures.is_empty() {
            failures.sort_by(|a, b| a.path.cmp(&b.path));
            return Err(SeedError::Import { failures });
        }
        let report = ImportReport::from_files(done);
        log::info!("import finished: {} record(s) from {} file(s)", report.records, report.files);
        Ok(report)
    }

    async fn process_file(
        &self,
        database: &str,
        path: PathBuf,
        settings: &ImportSettings,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> FileResult {
        if cancel.is_cancelled() {
            return FileResult::Cancelled;
        }
        progress.emit(Outcome::success(format!("Processing {}...", path.display())));
        match self.import_file(database, &path, settings, progress, cancel).await {
            Ok(Some(report)) => {
                log::info!(
                    "{}: {} record(s) into {}, {} skipped, {} malformed",
                    path.display(),
                    report.records,
                    report.collection,
                    report.skipped,
                    report.malformed
                );
                FileResult::Done(report)
            }
            Ok(None) => FileResult::Cancelled,
            Err(error) => {
                log::error!("{}: import failed: {error}", path.display());
                FileResult::Failed(FileFailure { path, error })
            }
        }
    }

    /// `Ok(None)` when cancellation was seen between batches.
    async fn import_file(
        &self,
        database: &str,
        path: &Path,
        settings: &ImportSettings,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Option<FileReport>, SeedError> {
        let name = collection_name(path);
        let collection = self.store.collection(database, &name);
        let file = tokio::fs::File::open(path).await?;
        let behavior = settings.existing_entry_behavior;
        prepare_collection(collection.as_ref(), behavior).await?;

        let mut report = FileReport { path: path.to_path_buf(), collection: name, ..FileReport::default() };
        let mut reader = RecordReader::new(BufReader::new(file), path.display().to_string());
        let mut batcher = Batcher::new(settings.batch_size);
        while let Some(record) = reader.next_record().await? {
            match record {
                Record::Document(doc) => {
                    if let Some(batch) = batcher.push(doc) {
                        if cancel.is_cancelled() {
                            return Ok(None);
                        }
                        flush(collection.as_ref(), batch, settings, &mut report).await?;
                    }
                }
                Record::Malformed { line, source, message } => {
                    log::warn!("{source}:{line}: {message}");
                    report.malformed += 1;
                    progress.emit(Outcome::failure(malformed_message(line, &source)));
                }
            }
        }
        if let Some(batch) = batcher.finish() {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            flush(collection.as_ref(), batch, settings, &mut report).await?;
        }
        Ok(Some(report))
    }
}

async fn flush(
    collection: &dyn StoreCollection,
    batch: Vec<bson::Document>,
    settings: &ImportSettings,
    report: &mut FileReport,
) -> Result<(), SeedError> {
    let size = batch.len() as u64;
    let outcome = resolve_batch(collection, batch, settings.existing_entry_behavior).await?;
    report.records += size;
    report.skipped += outcome.skipped;
    report.batches += 1;
    log::debug!(
        "{}: batch {} inserted {} skipped {}",
        collection.name(),
        report.batches,
        outcome.inserted,
        outcome.skipped
    );
    Ok(())
}

/// Files sharing a base name write to the same collection concurrently.
fn log_shared_collections(files: &[PathBuf]) {
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for f in files {
        *by_name.entry(collection_name(f)).or_default() += 1;
    }
    for (name, count) in by_name.into_iter().filter(|(_, c)| *c > 1) {
        log::debug!("{count} files target collection {name}; their inserts will interleave");
    }
}
