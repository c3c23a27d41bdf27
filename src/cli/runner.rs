use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use super::command::Command;
use super::util::format_elapsed;
use crate::errors::SeedError;
use crate::export::Exporter;
use crate::import::{Importer, collect_seed_files};
use crate::outcome::Outcome;
use crate::progress::{self, ProgressReceiver};
use crate::store::DocumentStore;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_USER_ERROR: i32 = 1;
pub const EXIT_UNEXPECTED: i32 = 2;

/// Section-prefixed console output: information to `out`, failures to `err`.
pub struct Console<O: Write, E: Write> {
    out: O,
    err: E,
}

impl Console<std::io::Stdout, std::io::Stderr> {
    #[must_use]
    pub fn stdio() -> Self {
        Self { out: std::io::stdout(), err: std::io::stderr() }
    }
}

impl<O: Write, E: Write> Console<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    pub fn info(&mut self, section: &str, message: &str) {
        let _ = writeln!(self.out, "{section} {message}");
    }

    pub fn error(&mut self, section: &str, message: &str) {
        let _ = writeln!(self.err, "{section} {message}");
    }

    pub fn outcome(&mut self, section: &str, outcome: &Outcome) {
        if outcome.is_success {
            self.info(section, &outcome.message);
        } else {
            self.error(section, &outcome.message);
        }
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}

/// Exit status for a finished command: failures caused by the caller's input map to
/// `EXIT_USER_ERROR`, everything else unexpected to `EXIT_UNEXPECTED`.
#[must_use]
pub fn exit_code(result: &Result<Outcome, SeedError>) -> i32 {
    match result {
        Ok(o) if o.is_success => EXIT_SUCCESS,
        Ok(_) => EXIT_USER_ERROR,
        Err(e) if e.is_user_error() => EXIT_USER_ERROR,
        Err(_) => EXIT_UNEXPECTED,
    }
}

/// Run one command against `store`, printing progress and the result to `console`.
///
/// # Errors
/// Whatever the import or export returned; the error is also printed.
pub async fn run<O: Write, E: Write>(
    store: Arc<dyn DocumentStore>,
    database: &str,
    cmd: Command,
    console: &mut Console<O, E>,
    cancel: &CancellationToken,
) -> Result<Outcome, SeedError> {
    let section = cmd.section();
    console.info(section, &format!("Beginning {}...", section.to_ascii_lowercase()));
    let started = Instant::now();
    let result = match cmd {
        Command::Import { source, settings } => {
            let files = match discover(&source, section, console) {
                Ok(files) => files,
                Err(e) => {
                    console.error(section, &format!("{e}.  Exiting..."));
                    return Err(e);
                }
            };
            let (sink, mut rx) = progress::channel();
            let importer = Importer::new(store);
            let import = importer.import(database, files, &settings, &sink, cancel);
            tokio::pin!(import);
            let result = loop {
                tokio::select! {
                    res = &mut import => break res,
                    Some(event) = rx.recv() => console.outcome(section, &event),
                }
            };
            print_pending(&mut rx, section, console);
            result
        }
        Command::Export { collection, query, destination, settings } => {
            console.info(section, &format!("Querying {database}/{collection} with query {query}"));
            let exporter = Exporter::new(store);
            let result =
                exporter.export_file(database, &collection, &query, &destination, &settings, cancel).await;
            if let Ok(o) = &result
                && o.is_success
            {
                console.info(section, &format!("Results written to {}", destination.display()));
            }
            result
        }
    };
    match &result {
        Ok(outcome) => console.outcome(section, outcome),
        Err(e) => {
            log::error!("{section} failed: {e}");
            console.error(section, &e.to_string());
        }
    }
    console.info(section, &format!("Took {} to complete", format_elapsed(started.elapsed())));
    result
}

fn discover<O: Write, E: Write>(
    source: &Path,
    section: &str,
    console: &mut Console<O, E>,
) -> Result<Vec<std::path::PathBuf>, SeedError> {
    if source.is_dir() {
        console.info(
            section,
            &format!("{} is a directory, recursively processing all .json files ...", source.display()),
        );
    } else if source.is_file() {
        console.info(section, &format!("{} is a file, processing...", source.display()));
    }
    collect_seed_files(source)
}

fn print_pending<O: Write, E: Write>(rx: &mut ProgressReceiver, section: &str, console: &mut Console<O, E>) {
    for event in progress::drain(rx) {
        console.outcome(section, &event);
    }
}
