mod batch;
mod discover;
mod framing;
mod options;
mod pipeline;
mod resolve;

pub use batch::Batcher;
pub use discover::{collect_seed_files, collection_name};
pub use framing::{LineKind, PendingRecord, Record, RecordFramer, RecordReader, classify, malformed_message, parse_record};
pub use options::{ExistingEntryBehavior, FileReport, ImportReport, ImportSettings};
pub use pipeline::Importer;
pub use resolve::{BatchOutcome, prepare_collection, resolve_batch};
