mod options;
mod pipeline;
mod sinks;

pub use options::{ExportReport, ExportSettings};
pub use pipeline::{Exporter, parse_filter};
pub use sinks::JsonLinesSink;
