use crate::export::ExportSettings;
use crate::import::ImportSettings;
use std::path::PathBuf;

/// A parsed tool invocation, independent of the argument parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Import {
        /// A seed file, or a directory searched recursively for `*.json`.
        source: PathBuf,
        settings: ImportSettings,
    },
    Export {
        collection: String,
        query: String,
        destination: PathBuf,
        settings: ExportSettings,
    },
}

impl Command {
    /// Prefix used on every console line the command prints.
    #[must_use]
    pub fn section(&self) -> &'static str {
        match self {
            Self::Import { .. } => "Import",
            Self::Export { .. } => "Export",
        }
    }
}

/// `./{collection}.json` when no destination was given.
#[must_use]
pub fn default_destination(collection: &str) -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(format!("{collection}.json"))
}
