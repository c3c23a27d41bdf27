use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by a document store backend.
///
/// A duplicate key is kept apart from transport problems: the first is a data conflict
/// caused by the input, the second means the store could not be reached or used.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("store command failed: {0}")]
    Command(String),
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{} does not exist", .0.display())]
    SourceNotFound(PathBuf),

    #[error("{0} is not a valid address")]
    InvalidAddress(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{} file(s) failed to import: {}", .failures.len(), summarize(.failures))]
    Import { failures: Vec<FileFailure> },
}

/// One file that could not be imported, with the error that stopped it.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: SeedError,
}

impl std::fmt::Display for FileFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

fn summarize(failures: &[FileFailure]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl SeedError {
    /// True when the error was caused by the caller's input rather than the environment.
    ///
    /// The command-line runner uses this to pick between the user-error and
    /// unexpected-error exit codes.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::SourceNotFound(_)
            | Self::InvalidAddress(_)
            | Self::InvalidSettings(_)
            | Self::Config(_)
            | Self::Store(StoreError::DuplicateKey(_)) => true,
            Self::Import { failures } => {
                !failures.is_empty() && failures.iter().all(|f| f.error.is_user_error())
            }
            _ => false,
        }
    }
}
