//! The report value returned by runs and carried by progress events.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub is_success: bool,
    pub message: String,
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self { is_success: true, message: message.into() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { is_success: false, message: message.into() }
    }

    /// Outcome used when a run stops because cancellation was requested.
    #[must_use]
    pub fn aborted() -> Self {
        Self::failure("Operation aborted")
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// `"{n} {noun}"` with an `s` appended unless `n == 1`.
pub(crate) fn plural(n: u64, noun: &str) -> String {
    if n == 1 { format!("{n} {noun}") } else { format!("{n} {noun}s") }
}
