use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Indent each exported document over several lines.
    pub pretty_print: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self { pretty_print: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub documents: u64,
    pub batches: u64,
}
