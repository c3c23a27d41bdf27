use crate::errors::SeedError;
use crate::outcome::{Outcome, plural};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// What to do about documents already in the target collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingEntryBehavior {
    /// Insert as-is; an identifier collision fails the file.
    #[default]
    None,
    /// Delete every document in the collection before the first batch.
    Truncate,
    /// Drop the collection, including its indexes, before the first batch.
    Drop,
    /// Skip incoming documents whose `_id` already exists.
    Ignore,
    /// Delete existing documents sharing an incoming `_id`, then insert.
    Replace,
}

impl ExistingEntryBehavior {
    pub const ALL: [Self; 5] = [Self::None, Self::Truncate, Self::Drop, Self::Ignore, Self::Replace];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Truncate => "truncate",
            Self::Drop => "drop",
            Self::Ignore => "ignore",
            Self::Replace => "replace",
        }
    }
}

impl fmt::Display for ExistingEntryBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExistingEntryBehavior {
    type Err = SeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                SeedError::InvalidSettings(format!(
                    "unknown existing entry behavior '{wanted}' (expected none, truncate, drop, ignore or replace)"
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub batch_size: usize,
    pub max_degree_of_parallelism: usize,
    pub existing_entry_behavior: ExistingEntryBehavior,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self { batch_size: 50, max_degree_of_parallelism: 4, existing_entry_behavior: ExistingEntryBehavior::None }
    }
}

impl ImportSettings {
    /// # Errors
    /// Returns `InvalidSettings` when the batch size or parallelism is zero.
    pub fn validate(&self) -> Result<(), SeedError> {
        if self.batch_size == 0 {
            return Err(SeedError::InvalidSettings("batch size must be at least 1".into()));
        }
        if self.max_degree_of_parallelism == 0 {
            return Err(SeedError::InvalidSettings("max degree of parallelism must be at least 1".into()));
        }
        Ok(())
    }
}

/// What one worker did with one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub collection: String,
    /// Parsed records passed to the conflict resolver, including ones skipped as existing.
    pub records: u64,
    /// Records dropped because their `_id` already existed (`Ignore` only).
    pub skipped: u64,
    pub malformed: u64,
    pub batches: u64,
}

/// Totals over every file of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub files: u64,
    pub records: u64,
    pub skipped: u64,
    pub malformed: u64,
    /// Set when the run stopped because cancellation was requested.
    pub cancelled: bool,
    pub per_file: Vec<FileReport>,
}

impl ImportReport {
    /// Fold per-file reports into run totals.
    pub fn from_files(mut per_file: Vec<FileReport>) -> Self {
        per_file.sort_by(|a, b| a.path.cmp(&b.path));
        let mut report = Self { files: per_file.len() as u64, ..Self::default() };
        for f in &per_file {
            report.records += f.records;
            report.skipped += f.skipped;
            report.malformed += f.malformed;
        }
        report.per_file = per_file;
        report
    }

    #[must_use]
    pub fn outcome(&self) -> Outcome {
        Outcome::success(format!(
            "Import complete. Imported {} from {}",
            plural(self.records, "record"),
            plural(self.files, "file")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn behavior_parses_case_insensitively() {
        assert_eq!("Replace".parse::<ExistingEntryBehavior>().unwrap(), ExistingEntryBehavior::Replace);
        assert_eq!(" DROP ".parse::<ExistingEntryBehavior>().unwrap(), ExistingEntryBehavior::Drop);
        assert!("upsert".parse::<ExistingEntryBehavior>().unwrap_err().is_user_error());
    }

    #[test]
    fn behavior_serializes_lowercase() {
        let s = serde_json::to_string(&ExistingEntryBehavior::Ignore).unwrap();
        assert_eq!(s, "\"ignore\"");
    }

    #[test]
    fn default_settings() {
        let s = ImportSettings::default();
        assert_eq!((s.batch_size, s.max_degree_of_parallelism), (50, 4));
        assert_eq!(s.existing_entry_behavior, ExistingEntryBehavior::None);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn zero_values_are_rejected() {
        let s = ImportSettings { batch_size: 0, ..Default::default() };
        assert!(s.validate().is_err());
        let s = ImportSettings { max_degree_of_parallelism: 0, ..Default::default() };
        assert!(s.validate().is_err());
    }

    #[test]
    fn report_sums_files_and_pluralizes() {
        let one = FileReport { path: "a.json".into(), records: 1, ..Default::default() };
        assert_eq!(ImportReport::from_files(vec![one.clone()]).outcome().message, "Import complete. Imported 1 record from 1 file");
        let two = FileReport { path: "b.json".into(), records: 4, skipped: 2, ..Default::default() };
        let report = ImportReport::from_files(vec![two, one]);
        assert_eq!(report.records, 5);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.per_file[0].path, PathBuf::from("a.json"));
        assert_eq!(report.outcome().message, "Import complete. Imported 5 records from 2 files");
        assert_eq!(ImportReport::default().outcome().message, "Import complete. Imported 0 records from 0 files");
    }
}
