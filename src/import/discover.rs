use crate::errors::SeedError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Seed files under `source`.
///
/// A file is returned as-is. A directory yields every `*.json` file beneath it,
/// recursively, in sorted order. Symlinked directories are not descended into.
///
/// # Errors
/// `SourceNotFound` when `source` is neither a file nor a directory; I/O errors while
/// walking a directory.
pub fn collect_seed_files(source: &Path) -> Result<Vec<PathBuf>, SeedError> {
    if source.is_file() {
        return Ok(vec![source.to_path_buf()]);
    }
    if !source.is_dir() {
        return Err(SeedError::SourceNotFound(source.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if !entry.file_type().is_dir()
            && path.is_file()
            && path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json"))
        {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    log::debug!("found {} seed file(s) under {}", files.len(), source.display());
    Ok(files)
}

/// Target collection for a seed file: its name without the extension.
#[must_use]
pub fn collection_name(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}
