use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::{FileRevision, VersionId};
use crate::error::{MigrationError, Result};

static TITLE_SEPARATOR_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]+").unwrap());

/// Turns `<digits>_<description>.<ext>` files into revisions
#[derive(Debug, Clone)]
pub struct RevisionParser {
    extension: String,
    pattern: Regex,
}

impl RevisionParser {
    pub fn new(extension: &str) -> Result<Self> {
        let extension = extension.trim_start_matches('.').to_string();
        if extension.is_empty() {
            return Err(MigrationError::Config(
                "revision file extension must not be empty".to_string(),
            ));
        }

        let pattern = RegexBuilder::new(&format!(
            r"^([0-9]+)_(.+)\.{}$",
            regex::escape(&extension)
        ))
        .case_insensitive(true)
        .build()
        .map_err(|e| MigrationError::Config(format!("invalid revision file pattern: {}", e)))?;

        Ok(Self { extension, pattern })
    }

    pub(crate) fn extension(&self) -> &str {
        &self.extension
    }

    /// Split a file name into its version and title.
    ///
    /// Returns `None` for names that do not follow the revision naming
    /// convention, including versions too large to represent.
    pub fn parse_file_name(&self, name: &str) -> Option<(VersionId, String)> {
        let captures = self.pattern.captures(name)?;
        let version = captures[1].parse::<VersionId>().ok()?;
        let title = TITLE_SEPARATOR_REGEX.replace_all(&captures[2], " ").into_owned();
        Some((version, title))
    }

    pub fn load_from_file(&self, path: &Path) -> Result<FileRevision> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| MigrationError::InvalidRevisionFile(path.display().to_string()))?;

        let (version_id, title) = self
            .parse_file_name(file_name)
            .ok_or_else(|| MigrationError::InvalidRevisionFile(file_name.to_string()))?;

        let content = fs::read(path).map_err(|e| MigrationError::io(path, e))?;

        Ok(FileRevision::new(version_id, title, file_name.to_string(), content))
    }

    /// Load every revision file directly inside `dir`, in file name order.
    ///
    /// Files with the revision extension whose names don't parse are
    /// logged and skipped; other files are ignored.
    pub fn scan(&self, dir: &Path) -> Result<Vec<FileRevision>> {
        let entries = fs::read_dir(dir).map_err(|e| MigrationError::io(dir, e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MigrationError::io(dir, e))?;
            let path = entry.path();
            if path.is_file() && self.has_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut revisions = Vec::with_capacity(paths.len());
        for path in paths {
            match self.load_from_file(&path) {
                Ok(revision) => revisions.push(revision),
                Err(e) if e.is_recoverable() => {
                    info!("Skipping file {}, it doesn't match the revision pattern", path.display());
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            "Found {} .{} revision file(s) in {}",
            revisions.len(),
            self.extension(),
            dir.display()
        );
        Ok(revisions)
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}
