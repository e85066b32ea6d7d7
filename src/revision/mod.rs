pub mod checksum;
pub mod parser;

use chrono::NaiveDateTime;
use std::fmt;

use crate::error::{MigrationError, Result};

pub use checksum::{compute_checksum, NormalizedChecksums};
pub use parser::RevisionParser;

pub type VersionId = u64;

/// Format used for `created_on` values written to the tracking table
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A revision found on disk during a directory scan
#[derive(Debug, Clone)]
pub struct FileRevision {
    pub version_id: VersionId,
    pub title: String,
    pub file_name: String,
    pub checksum: String,
    /// Raw file bytes; only decoded when the revision is executed
    pub content: Vec<u8>,
    pub normalized: NormalizedChecksums,
}

/// A revision recorded in the tracking table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRevision {
    pub version_id: VersionId,
    pub file_name: String,
    pub checksum: String,
    pub title: Option<String>,
    pub created_on: Option<NaiveDateTime>,
}

impl FileRevision {
    pub fn new(version_id: VersionId, title: String, file_name: String, content: Vec<u8>) -> Self {
        Self {
            version_id,
            title,
            file_name,
            checksum: checksum::checksum_bytes(&content),
            normalized: NormalizedChecksums::from_content(&content),
            content,
        }
    }

    /// Whether `checksum` identifies this file's content, tolerating
    /// line-ending conversions.
    pub fn accepts_checksum(&self, checksum: &str) -> bool {
        self.checksum == checksum || self.normalized.contains(checksum)
    }

    /// A stored record matches when it names the same file and its
    /// checksum is accepted.
    pub fn matches(&self, stored: &StoredRevision) -> bool {
        self.file_name == stored.file_name && self.accepts_checksum(&stored.checksum)
    }

    /// The content as SQL text for the adapter.
    pub fn sql(&self) -> Result<&str> {
        std::str::from_utf8(&self.content).map_err(|e| {
            MigrationError::io(
                &self.file_name,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    /// Build the tracking record written after this revision is applied.
    pub fn to_stored(&self, created_on: NaiveDateTime) -> StoredRevision {
        StoredRevision {
            version_id: self.version_id,
            file_name: self.file_name.clone(),
            checksum: self.checksum.clone(),
            title: Some(self.title.clone()),
            created_on: Some(created_on),
        }
    }
}

impl fmt::Display for FileRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:md5:{}]", self.file_name, self.checksum)
    }
}

impl fmt::Display for StoredRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:md5:{}]", self.file_name, self.checksum)
    }
}
