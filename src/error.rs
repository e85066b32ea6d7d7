use std::path::PathBuf;
use thiserror::Error;

use crate::revision::VersionId;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Applied revision at version {version}, {file} was not found")]
    MissingRevisionFile { version: VersionId, file: String },

    #[error(
        "Applied revision is no longer valid: version {version} recorded as [{stored_file}:md5:{stored_checksum}], revision file is [{file}:md5:{file_checksum}]"
    )]
    ChecksumMismatch {
        version: VersionId,
        stored_file: String,
        stored_checksum: String,
        file: String,
        file_checksum: String,
    },

    #[error("Duplicate revision at version {version}: {existing} and {duplicate}")]
    DuplicateVersion {
        version: VersionId,
        existing: String,
        duplicate: String,
    },

    #[error("Invalid revision file name: {0}")]
    InvalidRevisionFile(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Database schema is outdated. Current version: {current}, target version: {target}, {pending} revision(s) pending"
    )]
    Outdated {
        current: VersionId,
        target: VersionId,
        pending: usize,
    },
}

pub type Result<T> = std::result::Result<T, MigrationError>;

impl MigrationError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MigrationError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short name of the error class, used when reporting a failed run
    pub fn kind(&self) -> &'static str {
        match self {
            MigrationError::Config(_) => "ConfigError",
            MigrationError::MissingRevisionFile { .. } => "MissingRevisionFile",
            MigrationError::ChecksumMismatch { .. } => "ChecksumMismatch",
            MigrationError::DuplicateVersion { .. } => "DuplicateVersion",
            MigrationError::InvalidRevisionFile(_) => "InvalidRevisionFile",
            MigrationError::Connection(_) => "ConnectionError",
            MigrationError::Query(_) => "QueryError",
            MigrationError::Io { .. } => "IOError",
            MigrationError::Outdated { .. } => "Outdated",
        }
    }

    /// Whether a scan may log this error and carry on with the next file
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MigrationError::InvalidRevisionFile(_))
    }
}

impl From<rusqlite::Error> for MigrationError {
    fn from(e: rusqlite::Error) -> Self {
        MigrationError::Query(e.to_string())
    }
}
