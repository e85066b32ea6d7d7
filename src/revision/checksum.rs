use md5::{Digest, Md5};
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::fs;
use std::path::Path;

use crate::error::{MigrationError, Result};

static LINE_ENDING_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r\n|\r|\n").unwrap());

/// Checksums of a revision's content rewritten to each line-ending convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedChecksums {
    pub lf: String,
    pub crlf: String,
    pub cr: String,
}

impl NormalizedChecksums {
    pub fn from_content(content: &[u8]) -> Self {
        Self {
            lf: checksum_bytes(&LINE_ENDING_REGEX.replace_all(content, &b"\n"[..])),
            crlf: checksum_bytes(&LINE_ENDING_REGEX.replace_all(content, &b"\r\n"[..])),
            cr: checksum_bytes(&LINE_ENDING_REGEX.replace_all(content, &b"\r"[..])),
        }
    }

    pub fn contains(&self, checksum: &str) -> bool {
        self.lf == checksum || self.crlf == checksum || self.cr == checksum
    }
}

/// MD5 of `bytes` as 32 lowercase hex characters
pub fn checksum_bytes(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

/// Checksum of the file at `path`
pub fn compute_checksum(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| MigrationError::io(path, e))?;
    Ok(checksum_bytes(&bytes))
}

/// Checksums of `content` under LF, CRLF and CR line endings
pub fn normalized_checksums(content: &[u8]) -> NormalizedChecksums {
    NormalizedChecksums::from_content(content)
}
