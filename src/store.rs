use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::adapter::Adapter;
use crate::error::{MigrationError, Result};
use crate::revision::{FileRevision, StoredRevision};

pub const DEFAULT_TRACKING_TABLE: &str = "dbvc__schema_version";

static TABLE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Tracking table names are interpolated into SQL, so only plain
/// identifiers are accepted.
pub fn validate_table_name(name: &str) -> Result<()> {
    if TABLE_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(MigrationError::Config(format!(
            "Invalid tracking table name '{}': expected letters, digits and underscores",
            name
        )))
    }
}

/// Applied-revision records kept in the tracking table
pub struct RevisionStore<'a> {
    adapter: &'a mut dyn Adapter,
    table: &'a str,
}

impl<'a> RevisionStore<'a> {
    pub fn new(adapter: &'a mut dyn Adapter, table: &'a str) -> Self {
        Self { adapter, table }
    }

    pub fn ensure_table(&mut self) -> Result<()> {
        if !self.adapter.table_exists(self.table)? {
            info!("Tracking table {} does not exist, creating it", self.table);
            self.adapter.create_tracking_table(self.table)?;
        }
        Ok(())
    }

    pub fn load_applied(&self) -> Result<Vec<StoredRevision>> {
        let revisions = self.adapter.fetch_revisions(self.table)?;
        debug!("Loaded {} applied revision(s) from {}", revisions.len(), self.table);
        Ok(revisions)
    }

    /// Record `revision` as applied now.
    pub fn record(&mut self, revision: &FileRevision) -> Result<StoredRevision> {
        let stored = revision.to_stored(Utc::now().naive_utc());
        self.adapter.insert_revision(self.table, &stored)?;
        Ok(stored)
    }
}
