use chrono::NaiveDateTime;
use rusqlite::{Connection, params};
use std::path::Path;
use tracing::{debug, info};

use super::{Adapter, ConnectionParams};
use crate::error::{MigrationError, Result};
use crate::revision::{StoredRevision, TIMESTAMP_FORMAT, VersionId};

/// SQLite backend; `database` is a file path or `:memory:`
pub struct SqliteAdapter {
    conn: Connection,
}

impl SqliteAdapter {
    pub fn connect(params: &ConnectionParams) -> Result<Self> {
        if params.host.is_some() || params.user.is_some() {
            debug!("SQLite adapter ignores host and user settings");
        }

        let conn = if params.database == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(Path::new(&params.database))
        }
        .map_err(|e| {
            MigrationError::Connection(format!("Failed to open database {}: {}", params.database, e))
        })?;

        info!("Connected to SQLite database {}", params.database);
        Ok(Self { conn })
    }

    #[cfg(test)]
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Adapter for SqliteAdapter {
    fn execute(&mut self, batch: &str) -> Result<()> {
        self.conn.execute_batch(batch)?;
        Ok(())
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![name],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(exists)
    }

    fn create_tracking_table(&mut self, name: &str) -> Result<()> {
        self.conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{name}" (
                version_id INTEGER PRIMARY KEY,
                file TEXT NOT NULL,
                checksum TEXT NOT NULL,
                title TEXT,
                created_on TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
            "#
        ))?;
        Ok(())
    }

    fn fetch_revisions(&self, table: &str) -> Result<Vec<StoredRevision>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"SELECT version_id, file, checksum, title, created_on FROM "{table}" ORDER BY version_id"#
        ))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(version, file_name, checksum, title, created_on)| -> Result<StoredRevision> {
                let version_id = VersionId::try_from(version).map_err(|_| {
                    MigrationError::Query(format!("Invalid version {} in {}", version, table))
                })?;
                Ok(StoredRevision {
                    version_id,
                    file_name,
                    checksum,
                    title,
                    created_on: created_on
                        .and_then(|s| NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).ok()),
                })
            })
            .collect()
    }

    fn insert_revision(&mut self, table: &str, revision: &StoredRevision) -> Result<()> {
        let version = i64::try_from(revision.version_id).map_err(|_| {
            MigrationError::Query(format!("Version {} does not fit the tracking table", revision.version_id))
        })?;
        let created_on = revision
            .created_on
            .unwrap_or_else(|| chrono::Utc::now().naive_utc())
            .format(TIMESTAMP_FORMAT)
            .to_string();

        self.conn.execute(
            &format!(
                r#"INSERT INTO "{table}" (version_id, file, checksum, title, created_on) VALUES (?1, ?2, ?3, ?4, ?5)"#
            ),
            params![version, revision.file_name, revision.checksum, revision.title, created_on],
        )?;
        Ok(())
    }
}
