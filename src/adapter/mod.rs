pub mod registry;
pub mod sqlite;

use crate::error::Result;
use crate::revision::StoredRevision;

/// Connection settings handed to an adapter constructor
#[derive(Debug, Clone, Default)]
pub struct ConnectionParams {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: String,
}

/// Capabilities the migration core needs from a storage backend.
///
/// `fetch_revisions` and `insert_revision` form the tracking-table store;
/// the rest is plain statement execution.
pub trait Adapter {
    /// Run `batch`, which may hold several statements, as one unit.
    fn execute(&mut self, batch: &str) -> Result<()>;

    fn table_exists(&self, name: &str) -> Result<bool>;

    /// Create the tracking table if it does not exist yet.
    fn create_tracking_table(&mut self, name: &str) -> Result<()>;

    /// All rows of the tracking table.
    fn fetch_revisions(&self, table: &str) -> Result<Vec<StoredRevision>>;

    fn insert_revision(&mut self, table: &str, revision: &StoredRevision) -> Result<()>;
}

pub use registry::{connect, AdapterFactory, ADAPTERS};
pub use sqlite::SqliteAdapter;
