pub mod adapter;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod revision;
pub mod runner;
pub mod store;

pub use error::{MigrationError, Result};
pub use reconcile::{Plan, ReconciliationEngine, reconcile};
pub use revision::{FileRevision, RevisionParser, StoredRevision, VersionId};
pub use runner::{MigrationReport, MigrationRunner, Mode};
pub use store::RevisionStore;
