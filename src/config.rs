use clap::Parser;
use std::path::PathBuf;

use crate::adapter::ConnectionParams;
use crate::revision::VersionId;
use crate::runner::Mode;
use crate::store::DEFAULT_TRACKING_TABLE;

#[derive(Parser, Debug, Clone)]
#[command(name = "dbvc")]
#[command(about = "dbvc - apply versioned SQL revision files and detect drift in applied ones", long_about = None)]
pub struct Config {
    // Revisions
    #[arg(short, long, default_value = "revisions", env = "DBVC_REVISIONS_DIR", help = "Directory holding <version>_<title>.sql revision files")]
    pub revisions_dir: PathBuf,

    #[arg(short, long, default_value = "dry-run", env = "DBVC_MODE", help = "Run mode: dry-run, interactive, non-interactive or check")]
    pub mode: String,

    #[arg(short, long, default_value = "0", env = "DBVC_BASE_VERSION", help = "Version below which history is assumed to be present already")]
    pub base_version: VersionId,

    #[arg(short = 'y', long, env = "DBVC_ASSUME_YES", help = "Answer yes to the interactive confirmation")]
    pub yes: bool,

    #[arg(long, default_value = DEFAULT_TRACKING_TABLE, env = "DBVC_TRACKING_TABLE", help = "Table recording applied revisions")]
    pub tracking_table: String,

    // Database connection
    #[arg(short, long, default_value = "sqlite", env = "DBVC_ADAPTER", help = "Database adapter")]
    pub adapter: String,

    #[arg(long, env = "DBVC_HOST")]
    pub host: Option<String>,

    #[arg(long, env = "DBVC_PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "DBVC_USER")]
    pub user: Option<String>,

    #[arg(long, env = "DBVC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(short, long, default_value = "dbvc.db", env = "DBVC_DATABASE", help = "Database name; a file path or :memory: for SQLite")]
    pub database: String,

    #[arg(long, default_value = "info", env = "DBVC_LOG_LEVEL")]
    pub log_level: String,
}

impl Config {
    /// Get a configuration instance with all values resolved from CLI args and environment variables
    pub fn load() -> Self {
        Config::parse()
    }

    pub fn run_mode(&self) -> Mode {
        Mode::from_name(&self.mode)
    }

    pub fn connection_params(&self) -> ConnectionParams {
        ConnectionParams {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
        }
    }
}
