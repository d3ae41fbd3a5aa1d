// Stock Snowflake - Core Library
// Company financials store, snowflake metrics, CSV import and the API server

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod importer;
pub mod logging;
pub mod metrics;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use auth::{AuthContext, LoginSession};
pub use config::Settings;
pub use db::{get_admin_stats, open_connection, setup_database, AdminStats, SectorStat};
#[cfg(feature = "server")]
pub use db::{open_pool, Pool, PooledConnection};
pub use entities::{Company, CompanySummary, FinancialStatement, NewCompany, PortfolioEntry, User};
pub use error::{ConfigError, ImportError, StoreError};
pub use importer::{import_csv, import_csv_path, ImportReport, SkippedRow};
pub use metrics::{
    company_metrics, derive_metrics, snowflake_data, MetricScores, Score, SnowflakePoint,
    StatementSource, METRIC_LABELS,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
