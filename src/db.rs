use crate::auth::hash_password;
use crate::error::StoreError;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

pub type StoreResult<T> = Result<T, StoreError>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a connection with the pragmas every connection needs.
pub fn open_connection(path: &Path) -> StoreResult<Connection> {
    let conn = Connection::open(path)?;
    configure_connection(&conn)?;
    Ok(conn)
}

pub fn configure_connection(conn: &Connection) -> StoreResult<()> {
    apply_pragmas(conn)?;
    Ok(())
}

fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    // WAL for concurrent readers; a no-op ("memory") for in-memory databases
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(BUSY_TIMEOUT)
}

/// Create all tables and seed the admin account. Safe to run on every start.
pub fn setup_database(conn: &Connection, admin_username: &str, admin_password: &str) -> StoreResult<()> {
    configure_connection(conn)?;

    // ==========================================================================
    // Companies & yearly statements
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS companies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            ticker TEXT UNIQUE NOT NULL,
            sector TEXT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS financials (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id INTEGER NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
            year INTEGER NOT NULL,
            revenue REAL,
            profit REAL,
            assets REAL,
            liabilities REAL,
            dividends REAL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (company_id, year)
        )",
        [],
    )?;

    // ==========================================================================
    // Portfolio
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS portfolio (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id INTEGER NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
            shares INTEGER DEFAULT 1,
            purchase_price REAL,
            added_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Users & sessions
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT DEFAULT 'user',
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            token_hash TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_financials_company_year ON financials(company_id, year DESC)",
        [],
    )?;

    // One entry per company. Older databases carry a plain index under the
    // previous name; it is replaced by the unique one.
    conn.execute("DROP INDEX IF EXISTS idx_portfolio_company", [])?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_portfolio_company_unique ON portfolio(company_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at)",
        [],
    )?;

    let seeded = conn.execute(
        "INSERT OR IGNORE INTO users (username, password_hash, role) VALUES (?1, ?2, 'admin')",
        params![admin_username, hash_password(admin_password)],
    )?;
    if seeded > 0 {
        tracing::info!(username = admin_username, "Seeded admin user");
    }

    Ok(())
}

// ============================================================================
// ADMIN STATISTICS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorStat {
    pub sector: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminStats {
    pub company_count: i64,
    pub financial_count: i64,
    pub portfolio_count: i64,
    /// Companies created during the last 7 days
    pub recent_imports: i64,
    pub sector_stats: Vec<SectorStat>,
}

fn count(conn: &Connection, sql: &str) -> StoreResult<i64> {
    Ok(conn.query_row(sql, [], |row| row.get(0))?)
}

pub fn get_admin_stats(conn: &Connection) -> StoreResult<AdminStats> {
    let company_count = count(conn, "SELECT COUNT(*) FROM companies")?;
    let financial_count = count(conn, "SELECT COUNT(*) FROM financials")?;
    let portfolio_count = count(conn, "SELECT COUNT(*) FROM portfolio")?;
    let recent_imports = count(
        conn,
        "SELECT COUNT(*) FROM companies WHERE created_at >= datetime('now', '-7 days')",
    )?;

    let mut stmt = conn.prepare(
        "SELECT sector, COUNT(*) AS count
         FROM companies
         GROUP BY sector
         ORDER BY count DESC, sector",
    )?;

    let sector_stats = stmt
        .query_map([], |row| {
            Ok(SectorStat {
                sector: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AdminStats {
        company_count,
        financial_count,
        portfolio_count,
        recent_imports,
        sector_stats,
    })
}

// ============================================================================
// CONNECTION POOL
// ============================================================================

#[cfg(feature = "server")]
pub use pool::{open_pool, Pool, PooledConnection};

#[cfg(feature = "server")]
mod pool {
    use super::{apply_pragmas, StoreResult};
    use r2d2_sqlite::SqliteConnectionManager;
    use std::path::Path;

    pub type Pool = r2d2::Pool<SqliteConnectionManager>;
    pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

    /// Pool of up to `size` connections to the database file at `path`,
    /// each opened with the same pragmas as [`super::open_connection`].
    pub fn open_pool(path: &Path, size: u32) -> StoreResult<Pool> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| apply_pragmas(conn));
        let pool = r2d2::Pool::builder().max_size(size.max(1)).build(manager)?;
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::company::{upsert_company, NewCompany};

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn, "admin", "admin123").unwrap();
        conn
    }

    #[test]
    fn test_setup_is_idempotent() {
        let conn = test_db();
        setup_database(&conn, "admin", "admin123").unwrap();

        let users: i64 = conn
            .query_row("SELECT COUNT(*) FROM users WHERE role = 'admin'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(users, 1);
    }

    #[test]
    fn test_seeded_admin_password_is_sha256_hex() {
        let conn = test_db();

        let stored: String = conn
            .query_row(
                "SELECT password_hash FROM users WHERE username = 'admin'",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(stored, hash_password("admin123"));
        assert_eq!(stored.len(), 64);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = test_db();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_admin_stats() {
        let conn = test_db();

        let empty = get_admin_stats(&conn).unwrap();
        assert_eq!(empty.company_count, 0);
        assert!(empty.sector_stats.is_empty());

        upsert_company(&conn, &NewCompany::new("Alpha", "AAA", Some("Mining"))).unwrap();
        upsert_company(&conn, &NewCompany::new("Beta", "BBB", Some("Mining"))).unwrap();
        upsert_company(&conn, &NewCompany::new("Gamma", "CCC", Some("Banking"))).unwrap();
        upsert_company(&conn, &NewCompany::new("Delta", "DDD", None)).unwrap();

        let stats = get_admin_stats(&conn).unwrap();
        assert_eq!(stats.company_count, 4);
        assert_eq!(stats.financial_count, 0);
        assert_eq!(stats.portfolio_count, 0);
        assert_eq!(stats.recent_imports, 4);
        assert_eq!(
            stats.sector_stats[0],
            SectorStat {
                sector: Some("Mining".to_string()),
                count: 2
            }
        );
        assert_eq!(stats.sector_stats.len(), 3);
    }

    #[test]
    fn test_plain_portfolio_index_becomes_unique() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE portfolio (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id INTEGER NOT NULL,
                shares INTEGER DEFAULT 1,
                purchase_price REAL,
                added_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX idx_portfolio_company ON portfolio(company_id);",
        )
        .unwrap();

        setup_database(&conn, "admin", "pw").unwrap();

        let indexes: Vec<(String, i64)> = conn
            .prepare("SELECT name, \"unique\" FROM pragma_index_list('portfolio') ORDER BY name")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(indexes, vec![("idx_portfolio_company_unique".to_string(), 1)]);
    }

    #[cfg(feature = "server")]
    #[test]
    fn test_pool_connections_share_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(&dir.path().join("pool.db"), 2).unwrap();
        assert_eq!(pool.max_size(), 2);

        let a = pool.get().unwrap();
        setup_database(&a, "admin", "pw").unwrap();
        let b = pool.get().unwrap();

        upsert_company(&a, &NewCompany::new("Alpha", "AAA", None)).unwrap();
        let seen: i64 = b
            .query_row("SELECT COUNT(*) FROM companies", [], |row| row.get(0))
            .unwrap();
        assert_eq!(seen, 1);

        let foreign_keys: i64 = b
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);
    }
}
