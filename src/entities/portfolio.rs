// Portfolio - at most one entry per company

use crate::db::StoreResult;
use crate::entities::company::{company_exists, Company};
use crate::error::StoreError;
use rusqlite::{params, Connection};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioEntry {
    pub id: i64,
    pub shares: i64,
    pub purchase_price: Option<f64>,
    /// SQLite `CURRENT_TIMESTAMP` text, UTC
    pub added_at: String,
    pub company: Company,
}

/// Entries with their company, most recently added first.
pub fn list_portfolio(conn: &Connection) -> StoreResult<Vec<PortfolioEntry>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.shares, p.purchase_price, p.added_at,
                c.id, c.name, c.ticker, c.sector
         FROM portfolio p
         JOIN companies c ON p.company_id = c.id
         ORDER BY p.added_at DESC, p.id DESC",
    )?;

    let entries = stmt
        .query_map([], |row| {
            Ok(PortfolioEntry {
                id: row.get(0)?,
                shares: row.get::<_, Option<i64>>(1)?.unwrap_or(1),
                purchase_price: row.get(2)?,
                added_at: row.get(3)?,
                company: Company {
                    id: row.get(4)?,
                    name: row.get(5)?,
                    ticker: row.get(6)?,
                    sector: row.get(7)?,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

/// Add a company to the portfolio and return the new entry id.
///
/// Fails with `NotFound` for an unknown company and `Conflict` when the
/// company is already held.
pub fn add_to_portfolio(
    conn: &Connection,
    company_id: i64,
    shares: i64,
    purchase_price: f64,
) -> StoreResult<i64> {
    if !company_exists(conn, company_id)? {
        return Err(StoreError::not_found("Company not found"));
    }

    // the unique index on company_id decides, also between connections
    let inserted = conn.execute(
        "INSERT INTO portfolio (company_id, shares, purchase_price) VALUES (?1, ?2, ?3)
         ON CONFLICT(company_id) DO NOTHING",
        params![company_id, shares, purchase_price],
    )?;
    if inserted == 0 {
        return Err(StoreError::conflict("Company already in portfolio"));
    }

    Ok(conn.last_insert_rowid())
}

pub fn remove_from_portfolio(conn: &Connection, entry_id: i64) -> StoreResult<()> {
    let removed = conn.execute("DELETE FROM portfolio WHERE id = ?1", [entry_id])?;
    if removed == 0 {
        return Err(StoreError::not_found("Portfolio item not found"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_connection, setup_database};
    use crate::entities::company::{upsert_company, NewCompany};
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn, "admin", "pw").unwrap();
        conn
    }

    #[test]
    fn test_add_list_remove() {
        let conn = test_db();
        let acme = upsert_company(&conn, &NewCompany::new("Acme", "ACM", Some("Mining"))).unwrap();
        let beta = upsert_company(&conn, &NewCompany::new("Beta", "BET", None)).unwrap();

        let first = add_to_portfolio(&conn, acme, 10, 2.5).unwrap();
        let second = add_to_portfolio(&conn, beta, 1, 0.0).unwrap();

        let entries = list_portfolio(&conn).unwrap();
        assert_eq!(entries.len(), 2);
        // same-second inserts fall back to id order, newest first
        assert_eq!(entries[0].id, second);
        assert_eq!(entries[1].company.ticker, "ACM");
        assert_eq!(entries[1].shares, 10);
        assert_eq!(entries[1].purchase_price, Some(2.5));

        remove_from_portfolio(&conn, first).unwrap();
        assert_eq!(list_portfolio(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_company_is_a_conflict() {
        let conn = test_db();
        let acme = upsert_company(&conn, &NewCompany::new("Acme", "ACM", None)).unwrap();

        add_to_portfolio(&conn, acme, 1, 0.0).unwrap();
        let err = add_to_portfolio(&conn, acme, 1, 0.0).unwrap_err();

        assert!(matches!(err, StoreError::Conflict(ref m) if m == "Company already in portfolio"));
    }

    #[test]
    fn test_concurrent_adds_keep_one_entry_per_company() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portfolio.db");

        let conn = open_connection(&path).unwrap();
        setup_database(&conn, "admin", "pw").unwrap();
        let ids: Vec<i64> = (0..50)
            .map(|i| {
                let ticker = format!("T{i:03}");
                upsert_company(&conn, &NewCompany::new(&ticker, &ticker, None)).unwrap()
            })
            .collect();

        let barrier = Arc::new(Barrier::new(2));
        let workers: Vec<_> = (0..2)
            .map(|_| {
                let path = path.clone();
                let ids = ids.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let conn = open_connection(&path).unwrap();
                    let mut added = 0usize;
                    for id in ids {
                        barrier.wait();
                        match add_to_portfolio(&conn, id, 1, 0.0) {
                            Ok(_) => added += 1,
                            Err(StoreError::Conflict(_)) => {}
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                    added
                })
            })
            .collect();

        let added: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(added, ids.len());
        assert_eq!(list_portfolio(&conn).unwrap().len(), ids.len());
    }

    #[test]
    fn test_unknown_company_and_entry() {
        let conn = test_db();

        assert!(matches!(
            add_to_portfolio(&conn, 77, 1, 0.0),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            remove_from_portfolio(&conn, 77),
            Err(StoreError::NotFound(ref m)) if m == "Portfolio item not found"
        ));
    }
}
