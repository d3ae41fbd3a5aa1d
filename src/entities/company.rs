// Companies - identity is the ticker; the numeric id is what the API hands out

use crate::db::StoreResult;
use crate::error::StoreError;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub ticker: String,
    pub sector: Option<String>,
}

/// Company fields as they arrive from an import, before an id exists.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCompany {
    pub name: String,
    pub ticker: String,
    pub sector: Option<String>,
}

impl NewCompany {
    pub fn new(name: &str, ticker: &str, sector: Option<&str>) -> Self {
        NewCompany {
            name: name.to_string(),
            ticker: ticker.to_string(),
            sector: sector.map(str::to_string),
        }
    }
}

/// A company together with its latest year's figures, for the listing page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanySummary {
    pub id: i64,
    pub name: String,
    pub ticker: String,
    pub sector: Option<String>,
    pub latest_year: i64,
    pub revenue: Option<f64>,
    pub profit: Option<f64>,
    pub assets: Option<f64>,
    pub liabilities: Option<f64>,
    pub dividends: Option<f64>,
}

/// Every company that has at least one statement, paired with its most
/// recent one, ordered by name.
pub fn list_company_summaries(conn: &Connection) -> StoreResult<Vec<CompanySummary>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, c.ticker, c.sector,
                f.year, f.revenue, f.profit, f.assets, f.liabilities, f.dividends
         FROM companies c
         JOIN financials f ON f.company_id = c.id
         WHERE f.year = (SELECT MAX(year) FROM financials WHERE company_id = c.id)
         ORDER BY c.name, c.id",
    )?;

    let summaries = stmt
        .query_map([], |row| {
            Ok(CompanySummary {
                id: row.get(0)?,
                name: row.get(1)?,
                ticker: row.get(2)?,
                sector: row.get(3)?,
                latest_year: row.get(4)?,
                revenue: row.get(5)?,
                profit: row.get(6)?,
                assets: row.get(7)?,
                liabilities: row.get(8)?,
                dividends: row.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(summaries)
}

pub fn get_company(conn: &Connection, company_id: i64) -> StoreResult<Option<Company>> {
    let company = conn
        .query_row(
            "SELECT id, name, ticker, sector FROM companies WHERE id = ?1",
            [company_id],
            |row| {
                Ok(Company {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    ticker: row.get(2)?,
                    sector: row.get(3)?,
                })
            },
        )
        .optional()?;

    Ok(company)
}

pub fn company_exists(conn: &Connection, company_id: i64) -> StoreResult<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM companies WHERE id = ?1", [company_id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

/// Insert a company or refresh its name and sector, keyed by ticker.
/// Returns the (stable) company id.
pub fn upsert_company(conn: &Connection, company: &NewCompany) -> StoreResult<i64> {
    let id = conn.query_row(
        "INSERT INTO companies (name, ticker, sector) VALUES (?1, ?2, ?3)
         ON CONFLICT (ticker) DO UPDATE SET
            name = excluded.name,
            sector = excluded.sector
         RETURNING id",
        params![company.name, company.ticker, company.sector],
        |row| row.get(0),
    )?;

    Ok(id)
}

/// Remove a company with its statements and portfolio entries.
///
/// Runs as one transaction; when the company does not exist nothing is
/// changed and `NotFound` is returned.
pub fn delete_company(conn: &Connection, company_id: i64) -> StoreResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute("DELETE FROM portfolio WHERE company_id = ?1", [company_id])?;
    tx.execute("DELETE FROM financials WHERE company_id = ?1", [company_id])?;
    let removed = tx.execute("DELETE FROM companies WHERE id = ?1", [company_id])?;

    if removed == 0 {
        // dropping `tx` rolls back
        return Err(StoreError::not_found("Company not found"));
    }

    tx.commit()?;
    tracing::info!(company_id, "Deleted company");
    Ok(())
}
