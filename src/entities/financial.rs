// Financial statements - one row per company per year

use crate::db::StoreResult;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

/// One company's figures for one fiscal year.
///
/// `assets` is stored and returned but no score reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatement {
    pub year: i64,
    pub revenue: f64,
    pub profit: f64,
    pub assets: f64,
    pub liabilities: f64,
    pub dividends: f64,
}

impl FinancialStatement {
    /// Columns `year, revenue, profit, assets, liabilities, dividends` starting
    /// at `offset`. NULL figures read as zero.
    pub(crate) fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(FinancialStatement {
            year: row.get(offset)?,
            revenue: figure(row, offset + 1)?,
            profit: figure(row, offset + 2)?,
            assets: figure(row, offset + 3)?,
            liabilities: figure(row, offset + 4)?,
            dividends: figure(row, offset + 5)?,
        })
    }
}

fn figure(row: &Row<'_>, idx: usize) -> rusqlite::Result<f64> {
    Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or(0.0))
}

/// All statements for a company, newest year first. Unknown companies
/// simply have no statements.
pub fn get_statements(conn: &Connection, company_id: i64) -> StoreResult<Vec<FinancialStatement>> {
    let mut stmt = conn.prepare_cached(
        "SELECT year, revenue, profit, assets, liabilities, dividends
         FROM financials
         WHERE company_id = ?1
         ORDER BY year DESC",
    )?;

    let statements = stmt
        .query_map([company_id], |row| FinancialStatement::from_row(row, 0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(statements)
}

/// Insert a statement, replacing the figures if that year already exists.
pub fn upsert_statement(
    conn: &Connection,
    company_id: i64,
    statement: &FinancialStatement,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO financials (company_id, year, revenue, profit, assets, liabilities, dividends)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (company_id, year) DO UPDATE SET
            revenue = excluded.revenue,
            profit = excluded.profit,
            assets = excluded.assets,
            liabilities = excluded.liabilities,
            dividends = excluded.dividends",
        params![
            company_id,
            statement.year,
            statement.revenue,
            statement.profit,
            statement.assets,
            statement.liabilities,
            statement.dividends,
        ],
    )?;

    Ok(())
}

pub fn count_statements(conn: &Connection, company_id: i64) -> StoreResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM financials WHERE company_id = ?1",
        [company_id],
        |row| row.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::entities::company::{upsert_company, NewCompany};

    fn setup() -> (Connection, i64) {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn, "admin", "pw").unwrap();
        let id = upsert_company(&conn, &NewCompany::new("Acme", "ACM", None)).unwrap();
        (conn, id)
    }

    fn year(year: i64, revenue: f64) -> FinancialStatement {
        FinancialStatement {
            year,
            revenue,
            profit: 1.0,
            assets: 2.0,
            liabilities: 3.0,
            dividends: 4.0,
        }
    }

    #[test]
    fn test_statements_come_back_newest_first() {
        let (conn, id) = setup();

        for y in [2019, 2023, 2021] {
            upsert_statement(&conn, id, &year(y, y as f64)).unwrap();
        }

        let years: Vec<i64> = get_statements(&conn, id)
            .unwrap()
            .into_iter()
            .map(|s| s.year)
            .collect();
        assert_eq!(years, vec![2023, 2021, 2019]);
    }

    #[test]
    fn test_same_year_is_replaced_not_duplicated() {
        let (conn, id) = setup();

        upsert_statement(&conn, id, &year(2023, 100.0)).unwrap();
        upsert_statement(&conn, id, &year(2023, 250.0)).unwrap();

        let statements = get_statements(&conn, id).unwrap();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].revenue, 250.0);
        assert_eq!(count_statements(&conn, id).unwrap(), 1);
    }

    #[test]
    fn test_null_figures_read_as_zero() {
        let (conn, id) = setup();

        conn.execute(
            "INSERT INTO financials (company_id, year, revenue) VALUES (?1, 2020, 10.0)",
            [id],
        )
        .unwrap();

        let statements = get_statements(&conn, id).unwrap();
        assert_eq!(
            statements[0],
            FinancialStatement {
                year: 2020,
                revenue: 10.0,
                profit: 0.0,
                assets: 0.0,
                liabilities: 0.0,
                dividends: 0.0,
            }
        );
    }

    #[test]
    fn test_unknown_company_has_no_statements() {
        let (conn, _) = setup();
        assert!(get_statements(&conn, 9999).unwrap().is_empty());
    }

    #[test]
    fn test_statement_requires_existing_company() {
        let (conn, _) = setup();
        assert!(upsert_statement(&conn, 9999, &year(2023, 1.0)).is_err());
    }
}
