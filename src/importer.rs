// CSV bulk import - companies + yearly statements in one file
//
// Expected header:
//   Company,Ticker,Sector,Year,Revenue,Profit,Assets,Liabilities,Dividends
//
// Rows are validated and applied one at a time, each inside its own
// savepoint. A row that fails is rolled back and reported; the rest of the
// batch still goes in.

use crate::entities::company::{upsert_company, NewCompany};
use crate::entities::financial::{upsert_statement, FinancialStatement};
use crate::error::{ImportError, StoreError};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const EXPECTED_COLUMNS: [&str; 9] = [
    "Company",
    "Ticker",
    "Sector",
    "Year",
    "Revenue",
    "Profit",
    "Assets",
    "Liabilities",
    "Dividends",
];

// ============================================================================
// ROW PARSING
// ============================================================================

/// A row exactly as it sits in the file; every cell optional text.
#[derive(Debug, Default, Deserialize)]
struct RawRow {
    #[serde(rename = "Company", default)]
    company: Option<String>,
    #[serde(rename = "Ticker", default)]
    ticker: Option<String>,
    #[serde(rename = "Sector", default)]
    sector: Option<String>,
    #[serde(rename = "Year", default)]
    year: Option<String>,
    #[serde(rename = "Revenue", default)]
    revenue: Option<String>,
    #[serde(rename = "Profit", default)]
    profit: Option<String>,
    #[serde(rename = "Assets", default)]
    assets: Option<String>,
    #[serde(rename = "Liabilities", default)]
    liabilities: Option<String>,
    #[serde(rename = "Dividends", default)]
    dividends: Option<String>,
}

/// A validated row, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub company: NewCompany,
    pub statement: FinancialStatement,
}

impl ImportRow {
    fn parse(raw: &RawRow) -> Result<Self, String> {
        let name = required_text(&raw.company, "Company")?;
        let ticker = required_text(&raw.ticker, "Ticker")?;
        let sector = raw
            .sector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let year_text = required_text(&raw.year, "Year")?;
        let year = year_text
            .parse::<i64>()
            .map_err(|_| format!("Year {year_text:?} is not an integer"))?;

        Ok(ImportRow {
            company: NewCompany::new(name, ticker, sector),
            statement: FinancialStatement {
                year,
                revenue: required_number(&raw.revenue, "Revenue")?,
                profit: required_number(&raw.profit, "Profit")?,
                assets: required_number(&raw.assets, "Assets")?,
                liabilities: required_number(&raw.liabilities, "Liabilities")?,
                dividends: required_number(&raw.dividends, "Dividends")?,
            },
        })
    }
}

fn required_text<'a>(cell: &'a Option<String>, column: &str) -> Result<&'a str, String> {
    cell.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing {column}"))
}

fn required_number(cell: &Option<String>, column: &str) -> Result<f64, String> {
    let text = required_text(cell, column)?;
    let value = text
        .parse::<f64>()
        .map_err(|_| format!("{column} {text:?} is not a number"))?;
    if !value.is_finite() {
        return Err(format!("{column} {text:?} is not a finite number"));
    }
    Ok(value)
}

// ============================================================================
// IMPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    /// 1-based line in the source file (the header is line 1)
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: Vec<SkippedRow>,
}

impl ImportReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Import every row of a CSV stream. Only unreadable input or a failure to
/// open/commit the batch aborts; bad rows are skipped.
pub fn import_csv<R: Read>(conn: &Connection, input: R) -> Result<ImportReport, ImportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);
    let headers = rdr.headers()?.clone();

    let missing: Vec<&str> = EXPECTED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();
    if !missing.is_empty() {
        tracing::warn!(?missing, "CSV header lacks expected columns");
    }

    let mut tx = conn.unchecked_transaction()?;
    let mut report = ImportReport::default();

    for result in rdr.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                skip(&mut report, line, e.to_string());
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let row = record
            .deserialize::<RawRow>(Some(&headers))
            .map_err(|e| e.to_string())
            .and_then(|raw| ImportRow::parse(&raw));
        let row = match row {
            Ok(row) => row,
            Err(reason) => {
                skip(&mut report, line, reason);
                continue;
            }
        };

        let sp = tx.savepoint()?;
        match apply_row(&sp, &row) {
            Ok(()) => {
                sp.commit()?;
                report.imported += 1;
            }
            Err(e) => {
                // dropping the savepoint rolls the row back
                drop(sp);
                skip(&mut report, line, e.to_string());
            }
        }
    }

    tx.commit()?;

    tracing::info!(
        imported = report.imported,
        skipped = report.skipped_count(),
        "CSV import finished"
    );
    Ok(report)
}

/// Open `path` and import it.
pub fn import_csv_path(conn: &Connection, path: &Path) -> Result<ImportReport, ImportError> {
    let file = File::open(path)?;
    import_csv(conn, file)
}

fn apply_row(conn: &Connection, row: &ImportRow) -> Result<(), StoreError> {
    let company_id = upsert_company(conn, &row.company)?;
    upsert_statement(conn, company_id, &row.statement)
}

fn skip(report: &mut ImportReport, line: u64, reason: String) {
    tracing::warn!(line, %reason, "Skipping CSV row");
    report.skipped.push(SkippedRow { line, reason });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::entities::company::{get_company, list_company_summaries};
    use crate::entities::financial::get_statements;
    use pretty_assertions::assert_eq;

    const HEADER: &str = "Company,Ticker,Sector,Year,Revenue,Profit,Assets,Liabilities,Dividends\n";

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn, "admin", "pw").unwrap();
        conn
    }

    fn run(conn: &Connection, body: &str) -> ImportReport {
        import_csv(conn, format!("{HEADER}{body}").as_bytes()).unwrap()
    }

    #[test]
    fn test_imports_valid_rows() {
        let conn = test_db();

        let report = run(
            &conn,
            "Acme Mining,ACM,Mining,2022,800,150,5000,90,40\n\
             Acme Mining,ACM,Mining,2023,1000,200,5500,100,50\n\
             Bank Co,BNK,,2023,300, 30 ,900,10,0\n",
        );

        assert_eq!(report.imported, 3);
        assert!(report.skipped.is_empty());

        let summaries = list_company_summaries(&conn).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].ticker, "ACM");
        assert_eq!(summaries[0].latest_year, 2023);
        assert_eq!(summaries[1].sector, None);
        assert_eq!(summaries[1].profit, Some(30.0));
    }

    #[test]
    fn test_bad_rows_are_skipped_not_fatal() {
        let conn = test_db();

        let report = run(
            &conn,
            "Acme,ACM,Mining,2023,1000,200,5500,100,50\n\
             Broken,BRK,Mining,twenty,1,1,1,1,1\n\
             NoTicker,,Mining,2023,1,1,1,1,1\n\
             Weird,WRD,Mining,2023,abc,1,1,1,1\n\
             Infinite,INF,Mining,2023,inf,1,1,1,1\n\
             Short,SHT,Mining,2023\n\
             Beta,BET,Energy,2023,10,1,1,1,0\n",
        );

        assert_eq!(report.imported, 2);
        let lines: Vec<u64> = report.skipped.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![3, 4, 5, 6, 7]);
        assert_eq!(report.skipped[0].reason, "Year \"twenty\" is not an integer");
        assert_eq!(report.skipped[1].reason, "missing Ticker");
        assert_eq!(report.skipped[2].reason, "Revenue \"abc\" is not a number");
        assert_eq!(report.skipped[3].reason, "Revenue \"inf\" is not a finite number");

        // nothing from a skipped row leaks into the store
        let tickers: Vec<String> = list_company_summaries(&conn)
            .unwrap()
            .into_iter()
            .map(|s| s.ticker)
            .collect();
        assert_eq!(tickers, vec!["ACM".to_string(), "BET".to_string()]);
    }

    #[test]
    fn test_reimport_updates_in_place() {
        let conn = test_db();

        run(&conn, "Acme,ACM,Mining,2023,1000,200,5500,100,50\n");
        let report = run(&conn, "Acme Holdings,ACM,Energy,2023,1200,210,5600,90,55\n");
        assert_eq!(report.imported, 1);

        let summaries = list_company_summaries(&conn).unwrap();
        assert_eq!(summaries.len(), 1);
        let company = get_company(&conn, summaries[0].id).unwrap().unwrap();
        assert_eq!(company.name, "Acme Holdings");

        let statements = get_statements(&conn, company.id).unwrap();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].revenue, 1200.0);
    }

    #[test]
    fn test_zero_valued_figures_are_accepted() {
        let conn = test_db();
        let report = run(&conn, "Zero,ZRO,,2023,0,0,0,0,0\n");
        assert_eq!(report.imported, 1);
    }

    #[test]
    fn test_blank_figure_skips_the_row() {
        let conn = test_db();
        let report = run(&conn, "Gap,GAP,Mining,2023,,10,100,5,1\n");
        assert_eq!(report.imported, 0);
        assert_eq!(report.skipped[0].reason, "missing Revenue");
    }

    #[test]
    fn test_empty_input() {
        let conn = test_db();
        let report = import_csv(&conn, "".as_bytes()).unwrap();
        assert_eq!(report, ImportReport::default());
    }

    #[test]
    fn test_import_from_path() {
        let conn = test_db();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("financials.csv");
        std::fs::write(&path, format!("{HEADER}Acme,ACM,Mining,2023,1,1,1,1,1\n")).unwrap();

        let report = import_csv_path(&conn, &path).unwrap();
        assert_eq!(report.imported, 1);

        assert!(matches!(
            import_csv_path(&conn, &dir.path().join("missing.csv")),
            Err(ImportError::Io(_))
        ));
    }
}
