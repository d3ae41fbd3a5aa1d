use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use stock_snowflake::entities::company::{get_company, list_company_summaries};
use stock_snowflake::{
    company_metrics, import_csv_path, logging, open_connection, setup_database, Settings,
    METRIC_LABELS,
};

/// Company financials store with snowflake quality scores.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database file (overrides DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the tables and seed the admin user.
    Init,
    /// Bulk import companies and yearly statements from a CSV file.
    Import {
        /// CSV with Company,Ticker,Sector,Year,Revenue,Profit,Assets,Liabilities,Dividends
        csv: PathBuf,
    },
    /// List companies with their latest figures.
    Companies,
    /// Print the five snowflake scores of one company.
    Metrics {
        company_id: i64,
    },
}

fn main() -> Result<()> {
    logging::init_tracing("stock_snowflake=info");

    let cli = Cli::parse();
    let mut settings = Settings::from_env()?;
    if let Some(path) = cli.database {
        settings.database_path = path;
    }

    let conn = open_store(&settings)?;

    match cli.command {
        Commands::Init => {
            println!("✓ Database ready at {}", settings.database_path.display());
        }
        Commands::Import { csv } => run_import(&conn, &csv)?,
        Commands::Companies => print_companies(&conn)?,
        Commands::Metrics { company_id } => print_metrics(&conn, company_id)?,
    }

    Ok(())
}

fn open_store(settings: &Settings) -> Result<Connection> {
    let conn = open_connection(&settings.database_path)
        .with_context(|| format!("Failed to open database {:?}", settings.database_path))?;
    setup_database(&conn, &settings.admin_username, &settings.admin_password)
        .context("Failed to initialize database schema")?;
    Ok(conn)
}

fn run_import(conn: &Connection, csv: &Path) -> Result<()> {
    let report = import_csv_path(conn, csv)
        .with_context(|| format!("Failed to import {}", csv.display()))?;

    println!("✓ Imported: {} rows", report.imported);
    if !report.skipped.is_empty() {
        println!("✗ Skipped: {} rows", report.skipped.len());
        for row in &report.skipped {
            println!("   line {}: {}", row.line, row.reason);
        }
    }

    Ok(())
}

fn print_companies(conn: &Connection) -> Result<()> {
    let summaries = list_company_summaries(conn)?;
    if summaries.is_empty() {
        println!("No companies with financial data yet.");
        return Ok(());
    }

    println!(
        "{:>5}  {:<8}  {:<28}  {:<16}  {:>6}  {:>14}  {:>14}",
        "ID", "TICKER", "NAME", "SECTOR", "YEAR", "REVENUE", "PROFIT"
    );
    for c in summaries {
        println!(
            "{:>5}  {:<8}  {:<28}  {:<16}  {:>6}  {:>14.2}  {:>14.2}",
            c.id,
            c.ticker,
            c.name,
            c.sector.as_deref().unwrap_or("-"),
            c.latest_year,
            c.revenue.unwrap_or(0.0),
            c.profit.unwrap_or(0.0),
        );
    }

    Ok(())
}

fn print_metrics(conn: &Connection, company_id: i64) -> Result<()> {
    let company = get_company(conn, company_id)?
        .with_context(|| format!("Company {company_id} not found"))?;
    let scores = company_metrics(conn, company_id)?;

    println!("{} ({})", company.name, company.ticker);
    for (label, score) in METRIC_LABELS.iter().zip(scores.as_array()) {
        println!("  {:<18} {:>5.1}", label, score.value());
    }

    Ok(())
}
