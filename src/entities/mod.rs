// Store entities
//
// Each module owns one table family: its row types and the SQL that reads
// and writes them. All functions take a plain `&Connection`, so they work
// the same on a pooled connection, a test database or inside a savepoint.

pub mod company;
pub mod financial;
pub mod portfolio;
pub mod user;

pub use company::{Company, CompanySummary, NewCompany};
pub use financial::FinancialStatement;
pub use portfolio::PortfolioEntry;
pub use user::User;
