// Snowflake metrics - five bounded quality scores per company
//
// Scores are derived from the latest statement (and the one before it, for
// growth). Every division is guarded, so derivation never fails: degenerate
// inputs fall back to fixed constants instead of producing an error.

use crate::entities::financial::{get_statements, FinancialStatement};
use crate::error::StoreError;
use rusqlite::Connection;
use serde::{Serialize, Serializer};

/// Chart labels, in the order the frontend renders them.
pub const METRIC_LABELS: [&str; 5] = [
    "Valuation",
    "Future Growth",
    "Past Performance",
    "Financial Health",
    "Dividend Quality",
];

const SCORE_MIN: f64 = 0.0;
const SCORE_MAX: f64 = 100.0;

// ============================================================================
// SCORE
// ============================================================================

/// One derived score.
///
/// `NoData` is what a company without any statements gets. It reads as `0.0`
/// but serializes as the integer `0`, which keeps it distinguishable from a
/// computed score that happened to clamp to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    NoData,
    Value(f64),
}

impl Score {
    pub fn value(self) -> f64 {
        match self {
            Score::NoData => 0.0,
            Score::Value(v) => v,
        }
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Score::NoData => serializer.serialize_u8(0),
            Score::Value(v) => serializer.serialize_f64(*v),
        }
    }
}

// ============================================================================
// METRIC SCORES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricScores {
    pub valuation: Score,
    pub future_growth: Score,
    pub past_performance: Score,
    pub financial_health: Score,
    pub dividend_quality: Score,
}

impl MetricScores {
    pub fn no_data() -> Self {
        MetricScores {
            valuation: Score::NoData,
            future_growth: Score::NoData,
            past_performance: Score::NoData,
            financial_health: Score::NoData,
            dividend_quality: Score::NoData,
        }
    }

    /// Scores in label order (see [`METRIC_LABELS`]).
    pub fn as_array(&self) -> [Score; 5] {
        [
            self.valuation,
            self.future_growth,
            self.past_performance,
            self.financial_health,
            self.dividend_quality,
        ]
    }
}

/// Derive the five scores from a statement history ordered by year,
/// most recent first.
///
/// The history is trusted to be sorted; it is not re-sorted here. With a
/// single statement, growth is measured against itself and comes out flat.
pub fn derive_metrics(history: &[FinancialStatement]) -> MetricScores {
    let Some(latest) = history.first() else {
        return MetricScores::no_data();
    };
    let previous = history.get(1).unwrap_or(latest);

    MetricScores {
        valuation: Score::Value(finish(valuation_score(latest))),
        future_growth: Score::Value(finish(future_growth_score(latest, previous))),
        past_performance: Score::Value(finish(past_performance_score(latest))),
        financial_health: Score::Value(finish(financial_health_score(latest))),
        dividend_quality: Score::Value(finish(dividend_quality_score(latest))),
    }
}

// NOTE: the "equity" here is profit - liabilities, not assets - liabilities.
// Kept for parity with existing scores.
fn valuation_score(latest: &FinancialStatement) -> f64 {
    let denominator = latest.profit - latest.liabilities;
    let debt_to_equity = if denominator > 0.0 {
        latest.liabilities / denominator
    } else {
        1.0
    };
    100.0 - debt_to_equity * 20.0
}

fn future_growth_score(latest: &FinancialStatement, previous: &FinancialStatement) -> f64 {
    let revenue_growth_pct = if previous.revenue > 0.0 {
        (latest.revenue - previous.revenue) / previous.revenue * 100.0
    } else {
        0.0
    };
    50.0 + revenue_growth_pct
}

fn past_performance_score(latest: &FinancialStatement) -> f64 {
    let profit_margin_pct = if latest.revenue > 0.0 {
        latest.profit / latest.revenue * 100.0
    } else {
        0.0
    };
    profit_margin_pct * 2.0
}

fn financial_health_score(latest: &FinancialStatement) -> f64 {
    let current_ratio = if latest.liabilities > 0.0 {
        latest.profit / latest.liabilities
    } else {
        1.0
    };
    current_ratio * 20.0
}

fn dividend_quality_score(latest: &FinancialStatement) -> f64 {
    let dividend_yield_pct = if latest.revenue > 0.0 {
        latest.dividends / latest.revenue * 100.0
    } else {
        0.0
    };
    dividend_yield_pct * 10.0
}

/// max(lo, min(hi, x)). Written with `min`/`max` rather than `f64::clamp`
/// so a NaN collapses onto a bound instead of escaping the range.
pub fn clamp(lo: f64, hi: f64, x: f64) -> f64 {
    x.min(hi).max(lo)
}

/// Round to one decimal on the exact binary value, ties to even.
///
/// Going through the formatter avoids the error a `x * 10.0` step adds:
/// 0.15 is stored just below 0.15 and must come out as 0.1.
fn round1(x: f64) -> f64 {
    format!("{x:.1}").parse().unwrap_or(x)
}

fn finish(raw: f64) -> f64 {
    round1(clamp(SCORE_MIN, SCORE_MAX, raw))
}

// ============================================================================
// PRESENTATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnowflakePoint {
    pub metric: &'static str,
    pub value: Score,
}

/// Pair each score with its chart label, preserving label order.
pub fn snowflake_data(scores: &MetricScores) -> Vec<SnowflakePoint> {
    METRIC_LABELS
        .iter()
        .zip(scores.as_array())
        .map(|(&metric, value)| SnowflakePoint { metric, value })
        .collect()
}

// ============================================================================
// STORE SEAM
// ============================================================================

/// Anything able to hand over a company's statements, newest year first.
pub trait StatementSource {
    fn statements_for(&self, company_id: i64) -> Result<Vec<FinancialStatement>, StoreError>;
}

impl StatementSource for Connection {
    fn statements_for(&self, company_id: i64) -> Result<Vec<FinancialStatement>, StoreError> {
        get_statements(self, company_id)
    }
}

/// Load a company's history and derive its scores.
pub fn company_metrics<S>(source: &S, company_id: i64) -> Result<MetricScores, StoreError>
where
    S: StatementSource + ?Sized,
{
    let history = source.statements_for(company_id)?;
    Ok(derive_metrics(&history))
}
