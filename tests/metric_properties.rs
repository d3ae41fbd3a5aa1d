use proptest::prelude::*;
use proptest::test_runner::Config;
use stock_snowflake::{derive_metrics, FinancialStatement, MetricScores, Score};

fn figure() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(0.0),
        -1.0e6..1.0e6,
        -1.0e15..1.0e15,
        any::<f64>().prop_filter("finite", |v| v.is_finite()),
    ]
}

fn statement() -> impl Strategy<Value = FinancialStatement> {
    (1990_i64..2030, figure(), figure(), figure(), figure(), figure()).prop_map(
        |(year, revenue, profit, assets, liabilities, dividends)| FinancialStatement {
            year,
            revenue,
            profit,
            assets,
            liabilities,
            dividends,
        },
    )
}

fn values(scores: &MetricScores) -> [f64; 5] {
    scores.as_array().map(Score::value)
}

proptest! {
    #![proptest_config(Config::with_cases(512))]

    #[test]
    fn scores_stay_within_bounds(history in prop::collection::vec(statement(), 0..6)) {
        for score in values(&derive_metrics(&history)) {
            prop_assert!((0.0..=100.0).contains(&score), "score {} out of range", score);
        }
    }

    #[test]
    fn scores_have_one_decimal(history in prop::collection::vec(statement(), 1..4)) {
        for score in values(&derive_metrics(&history)) {
            let tenths = score * 10.0;
            prop_assert!((tenths - tenths.round()).abs() < 1e-9, "{} has more than one decimal", score);
        }
    }

    #[test]
    fn derivation_is_deterministic(history in prop::collection::vec(statement(), 0..4)) {
        let first = values(&derive_metrics(&history)).map(f64::to_bits);
        let second = values(&derive_metrics(&history)).map(f64::to_bits);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn single_statement_growth_is_flat(latest in statement()) {
        prop_assert_eq!(derive_metrics(&[latest]).future_growth, Score::Value(50.0));
    }

    #[test]
    fn history_beyond_two_years_is_ignored(
        latest in statement(),
        previous in statement(),
        older in prop::collection::vec(statement(), 0..4),
    ) {
        let mut history = vec![latest.clone(), previous.clone()];
        history.extend(older);
        prop_assert_eq!(derive_metrics(&history), derive_metrics(&[latest, previous]));
    }

    #[test]
    fn input_is_left_untouched(history in prop::collection::vec(statement(), 0..4)) {
        let before = history.clone();
        let _ = derive_metrics(&history);
        prop_assert_eq!(before, history);
    }
}
