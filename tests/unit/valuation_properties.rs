//! Valuation engine and undervalued filter properties

use pretty_assertions::assert_eq;
use test_log::test;

use intrinsic_value::analysis::{filter_undervalued, sort_by_mos_diff};
use intrinsic_value::models::{
    PricedValuation, UndervaluedEntry, Valuation, ValuationParams, ValuationResult,
};
use intrinsic_value::valuation::value;

use crate::common::date;

#[test]
fn test_sticker_and_mos_follow_from_future_price() {
    let params = ValuationParams::default();
    let discount = (1.0 + params.discount_rate).powi(params.years as i32);
    let samples = [0.05, 0.4, 1.0, 2.37, 5.0, 13.9, 48.25];

    for initial in samples {
        for latest in samples {
            let v = value(&initial.to_string(), &latest.to_string(), &params)
                .unwrap_or_else(|| panic!("{initial}/{latest} should be valued"));
            let unrounded_future = latest * latest / initial * params.pe_ratio;
            let unrounded_sticker = unrounded_future / discount;
            // Rounding to cents may land on either side of a half cent
            assert!(
                (v.sticker_price - unrounded_sticker).abs() <= 0.005 + 1e-9,
                "{initial}/{latest}: sticker {} vs {}",
                v.sticker_price,
                unrounded_sticker
            );
            assert!(
                (v.mos_price - unrounded_sticker * 0.5).abs() <= 0.005 + 1e-9,
                "{initial}/{latest}: mos {} vs {}",
                v.mos_price,
                unrounded_sticker * 0.5
            );
        }
    }
}

#[test]
fn test_non_positive_or_non_numeric_eps_is_absent() {
    let params = ValuationParams::default();
    for (initial, latest) in [
        ("0", "1.00"),
        ("0.00", "0.00"),
        ("-1.25", "2.00"),
        ("2.00", "-0.01"),
        ("N/A", "2.00"),
        ("2.00", "--"),
        ("", "2.00"),
    ] {
        assert_eq!(value(initial, latest, &params), None, "{initial:?}/{latest:?}");
    }
}

fn priced(ticker: &str, mos_price: f64, current_price: f64) -> PricedValuation {
    PricedValuation {
        result: ValuationResult {
            ticker: ticker.to_string(),
            company: ticker.to_string(),
            valuation: Valuation {
                eps_initial: 1.0,
                eps_latest: 2.0,
                eps_cagr_pct: 7.18,
                future_eps: 4.0,
                future_price: 120.0,
                sticker_price: mos_price * 2.0,
                mos_price,
            },
        },
        price_date: Some(date(2025, 1, 7)),
        current_price: Some(current_price),
        calculation_date: date(2025, 1, 7),
    }
}

#[test]
fn test_filter_boundary_is_inclusive() {
    let rows = vec![
        priced("EDGE", 20.0, 23.0),
        priced("OVER", 20.0, 23.01),
        priced("ROUND", 40.0, 46.0),
        priced("ROUNDOVER", 40.0, 46.01),
    ];
    let kept: Vec<String> = filter_undervalued(&rows, 1.15)
        .into_iter()
        .map(|e| e.priced.result.ticker)
        .collect();
    assert_eq!(kept, vec!["EDGE".to_string(), "ROUND".to_string()]);
}

#[test]
fn test_ranked_order() {
    let entries: Vec<UndervaluedEntry> = [("A", 5.0), ("B", 20.0), ("C", 10.0)]
        .into_iter()
        .map(|(ticker, diff)| UndervaluedEntry {
            priced: priced(ticker, 10.0, 9.0),
            mos_diff_pct: diff,
        })
        .collect();
    let diffs: Vec<f64> = sort_by_mos_diff(entries)
        .into_iter()
        .map(|e| e.mos_diff_pct)
        .collect();
    assert_eq!(diffs, vec![20.0, 10.0, 5.0]);
}
