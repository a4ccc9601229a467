use std::cmp::Ordering;

use crate::models::{PricedValuation, UndervaluedEntry};

/// Absorbs binary rounding so a price exactly at the threshold passes
const THRESHOLD_EPSILON: f64 = 1e-9;

/// `current_price <= tolerance * mos_price`
pub fn is_undervalued(current_price: f64, mos_price: f64, tolerance: f64) -> bool {
    current_price > 0.0 && current_price <= tolerance * mos_price + THRESHOLD_EPSILON
}

/// Percentage the MOS price sits above (positive) or below the market price
pub fn mos_diff_pct(mos_price: f64, current_price: f64) -> f64 {
    100.0 * (mos_price - current_price) / current_price
}

/// Keep rows whose price passes the tolerance check. Rows without a price
/// cannot be judged and are left out.
pub fn filter_undervalued(rows: &[PricedValuation], tolerance: f64) -> Vec<UndervaluedEntry> {
    rows.iter()
        .filter_map(|row| {
            let price = row.current_price?;
            let mos = row.result.valuation.mos_price;
            is_undervalued(price, mos, tolerance).then(|| UndervaluedEntry {
                priced: row.clone(),
                mos_diff_pct: mos_diff_pct(mos, price),
            })
        })
        .collect()
}

/// Most undervalued first; equal scores keep their input order
pub fn sort_by_mos_diff(mut entries: Vec<UndervaluedEntry>) -> Vec<UndervaluedEntry> {
    entries.sort_by(|a, b| {
        b.mos_diff_pct
            .partial_cmp(&a.mos_diff_pct)
            .unwrap_or(Ordering::Equal)
    });
    entries
}
