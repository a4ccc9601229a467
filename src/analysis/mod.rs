//! Valuation pipeline: value each EPS pair, price it, persist, filter, rank.

use chrono::{Datelike, NaiveDate};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::api::PriceSource;
use crate::error::Result;
use crate::models::{EpsPair, PricedValuation, RunParams, ValuationParams};
use crate::price_oracle::PriceOracle;
use crate::report::{self, ReportPaths};
use crate::valuation::value_pair;

pub mod undervalued;

pub use undervalued::{filter_undervalued, is_undervalued, mos_diff_pct, sort_by_mos_diff};

/// Counts reported at the end of a valuation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub input_rows: usize,
    pub valued: usize,
    pub dropped: usize,
    pub missing_price: usize,
    pub undervalued: usize,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub paths: ReportPaths,
    pub summary: RunSummary,
    pub results: Vec<PricedValuation>,
}

/// Date used for the price lookup. Past years use 7 January of that year as a
/// fixed start-of-year anchor so backtests line up with live runs.
pub fn price_lookup_date(final_year: i32, today: NaiveDate) -> NaiveDate {
    if final_year == today.year() {
        return today;
    }
    NaiveDate::from_ymd_opt(final_year, 1, 7).unwrap_or(today)
}

pub struct ValuationPipeline<P> {
    oracle: PriceOracle<P>,
    params: ValuationParams,
    output_dir: PathBuf,
}

impl<P: PriceSource> ValuationPipeline<P> {
    pub fn new(oracle: PriceOracle<P>, params: ValuationParams, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            oracle,
            params,
            output_dir: output_dir.into(),
        }
    }

    /// Value and price every row. Rows that cannot be valued are dropped;
    /// rows whose price is unavailable are kept with an empty price.
    pub async fn price_valuations(
        &self,
        eps_table: &[EpsPair],
        run: &RunParams,
        today: NaiveDate,
        summary: &mut RunSummary,
    ) -> Vec<PricedValuation> {
        let lookup_date = price_lookup_date(run.final_year, today);
        let mut results = Vec::new();

        for pair in eps_table {
            let result = match value_pair(pair, &self.params) {
                Ok(result) => result,
                Err(e) => {
                    debug!("[{}] dropped: {}", pair.ticker, e);
                    summary.dropped += 1;
                    continue;
                }
            };

            let quote = self.oracle.price_on(&result.ticker, Some(lookup_date)).await;
            if quote.is_none() {
                warn!("[{}] no price near {}, keeping row without price", result.ticker, lookup_date);
                summary.missing_price += 1;
            }
            results.push(PricedValuation {
                result,
                price_date: quote.map(|q| q.resolved_date),
                current_price: quote.map(|q| q.price),
                calculation_date: today,
            });
        }
        summary.valued = results.len();
        results
    }

    /// Full pipeline: price, persist everything, filter, rank and persist the
    /// undervalued subset.
    pub async fn run(&self, eps_table: &[EpsPair], run: &RunParams, today: NaiveDate) -> Result<RunOutcome> {
        let mut summary = RunSummary {
            input_rows: eps_table.len(),
            ..RunSummary::default()
        };
        let results = self.price_valuations(eps_table, run, today, &mut summary).await;

        let paths = ReportPaths::for_run(&self.output_dir, run);
        report::write_results(&paths.all_results, &results)?;
        info!(
            "💾 Saved intrinsic values for {} companies to {} ({} dropped for invalid EPS)",
            results.len(),
            paths.all_results.display(),
            summary.dropped
        );

        let undervalued = filter_undervalued(&results, self.params.undervalued_tolerance);
        report::write_results(&paths.undervalued, undervalued.iter().map(|e| &e.priced))?;
        summary.undervalued = undervalued.len();
        info!(
            "📉 {} undervalued companies saved to {}",
            undervalued.len(),
            paths.undervalued.display()
        );

        let sorted = sort_by_mos_diff(undervalued);
        let price_column = report::price_column_name(price_lookup_date(run.final_year, today));
        report::write_sorted_report(
            &paths.undervalued_sorted,
            &paths.undervalued_sorted_html,
            &sorted,
            &price_column,
        )?;
        info!("🏁 Ranked report written to {}", paths.undervalued_sorted.display());

        Ok(RunOutcome {
            paths,
            summary,
            results,
        })
    }
}
