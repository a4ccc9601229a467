//! Closing price on or near a target date.

use chrono::{Duration, NaiveDate};
use tracing::{debug, warn};

use crate::api::PriceSource;
use crate::models::{today, PriceQuote};
use crate::utils::MarketCalendar;

/// Days before the target date included in the lookup window
const WINDOW_DAYS_BEFORE: i64 = 2;

pub struct PriceOracle<P> {
    source: P,
}

impl<P: PriceSource> PriceOracle<P> {
    pub fn new(source: P) -> Self {
        Self { source }
    }

    /// Close for `ticker` on `date` (today when `None`).
    ///
    /// Weekends resolve to the preceding Friday. When the exact day has no
    /// close (holiday, halt) the most recent close in
    /// `[date - 2, date + 1)` is used instead. The returned quote carries the
    /// trading date the close belongs to.
    pub async fn price_on(&self, ticker: &str, date: Option<NaiveDate>) -> Option<PriceQuote> {
        let requested = date.unwrap_or_else(today);
        let target = MarketCalendar::last_weekday_on_or_before(requested);
        if MarketCalendar::is_weekend(requested) {
            debug!("[{}] {} is a weekend, pricing {} instead", ticker, requested, target);
        }
        let start = target - Duration::days(WINDOW_DAYS_BEFORE);
        let end = target + Duration::days(1);

        let closes = match self.source.daily_closes(ticker, start, end).await {
            Ok(closes) => closes,
            Err(e) => {
                warn!("[{}] price lookup near {} failed: {}", ticker, target, e);
                return None;
            }
        };

        let in_window = closes
            .into_iter()
            .filter(|c| c.date >= start && c.date < end && c.close.is_finite());
        let quote = in_window
            .max_by_key(|c| c.date)
            .map(|c| PriceQuote {
                price: c.close,
                resolved_date: c.date,
            });

        match quote {
            Some(quote) => {
                if quote.resolved_date != target {
                    debug!(
                        "[{}] no close on {}, using {}",
                        ticker, target, quote.resolved_date
                    );
                }
                debug!("{} closing price on {}: ${:.2}", ticker, quote.resolved_date, quote.price);
                Some(quote)
            }
            None => {
                warn!("No price data found for {} near {}", ticker, target);
                None
            }
        }
    }
}
