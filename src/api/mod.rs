use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::ApiError;
use crate::models::{CompanyRecord, DailyClose};

pub mod macrotrends_client;
pub mod rate_limit;
pub mod wikipedia_client;
pub mod yahoo_client;

pub use macrotrends_client::MacrotrendsEpsClient;
pub use rate_limit::{BackoffPolicy, FetchThrottle, UserAgentPool};
pub use wikipedia_client::WikipediaUniverseClient;
pub use yahoo_client::YahooPriceClient;

/// Source of the set of companies to analyse
#[async_trait]
pub trait CompanyUniverse {
    /// Fails when the source table cannot be located or parsed.
    async fn list_companies(&self) -> Result<Vec<CompanyRecord>, ApiError>;
}

/// Source of one EPS figure per (ticker, year)
#[async_trait]
pub trait EpsSource {
    /// Never fails: network errors, missing tables and missing years all come
    /// back as `None` after being logged.
    async fn fetch_eps(&self, ticker: &str, year: i32) -> Option<String>;
}

/// Daily closing prices
#[async_trait]
pub trait PriceSource {
    /// Closes for trading days in `[start, end)`, in any order.
    async fn daily_closes(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>, ApiError>;
}
