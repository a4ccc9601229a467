use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// One constituent of the analysed universe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub company_name: String,
    pub ticker: String,
}

impl CompanyRecord {
    pub fn new(company_name: impl Into<String>, ticker: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            ticker: ticker.into(),
        }
    }
}

/// EPS for a single (ticker, year). `eps` keeps the raw string as published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpsObservation {
    pub ticker: String,
    pub year: i32,
    pub eps: Option<String>,
}

/// Row of the acquisition output table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpsPair {
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "EPS_initial")]
    pub eps_initial: Option<String>,
    #[serde(rename = "EPS_latest")]
    pub eps_latest: Option<String>,
}

/// Years whose EPS are compared for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearWindow {
    pub initial: i32,
    pub latest: i32,
}

impl YearWindow {
    /// EPS for `final_year` itself is not published until the following year,
    /// so the window ends one year earlier.
    pub const fn for_run(final_year: i32, years_back: u32) -> Self {
        let latest = final_year - 1;
        Self {
            initial: latest - years_back as i32,
            latest,
        }
    }

    pub fn years(&self) -> [i32; 2] {
        [self.initial, self.latest]
    }
}

/// Output of the valuation engine for one EPS pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Valuation {
    pub eps_initial: f64,
    pub eps_latest: f64,
    pub eps_cagr_pct: f64,
    pub future_eps: f64,
    pub future_price: f64,
    pub sticker_price: f64,
    pub mos_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValuationResult {
    pub ticker: String,
    pub company: String,
    pub valuation: Valuation,
}

/// Closing price resolved by the price oracle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    pub price: f64,
    pub resolved_date: NaiveDate,
}

/// One daily bar as returned by a price source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedValuation {
    pub result: ValuationResult,
    pub price_date: Option<NaiveDate>,
    pub current_price: Option<f64>,
    pub calculation_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UndervaluedEntry {
    pub priced: PricedValuation,
    pub mos_diff_pct: f64,
}

/// The three invocation parameters of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunParams {
    pub backtest: bool,
    pub final_year: i32,
    pub years_back: u32,
}

impl RunParams {
    pub const DEFAULT_YEARS_BACK: u32 = 10;

    pub fn live(today: NaiveDate) -> Self {
        Self {
            backtest: false,
            final_year: today.year(),
            years_back: Self::DEFAULT_YEARS_BACK,
        }
    }

    pub const fn window(&self) -> YearWindow {
        YearWindow::for_run(self.final_year, self.years_back)
    }

    /// Year at the start of the lookback span, used in report names
    pub const fn start_year(&self) -> i32 {
        self.final_year - self.years_back as i32
    }
}

/// Parameters of the discounted-future-earnings model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValuationParams {
    pub years: u32,
    pub pe_ratio: f64,
    pub discount_rate: f64,
    pub mos_fraction: f64,
    pub undervalued_tolerance: f64,
}

impl Default for ValuationParams {
    fn default() -> Self {
        Self {
            years: 10,
            pe_ratio: 30.0,
            discount_rate: 0.15,
            mos_fraction: 0.5,
            undervalued_tolerance: 1.15,
        }
    }
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub eps_cache_path: PathBuf,
    pub output_dir: PathBuf,
    pub eps_fetch_delay: Duration,
    pub http_timeout: Duration,
    pub eps_max_retries: u32,
    pub eps_backoff: Duration,
    pub universe_url: String,
    pub eps_base_url: String,
    pub price_base_url: String,
    pub valuation: ValuationParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            eps_cache_path: PathBuf::from("nasdaq_eps_cache.csv"),
            output_dir: PathBuf::from("."),
            eps_fetch_delay: Duration::from_secs(15),
            http_timeout: Duration::from_secs(30),
            eps_max_retries: 3,
            eps_backoff: Duration::from_secs(30),
            universe_url: "https://en.wikipedia.org/wiki/Nasdaq-100".to_string(),
            eps_base_url: "https://www.macrotrends.net".to_string(),
            price_base_url: "https://query1.finance.yahoo.com".to_string(),
            valuation: ValuationParams::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let defaults = Self::default();
        let valuation = ValuationParams {
            years: env_parse("VALUATION_YEARS", defaults.valuation.years),
            pe_ratio: env_parse("VALUATION_PE_RATIO", defaults.valuation.pe_ratio),
            discount_rate: env_parse("VALUATION_DISCOUNT_RATE", defaults.valuation.discount_rate),
            ..defaults.valuation
        };

        Self {
            eps_cache_path: std::env::var("EPS_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.eps_cache_path),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            eps_fetch_delay: Duration::from_secs(env_parse(
                "EPS_FETCH_DELAY_SECS",
                defaults.eps_fetch_delay.as_secs(),
            )),
            http_timeout: Duration::from_secs(env_parse(
                "HTTP_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )),
            eps_max_retries: env_parse("EPS_MAX_RETRIES", defaults.eps_max_retries),
            eps_backoff: Duration::from_secs(env_parse(
                "EPS_BACKOFF_SECS",
                defaults.eps_backoff.as_secs(),
            )),
            universe_url: std::env::var("UNIVERSE_URL").unwrap_or(defaults.universe_url),
            eps_base_url: std::env::var("EPS_BASE_URL").unwrap_or(defaults.eps_base_url),
            price_base_url: std::env::var("PRICE_BASE_URL").unwrap_or(defaults.price_base_url),
            valuation,
        }
    }
}

fn env_parse<T: std::str::FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparsable {}={:?}, using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

/// Today's date in UTC
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
