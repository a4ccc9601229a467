pub mod analysis;
pub mod api;
pub mod cache;
pub mod eps_collector;
pub mod error;
pub mod models;
pub mod price_oracle;
pub mod report;
pub mod utils;
pub mod valuation;

pub use error::{Result, ScreenerError};
