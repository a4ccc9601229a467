use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::PriceSource;
use crate::error::ApiError;
use crate::models::{Config, DailyClose};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
    #[serde(default)]
    adjclose: Vec<AdjCloseSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseSeries {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Daily closes from the Yahoo Finance chart endpoint
#[derive(Debug, Clone)]
pub struct YahooPriceClient {
    client: Client,
    base_url: String,
}

impl YahooPriceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (compatible; intrinsic-value/0.1)")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(&config.price_base_url, config.http_timeout)
    }

    fn chart_url(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Url, ApiError> {
        let mut url = Url::parse(&format!("{}/v8/finance/chart/{}", self.base_url, ticker))?;
        url.query_pairs_mut()
            .append_pair("period1", &midnight_timestamp(start).to_string())
            .append_pair("period2", &midnight_timestamp(end).to_string())
            .append_pair("interval", "1d")
            .append_pair("events", "history");
        Ok(url)
    }
}

fn midnight_timestamp(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Turn a chart payload into closes, preferring split/dividend adjusted values
fn parse_chart(body: &str) -> Result<Vec<DailyClose>, ApiError> {
    let response: ChartResponse = serde_json::from_str(body)?;
    if let Some(error) = response.chart.error {
        return Err(ApiError::MissingData(format!(
            "chart error {}: {}",
            error.code.unwrap_or_default(),
            error.description.unwrap_or_default()
        )));
    }
    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };

    let offset = result.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
    let timestamps = result.timestamp.unwrap_or_default();
    let closes = match result.indicators.adjclose.into_iter().next() {
        Some(series) if !series.adjclose.is_empty() => series.adjclose,
        _ => result
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|q| q.close)
            .unwrap_or_default(),
    };

    Ok(timestamps
        .into_iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let date = DateTime::from_timestamp(ts + offset, 0)?.date_naive();
            Some(DailyClose { date, close: close? })
        })
        .collect())
}

#[async_trait]
impl PriceSource for YahooPriceClient {
    async fn daily_closes(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>, ApiError> {
        let url = self.chart_url(ticker, start, end)?;
        debug!("Making request to: {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        // Unknown tickers come back as 404 with a chart error body
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.text().await?;
        let closes: Vec<DailyClose> = parse_chart(&body)?
            .into_iter()
            .filter(|c| c.date >= start && c.date < end)
            .collect();

        debug!("Retrieved {} closes for {} from {} to {}", closes.len(), ticker, start, end);
        Ok(closes)
    }
}
