use async_trait::async_trait;
use reqwest::{header, Client};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};

use super::{BackoffPolicy, EpsSource, FetchThrottle, UserAgentPool};
use crate::error::ApiError;
use crate::models::Config;

const EPS_TABLE_SELECTOR: &str = "table.historical_data_table";

/// Scrapes annual diluted EPS from the macrotrends historical table
#[derive(Debug)]
pub struct MacrotrendsEpsClient {
    client: Client,
    base_url: String,
    throttle: FetchThrottle,
    backoff: BackoffPolicy,
    agents: UserAgentPool,
}

impl MacrotrendsEpsClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        throttle: FetchThrottle,
        backoff: BackoffPolicy,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            throttle,
            backoff,
            agents: UserAgentPool::default(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let backoff = BackoffPolicy {
            max_retries: config.eps_max_retries,
            initial_delay: config.eps_backoff,
            ..BackoffPolicy::default()
        };
        Self::new(
            &config.eps_base_url,
            config.http_timeout,
            FetchThrottle::new(config.eps_fetch_delay),
            backoff,
        )
    }

    pub fn eps_url(&self, ticker: &str) -> String {
        format!(
            "{}/stocks/charts/{}/{}/eps-earnings-per-share-diluted",
            self.base_url,
            ticker.to_uppercase(),
            ticker.to_lowercase()
        )
    }

    /// Download the page, retrying per the backoff policy when blocked
    async fn download(&self, ticker: &str) -> Result<String, ApiError> {
        let url = self.eps_url(ticker);
        let mut attempt = 0;
        loop {
            self.throttle.wait().await;
            debug!("Making request to: {}", url);

            let response = self
                .client
                .get(&url)
                .header(header::USER_AGENT, self.agents.next_agent())
                .send()
                .await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response.text().await?);
            }
            if !BackoffPolicy::is_retryable(status) {
                return Err(ApiError::Status {
                    status: status.as_u16(),
                    url,
                });
            }

            attempt += 1;
            match self.backoff.delay_for(attempt) {
                Some(delay) => {
                    warn!(
                        "[{}] HTTP {} from EPS source, backing off {:?} (retry {}/{})",
                        ticker, status, delay, attempt, self.backoff.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(ApiError::Blocked {
                        status: status.as_u16(),
                        attempts: attempt,
                    })
                }
            }
        }
    }

    pub async fn try_fetch_eps(&self, ticker: &str, year: i32) -> Result<String, ApiError> {
        let html = self.download(ticker).await?;
        extract_eps_for_year(&html, year)
    }
}

/// Find the EPS cell of the row whose first cell is `year`
pub fn extract_eps_for_year(html: &str, year: i32) -> Result<String, ApiError> {
    let document = Html::parse_document(html);
    let table_selector = Selector::parse(EPS_TABLE_SELECTOR)
        .map_err(|e| ApiError::MissingData(format!("invalid selector: {:?}", e)))?;
    let row_selector = Selector::parse("tr")
        .map_err(|e| ApiError::MissingData(format!("invalid selector: {:?}", e)))?;
    let cell_selector = Selector::parse("td")
        .map_err(|e| ApiError::MissingData(format!("invalid selector: {:?}", e)))?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| ApiError::MissingData("EPS table not found".to_string()))?;

    let year_label = year.to_string();
    for row in table.select(&row_selector) {
        let cells: Vec<String> = row
            .select(&cell_selector)
            .map(|td| td.text().collect::<String>().trim().to_string())
            .collect();
        if cells.first().map(String::as_str) == Some(year_label.as_str()) {
            return cells
                .get(1)
                .filter(|eps| !eps.is_empty())
                .cloned()
                .ok_or_else(|| ApiError::MissingData(format!("EPS cell for {} is empty", year)));
        }
    }

    Err(ApiError::MissingData(format!("EPS for {} not found", year)))
}

#[async_trait]
impl EpsSource for MacrotrendsEpsClient {
    async fn fetch_eps(&self, ticker: &str, year: i32) -> Option<String> {
        match self.try_fetch_eps(ticker, year).await {
            Ok(eps) => {
                debug!("[{}] EPS {} = {}", ticker, year, eps);
                Some(eps)
            }
            Err(e) => {
                warn!("[{}] EPS fetch for {} failed: {}", ticker, year, e);
                None
            }
        }
    }
}
