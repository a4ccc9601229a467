use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info};

use super::CompanyUniverse;
use crate::error::ApiError;
use crate::models::{CompanyRecord, Config};

const COMPANY_HEADER: &str = "Company";
const TICKER_HEADER: &str = "Ticker";

/// Reads index constituents from a Wikipedia page
#[derive(Debug, Clone)]
pub struct WikipediaUniverseClient {
    client: Client,
    url: String,
}

impl WikipediaUniverseClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("intrinsic-value/0.1")
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(&config.universe_url, config.http_timeout)
    }
}

#[async_trait]
impl CompanyUniverse for WikipediaUniverseClient {
    async fn list_companies(&self) -> Result<Vec<CompanyRecord>, ApiError> {
        info!("🌐 Fetching company universe from {}", self.url);
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status {
                status: response.status().as_u16(),
                url: self.url.clone(),
            });
        }
        let html = response.text().await?;
        parse_constituents(&html)
    }
}

fn selector(css: &str) -> Result<Selector, ApiError> {
    Selector::parse(css).map_err(|e| ApiError::MissingData(format!("invalid selector: {:?}", e)))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    let text = cell.text().collect::<String>();
    // Drop footnote markers such as "Ticker[3]"
    let text = text.split('[').next().unwrap_or("");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Take the first table whose header has both a Company and a Ticker column
pub fn parse_constituents(html: &str) -> Result<Vec<CompanyRecord>, ApiError> {
    let document = Html::parse_document(html);
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;
    let header_selector = selector("th")?;
    let cell_selector = selector("th, td")?;
    let data_selector = selector("td")?;

    for table in document.select(&table_selector) {
        let Some(header_row) = table
            .select(&row_selector)
            .find(|row| row.select(&header_selector).next().is_some())
        else {
            continue;
        };
        let headers: Vec<String> = header_row.select(&header_selector).map(cell_text).collect();
        let company_idx = headers.iter().position(|h| h == COMPANY_HEADER);
        let ticker_idx = headers.iter().position(|h| h == TICKER_HEADER);
        let (Some(company_idx), Some(ticker_idx)) = (company_idx, ticker_idx) else {
            continue;
        };

        let mut companies = Vec::new();
        for row in table.select(&row_selector) {
            if row.select(&data_selector).next().is_none() {
                continue;
            }
            let cells: Vec<String> = row.select(&cell_selector).map(cell_text).collect();
            let (Some(company), Some(ticker)) = (cells.get(company_idx), cells.get(ticker_idx))
            else {
                debug!("Skipping short universe row: {:?}", cells);
                continue;
            };
            if company.is_empty() || ticker.is_empty() {
                continue;
            }
            companies.push(CompanyRecord::new(company.clone(), ticker.clone()));
        }

        if companies.is_empty() {
            return Err(ApiError::MissingData(
                "constituents table has no rows".to_string(),
            ));
        }
        return Ok(companies);
    }

    Err(ApiError::MissingData(
        "no table with Company and Ticker columns".to_string(),
    ))
}
