//! Durable EPS cache keyed by (ticker, year).
//!
//! The CSV file has one row per ticker with `Ticker`, `Company` and one
//! `EPS_<year>` column for every year ever stored. Every access re-reads the
//! file, so nothing is assumed about what another process wrote in between.
//! Two processes writing at once is last-writer-wins; there is no locking.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::debug;

use crate::error::CacheError;
use crate::models::CompanyRecord;
use crate::utils::write_atomically;

const TICKER_COLUMN: &str = "Ticker";
const COMPANY_COLUMN: &str = "Company";
const EPS_PREFIX: &str = "EPS_";

/// Key/value contract for EPS lookups
pub trait EpsStore {
    fn get(&self, ticker: &str, year: i32) -> Result<Option<String>, CacheError>;

    /// Store `eps` for `(company.ticker, year)`. Returns `false` when the stored
    /// value was already identical and nothing was written.
    fn put(&self, company: &CompanyRecord, year: i32, eps: &str) -> Result<bool, CacheError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
struct CacheRow {
    ticker: String,
    company: String,
    values: BTreeMap<i32, String>,
}

#[derive(Debug, Default)]
struct CacheTable {
    years: BTreeSet<i32>,
    rows: Vec<CacheRow>,
}

impl CacheTable {
    fn row(&self, ticker: &str) -> Option<&CacheRow> {
        self.rows.iter().find(|r| r.ticker == ticker)
    }

    fn row_mut(&mut self, company: &CompanyRecord) -> &mut CacheRow {
        let index = match self.rows.iter().position(|r| r.ticker == company.ticker) {
            Some(index) => index,
            None => {
                self.rows.push(CacheRow {
                    ticker: company.ticker.clone(),
                    company: company.company_name.clone(),
                    values: BTreeMap::new(),
                });
                self.rows.len() - 1
            }
        };
        &mut self.rows[index]
    }
}

/// [`EpsStore`] backed by a CSV file
#[derive(Debug, Clone)]
pub struct CsvEpsCache {
    path: PathBuf,
}

impl CsvEpsCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<CacheTable, CacheError> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CacheTable::default()),
            Err(e) => return Err(e.into()),
        };
        if content.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(CacheTable::default());
        }

        let mut reader = csv::Reader::from_reader(content.as_slice());
        let headers = reader.headers()?.clone();

        let mut ticker_idx = None;
        let mut company_idx = None;
        let mut year_columns = Vec::new();
        for (idx, name) in headers.iter().enumerate() {
            let name = name.trim();
            if name == TICKER_COLUMN {
                ticker_idx = Some(idx);
            } else if name == COMPANY_COLUMN {
                company_idx = Some(idx);
            } else if let Some(year) = name.strip_prefix(EPS_PREFIX) {
                let year = year
                    .parse::<i32>()
                    .map_err(|_| CacheError::Header(format!("bad year column {:?}", name)))?;
                year_columns.push((idx, year));
            } else {
                return Err(CacheError::Header(format!("unexpected column {:?}", name)));
            }
        }
        let ticker_idx =
            ticker_idx.ok_or_else(|| CacheError::Header("missing Ticker column".to_string()))?;

        let mut table = CacheTable {
            years: year_columns.iter().map(|(_, year)| *year).collect(),
            rows: Vec::new(),
        };
        for record in reader.records() {
            let record = record?;
            let ticker = record.get(ticker_idx).unwrap_or("").trim().to_string();
            if ticker.is_empty() {
                continue;
            }
            let company = company_idx
                .and_then(|idx| record.get(idx))
                .unwrap_or("")
                .trim()
                .to_string();
            let values = year_columns
                .iter()
                .filter_map(|(idx, year)| {
                    let value = record.get(*idx)?.trim();
                    (!value.is_empty()).then(|| (*year, value.to_string()))
                })
                .collect();
            table.rows.push(CacheRow { ticker, company, values });
        }
        Ok(table)
    }

    fn save(&self, table: &CacheTable) -> Result<(), CacheError> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = vec![TICKER_COLUMN.to_string(), COMPANY_COLUMN.to_string()];
        header.extend(table.years.iter().map(|year| format!("{EPS_PREFIX}{year}")));
        writer.write_record(&header)?;

        for row in &table.rows {
            let mut record = vec![row.ticker.as_str(), row.company.as_str()];
            record.extend(
                table
                    .years
                    .iter()
                    .map(|year| row.values.get(year).map(String::as_str).unwrap_or("")),
            );
            writer.write_record(&record)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| CacheError::Io(e.into_error()))?;
        write_atomically(&self.path, &bytes)?;
        Ok(())
    }
}

impl EpsStore for CsvEpsCache {
    fn get(&self, ticker: &str, year: i32) -> Result<Option<String>, CacheError> {
        let table = self.load()?;
        Ok(table
            .row(ticker)
            .and_then(|row| row.values.get(&year))
            .cloned())
    }

    fn put(&self, company: &CompanyRecord, year: i32, eps: &str) -> Result<bool, CacheError> {
        let eps = eps.trim();
        let mut table = self.load()?;

        let row = table.row_mut(company);
        if row.values.get(&year).map(String::as_str) == Some(eps) {
            debug!("Cache already holds {} {} = {}", company.ticker, year, eps);
            return Ok(false);
        }
        if row.company.is_empty() {
            row.company = company.company_name.clone();
        }
        row.values.insert(year, eps.to_string());
        table.years.insert(year);

        self.save(&table)?;
        debug!("Cached {} {} = {}", company.ticker, year, eps);
        Ok(true)
    }
}
