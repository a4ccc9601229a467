//! Report files for a valuation run.
//!
//! File names depend only on `(backtest, final_year, years_back)`, so a rerun
//! with the same parameters replaces the previous files.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ReportError;
use crate::models::{EpsPair, PricedValuation, RunParams, UndervaluedEntry};
use crate::utils::{write_atomically, MarketCalendar};

const CALCULATION_DATE_FORMAT: &str = "%d-%m-%Y";

/// Output files of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub all_results: PathBuf,
    pub undervalued: PathBuf,
    pub undervalued_sorted: PathBuf,
    pub undervalued_sorted_html: PathBuf,
}

impl ReportPaths {
    pub fn for_run(output_dir: &Path, run: &RunParams) -> Self {
        let mode = if run.backtest { "backtest" } else { "live" };
        let span = format!("from_{}to{}", run.final_year, run.start_year());
        let undervalued_stem = format!("undervalued_companies_{mode}_{span}");
        Self {
            all_results: output_dir.join(format!("nasdaq_intrinsic_values_{mode}_{span}.csv")),
            undervalued: output_dir.join(format!("{undervalued_stem}.csv")),
            undervalued_sorted: output_dir.join(format!("{undervalued_stem}_sorted.csv")),
            undervalued_sorted_html: output_dir.join(format!("{undervalued_stem}_sorted.html")),
        }
    }
}

/// Where the acquisition table of a run is kept
pub fn eps_table_path(output_dir: &Path, run: &RunParams) -> PathBuf {
    output_dir.join(format!(
        "nasdaq_eps_data_{}_{}.csv",
        run.final_year, run.years_back
    ))
}

#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    #[serde(rename = "Calculation_date")]
    calculation_date: String,
    #[serde(rename = "Company")]
    company: &'a str,
    #[serde(rename = "Ticker")]
    ticker: &'a str,
    #[serde(rename = "EPS_initial")]
    eps_initial: f64,
    #[serde(rename = "EPS_latest")]
    eps_latest: f64,
    #[serde(rename = "EPS_CAGR")]
    eps_cagr: f64,
    #[serde(rename = "Future_EPS")]
    future_eps: f64,
    #[serde(rename = "Future_Price")]
    future_price: f64,
    #[serde(rename = "Sticker_Price")]
    sticker_price: f64,
    #[serde(rename = "MOS_Price")]
    mos_price: f64,
    #[serde(rename = "Price_Date")]
    price_date: Option<String>,
    #[serde(rename = "Current_Price")]
    current_price: Option<f64>,
}

impl<'a> From<&'a PricedValuation> for ResultRow<'a> {
    fn from(row: &'a PricedValuation) -> Self {
        let v = &row.result.valuation;
        Self {
            calculation_date: row.calculation_date.format(CALCULATION_DATE_FORMAT).to_string(),
            company: &row.result.company,
            ticker: &row.result.ticker,
            eps_initial: v.eps_initial,
            eps_latest: v.eps_latest,
            eps_cagr: v.eps_cagr_pct,
            future_eps: v.future_eps,
            future_price: v.future_price,
            sticker_price: v.sticker_price,
            mos_price: v.mos_price,
            price_date: row.price_date.map(|d| d.format("%Y-%m-%d").to_string()),
            current_price: row.current_price,
        }
    }
}

fn write_csv<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer.into_inner().map_err(|e| ReportError::Io(e.into_error()))?;
    write_atomically(path, &bytes)?;
    Ok(())
}

/// Header-only file for empty tables, so consumers still see the schema
fn write_header_only(path: &Path, header: &[String]) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header)?;
    let bytes = writer.into_inner().map_err(|e| ReportError::Io(e.into_error()))?;
    write_atomically(path, &bytes)?;
    Ok(())
}

const RESULT_COLUMNS: [&str; 12] = [
    "Calculation_date",
    "Company",
    "Ticker",
    "EPS_initial",
    "EPS_latest",
    "EPS_CAGR",
    "Future_EPS",
    "Future_Price",
    "Sticker_Price",
    "MOS_Price",
    "Price_Date",
    "Current_Price",
];

pub fn write_results<'a>(
    path: &Path,
    rows: impl IntoIterator<Item = &'a PricedValuation>,
) -> Result<usize, ReportError> {
    let rows: Vec<ResultRow<'_>> = rows.into_iter().map(ResultRow::from).collect();
    let count = rows.len();
    if rows.is_empty() {
        let header: Vec<String> = RESULT_COLUMNS.iter().map(|c| c.to_string()).collect();
        write_header_only(path, &header)?;
    } else {
        write_csv(path, rows)?;
    }
    Ok(count)
}

/// Column set of the ranked report
pub fn sorted_report_header(price_column: &str) -> Vec<String> {
    [
        "Calculation_date",
        "Company",
        "Ticker",
        price_column,
        "MOS_Price",
        "MOS_Diff_%",
        "EPS_initial",
        "EPS_latest",
        "EPS_CAGR",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

fn sorted_report_record(entry: &UndervaluedEntry) -> Vec<String> {
    let row = &entry.priced;
    let v = &row.result.valuation;
    vec![
        row.calculation_date.format(CALCULATION_DATE_FORMAT).to_string(),
        row.result.company.clone(),
        row.result.ticker.clone(),
        row.current_price.map(|p| p.to_string()).unwrap_or_default(),
        v.mos_price.to_string(),
        entry.mos_diff_pct.to_string(),
        v.eps_initial.to_string(),
        v.eps_latest.to_string(),
        v.eps_cagr_pct.to_string(),
    ]
}

/// Write the ranked table as CSV and as an HTML page
pub fn write_sorted_report(
    csv_path: &Path,
    html_path: &Path,
    entries: &[UndervaluedEntry],
    price_column: &str,
) -> Result<(), ReportError> {
    let header = sorted_report_header(price_column);

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&header)?;
    for entry in entries {
        writer.write_record(sorted_report_record(entry))?;
    }
    let bytes = writer.into_inner().map_err(|e| ReportError::Io(e.into_error()))?;
    write_atomically(csv_path, &bytes)?;

    write_atomically(html_path, render_html(&header, entries).as_bytes())?;
    Ok(())
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn render_html(header: &[String], entries: &[UndervaluedEntry]) -> String {
    let mut html = String::from("<table border=\"1\" class=\"dataframe\">\n  <thead>\n    <tr style=\"text-align: right;\">\n      <th></th>\n");
    for column in header {
        let _ = writeln!(html, "      <th>{}</th>", escape_html(column));
    }
    html.push_str("    </tr>\n  </thead>\n  <tbody>\n");

    for (idx, entry) in entries.iter().enumerate() {
        let row = &entry.priced;
        let v = &row.result.valuation;
        let cells = [
            row.calculation_date.format(CALCULATION_DATE_FORMAT).to_string(),
            row.result.company.clone(),
            row.result.ticker.clone(),
            row.current_price.map(|p| format!("{p:.2}")).unwrap_or_default(),
            format!("{:.2}", v.mos_price),
            format!("{:.2}", entry.mos_diff_pct),
            format!("{:.2}", v.eps_initial),
            format!("{:.2}", v.eps_latest),
            format!("{:.2}", v.eps_cagr_pct),
        ];
        html.push_str("    <tr>\n");
        let _ = writeln!(html, "      <th>{idx}</th>");
        for cell in cells {
            let _ = writeln!(html, "      <td>{}</td>", escape_html(&cell));
        }
        html.push_str("    </tr>\n");
    }
    html.push_str("  </tbody>\n</table>\n");
    html
}

/// Column name for the price in the ranked report, dated with the trading
/// day the lookup actually prices (weekends fall back to Friday)
pub fn price_column_name(price_lookup_date: NaiveDate) -> String {
    let priced_on = MarketCalendar::last_weekday_on_or_before(price_lookup_date);
    format!("Price {}", priced_on.format("%Y-%m-%d"))
}

pub fn write_eps_pairs(path: &Path, pairs: &[EpsPair]) -> Result<(), ReportError> {
    if pairs.is_empty() {
        let header = ["Company", "Ticker", "EPS_initial", "EPS_latest"]
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>();
        return write_header_only(path, &header);
    }
    write_csv(path, pairs)
}

pub fn read_eps_pairs(path: &Path) -> Result<Vec<EpsPair>, ReportError> {
    let content = fs::read(path)?;
    let mut reader = csv::Reader::from_reader(content.as_slice());
    let pairs = reader.deserialize().collect::<Result<Vec<EpsPair>, _>>()?;
    Ok(pairs)
}
