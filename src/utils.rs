use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Weekend handling for price lookups. Exchange holidays are not modelled;
/// the price window fallback covers them.
pub struct MarketCalendar;

impl MarketCalendar {
    pub fn is_weekend(date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Saturday and Sunday map back to the preceding Friday
    pub fn last_weekday_on_or_before(date: NaiveDate) -> NaiveDate {
        match date.weekday() {
            Weekday::Sat => date - Duration::days(1),
            Weekday::Sun => date - Duration::days(2),
            _ => date,
        }
    }
}

/// Parse an EPS string such as `"$1,234.56"` or `" -0.42 "`.
pub fn parse_eps(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Replace `path` with `contents` through a sibling temp file so readers never
/// observe a half-written file.
pub fn write_atomically(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    {
        let mut file = fs::File::create(tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)
}
