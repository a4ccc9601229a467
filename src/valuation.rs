//! Discounted-future-earnings valuation.
//!
//! Growth is the EPS CAGR between the two observations, projected forward
//! from the latest EPS over the same horizon. Because both the growth rate
//! and the projection use `years`, future EPS works out to
//! `eps_latest^2 / eps_initial`; that is how the model is defined.

use crate::error::ValuationError;
use crate::models::{EpsPair, Valuation, ValuationParams, ValuationResult};
use crate::utils::{parse_eps, round2};

fn invalid(reason: impl Into<String>) -> ValuationError {
    ValuationError::InvalidEpsPair {
        reason: reason.into(),
    }
}

fn parse_positive(label: &str, raw: &str) -> Result<f64, ValuationError> {
    let value = parse_eps(raw).ok_or_else(|| invalid(format!("{label} {raw:?} is not numeric")))?;
    if value <= 0.0 {
        return Err(invalid(format!("{label} {value} is not positive")));
    }
    Ok(value)
}

/// Value an EPS pair, explaining why when it cannot be valued
pub fn try_value(
    eps_initial: &str,
    eps_latest: &str,
    params: &ValuationParams,
) -> Result<Valuation, ValuationError> {
    let initial = parse_positive("EPS_initial", eps_initial)?;
    let latest = parse_positive("EPS_latest", eps_latest)?;
    if params.years == 0 {
        return Err(invalid("growth horizon must be at least one year"));
    }

    let years = f64::from(params.years);
    let cagr = (latest / initial).powf(1.0 / years) - 1.0;
    let future_eps = latest * (1.0 + cagr).powf(years);
    let future_price = future_eps * params.pe_ratio;
    let sticker_price = future_price / (1.0 + params.discount_rate).powf(years);
    let mos_price = sticker_price * params.mos_fraction;

    let valuation = Valuation {
        eps_initial: initial,
        eps_latest: latest,
        eps_cagr_pct: round2(cagr * 100.0),
        future_eps: round2(future_eps),
        future_price: round2(future_price),
        sticker_price: round2(sticker_price),
        mos_price: round2(mos_price),
    };
    if [valuation.future_price, valuation.sticker_price, valuation.mos_price]
        .iter()
        .any(|v| !v.is_finite())
    {
        return Err(invalid("valuation overflowed"));
    }
    Ok(valuation)
}

/// `None` whenever the pair is non-numeric or non-positive
pub fn value(eps_initial: &str, eps_latest: &str, params: &ValuationParams) -> Option<Valuation> {
    try_value(eps_initial, eps_latest, params).ok()
}

/// Value one row of the acquisition table
pub fn value_pair(pair: &EpsPair, params: &ValuationParams) -> Result<ValuationResult, ValuationError> {
    let initial = pair
        .eps_initial
        .as_deref()
        .ok_or_else(|| invalid("EPS_initial is absent"))?;
    let latest = pair
        .eps_latest
        .as_deref()
        .ok_or_else(|| invalid("EPS_latest is absent"))?;
    let valuation = try_value(initial, latest, params)?;
    Ok(ValuationResult {
        ticker: pair.ticker.clone(),
        company: pair.company.clone(),
        valuation,
    })
}
