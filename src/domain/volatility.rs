//! Rolling volatility estimator.
//!
//! Sample standard deviation (divisor `window - 1`) over each full trailing
//! window. Leading positions without a full window are dropped, so the
//! output has `len - window + 1` values, or none when `len < window`.

use crate::domain::error::RiskcastError;
use crate::domain::stats;
use chrono::NaiveDate;

pub const DEFAULT_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilityPoint {
    /// Date of the last observation in the window.
    pub date: NaiveDate,
    pub value: f64,
}

pub fn rolling_volatility(returns: &[f64], window: usize) -> Result<Vec<f64>, RiskcastError> {
    if window < 2 {
        return Err(RiskcastError::invalid(format!(
            "volatility window must be at least 2, got {window}"
        )));
    }
    if let Some(i) = returns.iter().position(|r| !r.is_finite()) {
        return Err(RiskcastError::invalid(format!(
            "non-finite return at position {i}"
        )));
    }
    if returns.len() < window {
        return Ok(vec![]);
    }

    Ok(returns.windows(window).map(stats::sample_std).collect())
}

/// [`rolling_volatility`] with each value stamped by its window's last date.
pub fn dated_rolling_volatility(
    dates: &[NaiveDate],
    returns: &[f64],
    window: usize,
) -> Result<Vec<VolatilityPoint>, RiskcastError> {
    if dates.len() != returns.len() {
        return Err(RiskcastError::ShapeMismatch {
            expected: returns.len(),
            actual: dates.len(),
        });
    }
    let values = rolling_volatility(returns, window)?;
    if values.is_empty() {
        return Ok(vec![]);
    }
    Ok(values
        .into_iter()
        .zip(&dates[window - 1..])
        .map(|(value, &date)| VolatilityPoint { date, value })
        .collect())
}
