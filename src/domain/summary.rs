//! Descriptive statistics and moving average of a close-price series.

use crate::domain::error::RiskcastError;
use crate::domain::stats;

pub const DEFAULT_MA_WINDOW: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; NaN for a single value.
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl PriceSummary {
    pub fn describe(values: &[f64]) -> Result<Self, RiskcastError> {
        if values.is_empty() {
            return Err(RiskcastError::insufficient("price summary", 1, 0));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(RiskcastError::invalid("price summary input has non-finite values"));
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        Ok(Self {
            count: values.len(),
            mean: stats::mean(values),
            std: stats::sample_std(values),
            min: sorted[0],
            q25: stats::quantile_sorted(&sorted, 0.25),
            median: stats::quantile_sorted(&sorted, 0.5),
            q75: stats::quantile_sorted(&sorted, 0.75),
            max: sorted[sorted.len() - 1],
        })
    }
}

/// Simple moving average, one value per full window.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return vec![];
    }
    values
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect()
}
