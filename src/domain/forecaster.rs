//! Next-period volatility forecaster.
//!
//! A linear model maps the `window` most recent volatility values (oldest
//! first) to the next one. Training builds every (window, next value) pair
//! from a volatility series and fits ordinary least squares with an
//! intercept: features and targets are centered, the centered system is
//! solved by SVD with a minimum-norm cutoff, and the intercept restores the
//! means. Rank-deficient designs, such as a perfectly linear series where
//! every window is a shifted copy of the first, still fit exactly.
//!
//! Forecasts are not clamped: a linear model can predict a negative
//! volatility and that value is returned as computed.

use crate::domain::error::RiskcastError;
use nalgebra::{DMatrix, DVector};

pub const DEFAULT_FEATURE_WINDOW: usize = 5;

/// Singular values below this fraction of the largest are treated as zero.
const RANK_TOLERANCE: f64 = 1e-12;

/// (feature, target) pairs extracted from a volatility series.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl TrainingSet {
    /// One pair per start index `i in 0..len - window`.
    pub fn from_series(series: &[f64], window: usize) -> Self {
        let count = series.len().saturating_sub(window);
        let features = (0..count)
            .map(|i| series[i..i + window].to_vec())
            .collect();
        let targets = (0..count).map(|i| series[i + window]).collect();
        Self { features, targets }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolatilityModel {
    coefficients: Vec<f64>,
    intercept: f64,
    training_pairs: usize,
}

impl VolatilityModel {
    /// One coefficient per window position, oldest first.
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Feature width the model was trained on.
    pub fn window(&self) -> usize {
        self.coefficients.len()
    }

    pub fn training_pairs(&self) -> usize {
        self.training_pairs
    }

    /// Point forecast for the value following `last_window`.
    pub fn predict(&self, last_window: &[f64]) -> Result<f64, RiskcastError> {
        if last_window.len() != self.window() {
            return Err(RiskcastError::ShapeMismatch {
                expected: self.window(),
                actual: last_window.len(),
            });
        }
        if last_window.iter().any(|v| !v.is_finite()) {
            return Err(RiskcastError::invalid("prediction window has non-finite values"));
        }
        Ok(self
            .coefficients
            .iter()
            .zip(last_window)
            .map(|(b, x)| b * x)
            .sum::<f64>()
            + self.intercept)
    }

    /// Forecast from the tail of `series`.
    pub fn forecast_next(&self, series: &[f64]) -> Result<f64, RiskcastError> {
        let width = self.window();
        if series.len() < width {
            return Err(RiskcastError::insufficient(
                "volatility forecast window",
                width,
                series.len(),
            ));
        }
        self.predict(&series[series.len() - width..])
    }
}

/// Fits the model on every (window, next value) pair of `series`.
pub fn train_risk_model(series: &[f64], window: usize) -> Result<VolatilityModel, RiskcastError> {
    if window == 0 {
        return Err(RiskcastError::invalid("feature window must be positive"));
    }
    if let Some(i) = series.iter().position(|v| !v.is_finite()) {
        return Err(RiskcastError::invalid(format!(
            "non-finite volatility at position {i}"
        )));
    }

    let set = TrainingSet::from_series(series, window);
    if set.is_empty() {
        return Err(RiskcastError::insufficient(
            "volatility model training",
            window + 1,
            series.len(),
        ));
    }

    let (coefficients, intercept) = fit_ols(&set, window)?;
    tracing::debug!(pairs = set.len(), window, intercept, "trained volatility model");

    Ok(VolatilityModel {
        coefficients,
        intercept,
        training_pairs: set.len(),
    })
}

fn fit_ols(set: &TrainingSet, window: usize) -> Result<(Vec<f64>, f64), RiskcastError> {
    let m = set.len();
    let x_mean: Vec<f64> = (0..window)
        .map(|j| set.features.iter().map(|f| f[j]).sum::<f64>() / m as f64)
        .collect();
    let y_mean = set.targets.iter().sum::<f64>() / m as f64;

    let x = DMatrix::from_fn(m, window, |i, j| set.features[i][j] - x_mean[j]);
    let y = DVector::from_fn(m, |i, _| set.targets[i] - y_mean);

    // every window identical (e.g. a single pair): only the intercept is fitted
    if x.amax() == 0.0 {
        return Ok((vec![0.0; window], y_mean));
    }

    let svd = x.svd(true, true);
    let largest = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    let beta = svd
        .solve(&y, largest * RANK_TOLERANCE)
        .map_err(RiskcastError::solver)?;

    if beta.iter().any(|b| !b.is_finite()) {
        return Err(RiskcastError::solver(
            "least squares fit produced non-finite coefficients",
        ));
    }

    let intercept = y_mean
        - x_mean
            .iter()
            .zip(beta.iter())
            .map(|(m, b)| m * b)
            .sum::<f64>();
    Ok((beta.iter().copied().collect(), intercept))
}
