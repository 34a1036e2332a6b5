//! One optimization-and-forecast request, end to end.

use crate::domain::error::RiskcastError;
use crate::domain::forecaster::{self, DEFAULT_FEATURE_WINDOW};
use crate::domain::optimizer::{self, OptimizationResult, SolverSettings};
use crate::domain::returns::ReturnTable;
use crate::domain::volatility::{self, DEFAULT_WINDOW, VolatilityPoint};
use std::fmt;
use std::str::FromStr;

/// Which return series the volatility forecast is computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VolatilityBasis {
    /// Row mean of the asset returns.
    #[default]
    EqualWeight,
    /// Returns of the optimized portfolio.
    Optimized,
}

impl FromStr for VolatilityBasis {
    type Err = RiskcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "equal" | "equal_weight" => Ok(Self::EqualWeight),
            "optimized" | "optimal" => Ok(Self::Optimized),
            other => Err(RiskcastError::invalid(format!(
                "unknown volatility basis '{other}' (expected equal or optimized)"
            ))),
        }
    }
}

impl fmt::Display for VolatilityBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EqualWeight => write!(f, "equal"),
            Self::Optimized => write!(f, "optimized"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub volatility_window: usize,
    pub feature_window: usize,
    pub basis: VolatilityBasis,
    pub solver: SolverSettings,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            volatility_window: DEFAULT_WINDOW,
            feature_window: DEFAULT_FEATURE_WINDOW,
            basis: VolatilityBasis::default(),
            solver: SolverSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub tickers: Vec<String>,
    pub observations: usize,
    pub optimization: OptimizationResult,
    pub basis: VolatilityBasis,
    pub volatility: Vec<VolatilityPoint>,
    pub forecast: f64,
}

impl AnalysisReport {
    pub fn weights(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.tickers
            .iter()
            .map(String::as_str)
            .zip(self.optimization.weights.iter().copied())
    }

    pub fn volatility_values(&self) -> Vec<f64> {
        self.volatility.iter().map(|p| p.value).collect()
    }
}

pub fn run_analysis(
    table: &ReturnTable,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, RiskcastError> {
    let optimization = optimizer::optimize_portfolio(table, &config.solver)?;

    let series = match config.basis {
        VolatilityBasis::EqualWeight => table.equal_weight_series(),
        VolatilityBasis::Optimized => table.weighted_series(&optimization.weights)?,
    };
    let volatility =
        volatility::dated_rolling_volatility(table.dates(), &series, config.volatility_window)?;
    let values: Vec<f64> = volatility.iter().map(|p| p.value).collect();

    let model = forecaster::train_risk_model(&values, config.feature_window)?;
    let forecast = model.forecast_next(&values)?;

    tracing::info!(
        assets = table.n_assets(),
        observations = table.n_observations(),
        volatility_points = values.len(),
        forecast,
        "analysis complete"
    );

    Ok(AnalysisReport {
        tickers: table.tickers().to_vec(),
        observations: table.n_observations(),
        optimization,
        basis: config.basis,
        volatility,
        forecast,
    })
}
