//! Return series builder and the per-asset return table.

use crate::domain::error::RiskcastError;
use crate::domain::price::{PriceSeries, common_timeline};
use crate::domain::stats;
use chrono::NaiveDate;
use nalgebra::DMatrix;
use std::collections::HashSet;

/// Fractional returns, one row per date and one column per ticker.
///
/// Every value is finite and every row is as wide as `tickers`; the
/// constructor rejects anything else.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnTable {
    tickers: Vec<String>,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<f64>>,
}

impl ReturnTable {
    pub fn new(
        tickers: Vec<String>,
        dates: Vec<NaiveDate>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, RiskcastError> {
        if tickers.is_empty() {
            return Err(RiskcastError::invalid("return table needs at least one asset"));
        }
        let mut seen = HashSet::new();
        for t in &tickers {
            if !seen.insert(t.as_str()) {
                return Err(RiskcastError::invalid(format!("duplicate ticker {t}")));
            }
        }
        if dates.len() != rows.len() {
            return Err(RiskcastError::ShapeMismatch {
                expected: rows.len(),
                actual: dates.len(),
            });
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != tickers.len() {
                return Err(RiskcastError::ShapeMismatch {
                    expected: tickers.len(),
                    actual: row.len(),
                });
            }
            if let Some(j) = row.iter().position(|v| !v.is_finite()) {
                return Err(RiskcastError::invalid(format!(
                    "non-finite return for {} on {}",
                    tickers[j], dates[i]
                )));
            }
        }
        Ok(Self {
            tickers,
            dates,
            rows,
        })
    }

    /// Single-asset table without dates, one observation per step.
    pub fn from_single_series(ticker: &str, returns: &[f64]) -> Result<Self, RiskcastError> {
        let dates = (0..returns.len())
            .map(|i| NaiveDate::default() + chrono::Duration::days(i as i64))
            .collect();
        let rows = returns.iter().map(|&r| vec![r]).collect();
        Self::new(vec![ticker.to_string()], dates, rows)
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn n_assets(&self) -> usize {
        self.tickers.len()
    }

    pub fn n_observations(&self) -> usize {
        self.rows.len()
    }

    pub fn column(&self, asset: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[asset]).collect()
    }

    pub fn mean_vector(&self) -> Vec<f64> {
        (0..self.n_assets())
            .map(|j| stats::mean(&self.column(j)))
            .collect()
    }

    /// Sample covariance matrix of the asset columns.
    pub fn covariance_matrix(&self) -> Result<DMatrix<f64>, RiskcastError> {
        if self.n_observations() < 2 {
            return Err(RiskcastError::insufficient(
                "covariance estimation",
                2,
                self.n_observations(),
            ));
        }
        let columns: Vec<Vec<f64>> = (0..self.n_assets()).map(|j| self.column(j)).collect();
        let n = self.n_assets();
        let mut cov = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                let c = stats::sample_covariance(&columns[i], &columns[j]);
                cov[(i, j)] = c;
                cov[(j, i)] = c;
            }
        }
        Ok(cov)
    }

    /// Row means: the return of an equally weighted basket.
    pub fn equal_weight_series(&self) -> Vec<f64> {
        let n = self.n_assets() as f64;
        self.rows
            .iter()
            .map(|r| r.iter().sum::<f64>() / n)
            .collect()
    }

    /// Per-row return of a portfolio holding `weights`.
    pub fn weighted_series(&self, weights: &[f64]) -> Result<Vec<f64>, RiskcastError> {
        if weights.len() != self.n_assets() {
            return Err(RiskcastError::ShapeMismatch {
                expected: self.n_assets(),
                actual: weights.len(),
            });
        }
        Ok(self
            .rows
            .iter()
            .map(|r| r.iter().zip(weights).map(|(x, w)| x * w).sum::<f64>())
            .collect())
    }
}

/// Percentage-change returns over the dates every series shares.
///
/// The first shared date has no predecessor and produces no row.
pub fn build_return_table(series: &[PriceSeries]) -> Result<ReturnTable, RiskcastError> {
    let tickers: Vec<String> = series.iter().map(|s| s.ticker.clone()).collect();
    let timeline = common_timeline(series);

    let mut dates = Vec::with_capacity(timeline.len().saturating_sub(1));
    let mut rows = Vec::with_capacity(timeline.len().saturating_sub(1));

    for pair in timeline.windows(2) {
        let (prev_date, date) = (pair[0], pair[1]);
        let mut row = Vec::with_capacity(series.len());
        for s in series {
            // both dates come from the shared timeline
            let (Some(prev), Some(curr)) = (s.close_on(prev_date), s.close_on(date)) else {
                return Err(RiskcastError::invalid(format!(
                    "{} has no close on {}",
                    s.ticker, date
                )));
            };
            if !(prev.is_finite() && prev > 0.0) {
                return Err(RiskcastError::invalid(format!(
                    "{} close on {} must be positive, got {}",
                    s.ticker, prev_date, prev
                )));
            }
            row.push((curr - prev) / prev);
        }
        dates.push(date);
        rows.push(row);
    }

    tracing::debug!(
        assets = tickers.len(),
        observations = rows.len(),
        "built return table"
    );
    ReturnTable::new(tickers, dates, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::PriceBar;
    use approx::assert_abs_diff_eq;

    fn series(ticker: &str, closes: &[(u32, f64)]) -> PriceSeries {
        PriceSeries::new(
            ticker.to_string(),
            closes
                .iter()
                .map(|&(day, close)| PriceBar {
                    ticker: ticker.to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
                    close,
                })
                .collect(),
        )
    }

    #[test]
    fn builds_percentage_change_and_drops_first_row() {
        let aapl = series("AAPL", &[(1, 100.0), (2, 110.0), (3, 99.0)]);
        let table = build_return_table(&[aapl]).unwrap();

        assert_eq!(table.n_observations(), 2);
        assert_eq!(table.tickers(), &["AAPL".to_string()]);
        assert_eq!(table.dates()[0], NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_abs_diff_eq!(table.rows()[0][0], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(table.rows()[1][0], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn aligns_on_shared_dates() {
        let aapl = series("AAPL", &[(1, 100.0), (2, 101.0), (3, 102.0), (4, 104.0)]);
        let msft = series("MSFT", &[(1, 200.0), (3, 210.0), (4, 189.0)]);
        let table = build_return_table(&[aapl, msft]).unwrap();

        // shared dates 1, 3, 4 → two rows
        assert_eq!(table.n_observations(), 2);
        assert_abs_diff_eq!(table.rows()[0][0], 0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(table.rows()[0][1], 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(table.rows()[1][1], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn single_date_gives_empty_table() {
        let aapl = series("AAPL", &[(1, 100.0)]);
        let table = build_return_table(&[aapl]).unwrap();
        assert_eq!(table.n_observations(), 0);
    }

    #[test]
    fn zero_close_is_rejected() {
        let aapl = series("AAPL", &[(1, 0.0), (2, 1.0)]);
        let err = build_return_table(&[aapl]).unwrap_err();
        assert!(matches!(err, RiskcastError::InvalidInput { .. }));
    }

    #[test]
    fn new_rejects_non_finite_values() {
        let err = ReturnTable::from_single_series("X", &[0.01, f64::NAN]).unwrap_err();
        assert!(matches!(err, RiskcastError::InvalidInput { .. }));
    }

    #[test]
    fn new_rejects_ragged_rows() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let err = ReturnTable::new(
            vec!["A".into(), "B".into()],
            vec![d],
            vec![vec![0.01]],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RiskcastError::ShapeMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn new_rejects_duplicate_tickers() {
        let err = ReturnTable::new(vec!["A".into(), "A".into()], vec![], vec![]).unwrap_err();
        assert!(matches!(err, RiskcastError::InvalidInput { .. }));
    }

    #[test]
    fn covariance_matrix_is_symmetric_sample_covariance() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let table = ReturnTable::new(
            vec!["A".into(), "B".into()],
            vec![d(1), d(2), d(3)],
            vec![vec![1.0, 3.0], vec![2.0, 2.0], vec![3.0, 1.0]],
        )
        .unwrap();

        let cov = table.covariance_matrix().unwrap();
        assert_abs_diff_eq!(cov[(0, 0)], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[(1, 1)], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[(0, 1)], -1.0, epsilon = 1e-12);
        assert_eq!(cov[(0, 1)], cov[(1, 0)]);
        assert_eq!(table.mean_vector(), vec![2.0, 2.0]);
    }

    #[test]
    fn covariance_needs_two_observations() {
        let table = ReturnTable::from_single_series("A", &[0.01]).unwrap();
        let err = table.covariance_matrix().unwrap_err();
        assert!(matches!(
            err,
            RiskcastError::InsufficientData {
                required: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn portfolio_series() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let table = ReturnTable::new(
            vec!["A".into(), "B".into()],
            vec![d(1), d(2)],
            vec![vec![0.02, 0.04], vec![-0.01, 0.01]],
        )
        .unwrap();

        let equal = table.equal_weight_series();
        assert_abs_diff_eq!(equal[0], 0.03, epsilon = 1e-12);
        assert_abs_diff_eq!(equal[1], 0.0, epsilon = 1e-12);

        let weighted = table.weighted_series(&[1.0, 0.0]).unwrap();
        assert_eq!(weighted, vec![0.02, -0.01]);

        assert!(matches!(
            table.weighted_series(&[1.0]),
            Err(RiskcastError::ShapeMismatch { .. })
        ));
    }
}
