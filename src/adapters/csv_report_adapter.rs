//! CSV report writer: `weights.csv`, `volatility.csv` and `summary.csv`.

use crate::domain::analysis::AnalysisReport;
use crate::domain::error::RiskcastError;
use crate::domain::price::PriceBar;
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const WEIGHTS_FILE: &str = "weights.csv";
pub const VOLATILITY_FILE: &str = "volatility.csv";
pub const SUMMARY_FILE: &str = "summary.csv";

#[derive(Serialize)]
struct WeightRow<'a> {
    ticker: &'a str,
    weight: f64,
}

#[derive(Serialize)]
struct VolatilityRow {
    date: String,
    volatility: f64,
}

#[derive(Serialize)]
struct SummaryRow {
    metric: &'static str,
    value: String,
}

#[derive(Serialize)]
struct PriceRow {
    date: String,
    close: f64,
    moving_average: Option<f64>,
}

pub struct CsvReportAdapter;

fn report_error(path: &Path, e: impl std::fmt::Display) -> RiskcastError {
    RiskcastError::Report {
        reason: format!("{}: {}", path.display(), e),
    }
}

fn write_rows<T: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<(), RiskcastError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| report_error(path, e))?;
    for row in rows {
        wtr.serialize(row).map_err(|e| report_error(path, e))?;
    }
    wtr.flush().map_err(|e| report_error(path, e))
}

fn summary_rows(report: &AnalysisReport) -> Vec<SummaryRow> {
    let opt = &report.optimization;
    vec![
        SummaryRow {
            metric: "expected_return",
            value: opt.expected_return.to_string(),
        },
        SummaryRow {
            metric: "risk",
            value: opt.risk.to_string(),
        },
        SummaryRow {
            metric: "daily_std",
            value: opt.daily_std().to_string(),
        },
        SummaryRow {
            metric: "forecast_volatility",
            value: report.forecast.to_string(),
        },
        SummaryRow {
            metric: "volatility_basis",
            value: report.basis.to_string(),
        },
        SummaryRow {
            metric: "observations",
            value: report.observations.to_string(),
        },
        SummaryRow {
            metric: "solver_iterations",
            value: opt.iterations.to_string(),
        },
    ]
}

/// Writes `date,close,moving_average` rows; the average is blank until the
/// first full window.
pub fn write_price_table(
    path: &Path,
    bars: &[PriceBar],
    moving_average: &[f64],
) -> Result<(), RiskcastError> {
    let offset = bars.len().saturating_sub(moving_average.len());
    write_rows(
        path,
        bars.iter().enumerate().map(|(i, bar)| PriceRow {
            date: bar.date.format("%Y-%m-%d").to_string(),
            close: bar.close,
            moving_average: i.checked_sub(offset).map(|j| moving_average[j]),
        }),
    )
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        report: &AnalysisReport,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, RiskcastError> {
        fs::create_dir_all(output_dir)?;

        let weights_path = output_dir.join(WEIGHTS_FILE);
        write_rows(
            &weights_path,
            report
                .weights()
                .map(|(ticker, weight)| WeightRow { ticker, weight }),
        )?;

        let volatility_path = output_dir.join(VOLATILITY_FILE);
        write_rows(
            &volatility_path,
            report.volatility.iter().map(|p| VolatilityRow {
                date: p.date.format("%Y-%m-%d").to_string(),
                volatility: p.value,
            }),
        )?;

        let summary_path = output_dir.join(SUMMARY_FILE);
        write_rows(&summary_path, summary_rows(report))?;

        tracing::info!(dir = %output_dir.display(), "wrote report");
        Ok(vec![weights_path, volatility_path, summary_path])
    }
}
