//! Configuration validation.
//!
//! Checks every section before any data is loaded, so a bad value fails
//! fast with the section and key that caused it.

use crate::domain::analysis::VolatilityBasis;
use crate::domain::error::RiskcastError;
use crate::domain::universe::parse_tickers;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::str::FromStr;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// `[data]` and, when it is the selected source, `[sqlite]`.
pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), RiskcastError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    match source.trim().to_lowercase().as_str() {
        "csv" => Ok(()),
        "sqlite" => validate_pool_size(config),
        other => Err(invalid(
            "data",
            "source",
            format!("unknown source '{other}' (expected csv or sqlite)"),
        )),
    }
}

/// `[analysis]` plus [`validate_model_config`]. Tickers are optional here
/// because the command line can supply them.
pub fn validate_analysis_config(config: &dyn ConfigPort) -> Result<(), RiskcastError> {
    validate_tickers(config)?;
    validate_dates(config)?;
    validate_model_config(config)
}

/// `[optimizer]` and `[forecast]`, all optional with defaults.
pub fn validate_model_config(config: &dyn ConfigPort) -> Result<(), RiskcastError> {
    validate_tolerance(config)?;
    validate_max_iterations(config)?;
    validate_windows(config)?;
    validate_basis(config)?;
    Ok(())
}

fn validate_pool_size(config: &dyn ConfigPort) -> Result<(), RiskcastError> {
    if config.get_string("sqlite", "path").is_none() {
        return Err(missing("sqlite", "path"));
    }
    let size: i64 = parse_or("sqlite", "pool_size", config, 4)?;
    if size < 1 {
        return Err(invalid("sqlite", "pool_size", "pool_size must be at least 1"));
    }
    Ok(())
}

fn validate_tickers(config: &dyn ConfigPort) -> Result<(), RiskcastError> {
    match config.get_string("analysis", "tickers") {
        Some(list) => parse_tickers(&list).map(|_| ()).map_err(Into::into),
        None => Ok(()),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), RiskcastError> {
    let start_date = parse_date(config, "start_date")?;
    let end_date = parse_date(config, "end_date")?;

    if start_date >= end_date {
        return Err(invalid(
            "analysis",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

/// Reads a required `[analysis]` date.
pub fn parse_date(config: &dyn ConfigPort, field: &str) -> Result<NaiveDate, RiskcastError> {
    let value = config
        .get_string("analysis", field)
        .ok_or_else(|| missing("analysis", field))?;
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        invalid(
            "analysis",
            field,
            format!("invalid {field} format, expected YYYY-MM-DD"),
        )
    })
}

fn validate_tolerance(config: &dyn ConfigPort) -> Result<(), RiskcastError> {
    let value: f64 = parse_or("optimizer", "tolerance", config, 1e-10)?;
    if !value.is_finite() || value <= 0.0 || value >= 1.0 {
        return Err(invalid(
            "optimizer",
            "tolerance",
            "tolerance must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_max_iterations(config: &dyn ConfigPort) -> Result<(), RiskcastError> {
    let value: i64 = parse_or("optimizer", "max_iterations", config, 500)?;
    if value < 1 {
        return Err(invalid(
            "optimizer",
            "max_iterations",
            "max_iterations must be at least 1",
        ));
    }
    Ok(())
}

fn validate_windows(config: &dyn ConfigPort) -> Result<(), RiskcastError> {
    let volatility: i64 = parse_or("forecast", "volatility_window", config, 5)?;
    if volatility < 2 {
        return Err(invalid(
            "forecast",
            "volatility_window",
            "volatility_window must be at least 2",
        ));
    }
    let feature: i64 = parse_or("forecast", "feature_window", config, 5)?;
    if feature < 1 {
        return Err(invalid(
            "forecast",
            "feature_window",
            "feature_window must be at least 1",
        ));
    }
    Ok(())
}

fn validate_basis(config: &dyn ConfigPort) -> Result<(), RiskcastError> {
    if let Some(value) = config.get_string("forecast", "basis") {
        value
            .parse::<VolatilityBasis>()
            .map_err(|e| invalid("forecast", "basis", e.to_string()))?;
    }
    Ok(())
}

/// Parses an optional key, rejecting values that are present but malformed.
fn parse_or<T: FromStr>(
    section: &str,
    key: &str,
    config: &dyn ConfigPort,
    default: T,
) -> Result<T, RiskcastError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| invalid(section, key, format!("'{}' is not a number", raw.trim()))),
    }
}

fn missing(section: &str, key: &str) -> RiskcastError {
    RiskcastError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> RiskcastError {
    RiskcastError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const DATES: &str = "[analysis]\nstart_date = 2024-01-01\nend_date = 2024-12-31\n";

    #[test]
    fn valid_analysis_config_passes() {
        let config = make_config(
            r#"
[analysis]
tickers = AAPL,MSFT
start_date = 2024-01-01
end_date = 2024-12-31

[optimizer]
tolerance = 1e-9
max_iterations = 200

[forecast]
volatility_window = 10
feature_window = 3
basis = optimized
"#,
        );
        assert!(validate_analysis_config(&config).is_ok());
    }

    #[test]
    fn defaults_pass_with_only_dates() {
        assert!(validate_analysis_config(&make_config(DATES)).is_ok());
    }

    #[test]
    fn model_config_needs_no_dates() {
        let config = make_config("[forecast]\nfeature_window = 3\n");
        assert!(validate_model_config(&config).is_ok());
        assert!(validate_analysis_config(&config).is_err());
    }

    #[test]
    fn missing_end_date_fails() {
        let config = make_config("[analysis]\nstart_date = 2024-01-01\n");
        let err = validate_analysis_config(&config).unwrap_err();
        assert!(matches!(err, RiskcastError::ConfigMissing { key, .. } if key == "end_date"));
    }

    #[test]
    fn invalid_start_date_format_fails() {
        let config = make_config("[analysis]\nstart_date = 2024/01/01\nend_date = 2024-12-31\n");
        let err = validate_analysis_config(&config).unwrap_err();
        assert!(matches!(err, RiskcastError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn start_after_end_fails() {
        let config = make_config("[analysis]\nstart_date = 2024-12-31\nend_date = 2024-01-01\n");
        let err = validate_analysis_config(&config).unwrap_err();
        assert!(matches!(err, RiskcastError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn duplicate_tickers_fail() {
        let config = make_config(&format!("{DATES}tickers = AAPL,aapl\n"));
        let err = validate_analysis_config(&config).unwrap_err();
        assert!(matches!(err, RiskcastError::ConfigInvalid { key, .. } if key == "tickers"));
    }

    #[test]
    fn non_positive_tolerance_fails() {
        let config = make_config(&format!("{DATES}[optimizer]\ntolerance = 0\n"));
        let err = validate_analysis_config(&config).unwrap_err();
        assert!(matches!(err, RiskcastError::ConfigInvalid { key, .. } if key == "tolerance"));
    }

    #[test]
    fn non_numeric_tolerance_fails() {
        let config = make_config(&format!("{DATES}[optimizer]\ntolerance = tiny\n"));
        let err = validate_analysis_config(&config).unwrap_err();
        assert!(matches!(err, RiskcastError::ConfigInvalid { key, .. } if key == "tolerance"));
    }

    #[test]
    fn zero_max_iterations_fails() {
        let config = make_config(&format!("{DATES}[optimizer]\nmax_iterations = 0\n"));
        let err = validate_analysis_config(&config).unwrap_err();
        assert!(
            matches!(err, RiskcastError::ConfigInvalid { key, .. } if key == "max_iterations")
        );
    }

    #[test]
    fn volatility_window_below_two_fails() {
        let config = make_config(&format!("{DATES}[forecast]\nvolatility_window = 1\n"));
        let err = validate_analysis_config(&config).unwrap_err();
        assert!(
            matches!(err, RiskcastError::ConfigInvalid { key, .. } if key == "volatility_window")
        );
    }

    #[test]
    fn zero_feature_window_fails() {
        let config = make_config(&format!("{DATES}[forecast]\nfeature_window = 0\n"));
        let err = validate_analysis_config(&config).unwrap_err();
        assert!(
            matches!(err, RiskcastError::ConfigInvalid { key, .. } if key == "feature_window")
        );
    }

    #[test]
    fn unknown_basis_fails() {
        let config = make_config(&format!("{DATES}[forecast]\nbasis = median\n"));
        let err = validate_analysis_config(&config).unwrap_err();
        assert!(matches!(err, RiskcastError::ConfigInvalid { key, .. } if key == "basis"));
    }

    #[test]
    fn csv_source_is_default() {
        assert!(validate_data_config(&make_config("[data]\n")).is_ok());
    }

    #[test]
    fn unknown_source_fails() {
        let err = validate_data_config(&make_config("[data]\nsource = postgres\n")).unwrap_err();
        assert!(matches!(err, RiskcastError::ConfigInvalid { key, .. } if key == "source"));
    }

    #[test]
    fn sqlite_source_requires_path() {
        let err = validate_data_config(&make_config("[data]\nsource = sqlite\n")).unwrap_err();
        assert!(matches!(err, RiskcastError::ConfigMissing { section, key } if section == "sqlite" && key == "path"));
    }

    #[test]
    fn sqlite_pool_size_must_be_positive() {
        let config =
            make_config("[data]\nsource = sqlite\n[sqlite]\npath = prices.db\npool_size = 0\n");
        let err = validate_data_config(&config).unwrap_err();
        assert!(matches!(err, RiskcastError::ConfigInvalid { key, .. } if key == "pool_size"));
    }
}
