//! Domain error types.

/// Top-level error type for riskcast.
///
/// Numeric failures (`InsufficientData`, `SolverFailure`, `ShapeMismatch`,
/// `InvalidInput`) come from the core; the rest come from adapters and
/// configuration.
#[derive(Debug, thiserror::Error)]
pub enum RiskcastError {
    #[error("insufficient data for {context}: need {required}, have {actual}")]
    InsufficientData {
        context: String,
        required: usize,
        actual: usize,
    },

    #[error("solver failure: {status}")]
    SolverFailure { status: String },

    #[error("shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("data query error: {reason}")]
    DataQuery { reason: String },

    #[error("no price data for {ticker}")]
    NoData { ticker: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RiskcastError {
    pub(crate) fn insufficient(context: &str, required: usize, actual: usize) -> Self {
        Self::InsufficientData {
            context: context.to_string(),
            required,
            actual,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn solver(status: impl Into<String>) -> Self {
        Self::SolverFailure {
            status: status.into(),
        }
    }
}

impl From<&RiskcastError> for std::process::ExitCode {
    fn from(err: &RiskcastError) -> Self {
        let code: u8 = match err {
            RiskcastError::Io(_) | RiskcastError::Report { .. } => 1,
            RiskcastError::ConfigParse { .. }
            | RiskcastError::ConfigMissing { .. }
            | RiskcastError::ConfigInvalid { .. } => 2,
            RiskcastError::DataSource { .. } | RiskcastError::DataQuery { .. } => 3,
            RiskcastError::InvalidInput { .. } | RiskcastError::ShapeMismatch { .. } => 4,
            RiskcastError::InsufficientData { .. } | RiskcastError::NoData { .. } => 5,
            RiskcastError::SolverFailure { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message_carries_sizes() {
        let err = RiskcastError::insufficient("covariance estimation", 2, 1);
        assert_eq!(
            err.to_string(),
            "insufficient data for covariance estimation: need 2, have 1"
        );
    }

    #[test]
    fn shape_mismatch_message() {
        let err = RiskcastError::ShapeMismatch {
            expected: 5,
            actual: 3,
        };
        assert_eq!(err.to_string(), "shape mismatch: expected 5 values, got 3");
    }

    #[test]
    fn solver_failure_keeps_status() {
        let err = RiskcastError::solver("iteration limit reached");
        assert!(matches!(err, RiskcastError::SolverFailure { ref status } if status == "iteration limit reached"));
    }

    #[test]
    fn exit_codes_distinguish_families() {
        use std::process::ExitCode;
        let solver = ExitCode::from(&RiskcastError::solver("x"));
        let data = ExitCode::from(&RiskcastError::insufficient("x", 1, 0));
        let config = ExitCode::from(&RiskcastError::ConfigMissing {
            section: "analysis".into(),
            key: "tickers".into(),
        });
        assert_eq!(solver, ExitCode::from(6));
        assert_eq!(data, ExitCode::from(5));
        assert_eq!(config, ExitCode::from(2));
    }
}
