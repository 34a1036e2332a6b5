//! Result export port trait.

use crate::domain::analysis::AnalysisReport;
use crate::domain::error::RiskcastError;
use std::path::Path;

/// Port for writing analysis results.
pub trait ReportPort {
    /// Writes `report` under `output_dir`, returning the paths created.
    fn write(
        &self,
        report: &AnalysisReport,
        output_dir: &Path,
    ) -> Result<Vec<std::path::PathBuf>, RiskcastError>;
}
