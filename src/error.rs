//! Error type shared by every stage of the report pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::kpi::KpiMetric;

/// Failures surfaced by loading, computing, rendering, or writing the report.
///
/// Validation failures (bad configuration, missing columns, malformed cells, an empty
/// dataset) are raised before anything is written to disk. The remaining variants describe
/// I/O and rendering problems that can only occur once the KPIs have been computed.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("unsupported input format '{0}' (expected .csv, .xls, .xlsx, .xlsm, .xlsb or .ods)")]
    UnsupportedFormat(String),

    #[error("failed to read spreadsheet {}: {source}", .path.display())]
    Spreadsheet {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("failed to read CSV file {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("spreadsheet {} has no worksheet or header row", .0.display())]
    MissingHeader(PathBuf),

    #[error("required column '{0}' is missing from the input")]
    MissingColumn(&'static str),

    #[error("row {row}, column '{column}': invalid value '{value}': {reason}")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
        reason: String,
    },

    #[error("input contains no sales rows; there are no categories to report")]
    EmptyDataset,

    #[error("total quantity sold for category '{0}' exceeds the supported range")]
    QuantityOverflow(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to encode chart {}: {source}", .path.display())]
    Chart {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("no chart was rendered for '{}'", .0.title())]
    MissingChart(KpiMetric),

    #[error("failed to load chart font {}: {reason}", .path.display())]
    ChartFont { path: PathBuf, reason: String },

    #[error("failed to write KPI summary {}: {source}", .path.display())]
    Summary {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to render report document: {0}")]
    Document(#[from] genpdf::error::Error),

    #[error("failed to write {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ReportError {
    /// Whether the error stems from the configuration or the input data rather than I/O.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_)
                | Self::MissingHeader(_)
                | Self::MissingColumn(_)
                | Self::InvalidValue { .. }
                | Self::EmptyDataset
                | Self::QuantityOverflow(_)
                | Self::InvalidConfig(_)
        )
    }

    /// Process exit code associated with the error: 2 for validation failures, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_validation() {
            2
        } else {
            1
        }
    }

    pub(crate) fn output(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Output {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ReportError;

    #[test]
    fn validation_errors_exit_with_two() {
        assert_eq!(ReportError::MissingColumn("TotalSales").exit_code(), 2);
        assert_eq!(ReportError::EmptyDataset.exit_code(), 2);
        assert_eq!(ReportError::InvalidConfig("x".into()).exit_code(), 2);
        assert_eq!(ReportError::QuantityOverflow("A".into()).exit_code(), 2);
    }

    #[test]
    fn io_errors_exit_with_one() {
        let err = ReportError::output(
            "out/report.pdf",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!err.is_validation());
        assert_eq!(err.exit_code(), 1);
        assert_eq!(ReportError::InputNotFound("sales.xls".into()).exit_code(), 1);
        assert_eq!(
            ReportError::MissingChart(crate::kpi::KpiMetric::TotalSales).exit_code(),
            1
        );
    }

    #[test]
    fn missing_column_message_names_the_column() {
        let message = ReportError::MissingColumn("TotalSales").to_string();
        assert!(message.contains("TotalSales"));
    }
}
