use thiserror::Error;

/// Everything that can stop a report run.
///
/// Row-level problems never show up here: bad dates drop the row and bad
/// amounts or quantities become zero.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Header row not found: no row contains the '{marker}' column")]
    HeaderNotFound { marker: String },

    #[error("Required column '{0}' is missing from the report")]
    MissingRequiredColumn(String),

    #[error("No revenue column found; expected one of: {accepted}")]
    MissingRevenueColumn { accepted: String },

    #[error("No rows left after date parsing; check the report's sale date column")]
    EmptyAfterDateFiltering,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unexpected failure: {0}")]
    Unexpected(String),

    #[error("Failed to read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The user can fix it by uploading another file.
    Warning,
    Fatal,
}

impl ReportError {
    pub fn severity(&self) -> Severity {
        match self {
            ReportError::EmptyAfterDateFiltering => Severity::Warning,
            _ => Severity::Fatal,
        }
    }

    /// True for the catch-all class: anything that is not a known structural problem.
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            ReportError::Unexpected(_)
                | ReportError::Spreadsheet(_)
                | ReportError::Csv(_)
                | ReportError::Json(_)
                | ReportError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_empty_result_is_a_warning() {
        assert_eq!(
            ReportError::EmptyAfterDateFiltering.severity(),
            Severity::Warning
        );
        let err = ReportError::HeaderNotFound {
            marker: "SKU".into(),
        };
        assert_eq!(err.severity(), Severity::Fatal);
        assert!(!err.is_unexpected());
    }

    #[test]
    fn io_errors_are_unexpected() {
        let err: ReportError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert!(err.is_unexpected());
        assert_eq!(err.to_string(), "IO error: boom");
    }

    #[test]
    fn header_message_names_the_marker() {
        let err = ReportError::HeaderNotFound {
            marker: "SKU".into(),
        };
        assert!(err.to_string().contains("'SKU'"));
    }
}
