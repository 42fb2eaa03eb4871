// Report settings: column names and ABC thresholds.
//
// Defaults match the marketplace sales export. A JSON file can override any
// subset of fields.
use crate::error::{ReportError, Result};
use serde::Deserialize;
use std::path::Path;

/// Accepted revenue column names, most preferred first.
pub const REVENUE_COLUMNS: [&str; 4] = [
    "Receita por produtos (BRL)",
    "Total (BRL)",
    "Valor total",
    "Receita",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Cell value that identifies the header row.
    pub header_marker: String,
    pub sku_column: String,
    pub date_column: String,
    pub quantity_column: String,
    /// Consulted in order; the first column present in the report wins.
    pub revenue_columns: Vec<String>,
    pub tier_a_threshold: f64,
    pub tier_b_threshold: f64,
    pub csv_delimiter: char,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            header_marker: "SKU".to_string(),
            sku_column: "SKU".to_string(),
            date_column: "Data da venda".to_string(),
            quantity_column: "Unidades".to_string(),
            revenue_columns: REVENUE_COLUMNS.iter().map(|s| s.to_string()).collect(),
            tier_a_threshold: 0.80,
            tier_b_threshold: 0.95,
            csv_delimiter: ',',
        }
    }
}

impl ReportConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: ReportConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_json_str(&s)
    }

    /// Reads `path` when it exists, otherwise returns the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            tracing::debug!("Loading report config from {}", path.display());
            Self::from_json_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let (a, b) = (self.tier_a_threshold, self.tier_b_threshold);
        if !(a > 0.0 && a <= b && b <= 1.0) {
            return Err(ReportError::InvalidConfig(format!(
                "tier thresholds must satisfy 0 < A <= B <= 1 (got A={}, B={})",
                a, b
            )));
        }
        if self.revenue_columns.is_empty() {
            return Err(ReportError::InvalidConfig(
                "at least one revenue column name is required".to_string(),
            ));
        }
        if self.header_marker.trim().is_empty() {
            return Err(ReportError::InvalidConfig(
                "header marker must not be blank".to_string(),
            ));
        }
        if !self.csv_delimiter.is_ascii() {
            return Err(ReportError::InvalidConfig(format!(
                "CSV delimiter must be a single ASCII character (got '{}')",
                self.csv_delimiter
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ReportConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.revenue_columns[0], "Receita por produtos (BRL)");
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config =
            ReportConfig::from_json_str(r#"{"date_column": "Data", "csv_delimiter": ";"}"#)
                .unwrap();
        assert_eq!(config.date_column, "Data");
        assert_eq!(config.csv_delimiter, ';');
        assert_eq!(config.sku_column, "SKU");
        assert_eq!(config.tier_b_threshold, 0.95);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let err = ReportConfig::from_json_str(r#"{"tier_a_threshold": 0.9, "tier_b_threshold": 0.5}"#)
            .unwrap_err();
        assert!(matches!(err, ReportError::InvalidConfig(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, ReportConfig::default());
    }

    #[test]
    fn reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report_config.json");
        std::fs::write(&path, r#"{"revenue_columns": ["Faturamento"]}"#).unwrap();
        let config = ReportConfig::load_or_default(&path).unwrap();
        assert_eq!(config.revenue_columns, vec!["Faturamento".to_string()]);
    }
}
