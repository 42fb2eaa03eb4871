//! Week-over-week sales breakdown per SKU from a marketplace sales export.
//!
//! The pipeline runs strictly in order:
//!
//! 1. [`loader::read_grid`] reads the spreadsheet (or CSV) into raw cells.
//! 2. [`loader::locate_header`] finds the row holding the `SKU` marker.
//! 3. [`loader::records_from_grid`] and [`loader::normalize`] turn rows into
//!    [`types::Transaction`]s, dropping rows without a SKU or a readable date.
//! 4. [`reports::build_report`] buckets sales into weeks counted from the
//!    earliest sale, pivots units and revenue, computes week-over-week
//!    changes and the ABC revenue tiers.
//!
//! [`output`] turns the finished [`types::SalesReport`] into tables.
pub mod config;
pub mod error;
pub mod loader;
pub mod output;
pub mod reports;
pub mod types;
pub mod util;

use config::ReportConfig;
use error::Result;
use std::path::Path;
use types::{RawGrid, SalesReport};

/// Build the report from an already-read grid.
pub fn run_grid(grid: &RawGrid, config: &ReportConfig) -> Result<SalesReport> {
    let header_idx = loader::locate_header(grid, &config.header_marker)?;
    tracing::debug!("Header row found at index {}", header_idx);
    let table = loader::records_from_grid(grid, header_idx);
    let (transactions, load) = loader::normalize(&table, config)?;
    reports::build_report(&transactions, load, config)
}

/// Read `path` and build the report. The file is closed before any
/// aggregation starts.
pub fn run(path: &Path, config: &ReportConfig) -> Result<SalesReport> {
    let grid = loader::read_grid(path, config)?;
    run_grid(&grid, config)
}
