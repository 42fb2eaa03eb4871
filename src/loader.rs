use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use crate::types::{Cell, LoadReport, RawGrid, RawRecord, RawTable, Transaction};
use crate::util::{
    clamp_amount, excel_serial_to_date, floor_non_negative, parse_amount, parse_quantity,
    parse_sale_date,
};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use std::path::Path;
use tracing::{debug, info, warn};

/// Read the first worksheet (or the whole CSV) into a grid of cells.
///
/// The file handle is owned by this function and closed before it returns,
/// whether or not reading succeeded.
pub fn read_grid(path: &Path, config: &ReportConfig) -> Result<RawGrid> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    let grid = match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(path)?,
        "csv" => read_csv(path, config.csv_delimiter)?,
        other => {
            return Err(ReportError::Unexpected(format!(
                "unsupported file type '{}' ({})",
                other,
                path.display()
            )))
        }
    };
    debug!("Read {} raw rows from {}", grid.len(), path.display());
    Ok(grid)
}

fn read_workbook(path: &Path) -> Result<RawGrid> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ReportError::Unexpected("workbook has no worksheets".to_string()))??;
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect())
}

fn read_csv(path: &Path, delimiter: char) -> Result<RawGrid> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .from_path(path)?;
    let mut grid = Vec::new();
    // Exports are not always UTF-8; decode lossily instead of failing the file.
    for result in rdr.byte_records() {
        let record = result?;
        grid.push(
            record
                .iter()
                .map(|field| cell_from_text(&String::from_utf8_lossy(field)))
                .collect(),
        );
    }
    Ok(grid)
}

fn cell_from_text(s: &str) -> Cell {
    if s.trim().is_empty() {
        Cell::Empty
    } else {
        Cell::Text(s.to_string())
    }
}

pub fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => cell_from_text(s),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            excel_serial_to_date(serial).map_or(Cell::Number(serial), Cell::Date)
        }
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map_or_else(|| cell_from_text(s), Cell::Date),
        Data::DurationIso(s) => cell_from_text(s),
        Data::Error(_) => Cell::Empty,
    }
}

/// Index of the first row holding a cell equal to `marker`, ignoring case
/// and surrounding whitespace. Partial matches such as "SKU do anúncio" do
/// not count.
pub fn locate_header(grid: &[Vec<Cell>], marker: &str) -> Result<usize> {
    let wanted = marker.trim().to_uppercase();
    grid.iter()
        .position(|row| {
            row.iter()
                .filter_map(Cell::as_text)
                .any(|t| t.to_uppercase() == wanted)
        })
        .ok_or_else(|| ReportError::HeaderNotFound {
            marker: marker.trim().to_string(),
        })
}

/// Turn the rows below `header_idx` into name-keyed records. Rows above the
/// header are discarded, as are rows with no content at all.
pub fn records_from_grid(grid: &[Vec<Cell>], header_idx: usize) -> RawTable {
    let Some(header) = grid.get(header_idx) else {
        return RawTable::default();
    };
    let names: Vec<Option<String>> = header
        .iter()
        .map(|c| {
            let name = c.to_string();
            if name.is_empty() {
                None
            } else {
                Some(name)
            }
        })
        .collect();

    let mut columns: Vec<String> = Vec::new();
    for name in names.iter().flatten() {
        if !columns.contains(name) {
            columns.push(name.clone());
        }
    }

    let records = grid[header_idx + 1..]
        .iter()
        .filter(|row| !row.iter().all(Cell::is_blank))
        .map(|row| {
            let mut record = RawRecord::new();
            for (name, cell) in names.iter().zip(row.iter()) {
                if let Some(name) = name {
                    // Duplicate header names: the leftmost column wins.
                    record.entry(name.clone()).or_insert_with(|| cell.clone());
                }
            }
            record
        })
        .collect();

    RawTable { columns, records }
}

fn entity_from_cell(cell: &Cell) -> Option<String> {
    let id = cell.to_string();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

fn date_from_cell(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date(d) => Some(*d),
        Cell::Text(s) => parse_sale_date(s),
        _ => None,
    }
}

fn amount_from_cell(cell: &Cell) -> f64 {
    match cell {
        Cell::Number(v) => clamp_amount(*v),
        Cell::Text(s) => parse_amount(s),
        _ => 0.0,
    }
}

fn quantity_from_cell(cell: &Cell) -> u64 {
    match cell {
        Cell::Number(v) => floor_non_negative(*v),
        Cell::Text(s) => parse_quantity(s),
        _ => 0,
    }
}

/// Resolve the configured columns and convert every record into a
/// `Transaction`.
///
/// Rows without a SKU and rows whose sale date cannot be read are dropped;
/// bad amounts and quantities become zero. Only missing columns fail the run.
pub fn normalize(
    table: &RawTable,
    config: &ReportConfig,
) -> Result<(Vec<Transaction>, LoadReport)> {
    for required in [&config.sku_column, &config.date_column, &config.quantity_column] {
        if !table.has_column(required) {
            return Err(ReportError::MissingRequiredColumn(required.clone()));
        }
    }
    let revenue_column = config
        .revenue_columns
        .iter()
        .find(|c| table.has_column(c))
        .ok_or_else(|| ReportError::MissingRevenueColumn {
            accepted: config.revenue_columns.join(", "),
        })?;
    debug!("Using '{}' as the revenue column", revenue_column);

    let mut report = LoadReport {
        total_rows: table.records.len(),
        revenue_column: revenue_column.clone(),
        ..LoadReport::default()
    };
    let mut transactions = Vec::with_capacity(table.records.len());

    for record in &table.records {
        let Some(entity_id) = record.get(&config.sku_column).and_then(entity_from_cell) else {
            report.missing_entity += 1;
            continue;
        };
        let Some(sale_date) = record.get(&config.date_column).and_then(date_from_cell) else {
            report.unparsed_dates += 1;
            continue;
        };
        let quantity = record
            .get(&config.quantity_column)
            .map(quantity_from_cell)
            .unwrap_or(0);
        let amount = record.get(revenue_column).map(amount_from_cell).unwrap_or(0.0);

        transactions.push(Transaction {
            entity_id,
            sale_date,
            quantity,
            amount,
        });
    }

    report.retained = transactions.len();
    if report.unparsed_dates > 0 {
        warn!(
            "Dropped {} rows with unreadable sale dates",
            report.unparsed_dates
        );
    }
    info!(
        "Normalized {} of {} rows ({} without SKU)",
        report.retained, report.total_rows, report.missing_entity
    );
    Ok((transactions, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn sample_grid() -> RawGrid {
        vec![
            vec![text("Relatório de vendas"), Cell::Empty, Cell::Empty, Cell::Empty],
            vec![Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty],
            vec![
                text(" sku "),
                text("Data da venda"),
                text("Unidades"),
                text("Total (BRL)"),
            ],
            vec![text("X1"), text("10 de janeiro de 2025 10:00 hs."), Cell::Number(5.0), text("R$ 100,00")],
            vec![Cell::Number(778.0), Cell::Date(NaiveDate::from_ymd_opt(2025, 1, 12).unwrap()), text("2"), Cell::Number(30.5)],
            vec![Cell::Empty, Cell::Empty, Cell::Empty, text("R$ 130,50")],
            vec![text("X2"), text("ontem"), Cell::Number(1.0), text("R$ 9,00")],
            vec![text("X3"), text("11 de janeiro de 2025"), text("x"), text("abc")],
        ]
    }

    #[test]
    fn header_match_is_exact_and_case_insensitive() {
        let grid = sample_grid();
        assert_eq!(locate_header(&grid, "SKU").unwrap(), 2);

        let partial = vec![vec![text("SKU do anúncio")], vec![text("sku")]];
        assert_eq!(locate_header(&partial, "SKU").unwrap(), 1);
    }

    #[test]
    fn missing_header_is_reported() {
        let grid = vec![vec![text("Produto"), text("Qtd")]];
        let err = locate_header(&grid, "SKU").unwrap_err();
        assert!(matches!(err, ReportError::HeaderNotFound { .. }));
    }

    #[test]
    fn records_are_keyed_by_trimmed_header() {
        let grid = sample_grid();
        let table = records_from_grid(&grid, 2);
        assert_eq!(table.columns, vec!["sku", "Data da venda", "Unidades", "Total (BRL)"]);
        assert_eq!(table.records.len(), 5);
        assert_eq!(table.records[0].get("sku"), Some(&text("X1")));
    }

    #[test]
    fn normalize_drops_and_coerces() {
        let grid = sample_grid();
        let table = records_from_grid(&grid, 2);
        let config = ReportConfig {
            sku_column: "sku".to_string(),
            ..ReportConfig::default()
        };
        let (txs, report) = normalize(&table, &config).unwrap();

        assert_eq!(report.total_rows, 5);
        assert_eq!(report.missing_entity, 1);
        assert_eq!(report.unparsed_dates, 1);
        assert_eq!(report.retained, 3);
        assert_eq!(report.revenue_column, "Total (BRL)");

        assert_eq!(txs[0].entity_id, "X1");
        assert_eq!(txs[0].quantity, 5);
        assert_eq!(txs[0].amount, 100.0);
        assert_eq!(txs[1].entity_id, "778");
        assert_eq!(txs[1].quantity, 2);
        assert_eq!(txs[1].amount, 30.5);
        assert_eq!(txs[2].entity_id, "X3");
        assert_eq!(txs[2].quantity, 0);
        assert_eq!(txs[2].amount, 0.0);
    }

    #[test]
    fn revenue_column_priority() {
        let grid = vec![
            vec![
                text("SKU"),
                text("Data da venda"),
                text("Unidades"),
                text("Total (BRL)"),
                text("Receita por produtos (BRL)"),
            ],
            vec![text("X1"), text("1 de abril de 2025"), Cell::Number(1.0), Cell::Number(50.0), Cell::Number(42.0)],
        ];
        let table = records_from_grid(&grid, 0);
        let (txs, report) = normalize(&table, &ReportConfig::default()).unwrap();
        assert_eq!(report.revenue_column, "Receita por produtos (BRL)");
        assert_eq!(txs[0].amount, 42.0);
    }

    #[test]
    fn missing_columns_are_fatal() {
        let grid = vec![vec![text("SKU"), text("Data da venda"), text("Total (BRL)")]];
        let table = records_from_grid(&grid, 0);
        let err = normalize(&table, &ReportConfig::default()).unwrap_err();
        assert!(matches!(err, ReportError::MissingRequiredColumn(ref c) if c == "Unidades"));

        let grid = vec![vec![text("SKU"), text("Data da venda"), text("Unidades")]];
        let table = records_from_grid(&grid, 0);
        let err = normalize(&table, &ReportConfig::default()).unwrap_err();
        assert!(matches!(err, ReportError::MissingRevenueColumn { .. }));
    }

    #[test]
    fn workbook_cells_map_to_typed_cells() {
        assert_eq!(cell_from_data(&Data::Int(3)), Cell::Number(3.0));
        assert_eq!(cell_from_data(&Data::String("  ".into())), Cell::Empty);
        assert_eq!(
            cell_from_data(&Data::DateTimeIso("2025-01-10T08:00:00".into())),
            Cell::Date(NaiveDate::from_ymd_opt(2025, 1, 10).unwrap())
        );
    }

    #[test]
    fn unsupported_extension_is_unexpected() {
        let err = read_grid(Path::new("vendas.pdf"), &ReportConfig::default()).unwrap_err();
        assert!(err.is_unexpected());
    }
}
