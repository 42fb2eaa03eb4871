use crate::error::Result;
use crate::types::{AbcTable, DeltaTable, LoadReport, Metric, PivotTable, SalesReport};
use crate::util::{format_currency, format_delta, format_int, format_number, Trend};
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

const TOTAL_LABEL: &str = "TOTAL";

pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn format_value(metric: Metric, v: f64) -> String {
    match metric {
        Metric::Quantity => format_number(v, 0),
        Metric::Revenue => format_currency(v),
    }
}

/// Delta text with an up/down marker for non-zero changes.
pub fn format_delta_cell(fraction: f64) -> String {
    let marker = Trend::of(fraction).marker();
    if marker.is_empty() {
        format_delta(fraction)
    } else {
        format!("{} {}", format_delta(fraction), marker)
    }
}

fn metric_row(metric: Metric, label: &str, cells: &[f64], deltas: &[f64], total: f64) -> Vec<String> {
    let mut row = vec![label.to_string()];
    for (i, v) in cells.iter().enumerate() {
        row.push(format_value(metric, *v));
        // Bucket i > 0 is followed by its change against bucket i - 1.
        if i > 0 {
            row.push(deltas.get(i - 1).map(|d| format_delta_cell(*d)).unwrap_or_default());
        }
    }
    row.push(format_value(metric, total));
    row
}

/// Entity x week table with a change column after every week but the first.
pub fn render_metric_table(table: &PivotTable, deltas: &DeltaTable) -> String {
    let mut builder = Builder::default();

    let mut header = vec!["SKU".to_string()];
    for (i, bucket) in table.buckets.iter().enumerate() {
        header.push(bucket.label());
        if i > 0 {
            header.push(format!("Δ {}", bucket.label()));
        }
    }
    header.push("Total".to_string());
    builder.push_record(header);

    for row in &table.rows {
        let row_deltas = deltas
            .rows
            .iter()
            .find(|d| d.entity_id == row.entity_id)
            .map(|d| d.deltas.as_slice())
            .unwrap_or(&[]);
        builder.push_record(metric_row(
            table.metric,
            &row.entity_id,
            &row.cells,
            row_deltas,
            row.total,
        ));
    }
    builder.push_record(metric_row(
        table.metric,
        TOTAL_LABEL,
        &table.column_totals,
        &deltas.totals,
        table.grand_total,
    ));

    builder.build().with(Style::markdown()).to_string()
}

pub fn render_abc_table(table: &AbcTable) -> String {
    if table.rows.is_empty() {
        return "(no rows)".to_string();
    }
    let mut builder = Builder::default();
    let mut header = vec!["SKU".to_string()];
    header.extend(table.periods.iter().map(|p| p.label()));
    builder.push_record(header);
    for row in &table.rows {
        let mut record = vec![row.entity_id.clone()];
        record.extend(row.tiers.iter().map(|t| t.to_string()));
        builder.push_record(record);
    }
    builder.build().with(Style::markdown()).to_string()
}

pub fn success_message(load: &LoadReport) -> String {
    let mut msg = format!(
        "Report processed: {} transactions",
        format_int(load.retained)
    );
    let mut notes = Vec::new();
    if load.missing_entity > 0 {
        notes.push(format!("{} rows without SKU skipped", format_int(load.missing_entity)));
    }
    if load.unparsed_dates > 0 {
        notes.push(format!(
            "{} rows with unreadable dates dropped",
            format_int(load.unparsed_dates)
        ));
    }
    if !notes.is_empty() {
        msg.push_str(&format!(" ({})", notes.join(", ")));
    }
    msg
}

pub fn print_report(report: &SalesReport) {
    println!(
        "Weeks counted from {} (revenue column: {})\n",
        report.start_date.format("%d/%m/%Y"),
        report.load.revenue_column
    );
    println!("Units sold per week\n");
    println!("{}\n", render_metric_table(&report.quantity, &report.quantity_deltas));
    println!("Revenue per week\n");
    println!("{}\n", render_metric_table(&report.revenue, &report.revenue_deltas));
    println!("ABC classification\n");
    println!("{}\n", render_abc_table(&report.abc));
}
