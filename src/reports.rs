use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use crate::types::{
    AbcRow, AbcTable, DeltaRow, DeltaTable, LoadReport, Metric, Period, PivotRow, PivotTable,
    SalesReport, Tier, Transaction, WeekBucket,
};
use crate::util::{days_between, period_change};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

// Cumulative fractions are sums of floats; allow for rounding at the boundaries.
const TIER_EPSILON: f64 = 1e-9;

/// Transactions tagged with their week bucket.
#[derive(Debug, Clone)]
pub struct Bucketed<'a> {
    pub start_date: NaiveDate,
    pub entries: Vec<(WeekBucket, &'a Transaction)>,
}

impl Bucketed<'_> {
    /// Every bucket up to the latest one observed, so each delta has a
    /// preceding column.
    pub fn buckets(&self) -> Vec<WeekBucket> {
        let last = self
            .entries
            .iter()
            .map(|(b, _)| *b)
            .max()
            .unwrap_or(WeekBucket::new(0));
        WeekBucket::through(last)
    }
}

pub fn bucket_transactions(transactions: &[Transaction]) -> Result<Bucketed<'_>> {
    let start_date = transactions
        .iter()
        .map(|t| t.sale_date)
        .min()
        .ok_or(ReportError::EmptyAfterDateFiltering)?;
    let entries = transactions
        .iter()
        .map(|t| (WeekBucket::from_days(days_between(start_date, t.sale_date)), t))
        .collect();
    Ok(Bucketed {
        start_date,
        entries,
    })
}

/// Sum `metric` per entity and bucket. Missing combinations are zero.
pub fn pivot(bucketed: &Bucketed<'_>, metric: Metric) -> PivotTable {
    let buckets = bucketed.buckets();
    let width = buckets.len();

    let mut sums: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for (bucket, tx) in &bucketed.entries {
        let cells = sums
            .entry(tx.entity_id.as_str())
            .or_insert_with(|| vec![0.0; width]);
        cells[bucket.index()] += metric.of(tx);
    }

    let rows: Vec<PivotRow> = sums
        .into_iter()
        .map(|(entity_id, cells)| PivotRow {
            entity_id: entity_id.to_string(),
            total: cells.iter().sum(),
            cells,
        })
        .collect();

    let mut column_totals = vec![0.0; width];
    for row in &rows {
        for (acc, v) in column_totals.iter_mut().zip(&row.cells) {
            *acc += v;
        }
    }
    let grand_total = column_totals.iter().sum();

    PivotTable {
        metric,
        buckets,
        rows,
        column_totals,
        grand_total,
    }
}

fn changes(cells: &[f64]) -> Vec<f64> {
    cells
        .windows(2)
        .map(|w| period_change(w[0], w[1]))
        .collect()
}

/// Week-over-week change for every entity and for the totals row.
pub fn deltas(table: &PivotTable) -> DeltaTable {
    DeltaTable {
        metric: table.metric,
        buckets: table.buckets.iter().skip(1).copied().collect(),
        rows: table
            .rows
            .iter()
            .map(|r| DeltaRow {
                entity_id: r.entity_id.clone(),
                deltas: changes(&r.cells),
            })
            .collect(),
        totals: changes(&table.column_totals),
    }
}

/// Tier every entry of one period by its share of the period's revenue.
///
/// Entries are ranked by revenue descending, ties by entity id. An entity
/// is A while the cumulative share including it is within `tier_a`, B
/// within `tier_b`, C beyond. A period without revenue is unclassified.
/// The result is aligned with `values`.
pub fn classify_period(values: &[(&str, f64)], tier_a: f64, tier_b: f64) -> Vec<Tier> {
    let total: f64 = values.iter().map(|(_, v)| v).sum();
    if total <= 0.0 {
        return vec![Tier::Unclassified; values.len()];
    }

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .1
            .partial_cmp(&values[a].1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| values[a].0.cmp(values[b].0))
    });

    let mut tiers = vec![Tier::C; values.len()];
    let mut cumulative = 0.0;
    for idx in order {
        cumulative += values[idx].1;
        let share = cumulative / total;
        tiers[idx] = if share <= tier_a + TIER_EPSILON {
            Tier::A
        } else if share <= tier_b + TIER_EPSILON {
            Tier::B
        } else {
            Tier::C
        };
    }
    tiers
}

/// ABC tiers per week bucket and for the whole report, from the revenue pivot.
pub fn abc(revenue: &PivotTable, config: &ReportConfig) -> AbcTable {
    let mut periods: Vec<Period> = revenue.buckets.iter().map(|b| Period::Week(*b)).collect();
    periods.push(Period::Month);

    let mut rows: Vec<AbcRow> = revenue
        .rows
        .iter()
        .map(|r| AbcRow {
            entity_id: r.entity_id.clone(),
            tiers: Vec::with_capacity(periods.len()),
        })
        .collect();

    for (col, period) in periods.iter().enumerate() {
        let values: Vec<(&str, f64)> = revenue
            .rows
            .iter()
            .map(|r| {
                let v = match period {
                    Period::Week(_) => r.cells[col],
                    Period::Month => r.total,
                };
                (r.entity_id.as_str(), v)
            })
            .collect();
        let tiers = classify_period(&values, config.tier_a_threshold, config.tier_b_threshold);
        for (row, tier) in rows.iter_mut().zip(tiers) {
            row.tiers.push(tier);
        }
    }

    AbcTable { periods, rows }
}

/// Aggregate normalized transactions into the finished tables.
pub fn build_report(
    transactions: &[Transaction],
    load: LoadReport,
    config: &ReportConfig,
) -> Result<SalesReport> {
    let bucketed = bucket_transactions(transactions)?;
    debug!(
        "Start date {}, {} week buckets",
        bucketed.start_date,
        bucketed.buckets().len()
    );

    let quantity = pivot(&bucketed, Metric::Quantity);
    let revenue = pivot(&bucketed, Metric::Revenue);
    let quantity_deltas = deltas(&quantity);
    let revenue_deltas = deltas(&revenue);
    let abc_table = abc(&revenue, config);

    Ok(SalesReport {
        start_date: bucketed.start_date,
        load,
        quantity,
        revenue,
        quantity_deltas,
        revenue_deltas,
        abc: abc_table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(entity: &str, day: u32, quantity: u64, amount: f64) -> Transaction {
        Transaction {
            entity_id: entity.to_string(),
            sale_date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            quantity,
            amount,
        }
    }

    #[test]
    fn start_date_is_earliest_sale() {
        let txs = vec![tx("X1", 12, 1, 1.0), tx("X2", 3, 1, 1.0), tx("X1", 30, 1, 1.0)];
        let bucketed = bucket_transactions(&txs).unwrap();
        assert_eq!(
            bucketed.start_date,
            NaiveDate::from_ymd_opt(2025, 1, 3).unwrap()
        );
        let labels: Vec<usize> = bucketed.entries.iter().map(|(b, _)| b.index()).collect();
        assert_eq!(labels, vec![1, 0, 3]);
    }

    #[test]
    fn empty_input_has_no_buckets() {
        let err = bucket_transactions(&[]).unwrap_err();
        assert!(matches!(err, ReportError::EmptyAfterDateFiltering));
    }

    #[test]
    fn pivot_fills_missing_cells_with_zero() {
        let txs = vec![tx("B", 1, 2, 20.0), tx("A", 9, 3, 30.0), tx("B", 20, 1, 5.0)];
        let bucketed = bucket_transactions(&txs).unwrap();
        let qty = pivot(&bucketed, Metric::Quantity);

        assert_eq!(qty.buckets.len(), 3);
        assert_eq!(qty.rows[0].entity_id, "A");
        assert_eq!(qty.rows[0].cells, vec![0.0, 3.0, 0.0]);
        assert_eq!(qty.rows[1].cells, vec![2.0, 0.0, 1.0]);
        assert_eq!(qty.rows[1].total, 3.0);
        assert_eq!(qty.column_totals, vec![2.0, 3.0, 1.0]);
        assert_eq!(qty.grand_total, 6.0);
        assert_eq!(qty.value("A", WeekBucket::new(0)), 0.0);
        assert_eq!(qty.value("missing", WeekBucket::new(1)), 0.0);
    }

    #[test]
    fn late_sales_collapse_into_last_bucket() {
        let txs = vec![tx("A", 1, 1, 1.0), tx("A", 29, 2, 1.0), tx("A", 31, 4, 1.0)];
        let bucketed = bucket_transactions(&txs).unwrap();
        let qty = pivot(&bucketed, Metric::Quantity);
        assert_eq!(qty.buckets.len(), 5);
        assert_eq!(qty.value("A", WeekBucket::LAST), 6.0);
    }

    #[test]
    fn deltas_cover_every_bucket_after_the_first() {
        let txs = vec![tx("A", 1, 0, 100.0), tx("B", 8, 1, 50.0)];
        let bucketed = bucket_transactions(&txs).unwrap();
        let revenue = pivot(&bucketed, Metric::Revenue);
        let d = deltas(&revenue);

        assert_eq!(d.buckets, vec![WeekBucket::new(1)]);
        assert_eq!(d.delta("A", WeekBucket::new(1)), Some(-1.0));
        assert_eq!(d.delta("B", WeekBucket::new(1)), Some(1.0));
        assert_eq!(d.totals, vec![-0.5]);
    }

    #[test]
    fn classification_boundaries_are_inclusive() {
        let values = [("a", 80.0), ("b", 15.0), ("c", 5.0)];
        assert_eq!(
            classify_period(&values, 0.80, 0.95),
            vec![Tier::A, Tier::B, Tier::C]
        );
    }

    #[test]
    fn classification_keeps_input_alignment() {
        let values = [("small", 5.0), ("big", 70.0), ("mid", 25.0)];
        assert_eq!(
            classify_period(&values, 0.80, 0.95),
            vec![Tier::C, Tier::A, Tier::B]
        );
    }

    #[test]
    fn ties_break_by_entity_id() {
        let values = [("Z", 50.0), ("M", 50.0)];
        assert_eq!(classify_period(&values, 0.80, 0.95), vec![Tier::C, Tier::A]);
    }

    #[test]
    fn zero_revenue_period_is_unclassified() {
        let values = [("a", 0.0), ("b", 0.0)];
        assert_eq!(
            classify_period(&values, 0.80, 0.95),
            vec![Tier::Unclassified, Tier::Unclassified]
        );
    }

    #[test]
    fn abc_has_one_column_per_bucket_plus_total() {
        let txs = vec![
            tx("A", 1, 1, 90.0),
            tx("B", 2, 1, 10.0),
            tx("B", 9, 1, 0.0),
        ];
        let bucketed = bucket_transactions(&txs).unwrap();
        let revenue = pivot(&bucketed, Metric::Revenue);
        let table = abc(&revenue, &ReportConfig::default());

        assert_eq!(
            table.periods,
            vec![Period::Week(WeekBucket::new(0)), Period::Week(WeekBucket::new(1)), Period::Month]
        );
        assert_eq!(table.tier("A", Period::Week(WeekBucket::new(0))), Some(Tier::B));
        assert_eq!(table.tier("B", Period::Week(WeekBucket::new(1))), Some(Tier::Unclassified));
        assert_eq!(table.tier("B", Period::Month), Some(Tier::C));
    }
}
