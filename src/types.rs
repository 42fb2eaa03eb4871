use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// A single spreadsheet cell after it has been read from the source document.
///
/// Cells are loosely typed in the export: the same column can hold text in one
/// row and a native number in the next, so every parser works on `Cell`
/// rather than on strings.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    /// Trimmed text content, `None` for non-text or blank cells.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    None
                } else {
                    Some(t)
                }
            }
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => write!(f, "{}", s.trim()),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// The document as read, before the header row is known.
pub type RawGrid = Vec<Vec<Cell>>;

/// One data row below the header, keyed by trimmed column name.
pub type RawRecord = HashMap<String, Cell>;

/// Data rows keyed by header name, plus the header names in document order.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl RawTable {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

/// A fully resolved sale. Rows that cannot produce all four fields never
/// become a `Transaction`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub entity_id: String,
    pub sale_date: NaiveDate,
    pub quantity: u64,
    pub amount: f64,
}

/// Seven-day window counted from the earliest sale in the report.
/// The last bucket absorbs every day from 28 onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekBucket(u8);

impl WeekBucket {
    pub const LAST: WeekBucket = WeekBucket(4);

    pub fn new(index: u8) -> Self {
        WeekBucket(index.min(Self::LAST.0))
    }

    pub fn from_days(days: i64) -> Self {
        match days {
            d if d < 7 => WeekBucket(0),
            d if d < 14 => WeekBucket(1),
            d if d < 21 => WeekBucket(2),
            d if d < 28 => WeekBucket(3),
            _ => Self::LAST,
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn label(self) -> String {
        if self == Self::LAST {
            "Week 5+".to_string()
        } else {
            format!("Week {}", self.0 + 1)
        }
    }

    /// Every bucket from the first one up to and including `last`.
    pub fn through(last: WeekBucket) -> Vec<WeekBucket> {
        (0..=last.0).map(WeekBucket).collect()
    }
}

impl Serialize for WeekBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Metric {
    Quantity,
    Revenue,
}

impl Metric {
    pub fn of(self, tx: &Transaction) -> f64 {
        match self {
            Metric::Quantity => tx.quantity as f64,
            Metric::Revenue => tx.amount,
        }
    }
}

/// ABC revenue-concentration tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    A,
    B,
    C,
    /// The period had no revenue at all.
    Unclassified,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::A => "A",
            Tier::B => "B",
            Tier::C => "C",
            Tier::Unclassified => "-",
        }
    }

    pub fn parse(s: &str) -> Option<Tier> {
        match s.trim().to_uppercase().as_str() {
            "A" => Some(Tier::A),
            "B" => Some(Tier::B),
            "C" => Some(Tier::C),
            "-" => Some(Tier::Unclassified),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Tier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A column of the ABC table: one week bucket or the whole report span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Week(WeekBucket),
    Month,
}

impl Period {
    pub fn label(self) -> String {
        match self {
            Period::Week(b) => b.label(),
            Period::Month => "Total".to_string(),
        }
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotRow {
    pub entity_id: String,
    /// One value per bucket of the owning table, zero when the entity had no sales.
    pub cells: Vec<f64>,
    pub total: f64,
}

/// Entity x week cross-tabulation for one metric.
///
/// `column_totals` is the totals row; it is kept apart from `rows` so that
/// ranking never sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTable {
    pub metric: Metric,
    pub buckets: Vec<WeekBucket>,
    pub rows: Vec<PivotRow>,
    pub column_totals: Vec<f64>,
    pub grand_total: f64,
}

impl PivotTable {
    pub fn row(&self, entity_id: &str) -> Option<&PivotRow> {
        self.rows.iter().find(|r| r.entity_id == entity_id)
    }

    /// Zero for entities or buckets the table does not contain.
    pub fn value(&self, entity_id: &str, bucket: WeekBucket) -> f64 {
        let Some(col) = self.buckets.iter().position(|b| *b == bucket) else {
            return 0.0;
        };
        self.row(entity_id).map(|r| r.cells[col]).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaRow {
    pub entity_id: String,
    /// Fractional change, aligned with `DeltaTable::buckets`.
    pub deltas: Vec<f64>,
}

/// Week-over-week change for every bucket after the first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaTable {
    pub metric: Metric,
    pub buckets: Vec<WeekBucket>,
    pub rows: Vec<DeltaRow>,
    pub totals: Vec<f64>,
}

impl DeltaTable {
    pub fn delta(&self, entity_id: &str, bucket: WeekBucket) -> Option<f64> {
        let col = self.buckets.iter().position(|b| *b == bucket)?;
        self.rows
            .iter()
            .find(|r| r.entity_id == entity_id)
            .map(|r| r.deltas[col])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbcRow {
    pub entity_id: String,
    /// One tier per period, aligned with `AbcTable::periods`.
    pub tiers: Vec<Tier>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbcTable {
    pub periods: Vec<Period>,
    pub rows: Vec<AbcRow>,
}

impl AbcTable {
    pub fn tier(&self, entity_id: &str, period: Period) -> Option<Tier> {
        let col = self.periods.iter().position(|p| *p == period)?;
        self.rows
            .iter()
            .find(|r| r.entity_id == entity_id)
            .map(|r| r.tiers[col])
    }

    /// Keep only entities whose whole-report tier is one of `tiers`.
    /// An empty selection keeps everything.
    pub fn filter(&self, tiers: &[Tier]) -> AbcTable {
        if tiers.is_empty() {
            return self.clone();
        }
        let Some(col) = self.periods.iter().position(|p| *p == Period::Month) else {
            return self.clone();
        };
        AbcTable {
            periods: self.periods.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| tiers.contains(&r.tiers[col]))
                .cloned()
                .collect(),
        }
    }
}

/// Row accounting for one ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub total_rows: usize,
    pub missing_entity: usize,
    pub unparsed_dates: usize,
    pub retained: usize,
    pub revenue_column: String,
}

/// Everything the presentation layer needs for one uploaded report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesReport {
    pub start_date: NaiveDate,
    pub load: LoadReport,
    pub quantity: PivotTable,
    pub revenue: PivotTable,
    pub quantity_deltas: DeltaTable,
    pub revenue_deltas: DeltaTable,
    pub abc: AbcTable,
}
