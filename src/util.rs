// Parsing and formatting helpers.
//
// This module centralizes the locale-specific text handling (Portuguese
// dates, Brazilian currency strings) so the rest of the code can assume
// clean, typed values.
use chrono::{Duration, NaiveDate};
use num_format::{Locale, ToFormattedString};

const MONTHS: [(&str, u32); 12] = [
    ("janeiro", 1),
    ("fevereiro", 2),
    ("marco", 3),
    ("abril", 4),
    ("maio", 5),
    ("junho", 6),
    ("julho", 7),
    ("agosto", 8),
    ("setembro", 9),
    ("outubro", 10),
    ("novembro", 11),
    ("dezembro", 12),
];

/// Replace accented Latin letters with their base letter ("março" -> "marco").
pub fn fold_diacritics(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ç' => 'c',
            'Ç' => 'C',
            other => other,
        })
        .collect()
}

pub fn month_number(name: &str) -> Option<u32> {
    let key = fold_diacritics(&name.trim().to_lowercase());
    MONTHS.iter().find(|(m, _)| *m == key).map(|(_, n)| *n)
}

/// Parse "<day> de <month> de <year> [time...]", e.g.
/// "10 de janeiro de 2025 14:32 hs.". Anything after the year is ignored.
pub fn parse_sale_date(s: &str) -> Option<NaiveDate> {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    if tokens.len() < 5 {
        return None;
    }
    let day: u32 = tokens[0].parse().ok()?;
    let month = month_number(tokens[2])?;
    let year: i32 = tokens[4].trim_end_matches(',').parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Spreadsheet serial day number (1900 date system) to a calendar date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Parse a decimal written either plainly ("1234.5") or Brazilian style
/// ("R$ 1.234,50"). When a comma is present it is the decimal separator and
/// dots are thousands separators.
pub fn parse_decimal(s: &str) -> Option<f64> {
    let s = s.replace("R$", "").replace("BRL", "");
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return None;
    }
    let normalized = if s.contains(',') {
        s.replace('.', "").replace(',', ".")
    } else {
        s
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Revenue text to a non-negative amount; unparseable text is zero.
pub fn parse_amount(s: &str) -> f64 {
    clamp_amount(parse_decimal(s).unwrap_or(0.0))
}

pub fn clamp_amount(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

/// Quantity text to a non-negative whole number; unparseable text is zero.
pub fn parse_quantity(s: &str) -> u64 {
    parse_decimal(s).map(floor_non_negative).unwrap_or(0)
}

pub fn floor_non_negative(v: f64) -> u64 {
    if v.is_finite() && v > 0.0 {
        v.floor() as u64
    } else {
        0
    }
}

pub fn days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// Fractional change from `previous` to `current`. A zero baseline gives
/// +100% when anything was sold and 0% otherwise.
pub fn period_change(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        if current > 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        (current - previous) / previous
    }
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals with `num-format` grouping on the integer part,
    // e.g. `1,234,567.89`.
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: u64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// Brazilian currency, e.g. `R$ 1.234,56`.
pub fn format_currency(amount: f64) -> String {
    let plain = format_number(amount.abs(), 2);
    let swapped: String = plain
        .chars()
        .map(|c| match c {
            ',' => '.',
            '.' => ',',
            other => other,
        })
        .collect();
    if amount < 0.0 {
        format!("-R$ {}", swapped)
    } else {
        format!("R$ {}", swapped)
    }
}

/// Signed percentage with one decimal, e.g. `+12.5%` or `-100.0%`.
pub fn format_delta(fraction: f64) -> String {
    let pct = fraction * 100.0;
    // Keep "-0.0%" out of the output for a zero change.
    let pct = if pct == 0.0 { 0.0 } else { pct };
    format!("{:+.1}%", pct)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn of(fraction: f64) -> Self {
        if fraction > 0.0 {
            Trend::Up
        } else if fraction < 0.0 {
            Trend::Down
        } else {
            Trend::Flat
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Trend::Up => "▲",
            Trend::Down => "▼",
            Trend::Flat => "",
        }
    }
}
