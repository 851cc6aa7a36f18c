// src/transform/compute.rs

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use super::padded;
use crate::error::TableError;
use crate::table::{
    canonical_name, clean_field, field, is_blank,
    number::{parse_permissive, render_decimal, DecimalConvention},
    Table,
};

pub const YEAR_COLUMN: &str = "YEAR";
pub const QUARTER_COLUMN: &str = "QUARTER";

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern should compile"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    /// Division by zero yields `0.0`.
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Operation::Add => a + b,
            Operation::Subtract => a - b,
            Operation::Multiply => a * b,
            Operation::Divide if b == 0.0 => 0.0,
            Operation::Divide => a / b,
        }
    }
}

/// Append `new_column` = `left op right` to every non-blank row.
///
/// Operands accept either decimal separator and fall back to `0.0`. Results
/// carry two fractional digits in the file's own convention and are quoted.
/// Blank rows are dropped.
pub fn compute_column(
    table: &Table,
    left: &str,
    right: &str,
    new_column: &str,
    op: Operation,
) -> Result<Table, TableError> {
    let index = table.column_index();
    let a = index.position(left)?;
    let b = index.position(right)?;
    let convention = DecimalConvention::for_delimiter(table.delimiter);
    let width = table.header.len();

    let mut header = table.header.clone();
    header.push(canonical_name(new_column));

    let rows = table
        .rows
        .iter()
        .filter(|row| !is_blank(row))
        .map(|row| {
            let value = op.apply(
                parse_permissive(field(row, a)),
                parse_permissive(field(row, b)),
            );
            let mut out = padded(row, width);
            out.push(format!("\"{}\"", render_decimal(value, convention)));
            out
        })
        .collect();
    Ok(Table::new(header, rows, table.delimiter))
}

/// `(year, "Q1".."Q4")` for a `YYYY-MM-DD` field, or `None` when the field is
/// not exactly that shape or not a real calendar date.
pub fn year_quarter(raw: &str) -> Option<(i32, String)> {
    let cleaned = clean_field(raw);
    if !ISO_DATE.is_match(&cleaned) {
        return None;
    }
    let date = NaiveDate::parse_from_str(&cleaned, "%Y-%m-%d").ok()?;
    Some((date.year(), format!("Q{}", (date.month() - 1) / 3 + 1)))
}

/// Append YEAR and QUARTER derived from `date_column`. Rows whose date does
/// not parse get YEAR `0` and an empty QUARTER.
///
/// A date must also exist on the calendar: `2023-13-01` or `2023-02-30` have
/// the right shape but still get the sentinels, rather than a quarter worked
/// out from the month digits (which would give `Q5` for month 13).
pub fn derive_year_quarter(table: &Table, date_column: &str) -> Result<Table, TableError> {
    let idx = table.position(date_column)?;
    let width = table.header.len();

    let mut header = table.header.clone();
    header.push(YEAR_COLUMN.to_string());
    header.push(QUARTER_COLUMN.to_string());

    let rows = table
        .rows
        .iter()
        .map(|row| {
            let raw = field(row, idx);
            let (year, quarter) = year_quarter(raw).unwrap_or_else(|| {
                trace!(raw, "malformed date");
                (0, String::new())
            });
            let mut out = padded(row, width);
            out.push(year.to_string());
            out.push(quarter);
            out
        })
        .collect();
    Ok(Table::new(header, rows, table.delimiter))
}
