// src/transform/filter.rs

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use tracing::{debug, info, instrument};

use crate::error::TableError;
use crate::table::{clean_field, field, is_blank, match_key, number::parse_number, Table};

/// Keep the header plus every non-blank row whose `column` matches `expected`.
/// Both sides are compared without quotes, whitespace or case.
pub fn filter_by_value(table: &Table, column: &str, expected: &str) -> Result<Table, TableError> {
    let idx = table.position(column)?;
    let expected = match_key(expected);

    let rows = table
        .rows
        .iter()
        .filter(|row| !is_blank(row) && match_key(field(row, idx)) == expected)
        .cloned()
        .collect();
    Ok(table.with_rows(rows))
}

/// Drop rows whose cleaned `column` equals `value` exactly.
pub fn remove_rows_by_value(table: &Table, column: &str, value: &str) -> Result<Table, TableError> {
    let idx = table.position(column)?;
    let rows = table
        .rows
        .iter()
        .filter(|row| clean_field(field(row, idx)) != value)
        .cloned()
        .collect();
    Ok(table.with_rows(rows))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::Eq => value == threshold,
            Comparison::Ne => value != threshold,
            Comparison::Lt => value < threshold,
            Comparison::Le => value <= threshold,
            Comparison::Gt => value > threshold,
            Comparison::Ge => value >= threshold,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "!=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Comparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" | "==" => Ok(Comparison::Eq),
            "!=" | "<>" | "≠" => Ok(Comparison::Ne),
            "<" => Ok(Comparison::Lt),
            "<=" | "≤" => Ok(Comparison::Le),
            ">" => Ok(Comparison::Gt),
            ">=" | "≥" => Ok(Comparison::Ge),
            other => Err(format!("unknown comparison `{}`", other)),
        }
    }
}

/// Keep rows whose numeric `column` satisfies `cmp` against `threshold`.
/// Rows whose field is not a number are always kept.
pub fn retain_by_comparison(
    table: &Table,
    column: &str,
    cmp: Comparison,
    threshold: f64,
) -> Result<Table, TableError> {
    let idx = table.position(column)?;
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .filter(|row| match parse_number(field(row, idx)) {
            Some(v) => cmp.holds(v, threshold),
            None => true,
        })
        .cloned()
        .collect();
    debug!(
        column,
        cmp = %cmp,
        threshold,
        dropped = table.rows.len() - rows.len(),
        "numeric filter"
    );
    Ok(table.with_rows(rows))
}

/// File-level [`filter_by_value`] over many inputs. Each output is written to
/// `output_dir/filtered_<input name>`; inputs without a header line produce
/// no output. Returns the written paths in input order.
#[instrument(level = "info", skip(inputs, output_dir), fields(files = inputs.len()))]
pub fn filter_files_by_value(
    inputs: &[PathBuf],
    output_dir: &Path,
    column: &str,
    expected: &str,
    delimiter: char,
) -> Result<Vec<PathBuf>, TableError> {
    let mut written = Vec::with_capacity(inputs.len());
    for input in inputs {
        let table = Table::load(input, delimiter)?;
        if !table.has_header() {
            debug!(path = %input.display(), "empty input, skipped");
            continue;
        }
        let filtered = filter_by_value(&table, column, expected)?;
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "input.csv".to_string());
        let out = output_dir.join(format!("filtered_{}", name));
        filtered.save(&out)?;
        info!(
            input = %input.display(),
            kept = filtered.rows.len(),
            of = table.rows.len(),
            "filtered"
        );
        written.push(out);
    }
    Ok(written)
}
