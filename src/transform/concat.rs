// src/transform/concat.rs

use std::path::Path;

use tracing::debug;

use crate::error::TableError;
use crate::table::Table;

/// Append the data rows of every table, in order, under the first header.
///
/// Tables without a header (empty files) contribute nothing. Later headers
/// are ignored even when they differ from the first one.
pub fn concatenate(tables: &[Table]) -> Result<Table, TableError> {
    let first = tables.first().ok_or(TableError::EmptyInput)?;
    let header = tables
        .iter()
        .find(|t| t.has_header())
        .map(|t| t.header.clone())
        .unwrap_or_default();

    let rows: Vec<Vec<String>> = tables
        .iter()
        .filter(|t| t.has_header())
        .flat_map(|t| t.rows.iter().cloned())
        .collect();
    debug!(tables = tables.len(), rows = rows.len(), "concatenated");
    Ok(Table::new(header, rows, first.delimiter))
}

/// Load every path and [`concatenate`] them.
pub fn concatenate_files<P: AsRef<Path>>(paths: &[P], delimiter: char) -> Result<Table, TableError> {
    let tables = paths
        .iter()
        .map(|p| Table::load(p, delimiter))
        .collect::<Result<Vec<_>, _>>()?;
    concatenate(&tables)
}
