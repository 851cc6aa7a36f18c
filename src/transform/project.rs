// src/transform/project.rs

use crate::error::TableError;
use crate::table::{field, Table};

/// Keep only `columns`, in the requested order. The header becomes exactly
/// the requested names; short rows yield empty fields. Any absent column
/// aborts the whole projection.
pub fn project_columns<S: AsRef<str>>(table: &Table, columns: &[S]) -> Result<Table, TableError> {
    let index = table.column_index();
    let positions = columns
        .iter()
        .map(|c| index.position(c.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    let header = columns.iter().map(|c| c.as_ref().to_string()).collect();
    let rows = table
        .rows
        .iter()
        .map(|row| {
            positions
                .iter()
                .map(|&i| field(row, i).to_string())
                .collect()
        })
        .collect();
    Ok(Table::new(header, rows, table.delimiter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reorders_and_pads() {
        let t = Table::parse("\"A\";\"B\";\"C\"\n1;2;3\n4\n", ';');
        let out = project_columns(&t, &["C", "a"]).unwrap();
        assert_eq!(out.header, vec!["C", "a"]);
        assert_eq!(out.rows, vec![vec!["3", "1"], vec!["", "4"]]);
    }

    #[test]
    fn absent_column_aborts_without_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let t = Table::parse("A;B\n1;2\n", ';');

        let result = project_columns(&t, &["A", "MISSING"]).and_then(|p| p.save(&path));
        assert!(matches!(
            result,
            Err(TableError::ColumnNotFound { column }) if column == "MISSING"
        ));
        assert!(!path.exists());
    }
}
