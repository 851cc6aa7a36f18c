// src/transform/join.rs

use std::collections::HashMap;

use tracing::debug;

use super::padded;
use crate::error::TableError;
use crate::table::{field, Table};

pub const OBSERVATION_COLUMN: &str = "OBSERVATION";
pub const DATA_NOT_FOUND: &str = "DATA_NOT_FOUND";

/// Left join: one output row per left row.
///
/// The output header is `left ⧺ right ⧺ OBSERVATION`. A matching right row is
/// appended with an empty observation; otherwise the right side is filled
/// with empty fields and the observation reads `DATA_NOT_FOUND`. Keys are
/// compared as raw field text, so callers normalise both sides beforehand if
/// quoting differs. When the right table repeats a key, its last row wins.
pub fn join_by_key(
    left: &Table,
    right: &Table,
    left_key: &str,
    right_key: &str,
) -> Result<Table, TableError> {
    let rk = right.position(right_key)?;
    let lk = left.position(left_key)?;
    let left_width = left.header.len();
    let right_width = right.header.len();

    let by_key: HashMap<&str, &Vec<String>> = right
        .rows
        .iter()
        .filter(|row| rk < row.len())
        .map(|row| (row[rk].as_str(), row))
        .collect();

    let mut header = Vec::with_capacity(left_width + right_width + 1);
    header.extend(left.header.iter().cloned());
    header.extend(right.header.iter().cloned());
    header.push(OBSERVATION_COLUMN.to_string());

    let mut missing = 0usize;
    let rows = left
        .rows
        .iter()
        .map(|row| {
            let mut out = padded(row, left_width);
            match by_key.get(field(row, lk)) {
                Some(matched) => {
                    out.extend(padded(matched, right_width));
                    out.push(String::new());
                }
                None => {
                    missing += 1;
                    out.extend(std::iter::repeat(String::new()).take(right_width));
                    out.push(DATA_NOT_FOUND.to_string());
                }
            }
            out
        })
        .collect();

    debug!(
        left = left.rows.len(),
        right = right.rows.len(),
        missing,
        "joined"
    );
    Ok(Table::new(header, rows, left.delimiter))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Table {
        Table::parse(
            "REGISTRO_OPERADORA;CNPJ;RAZAO_SOCIAL\n123;11222333000181;ACME SAUDE\n456;33000167000101;OLD\n456;33000167000101;NEW\n",
            ';',
        )
    }

    #[test]
    fn matched_and_unmatched_rows() {
        let left = Table::parse("REG_ANS;VALOR\n123;10\n999;20\n", ';');
        let out = join_by_key(&left, &registry(), "reg_ans", "registro_operadora").unwrap();

        assert_eq!(
            out.header,
            vec!["REG_ANS", "VALOR", "REGISTRO_OPERADORA", "CNPJ", "RAZAO_SOCIAL", "OBSERVATION"]
        );
        assert_eq!(
            out.rows[0],
            vec!["123", "10", "123", "11222333000181", "ACME SAUDE", ""]
        );
        assert_eq!(out.rows[1], vec!["999", "20", "", "", "", "DATA_NOT_FOUND"]);
    }

    #[test]
    fn last_duplicate_right_key_wins() {
        let left = Table::parse("REG_ANS\n456\n", ';');
        let out = join_by_key(&left, &registry(), "REG_ANS", "REGISTRO_OPERADORA").unwrap();
        assert_eq!(out.rows[0][3], "NEW");
    }

    #[test]
    fn keys_compare_raw() {
        let left = Table::parse("REG_ANS\n\"123\"\n", ';');
        let out = join_by_key(&left, &registry(), "REG_ANS", "REGISTRO_OPERADORA").unwrap();
        assert_eq!(out.rows[0].last().unwrap(), DATA_NOT_FOUND);
    }

    #[test]
    fn one_output_row_per_left_row() {
        let left = Table::parse("REG_ANS;X\n123\n\n123;1\n", ';');
        let out = join_by_key(&left, &registry(), "REG_ANS", "REGISTRO_OPERADORA").unwrap();
        assert_eq!(out.rows.len(), 3);
        assert!(out.rows.iter().all(|r| r.len() == out.header.len()));
    }

    #[test]
    fn missing_key_column_aborts() {
        let left = Table::parse("REG_ANS\n123\n", ';');
        assert!(matches!(
            join_by_key(&left, &registry(), "REG", "REGISTRO_OPERADORA"),
            Err(TableError::ColumnNotFound { column }) if column == "REG"
        ));
    }
}
