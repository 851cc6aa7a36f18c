// src/transform/normalize.rs

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::TableError;
use crate::table::{canonical_name, clean_field, is_blank, Table};

static NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+[.,]?\d*$").expect("numeric pattern should compile"));

/// Unquote and trim every data field. The header is left alone.
pub fn strip_quotes(table: &Table) -> Table {
    let rows = table
        .rows
        .iter()
        .map(|row| row.iter().map(|f| clean_field(f)).collect())
        .collect();
    table.with_rows(rows)
}

/// Replace every header name with its canonical form.
pub fn normalize_headers(table: &Table) -> Table {
    let header = table.header.iter().map(|h| canonical_name(h)).collect();
    Table::new(header, table.rows.clone(), table.delimiter)
}

/// Fields that look numeric are unquoted and get a decimal point.
pub fn normalize_numbers(table: &Table) -> Table {
    let rows = table
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|f| {
                    let cleaned = clean_field(f);
                    if NUMERIC.is_match(&cleaned) {
                        cleaned.replace(',', ".")
                    } else {
                        f.clone()
                    }
                })
                .collect()
        })
        .collect();
    table.with_rows(rows)
}

/// Unquote, trim and lowercase the listed columns. Unknown names are skipped.
pub fn normalize_text_columns<S: AsRef<str>>(table: &Table, columns: &[S]) -> Table {
    let index = table.column_index();
    let targets: Vec<usize> = columns
        .iter()
        .filter_map(|c| index.position(c.as_ref()).ok())
        .collect();

    let rows = table
        .rows
        .iter()
        .map(|row| {
            let mut out = row.clone();
            for &i in &targets {
                if let Some(f) = out.get_mut(i) {
                    *f = clean_field(f).to_lowercase();
                }
            }
            out
        })
        .collect();
    table.with_rows(rows)
}

/// Drop rows with no content in any field.
pub fn remove_blank_rows(table: &Table) -> Table {
    let rows = table
        .rows
        .iter()
        .filter(|row| !is_blank(row))
        .cloned()
        .collect();
    table.with_rows(rows)
}

/// `table` itself, or `EmptyInput` when it has no header line.
pub fn require_header(table: &Table) -> Result<&Table, TableError> {
    if table.has_header() {
        Ok(table)
    } else {
        Err(TableError::EmptyInput)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::parse(
            "\"reg_ans\";\"DESCRICAO\";\"VL\"\n\"123\";\" Eventos \";\"1000,50\"\n\"\";\"\";\"\"\n456;Outros;-3\n",
            ';',
        )
    }

    #[test]
    fn strips_quotes_from_data_only() {
        let out = strip_quotes(&sample());
        assert_eq!(out.header, sample().header);
        assert_eq!(out.rows[0], vec!["123", "Eventos", "1000,50"]);
    }

    #[test]
    fn canonical_headers() {
        assert_eq!(
            normalize_headers(&sample()).header,
            vec!["REG_ANS", "DESCRICAO", "VL"]
        );
    }

    #[test]
    fn numbers_get_decimal_point() {
        let out = normalize_numbers(&sample());
        assert_eq!(out.rows[0], vec!["123", "\" Eventos \"", "1000.50"]);
        assert_eq!(out.rows[2], vec!["456", "Outros", "-3"]);
    }

    #[test]
    fn text_columns_lowercased() {
        let out = normalize_text_columns(&sample(), &["descricao", "UNKNOWN"]);
        assert_eq!(out.rows[0][1], "eventos");
        assert_eq!(out.rows[2][1], "outros");
        assert_eq!(out.rows[0][0], "\"123\"");
    }

    #[test]
    fn blank_rows_removed() {
        let out = remove_blank_rows(&sample());
        assert_eq!(out.rows.len(), 2);
    }

    #[test]
    fn empty_table_has_no_header() {
        assert!(require_header(&Table::parse("", ';')).is_err());
        assert!(require_header(&sample()).is_ok());
    }
}
