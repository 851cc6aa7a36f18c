// src/transform/mod.rs
//! Table-to-table operations.
//!
//! Every operation borrows its input and returns a new [`Table`]; chains are
//! written as plain composition, e.g.
//! `project_columns(&join_by_key(&filter_by_value(&t, c, v)?, &r, lk, rk)?, &cols)?`.
//! A missing column aborts the operation with `TableError::ColumnNotFound`
//! before any row is touched.

pub mod compute;
pub mod concat;
pub mod dedup;
pub mod filter;
pub mod join;
pub mod normalize;
pub mod project;
pub mod validate;

pub use compute::{compute_column, derive_year_quarter, Operation};
pub use concat::{concatenate, concatenate_files};
pub use dedup::{deduplicate, Keep};
pub use filter::{
    filter_by_value, filter_files_by_value, remove_rows_by_value, retain_by_comparison,
    Comparison,
};
pub use join::{join_by_key, DATA_NOT_FOUND, OBSERVATION_COLUMN};
pub use normalize::{
    normalize_headers, normalize_numbers, normalize_text_columns, remove_blank_rows,
    strip_quotes,
};
pub use project::project_columns;
pub use validate::{
    is_valid_cnpj, remove_invalid_rows, validate_by_regex, validate_cnpj, validate_required,
};

use crate::table::canonical_name;

/// Copy of `row` padded with empty fields up to `width`.
pub(crate) fn padded(row: &[String], width: usize) -> Vec<String> {
    let mut out = row.to_vec();
    if out.len() < width {
        out.resize(width, String::new());
    }
    out
}

/// Position of `name` in `header`, appending it (canonical form) when absent.
pub(crate) fn ensure_column(header: &mut Vec<String>, name: &str) -> usize {
    let wanted = canonical_name(name);
    match header.iter().rposition(|h| canonical_name(h) == wanted) {
        Some(i) => i,
        None => {
            header.push(wanted);
            header.len() - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_never_truncates() {
        let row = vec!["a".to_string(), "b".to_string()];
        assert_eq!(padded(&row, 4), vec!["a", "b", "", ""]);
        assert_eq!(padded(&row, 1), vec!["a", "b"]);
    }

    #[test]
    fn ensure_column_is_idempotent() {
        let mut header = vec!["\"cnpj\"".to_string()];
        assert_eq!(ensure_column(&mut header, "CNPJ"), 0);
        assert_eq!(ensure_column(&mut header, "cnpj_valid"), 1);
        assert_eq!(ensure_column(&mut header, "CNPJ_VALID"), 1);
        assert_eq!(header, vec!["\"cnpj\"", "CNPJ_VALID"]);
    }
}
