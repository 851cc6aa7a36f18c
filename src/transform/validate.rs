// src/transform/validate.rs
//! Row validation. Every validator appends (or reuses) a `<COLUMN>_VALID`
//! column holding `true` / `false`.

use regex::Regex;
use tracing::debug;

use super::{ensure_column, join::OBSERVATION_COLUMN, padded};
use crate::error::TableError;
use crate::table::{canonical_name, clean_field, field, is_blank, Table};

pub const VALID_SUFFIX: &str = "_VALID";
const TRUE: &str = "true";
const FALSE: &str = "false";

fn flag(valid: bool) -> String {
    let text = if valid { TRUE } else { FALSE };
    text.to_string()
}

pub fn valid_column(column: &str) -> String {
    format!("{}{}", canonical_name(column), VALID_SUFFIX)
}

/// Set `<column>_VALID` on each row from `check(cleaned field)`.
fn mark<F>(table: &Table, column: &str, skip_blank: bool, check: F) -> Result<Table, TableError>
where
    F: Fn(&str) -> bool,
{
    let idx = table.position(column)?;
    let mut header = table.header.clone();
    let valid_idx = ensure_column(&mut header, &valid_column(column));
    let width = header.len();

    let mut invalid = 0usize;
    let rows = table
        .rows
        .iter()
        .filter(|row| !(skip_blank && is_blank(row)))
        .map(|row| {
            let ok = check(clean_field(field(row, idx)).as_str());
            invalid += usize::from(!ok);
            let mut out = padded(row, width);
            out[valid_idx] = flag(ok);
            out
        })
        .collect();
    debug!(column, invalid, "validated");
    Ok(Table::new(header, rows, table.delimiter))
}

/// Full-match `pattern` against the cleaned field. Blank rows are dropped.
pub fn validate_by_regex(table: &Table, column: &str, pattern: &str) -> Result<Table, TableError> {
    let re = Regex::new(&format!("^(?:{})$", pattern))?;
    mark(table, column, true, |v| re.is_match(v))
}

/// Brazilian CNPJ: 14 digits (punctuation ignored), not all identical, with
/// two modulo-11 check digits.
pub fn is_valid_cnpj(raw: &str) -> bool {
    let digits: Vec<u32> = raw.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 14 || digits.iter().all(|&d| d == digits[0]) {
        return false;
    }
    check_digit(&digits[..12]) == digits[12] && check_digit(&digits[..13]) == digits[13]
}

/// Weights 2..=9 applied right to left, restarting at 2.
fn check_digit(prefix: &[u32]) -> u32 {
    let sum: u32 = prefix
        .iter()
        .rev()
        .zip((2u32..=9).cycle())
        .map(|(&d, w)| d * w)
        .sum();
    match sum % 11 {
        r if r < 2 => 0,
        r => 11 - r,
    }
}

pub fn validate_cnpj(table: &Table, column: &str) -> Result<Table, TableError> {
    mark(table, column, false, is_valid_cnpj)
}

/// Mark empty `column` values invalid and note `field <column> not filled` in
/// OBSERVATION, joining earlier notes with ` | `. Re-running reuses the
/// existing VALID and OBSERVATION columns.
pub fn validate_required(table: &Table, column: &str) -> Result<Table, TableError> {
    let idx = table.position(column)?;
    let mut header = table.header.clone();
    let valid_idx = ensure_column(&mut header, &valid_column(column));
    let obs_idx = ensure_column(&mut header, OBSERVATION_COLUMN);
    let width = header.len();
    let message = format!("field {} not filled", column);

    let rows = table
        .rows
        .iter()
        .map(|row| {
            let filled = !clean_field(field(row, idx)).is_empty();
            let mut out = padded(row, width);
            out[valid_idx] = flag(filled);
            if !filled {
                let previous = clean_field(&out[obs_idx]);
                out[obs_idx] = if previous.is_empty() {
                    message.clone()
                } else {
                    format!("{} | {}", previous, message)
                };
            }
            out
        })
        .collect();
    Ok(Table::new(header, rows, table.delimiter))
}

/// Keep rows whose `<column>_VALID` is `true` (any case).
pub fn remove_invalid_rows(table: &Table, column: &str) -> Result<Table, TableError> {
    let idx = table.position(&valid_column(column))?;
    let rows = table
        .rows
        .iter()
        .filter(|row| clean_field(field(row, idx)).eq_ignore_ascii_case(TRUE))
        .cloned()
        .collect();
    Ok(table.with_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cnpj_golden_values() {
        assert!(is_valid_cnpj("11222333000181"));
        assert!(is_valid_cnpj("11.222.333/0001-81"));
        assert!(is_valid_cnpj("33000167000101"));
        assert!(!is_valid_cnpj("11222333000182"));
        assert!(!is_valid_cnpj("1122233300018"));
        assert!(!is_valid_cnpj(""));
        for d in 0..=9 {
            assert!(!is_valid_cnpj(&d.to_string().repeat(14)));
        }
    }

    #[test]
    fn cnpj_column_is_marked() {
        let t = Table::parse("\"CNPJ\";N\n\"11222333000181\";a\n11222333000182;b\n;c\n", ';');
        let out = validate_cnpj(&t, "cnpj").unwrap();
        assert_eq!(out.header.last().unwrap(), "CNPJ_VALID");
        let flags: Vec<_> = out.rows.iter().map(|r| r[2].as_str()).collect();
        assert_eq!(flags, vec!["true", "false", "false"]);
    }

    #[test]
    fn regex_must_match_whole_field() {
        let t = Table::parse("UF;X\nSP;1\nXSPX;2\n\n\"RJ\";3\n", ';');
        let out = validate_by_regex(&t, "UF", "[A-Z]{2}").unwrap();
        assert_eq!(out.rows.len(), 3);
        let flags: Vec<_> = out.rows.iter().map(|r| r[2].as_str()).collect();
        assert_eq!(flags, vec!["true", "false", "true"]);
    }

    #[test]
    fn bad_pattern_is_reported() {
        let t = Table::parse("UF\nSP\n", ';');
        assert!(matches!(
            validate_by_regex(&t, "UF", "("),
            Err(TableError::InvalidPattern(_))
        ));
    }

    #[test]
    fn required_accumulates_observations() {
        let t = Table::parse("CNPJ;RAZAO_SOCIAL;OBSERVATION\n;;DATA_NOT_FOUND\n1;ACME;\n", ';');
        let once = validate_required(&t, "RAZAO_SOCIAL").unwrap();
        let twice = validate_required(&once, "CNPJ").unwrap();

        assert_eq!(
            twice.header,
            vec!["CNPJ", "RAZAO_SOCIAL", "OBSERVATION", "RAZAO_SOCIAL_VALID", "CNPJ_VALID"]
        );
        assert_eq!(
            twice.rows[0][2],
            "DATA_NOT_FOUND | field RAZAO_SOCIAL not filled | field CNPJ not filled"
        );
        assert_eq!(twice.rows[0][3], "false");
        assert_eq!(twice.rows[1][2], "");
        assert_eq!(twice.rows[1][4], "true");
    }

    #[test]
    fn required_is_idempotent_on_header() {
        let t = Table::parse("NAME\n\nBOB\n", ';');
        let once = validate_required(&t, "NAME").unwrap();
        let twice = validate_required(&once, "NAME").unwrap();
        assert_eq!(once.header, twice.header);
        assert_eq!(twice.header, vec!["NAME", "NAME_VALID", "OBSERVATION"]);
        assert_eq!(
            twice.rows[0],
            vec!["", "false", "field NAME not filled | field NAME not filled"]
        );
    }

    #[test]
    fn invalid_rows_are_removed() {
        let t = Table::parse("CNPJ\n11222333000181\n123\n", ';');
        let out = remove_invalid_rows(&validate_cnpj(&t, "CNPJ").unwrap(), "cnpj").unwrap();
        assert_eq!(out.rows, vec![vec!["11222333000181", "true"]]);

        assert!(matches!(
            remove_invalid_rows(&t, "CNPJ"),
            Err(TableError::ColumnNotFound { .. })
        ));
    }
}
