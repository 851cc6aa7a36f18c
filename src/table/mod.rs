// src/table/mod.rs
//! Delimited text files addressed by column name.
//!
//! A [`Table`] keeps the header (record 0) apart from the data rows and
//! resolves column names to positions through a [`ColumnIndex`] built fresh
//! from the header whenever a transform needs one.
//!
//! Splitting is a plain split on the delimiter: a delimiter inside a quoted
//! field is *not* protected and will shift every later field of that row.
//! Callers that need quote-safe parsing must not feed such files through here.

pub mod number;

use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::error::TableError;

pub const DEFAULT_DELIMITER: char = ';';

/// Trim whitespace and drop every double quote.
pub fn clean_field(raw: &str) -> String {
    raw.replace('"', "").trim().to_string()
}

/// Canonical column name: quotes and surrounding whitespace removed, uppercase.
pub fn canonical_name(raw: &str) -> String {
    clean_field(raw).to_uppercase()
}

/// Comparison form used by value filters: quotes and all whitespace removed, lowercase.
pub fn match_key(raw: &str) -> String {
    raw.replace('"', "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Field `idx` of `row`, or `""` when the row is too short.
pub fn field(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

/// A row with no content in any field.
pub fn is_blank(row: &[String]) -> bool {
    row.iter().all(|f| clean_field(f).is_empty())
}

pub fn split_line(line: &str, delimiter: char) -> Vec<String> {
    line.split(delimiter).map(str::to_string).collect()
}

/// Name → position map derived from a header.
///
/// Duplicate column names collide: the last occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    pub fn from_header(header: &[String]) -> Self {
        let positions = header
            .iter()
            .enumerate()
            .map(|(i, name)| (canonical_name(name), i))
            .collect();
        Self { positions }
    }

    /// Position of `name`, compared in canonical form.
    pub fn position(&self, name: &str) -> Result<usize, TableError> {
        self.positions
            .get(&canonical_name(name))
            .copied()
            .ok_or_else(|| TableError::missing(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(&canonical_name(name))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// One delimited text file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Column names exactly as they appear on line 1.
    pub header: Vec<String>,
    /// Data rows; may be shorter than the header.
    pub rows: Vec<Vec<String>>,
    pub delimiter: char,
}

impl Table {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>, delimiter: char) -> Self {
        Self {
            header,
            rows,
            delimiter,
        }
    }

    /// A table with the same header and delimiter but different rows.
    pub fn with_rows(&self, rows: Vec<Vec<String>>) -> Self {
        Self::new(self.header.clone(), rows, self.delimiter)
    }

    /// Parse in-memory text. An empty text yields an empty header and no rows.
    pub fn parse(text: &str, delimiter: char) -> Self {
        let mut lines = text.lines();
        let header = match lines.next() {
            Some(first) => split_line(first.trim_start_matches('\u{feff}'), delimiter),
            None => Vec::new(),
        };
        let rows = lines.map(|l| split_line(l, delimiter)).collect();
        Self::new(header, rows, delimiter)
    }

    /// Read `path`; invalid UTF-8 sequences are replaced rather than rejected.
    pub fn load(path: impl AsRef<Path>, delimiter: char) -> Result<Self, TableError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| TableError::io(path, e))?;
        let table = Self::parse(&String::from_utf8_lossy(&bytes), delimiter);
        debug!(path = %path.display(), rows = table.rows.len(), "loaded table");
        Ok(table)
    }

    pub fn column_index(&self) -> ColumnIndex {
        ColumnIndex::from_header(&self.header)
    }

    /// Shorthand for `self.column_index().position(name)`.
    pub fn position(&self, name: &str) -> Result<usize, TableError> {
        self.column_index().position(name)
    }

    pub fn has_header(&self) -> bool {
        !self.header.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render_row(&self, row: &[String]) -> String {
        row.join(&self.delimiter.to_string())
    }

    /// Every record rendered back to text, header first.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        let header = self.has_header().then(|| self.render_row(&self.header));
        header
            .into_iter()
            .chain(self.rows.iter().map(|r| self.render_row(r)))
    }

    /// Write the table as-is.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TableError> {
        self.write_with(path.as_ref(), |f| f.to_string())
    }

    /// Write the table quoting text fields: already-quoted fields are kept,
    /// numbers without a comma stay bare, everything else is quoted with
    /// embedded quotes doubled.
    pub fn save_formatted(&self, path: impl AsRef<Path>) -> Result<(), TableError> {
        self.write_with(path.as_ref(), format_field)
    }

    /// Writes to a temporary sibling first and renames it into place, so a
    /// failed write never leaves a partial artifact at `path`.
    fn write_with<F>(&self, path: &Path, render: F) -> Result<(), TableError>
    where
        F: Fn(&str) -> String,
    {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| TableError::io(parent, e))?;
        }
        let temp_path = temp_sibling(path);
        let delimiter = self.delimiter.to_string();

        let result = (|| -> std::io::Result<()> {
            let mut out = BufWriter::new(File::create(&temp_path)?);
            let records = self
                .has_header()
                .then_some(&self.header)
                .into_iter()
                .chain(self.rows.iter());
            for record in records {
                let line = record
                    .iter()
                    .map(|f| render(f.as_str()))
                    .collect::<Vec<_>>()
                    .join(&delimiter);
                out.write_all(line.as_bytes())?;
                out.write_all(b"\n")?;
            }
            out.flush()
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(TableError::io(path, e));
        }
        fs::rename(&temp_path, path).map_err(|e| TableError::io(path, e))?;
        debug!(path = %path.display(), rows = self.rows.len(), "wrote table");
        Ok(())
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Field rendering used by [`Table::save_formatted`].
pub fn format_field(raw: &str) -> String {
    let field = raw.trim();
    if field.len() >= 2 && field.starts_with('"') && field.ends_with('"') {
        return field.to_string();
    }
    let numeric = !field.is_empty() && field.replace(',', ".").parse::<f64>().is_ok();
    if numeric && !field.contains(',') {
        field.to_string()
    } else {
        format!("\"{}\"", field.replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Table {
        Table::parse(
            "\"REG_ANS\";\"DESCRICAO\";\"VL_SALDO_FINAL\"\n\"123\";\"Eventos\";\"10,5\"\n\"456\"\n",
            ';',
        )
    }

    #[test]
    fn canonical_names_strip_quotes_and_case() {
        assert_eq!(canonical_name("  \"reg_ans\" "), "REG_ANS");
        assert_eq!(match_key(" \"Eventos / Sinistros\" "), "eventos/sinistros");
    }

    #[test]
    fn column_index_is_case_and_quote_insensitive() {
        let t = sample();
        let idx = t.column_index();
        assert_eq!(idx.position("reg_ans").unwrap(), 0);
        assert_eq!(idx.position("\"Vl_Saldo_Final\"").unwrap(), 2);
        assert!(matches!(
            idx.position("CNPJ"),
            Err(TableError::ColumnNotFound { column }) if column == "CNPJ"
        ));
    }

    #[test]
    fn duplicate_header_names_last_wins() {
        let t = Table::parse("A;B;a\n1;2;3\n", ';');
        assert_eq!(t.position("A").unwrap(), 2);
    }

    #[test]
    fn ragged_rows_read_as_empty() {
        let t = sample();
        assert_eq!(t.rows.len(), 2);
        assert_eq!(field(&t.rows[1], 2), "");
        assert_eq!(field(&t.rows[0], 1), "\"Eventos\"");
    }

    #[test]
    fn split_is_not_quote_aware() {
        let t = Table::parse("A;B\n\"x;y\";z\n", ';');
        assert_eq!(t.rows[0], vec!["\"x", "y\"", "z"]);
    }

    #[test]
    fn empty_text_has_no_header() {
        let t = Table::parse("", ';');
        assert!(!t.has_header());
        assert!(t.is_empty());
        assert_eq!(t.lines().count(), 0);
    }

    #[test]
    fn save_and_load_preserve_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("t.csv");
        let t = sample();
        t.save(&path).unwrap();
        assert!(!dir.path().join("nested").join("t.csv.tmp").exists());

        let back = Table::load(&path, ';').unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = Table::load(dir.path().join("nope.csv"), ';').unwrap_err();
        assert!(matches!(err, TableError::Io { .. }));
    }

    #[test]
    fn formatted_fields_quote_text_only() {
        assert_eq!(format_field("123"), "123");
        assert_eq!(format_field("12.5"), "12.5");
        assert_eq!(format_field("12,5"), "\"12,5\"");
        assert_eq!(format_field("\"kept\""), "\"kept\"");
        assert_eq!(format_field("ACME \"SA\""), "\"ACME \"\"SA\"\"\"");
        assert_eq!(format_field(""), "\"\"");
    }

    #[test]
    fn save_formatted_writes_quoted_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let t = Table::parse("CNPJ;VALUE\n11222333000181;10,50\n", ';');
        t.save_formatted(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "\"CNPJ\";\"VALUE\"\n11222333000181;\"10,50\"\n");
    }
}
