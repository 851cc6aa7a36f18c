// src/transform/dedup.rs

use std::collections::{HashMap, HashSet};

use crate::table::{split_line, Table};

/// Which occurrence of a repeated row survives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keep {
    /// Output in first-seen order.
    First,
    /// Each row moves to the position of its last occurrence.
    Last,
}

/// Remove repeated data rows. The key is the whole rendered line, trimmed;
/// blank lines are dropped and the header is kept verbatim.
pub fn deduplicate(table: &Table, keep: Keep) -> Table {
    let lines: Vec<String> = table
        .rows
        .iter()
        .map(|r| table.render_row(r).trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();

    let unique: Vec<&String> = match keep {
        Keep::First => {
            let mut seen = HashSet::new();
            lines.iter().filter(|l| seen.insert(l.as_str())).collect()
        }
        Keep::Last => {
            let last: HashMap<&str, usize> = lines
                .iter()
                .enumerate()
                .map(|(i, l)| (l.as_str(), i))
                .collect();
            lines
                .iter()
                .enumerate()
                .filter(|(i, l)| last.get(l.as_str()) == Some(i))
                .map(|(_, l)| l)
                .collect()
        }
    };

    let rows = unique
        .into_iter()
        .map(|l| split_line(l, table.delimiter))
        .collect();
    table.with_rows(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(t: &Table) -> Vec<String> {
        t.rows.iter().map(|r| t.render_row(r)).collect()
    }

    #[test]
    fn keep_first_and_keep_last_orders() {
        let t = Table::parse("H\nA\nB\nA\n", ';');
        assert_eq!(rows(&deduplicate(&t, Keep::First)), vec!["A", "B"]);
        assert_eq!(rows(&deduplicate(&t, Keep::Last)), vec!["B", "A"]);
    }

    #[test]
    fn header_kept_and_blank_lines_dropped() {
        let t = Table::parse(" H ;X\n  A;1 \n\nA;1\nB;2\n", ';');
        let out = deduplicate(&t, Keep::First);
        assert_eq!(out.header, vec![" H ", "X"]);
        assert_eq!(rows(&out), vec!["A;1", "B;2"]);
    }

    #[test]
    fn column_order_matters() {
        let t = Table::parse("H;I\n1;2\n2;1\n", ';');
        assert_eq!(deduplicate(&t, Keep::First).rows.len(), 2);
    }
}
