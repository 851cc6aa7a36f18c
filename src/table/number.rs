// src/table/number.rs

use super::clean_field;

/// How decimal values are written in a given file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecimalConvention {
    /// `1000,50` (files delimited by `;`)
    Comma,
    /// `1000.50`
    Point,
}

impl DecimalConvention {
    /// Files split on `;` carry the decimal comma; everything else the point.
    pub fn for_delimiter(delimiter: char) -> Self {
        if delimiter == ';' {
            DecimalConvention::Comma
        } else {
            DecimalConvention::Point
        }
    }
}

/// Parses a field that may be quoted and may use either decimal separator.
/// Returns `None` for empty, malformed or non-finite input.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = clean_field(raw).replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Like [`parse_number`] but degrades to `0.0`.
pub fn parse_permissive(raw: &str) -> f64 {
    parse_number(raw).unwrap_or_else(|| {
        tracing::trace!(raw, "unparseable number, using 0.0");
        0.0
    })
}

/// Two fractional digits, in the file's decimal convention.
pub fn render_decimal(value: f64, convention: DecimalConvention) -> String {
    // avoid "-0.00"
    let value = if (value * 100.0).round() == 0.0 { 0.0 } else { value };
    let text = format!("{:.2}", value);
    match convention {
        DecimalConvention::Comma => text.replace('.', ","),
        DecimalConvention::Point => text,
    }
}
