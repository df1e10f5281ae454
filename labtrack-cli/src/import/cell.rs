//! Cell normalization
//!
//! Converts raw calamine cells into the closed set of value kinds the rest of
//! the engine is allowed to see. Formula cells arrive from calamine as their
//! cached computed values, so classification always runs on the result, never
//! on formula text. A cell that cannot be classified fails the whole workbook
//! load; silently coercing bad data to text is worse than an upfront
//! rejection.

use anyhow::{Result, bail};
use calamine::Data;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// The value kinds a normalized cell can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// Trimmed text; numeric scalars are stringified into this kind
    Text,
    /// Absolute timestamp (UTC), independent of display locale
    DateTime,
    /// Pure boolean flag
    Bool,
}

impl std::fmt::Display for CellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellKind::Text => write!(f, "text"),
            CellKind::DateTime => write!(f, "date-time"),
            CellKind::Bool => write!(f, "boolean"),
        }
    }
}

/// A normalized cell value. The kind is fixed at normalization time.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    DateTime(DateTime<Utc>),
    Bool(bool),
}

impl CellValue {
    pub fn kind(&self) -> CellKind {
        match self {
            CellValue::Text(_) => CellKind::Text,
            CellValue::DateTime(_) => CellKind::DateTime,
            CellValue::Bool(_) => CellKind::Bool,
        }
    }

    /// Try to get as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as a timestamp
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            CellValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Try to get as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            CellValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Normalize one raw cell. `Ok(None)` means the cell is blank (empty or
/// whitespace-only text).
///
/// Pure function of the input; position arguments exist only for the error
/// message on unclassifiable cells.
pub fn normalize(cell: &Data, row: u32, column: &str) -> Result<Option<CellValue>> {
    let value = match cell {
        Data::Empty => return Ok(None),
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            CellValue::Text(trimmed.to_string())
        }
        Data::Int(i) => CellValue::Text(i.to_string()),
        Data::Float(f) => CellValue::Text(format_number(*f)),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => CellValue::DateTime(naive.and_utc()),
            None => bail!(
                "cell {}{} holds a date serial that cannot be converted",
                column,
                row
            ),
        },
        Data::DateTimeIso(s) => CellValue::DateTime(parse_iso_datetime(s.trim()).ok_or_else(
            || {
                anyhow::anyhow!(
                    "cell {}{} holds an unparseable ISO date-time: {}",
                    column,
                    row,
                    s
                )
            },
        )?),
        Data::DurationIso(s) => bail!(
            "cell {}{} holds a duration value, which is not supported: {}",
            column,
            row,
            s
        ),
        Data::Error(e) => bail!("cell {}{} holds a spreadsheet error: {:?}", column, row, e),
    };
    Ok(Some(value))
}

/// Stringify a numeric scalar, preserving precision. Integral floats drop the
/// fractional part so "42" round-trips as "42" rather than "42.0".
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Parse an ISO-8601 date-time string into UTC, accepting date-only values as
/// midnight UTC.
pub fn parse_iso_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}
