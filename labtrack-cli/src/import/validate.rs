//! Shared field validators
//!
//! `FieldCheck` binds one worksheet row to the run's message log. Each
//! validator either yields the parsed value or appends exactly one
//! error-flagged message and yields `None`; importers run every validator for
//! a row before deciding to abandon it, so a row reports all of its problems
//! at once.

use chrono::{DateTime, Utc};

use super::cell::{CellValue, parse_iso_datetime};
use super::messages::MessageLog;

pub struct FieldCheck<'a> {
    row: u32,
    log: &'a mut MessageLog,
}

impl<'a> FieldCheck<'a> {
    pub fn new(row: u32, log: &'a mut MessageLog) -> Self {
        FieldCheck { row, log }
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    /// Append an error against this row
    pub fn fail(&mut self, column: &str, text: impl Into<String>) {
        self.log.error(Some(self.row), Some(column), text);
    }

    /// Append an informational note against this row
    pub fn note(&mut self, column: &str, text: impl Into<String>) {
        self.log.info(Some(self.row), Some(column), text);
    }

    /// A non-blank text field
    pub fn required_text(
        &mut self,
        cell: Option<&CellValue>,
        column: &str,
        field: &str,
    ) -> Option<String> {
        match cell {
            None => {
                self.fail(column, format!("{} is required", field));
                None
            }
            Some(CellValue::Text(s)) => Some(s.clone()),
            Some(other) => {
                self.fail(
                    column,
                    format!("{} must be text, found a {} value", field, other.kind()),
                );
                None
            }
        }
    }

    /// A text field that may be blank. `Some(None)` is a valid blank;
    /// `None` means the cell held the wrong kind and the row must fail.
    pub fn optional_text(
        &mut self,
        cell: Option<&CellValue>,
        column: &str,
        field: &str,
    ) -> Option<Option<String>> {
        match cell {
            None => Some(None),
            Some(CellValue::Text(s)) => Some(Some(s.clone())),
            Some(other) => {
                self.fail(
                    column,
                    format!("{} must be text, found a {} value", field, other.kind()),
                );
                None
            }
        }
    }

    /// Enforce a length bound on an already-extracted value
    pub fn max_len(
        &mut self,
        value: Option<String>,
        max: usize,
        column: &str,
        field: &str,
    ) -> Option<String> {
        let value = value?;
        if value.chars().count() > max {
            self.fail(
                column,
                format!("{} is longer than {} characters", field, max),
            );
            None
        } else {
            Some(value)
        }
    }

    /// Enumerated-value membership; the match is case-insensitive and the
    /// canonical (uppercase) form is returned.
    pub fn one_of(
        &mut self,
        value: Option<String>,
        allowed: &[&str],
        column: &str,
        field: &str,
    ) -> Option<String> {
        let value = value?;
        let canonical = value.to_uppercase();
        if allowed.contains(&canonical.as_str()) {
            Some(canonical)
        } else {
            self.fail(
                column,
                format!("{} must be one of {}", field, allowed.join(", ")),
            );
            None
        }
    }

    /// A required decimal within an inclusive range
    pub fn required_decimal(
        &mut self,
        cell: Option<&CellValue>,
        column: &str,
        field: &str,
        min: f64,
        max: f64,
    ) -> Option<f64> {
        let text = self.required_text(cell, column, field)?;
        self.parse_decimal(&text, column, field, min, max)
    }

    /// An optional decimal within an inclusive range
    pub fn optional_decimal(
        &mut self,
        cell: Option<&CellValue>,
        column: &str,
        field: &str,
        min: f64,
        max: f64,
    ) -> Option<Option<f64>> {
        match self.optional_text(cell, column, field)? {
            None => Some(None),
            Some(text) => self.parse_decimal(&text, column, field, min, max).map(Some),
        }
    }

    fn parse_decimal(
        &mut self,
        text: &str,
        column: &str,
        field: &str,
        min: f64,
        max: f64,
    ) -> Option<f64> {
        match text.parse::<f64>() {
            Ok(value) if value >= min && value <= max => Some(value),
            Ok(_) => {
                self.fail(
                    column,
                    format!("{} must be between {} and {}", field, min, max),
                );
                None
            }
            Err(_) => {
                self.fail(column, format!("{} must be a number", field));
                None
            }
        }
    }

    /// A required integer within an inclusive range
    pub fn required_int(
        &mut self,
        cell: Option<&CellValue>,
        column: &str,
        field: &str,
        min: i64,
        max: i64,
    ) -> Option<i64> {
        let text = self.required_text(cell, column, field)?;
        match text.parse::<i64>() {
            Ok(value) if value >= min && value <= max => Some(value),
            Ok(_) => {
                self.fail(
                    column,
                    format!("{} must be between {} and {}", field, min, max),
                );
                None
            }
            Err(_) => {
                self.fail(column, format!("{} must be a whole number", field));
                None
            }
        }
    }

    /// An optional integer within an inclusive range
    pub fn optional_int(
        &mut self,
        cell: Option<&CellValue>,
        column: &str,
        field: &str,
        min: i64,
        max: i64,
    ) -> Option<Option<i64>> {
        match cell {
            None => Some(None),
            some => self.required_int(some, column, field, min, max).map(Some),
        }
    }

    /// A required date-time: either a date-time cell or text in ISO form
    pub fn required_datetime(
        &mut self,
        cell: Option<&CellValue>,
        column: &str,
        field: &str,
    ) -> Option<DateTime<Utc>> {
        match cell {
            None => {
                self.fail(column, format!("{} is required", field));
                None
            }
            Some(CellValue::DateTime(dt)) => Some(*dt),
            Some(CellValue::Text(s)) => match parse_iso_datetime(s) {
                Some(dt) => Some(dt),
                None => {
                    self.fail(column, format!("{} must be a date", field));
                    None
                }
            },
            Some(other) => {
                self.fail(
                    column,
                    format!("{} must be a date, found a {} value", field, other.kind()),
                );
                None
            }
        }
    }

    /// An optional date-time
    pub fn optional_datetime(
        &mut self,
        cell: Option<&CellValue>,
        column: &str,
        field: &str,
    ) -> Option<Option<DateTime<Utc>>> {
        match cell {
            None => Some(None),
            some => self.required_datetime(some, column, field).map(Some),
        }
    }

    /// An optional boolean flag: a boolean cell or yes/no text
    pub fn optional_bool(
        &mut self,
        cell: Option<&CellValue>,
        column: &str,
        field: &str,
    ) -> Option<Option<bool>> {
        match cell {
            None => Some(None),
            Some(CellValue::Bool(b)) => Some(Some(*b)),
            Some(CellValue::Text(s)) => match s.to_uppercase().as_str() {
                "TRUE" | "YES" | "Y" | "1" => Some(Some(true)),
                "FALSE" | "NO" | "N" | "0" => Some(Some(false)),
                _ => {
                    self.fail(column, format!("{} must be a yes/no value", field));
                    None
                }
            },
            Some(other) => {
                self.fail(
                    column,
                    format!(
                        "{} must be a yes/no value, found a {} value",
                        field,
                        other.kind()
                    ),
                );
                None
            }
        }
    }

    /// A required boolean flag
    pub fn required_bool(
        &mut self,
        cell: Option<&CellValue>,
        column: &str,
        field: &str,
    ) -> Option<bool> {
        match self.optional_bool(cell, column, field)? {
            Some(value) => Some(value),
            None => {
                self.fail(column, format!("{} is required", field));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_required_text_blank_fails() {
        let mut log = MessageLog::new();
        let mut check = FieldCheck::new(4, &mut log);
        assert_eq!(check.required_text(None, "A", "tube accession"), None);
        assert!(log.has_errors());
        assert_eq!(log.all()[0].row, Some(4));
        assert_eq!(log.all()[0].column.as_deref(), Some("A"));
        assert!(log.all()[0].text.contains("required"));
    }

    #[test]
    fn test_required_text_wrong_kind_fails() {
        let mut log = MessageLog::new();
        let mut check = FieldCheck::new(2, &mut log);
        let cell = CellValue::Bool(true);
        assert_eq!(check.required_text(Some(&cell), "B", "decision"), None);
        assert!(log.all()[0].text.contains("must be text"));
    }

    #[test]
    fn test_optional_text_blank_is_valid() {
        let mut log = MessageLog::new();
        let mut check = FieldCheck::new(2, &mut log);
        assert_eq!(check.optional_text(None, "C", "plate"), Some(None));
        assert!(log.is_empty());
    }

    #[test]
    fn test_one_of_canonicalizes() {
        let mut log = MessageLog::new();
        let mut check = FieldCheck::new(2, &mut log);
        assert_eq!(
            check.one_of(
                Some("accepted".to_string()),
                &["ACCEPTED", "REJECTED"],
                "B",
                "decision"
            ),
            Some("ACCEPTED".to_string())
        );
        assert_eq!(
            check.one_of(
                Some("MAYBE".to_string()),
                &["ACCEPTED", "REJECTED"],
                "B",
                "decision"
            ),
            None
        );
        assert_eq!(log.error_count(), 1);
    }

    #[test]
    fn test_decimal_range() {
        let mut log = MessageLog::new();
        let mut check = FieldCheck::new(2, &mut log);
        let cell = text("36.75");
        assert_eq!(
            check.required_decimal(Some(&cell), "C", "ct value", 0.0, 50.0),
            Some(36.75)
        );

        let out_of_range = text("61.2");
        assert_eq!(
            check.required_decimal(Some(&out_of_range), "C", "ct value", 0.0, 50.0),
            None
        );
        let not_a_number = text("n/a");
        assert_eq!(
            check.required_decimal(Some(&not_a_number), "C", "ct value", 0.0, 50.0),
            None
        );
        assert_eq!(log.error_count(), 2);
    }

    #[test]
    fn test_int_range() {
        let mut log = MessageLog::new();
        let mut check = FieldCheck::new(2, &mut log);
        assert_eq!(
            check.required_int(Some(&text("14")), "D", "days to positivity", 0, 42),
            Some(14)
        );
        assert_eq!(
            check.required_int(Some(&text("60")), "D", "days to positivity", 0, 42),
            None
        );
    }

    #[test]
    fn test_datetime_from_cell_and_text() {
        let mut log = MessageLog::new();
        let mut check = FieldCheck::new(2, &mut log);
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap();
        let cell = CellValue::DateTime(ts);
        assert_eq!(check.required_datetime(Some(&cell), "E", "resulted at"), Some(ts));

        let as_text = text("2024-03-15T09:30:00");
        assert_eq!(
            check.required_datetime(Some(&as_text), "E", "resulted at"),
            Some(ts)
        );

        assert_eq!(
            check.required_datetime(Some(&text("soon")), "E", "resulted at"),
            None
        );
        assert_eq!(log.error_count(), 1);
    }

    #[test]
    fn test_bool_from_text() {
        let mut log = MessageLog::new();
        let mut check = FieldCheck::new(2, &mut log);
        assert_eq!(
            check.optional_bool(Some(&text("YES")), "F", "enrolled"),
            Some(Some(true))
        );
        assert_eq!(
            check.optional_bool(Some(&text("n")), "F", "enrolled"),
            Some(Some(false))
        );
        assert_eq!(check.optional_bool(None, "F", "enrolled"), Some(None));
        assert_eq!(check.optional_bool(Some(&text("sure")), "F", "enrolled"), None);
    }

    #[test]
    fn test_max_len() {
        let mut log = MessageLog::new();
        let mut check = FieldCheck::new(2, &mut log);
        assert_eq!(
            check.max_len(Some("ok".to_string()), 5, "B", "organism"),
            Some("ok".to_string())
        );
        assert_eq!(
            check.max_len(Some("much too long".to_string()), 5, "B", "organism"),
            None
        );
        // None passes through without a second message
        drop(check);
        let before = log.len();
        let mut check = FieldCheck::new(2, &mut log);
        assert_eq!(check.max_len(None, 5, "B", "organism"), None);
        assert_eq!(log.len(), before);
    }
}
