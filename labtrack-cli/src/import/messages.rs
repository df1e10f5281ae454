//! Validation findings for an import run
//!
//! Every field validator and resolution step reports through the same
//! structure. Error-flagged messages block the affected row from committing;
//! informational messages are for operator visibility only.

/// One validation finding
#[derive(Debug, Clone, PartialEq)]
pub struct ImportMessage {
    /// Worksheet row the finding is tied to; `None` for run-level findings
    pub row: Option<u32>,
    /// Column letter the finding is tied to, when one applies
    pub column: Option<String>,
    /// Free-text detail
    pub text: String,
    /// Error findings exclude the row from output; informational ones do not
    pub error: bool,
}

impl std::fmt::Display for ImportMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.row, self.column.as_deref()) {
            (Some(row), Some(column)) => write!(f, "row {}, column {}: {}", row, column, self.text),
            (Some(row), None) => write!(f, "row {}: {}", row, self.text),
            _ => write!(f, "{}", self.text),
        }
    }
}

/// Accumulator for the messages of one import run
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Vec<ImportMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        MessageLog::default()
    }

    /// Append an error-flagged finding
    pub fn error(&mut self, row: Option<u32>, column: Option<&str>, text: impl Into<String>) {
        let message = ImportMessage {
            row,
            column: column.map(str::to_string),
            text: text.into(),
            error: true,
        };
        log::debug!("import error: {}", message);
        self.messages.push(message);
    }

    /// Append an informational finding
    pub fn info(&mut self, row: Option<u32>, column: Option<&str>, text: impl Into<String>) {
        self.messages.push(ImportMessage {
            row,
            column: column.map(str::to_string),
            text: text.into(),
            error: false,
        });
    }

    pub fn all(&self) -> &[ImportMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|m| m.error)
    }

    pub fn error_count(&self) -> usize {
        self.messages.iter().filter(|m| m.error).count()
    }

    /// Findings tied to one row
    pub fn for_row(&self, row: u32) -> impl Iterator<Item = &ImportMessage> {
        self.messages.iter().filter(move |m| m.row == Some(row))
    }

    /// Messages sorted by (row, column) for display; run-level messages first.
    /// The underlying order of appends is preserved within a cell.
    pub fn sorted_for_display(&self) -> Vec<&ImportMessage> {
        let mut sorted: Vec<&ImportMessage> = self.messages.iter().collect();
        sorted.sort_by(|a, b| (a.row, &a.column).cmp(&(b.row, &b.column)));
        sorted
    }
}
