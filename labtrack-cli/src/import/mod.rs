//! Spreadsheet import and reconciliation engine
//!
//! Turns uploaded workbooks into validated domain mutations. The flow is the
//! same for every document type: load the workbook into a uniform in-memory
//! model, run the document's importer row by row, collect messages and the
//! classified output, then either commit the staged mutations or discard
//! them for a preview.

pub mod cache;
pub mod cell;
pub mod columns;
pub mod importers;
pub mod messages;
pub mod output;
pub mod pipeline;
pub mod validate;
pub mod worksheet;

pub use cache::ResolutionCache;
pub use cell::{CellKind, CellValue, normalize};
pub use columns::{ColumnMap, column_index, column_label};
pub use messages::{ImportMessage, MessageLog};
pub use output::{Classification, ImportOutput, RecordKind, RecordRef};
pub use pipeline::{ImportRun, RowImporter, RunContext, RunState, resolve_cached};
pub use validate::FieldCheck;
pub use worksheet::{Workbook, Worksheet, load_workbook};
