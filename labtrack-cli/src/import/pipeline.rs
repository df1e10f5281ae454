//! Import pipeline driver
//!
//! One generic driver runs every concrete importer: iterate worksheet rows
//! top to bottom, skip blank rows, let the importer validate and stage
//! mutations, then either flush the session (commit) or discard it
//! (preview). Preview and commit are the same code path; only the final
//! session call differs, so what the preview shows is what a commit does.
//!
//! Row-level failures accumulate in the message log and never abort the run;
//! structural failures (unreadable sheet, missing plate-identifier cell)
//! abort the whole run before or during processing via `Err`.

use std::future::Future;

use anyhow::{Result, bail};

use crate::store::{RecordStore, Session};

use super::cache::ResolutionCache;
use super::columns::ColumnMap;
use super::messages::MessageLog;
use super::output::ImportOutput;
use super::worksheet::Worksheet;

/// Shared mutable state handed to an importer for each row
pub struct RunContext<'a, S> {
    pub store: &'a S,
    pub session: &'a mut Session,
    pub messages: &'a mut MessageLog,
    pub output: &'a mut ImportOutput,
}

/// The per-document-type strategy plugged into the driver
pub trait RowImporter<S: RecordStore> {
    /// Logical field -> column letter map; also drives blank-row detection
    fn columns(&self) -> &ColumnMap;

    /// First worksheet row holding data (1-based). Documents with a header
    /// row start at 2; headerless documents start at 1.
    fn first_data_row(&self) -> u32 {
        2
    }

    /// Structural prelude run once before any row (e.g. reading a
    /// plate-identifier header cell). An `Err` aborts the whole run.
    async fn prepare(&mut self, sheet: &Worksheet, ctx: &mut RunContext<'_, S>) -> Result<()> {
        let _ = (sheet, ctx);
        Ok(())
    }

    /// Process one non-blank row. Validation failures are recorded in
    /// `ctx.messages` and return `Ok`; only structural failures return `Err`.
    async fn import_row(
        &mut self,
        sheet: &Worksheet,
        row: u32,
        ctx: &mut RunContext<'_, S>,
    ) -> Result<()>;
}

/// Import run state machine. Terminal states are `Processed`; a second
/// `process()` call returns the memoized output without reprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Unprocessed,
    Processing,
    Processed { committed: bool },
}

/// One import run: a worksheet, an importer strategy, and the run-scoped
/// session, cache(s), message log and output. Instances are single-use.
pub struct ImportRun<'s, S: RecordStore, I: RowImporter<S>> {
    importer: I,
    store: &'s S,
    sheet: Worksheet,
    session: Session,
    messages: MessageLog,
    output: ImportOutput,
    state: RunState,
}

impl<'s, S: RecordStore, I: RowImporter<S>> ImportRun<'s, S, I> {
    pub fn new(importer: I, store: &'s S, sheet: Worksheet) -> Self {
        ImportRun {
            importer,
            store,
            sheet,
            session: Session::new(),
            messages: MessageLog::new(),
            output: ImportOutput::new(),
            state: RunState::Unprocessed,
        }
    }

    /// Run the import. `commit = false` previews: mutations are built and
    /// then discarded. `commit = true` flushes the same mutations durably.
    /// The flag applies to the whole run, never per row.
    pub async fn process(&mut self, commit: bool) -> Result<&ImportOutput> {
        if let RunState::Processed { committed } = self.state {
            log::debug!(
                "process() called on a finished run (committed={}); returning memoized output",
                committed
            );
            return Ok(&self.output);
        }
        // A run that failed mid-way holds partial output and staged mutations;
        // re-entering the row loop would double-append them.
        if self.state == RunState::Processing {
            bail!("import run already failed and cannot be resumed");
        }
        self.state = RunState::Processing;

        let Self {
            importer,
            store,
            sheet,
            session,
            messages,
            output,
            ..
        } = &mut *self;
        let store: &S = store;

        let mut ctx = RunContext {
            store,
            session,
            messages,
            output,
        };
        importer.prepare(sheet, &mut ctx).await?;

        let last = sheet.num_rows();
        for row in importer.first_data_row()..=last {
            if is_blank_row(sheet, importer.columns(), row) {
                continue;
            }
            importer.import_row(sheet, row, &mut ctx).await?;
        }

        if commit {
            session.flush(store).await?;
        } else {
            session.discard();
        }

        self.state = RunState::Processed { committed: commit };
        log::info!(
            "import {}: {} records, {} messages ({} errors)",
            if commit { "committed" } else { "previewed" },
            self.output.total(),
            self.messages.len(),
            self.messages.error_count()
        );
        Ok(&self.output)
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn sheet(&self) -> &Worksheet {
        &self.sheet
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn output(&self) -> &ImportOutput {
        &self.output
    }
}

/// A row is blank when every mapped column is empty; such rows are
/// incidental spreadsheet padding, not errors.
pub fn is_blank_row(sheet: &Worksheet, columns: &ColumnMap, row: u32) -> bool {
    columns.columns().all(|column| sheet.value(row, column).is_none())
}

/// Resolve a natural key through the per-run cache, delegating to the
/// persistence layer on the first reference only. Definitive "not found"
/// results are memoized as well.
pub async fn resolve_cached<R, F, Fut>(
    cache: &mut ResolutionCache<R>,
    key: &str,
    lookup: F,
) -> Result<Option<R>>
where
    R: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<R>>>,
{
    if let Some(cached) = cache.cached(key) {
        return Ok(cached.clone());
    }
    let record = lookup().await?;
    cache.store(key, record.clone());
    Ok(record)
}

/// Run an import with the commit guard. A commit request first previews the
/// sheet on a fresh importer; when the preview carries any error-flagged
/// message the commit is withheld and the preview run is returned instead, so
/// nothing reaches durable storage from a sheet with known problems. The
/// caller distinguishes the outcomes through `RunState`.
pub async fn process_guarded<'s, S, I, F>(
    make_importer: F,
    store: &'s S,
    sheet: Worksheet,
    commit: bool,
) -> Result<ImportRun<'s, S, I>>
where
    S: RecordStore,
    I: RowImporter<S>,
    F: Fn() -> I,
{
    if commit {
        let mut preview = ImportRun::new(make_importer(), store, sheet.clone());
        preview.process(false).await?;
        if preview.messages().has_errors() {
            log::warn!(
                "commit withheld: preview reported {} error(s)",
                preview.messages().error_count()
            );
            return Ok(preview);
        }
    }
    let mut run = ImportRun::new(make_importer(), store, sheet);
    run.process(commit).await?;
    Ok(run)
}
