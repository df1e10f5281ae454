//! Import command handler
//!
//! Resolves the workbook (direct path or staging token), loads and normalizes
//! it, runs the selected importer, and renders the preview or commit receipt.
//! A committed import consumes its staged upload.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use colored::*;

use super::super::{DocType, ImportArgs};
use crate::config::Config;
use crate::import::importers::{
    CheckinImporter, CultureImporter, ElisaImporter, PlateReaderImporter, QpcrImporter,
    RosterImporter,
};
use crate::import::pipeline::process_guarded;
use crate::import::{Classification, ImportRun, RowImporter, RunState, Worksheet, load_workbook};
use crate::staging::StagingArea;
use crate::store::{RecordStore, SqliteStore};

pub async fn handle_import_command(args: ImportArgs, config: &Config) -> Result<()> {
    if args.no_color {
        colored::control::set_override(false);
    }

    let staging = StagingArea::new(&config.staging_dir);
    let (path, file_name, mime_type, actor) = if args.staged {
        let (path, upload) = staging.open(&args.source)?;
        (path, upload.file_name, upload.mime_type, upload.uploaded_by)
    } else {
        let path = PathBuf::from(&args.source);
        if !path.exists() {
            bail!("workbook does not exist: {}", path.display());
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string())
            .with_context(|| format!("no usable file name in {}", path.display()))?;
        (path, file_name, guess_mime_type(&args.source), args.actor.clone())
    };

    let workbook = load_workbook(&path, &file_name, &mime_type, &actor)?;
    let sheet = match &args.sheet {
        Some(name) => workbook
            .sheet(name)
            .with_context(|| format!("workbook has no sheet named '{}'", name))?,
        None => workbook.first_sheet()?,
    }
    .clone();

    let store = SqliteStore::connect(&config.database_path).await?;

    println!(
        "{} {} ({})",
        (if args.commit { "Importing" } else { "Previewing" }).bold(),
        file_name,
        sheet.name()
    );
    println!();

    match args.doc_type {
        DocType::Roster => run_and_render(RosterImporter::new, &store, sheet, args.commit).await?,
        DocType::Checkin => {
            run_and_render(CheckinImporter::new, &store, sheet, args.commit).await?
        }
        DocType::Qpcr => run_and_render(QpcrImporter::new, &store, sheet, args.commit).await?,
        DocType::Elisa => run_and_render(ElisaImporter::new, &store, sheet, args.commit).await?,
        DocType::Culture => {
            run_and_render(CultureImporter::new, &store, sheet, args.commit).await?
        }
        DocType::Plate => {
            run_and_render(PlateReaderImporter::new, &store, sheet, args.commit).await?
        }
    }

    if args.commit {
        // run_and_render bails on a withheld commit, so reaching here means
        // the flush happened; the staged upload is consumed only now.
        if args.staged {
            staging.remove(&args.source)?;
        }
        println!("{}", "Import committed.".green().bold());
    } else {
        println!(
            "{}",
            "Preview only; re-run with --commit to apply.".dimmed()
        );
    }
    Ok(())
}

/// Run one import and print its classification counts and messages. A commit
/// is withheld when the sheet carries error findings: the preview is printed,
/// the staged upload stays put, and the process exits non-zero.
async fn run_and_render<S, I, F>(make_importer: F, store: &S, sheet: Worksheet, commit: bool) -> Result<()>
where
    S: RecordStore,
    I: RowImporter<S>,
    F: Fn() -> I,
{
    let run = process_guarded(make_importer, store, sheet, commit).await?;
    render(&run);

    if commit && run.state() != (RunState::Processed { committed: true }) {
        bail!(
            "commit withheld: the sheet has {} error(s); fix them and retry",
            run.messages().error_count()
        );
    }
    Ok(())
}

fn render<S, I>(run: &ImportRun<'_, S, I>)
where
    S: RecordStore,
    I: RowImporter<S>,
{
    if run.output().is_empty() {
        println!("{}", "No records affected.".dimmed());
    }
    for (classification, records) in run.output().classifications() {
        let label = format!("{} ({})", classification, records.len());
        let label = match classification {
            Classification::Created | Classification::Accepted => label.green(),
            Classification::Updated => label.cyan(),
            Classification::Rejected => label.yellow(),
        };
        println!("{}", label.bold());
        for record in records {
            println!("  {}", record);
        }
    }

    if !run.messages().is_empty() {
        println!();
        for message in run.messages().sorted_for_display() {
            if message.error {
                println!("{} {}", "error:".red().bold(), message);
            } else {
                println!("{} {}", "note: ".dimmed(), message);
            }
        }
    }
    println!();
}

fn guess_mime_type(source: &str) -> String {
    let mime = match source.rsplit('.').next() {
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("xls") => "application/vnd.ms-excel",
        Some("ods") => "application/vnd.oasis.opendocument.spreadsheet",
        _ => "application/octet-stream",
    };
    mime.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_mime_type() {
        assert!(guess_mime_type("roster.xlsx").contains("spreadsheetml"));
        assert_eq!(guess_mime_type("old.xls"), "application/vnd.ms-excel");
        assert_eq!(guess_mime_type("noext"), "application/octet-stream");
    }
}
