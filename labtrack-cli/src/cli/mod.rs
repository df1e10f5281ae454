//! Command-line interface definitions

pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "labtrack-cli",
    about = "Spreadsheet import and reconciliation for specimen tracking",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Preview or commit a spreadsheet import
    Import(ImportArgs),
    /// Copy a workbook into the staging area
    Stage(StageArgs),
    /// List staged uploads
    Staged,
    /// Remove staged uploads past the retention window
    Sweep,
}

/// Document types the engine knows how to import
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DocType {
    /// Participant roster
    Roster,
    /// Tube check-in decisions
    Checkin,
    /// qPCR results
    Qpcr,
    /// ELISA results
    Elisa,
    /// Culture results
    Culture,
    /// Plate-reader export
    Plate,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Document type held by the sheet
    #[arg(value_enum)]
    pub doc_type: DocType,

    /// Path to the workbook, or a staging token with --staged
    pub source: String,

    /// Treat SOURCE as a staging token instead of a file path
    #[arg(long)]
    pub staged: bool,

    /// Sheet name (defaults to the first sheet)
    #[arg(long)]
    pub sheet: Option<String>,

    /// Apply the staged mutations instead of previewing them
    #[arg(long)]
    pub commit: bool,

    /// Name recorded as the actor of this import
    #[arg(long, default_value = "cli")]
    pub actor: String,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Args)]
pub struct StageArgs {
    /// Workbook file to stage
    pub file: PathBuf,

    /// MIME type recorded for the upload
    #[arg(long, default_value = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")]
    pub mime_type: String,

    /// Name recorded as the uploader
    #[arg(long, default_value = "cli")]
    pub actor: String,
}
