//! Staging command handlers

use anyhow::Result;
use colored::*;

use super::super::StageArgs;
use crate::config::Config;
use crate::staging::StagingArea;

pub fn handle_stage_command(args: StageArgs, config: &Config) -> Result<()> {
    let staging = StagingArea::new(&config.staging_dir);
    let upload = staging.stage(&args.file, args.mime_type, args.actor)?;
    println!(
        "Staged {} as {}",
        upload.file_name.bold(),
        upload.token.cyan()
    );
    Ok(())
}

pub fn handle_staged_command(config: &Config) -> Result<()> {
    let staging = StagingArea::new(&config.staging_dir);
    let uploads = staging.list()?;
    if uploads.is_empty() {
        println!("{}", "No staged uploads.".dimmed());
        return Ok(());
    }
    for upload in uploads {
        println!(
            "{}  {}  {} by {}",
            upload.token.cyan(),
            upload.file_name,
            upload.uploaded_at.format("%Y-%m-%d %H:%M"),
            upload.uploaded_by
        );
    }
    Ok(())
}

pub fn handle_sweep_command(config: &Config) -> Result<()> {
    let staging = StagingArea::new(&config.staging_dir);
    let removed = staging.sweep(config.retention_days)?;
    if removed.is_empty() {
        println!("Nothing to sweep.");
    } else {
        println!(
            "Swept {} staged upload(s) older than {} days.",
            removed.len(),
            config.retention_days
        );
    }
    Ok(())
}
