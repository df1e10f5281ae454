//! Command handlers

pub mod import;
pub mod staging;

pub use import::handle_import_command;
pub use staging::{handle_stage_command, handle_staged_command, handle_sweep_command};
