//! Concrete reconciliation importers, one per document type
//!
//! Each importer supplies its own column map, field validators and output
//! classification on top of the shared pipeline. Instances never share
//! mutable state; every run gets fresh caches and a fresh message log.

pub mod checkin;
pub mod culture;
pub mod elisa;
pub mod plate_reader;
pub mod qpcr;
pub mod roster;

pub use checkin::CheckinImporter;
pub use culture::CultureImporter;
pub use elisa::ElisaImporter;
pub use plate_reader::PlateReaderImporter;
pub use qpcr::QpcrImporter;
pub use roster::RosterImporter;
