//! Persistence layer
//!
//! The import engine talks to storage through the `RecordStore` trait:
//! natural-key lookups plus one atomic `apply` of a run's staged mutations.
//! `SqliteStore` is the durable implementation; `MemoryStore` backs tests and
//! dry runs.

pub mod memory;
pub mod models;
pub mod session;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

pub use memory::MemoryStore;
pub use models::{
    AssayKind, AssayResult, GroupStatus, Participant, ParticipantGroup, Plate, PlateStatus,
    Specimen, SpecimenStatus, Tube, TubeStatus, Well,
};
pub use session::{Mutation, Session};
pub use sqlite::SqliteStore;

/// Natural-key lookup and transactional write primitives
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_group(&self, code: &str) -> Result<Option<ParticipantGroup>>;

    async fn find_participant(&self, external_id: &str) -> Result<Option<Participant>>;

    async fn find_tube(&self, accession: &str) -> Result<Option<Tube>>;

    async fn find_specimen(&self, accession: &str) -> Result<Option<Specimen>>;

    async fn find_plate(&self, barcode: &str) -> Result<Option<Plate>>;

    async fn find_well(&self, plate_barcode: &str, position: &str) -> Result<Option<Well>>;

    /// Number of results already recorded for a specimen under one assay
    async fn result_count(&self, specimen_accession: &str, assay: AssayKind) -> Result<i64>;

    /// Apply a batch of staged mutations as one atomic unit
    async fn apply(&self, mutations: &[Mutation]) -> Result<()>;
}
