//! Staged mutations for one import run
//!
//! The two-phase commit boundary: every importer builds its mutations into a
//! `Session` regardless of mode. At the end of the run the session is either
//! flushed (commit) or discarded (preview), so the preview is generated by
//! literally the same code path as the commit.

use anyhow::Result;

use super::RecordStore;
use super::models::{AssayResult, Participant, Plate, Specimen, Tube, Well};

/// One staged write against the persistence layer
#[derive(Debug, Clone)]
pub enum Mutation {
    CreateParticipant(Participant),
    UpdateParticipant(Participant),
    UpdateTube(Tube),
    CreateResult(AssayResult),
    UpdateSpecimen(Specimen),
    UpsertWell(Well),
    UpdatePlate(Plate),
}

impl Mutation {
    /// Short description for logging
    pub fn describe(&self) -> String {
        match self {
            Mutation::CreateParticipant(p) => format!("create participant {}", p.external_id),
            Mutation::UpdateParticipant(p) => format!("update participant {}", p.external_id),
            Mutation::UpdateTube(t) => format!("update tube {}", t.accession),
            Mutation::CreateResult(r) => {
                format!("create {} result for specimen {}", r.assay, r.specimen_accession)
            }
            Mutation::UpdateSpecimen(s) => format!("update specimen {}", s.accession),
            Mutation::UpsertWell(w) => format!("upsert well {}:{}", w.plate_barcode, w.position),
            Mutation::UpdatePlate(p) => format!("update plate {}", p.barcode),
        }
    }
}

/// In-memory buffer of staged mutations for one run
#[derive(Debug, Default)]
pub struct Session {
    pending: Vec<Mutation>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    /// Stage a mutation; nothing reaches durable storage until `flush`
    pub fn stage(&mut self, mutation: Mutation) {
        log::debug!("staged: {}", mutation.describe());
        self.pending.push(mutation);
    }

    pub fn pending(&self) -> &[Mutation] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Durably apply every staged mutation as one atomic unit
    pub async fn flush<S: RecordStore + ?Sized>(&mut self, store: &S) -> Result<()> {
        if self.pending.is_empty() {
            log::debug!("flush with no staged mutations");
            return Ok(());
        }
        store.apply(&self.pending).await?;
        log::info!("flushed {} mutations", self.pending.len());
        self.pending.clear();
        Ok(())
    }

    /// Drop every staged mutation without writing (preview mode)
    pub fn discard(&mut self) {
        log::debug!("discarding {} staged mutations", self.pending.len());
        self.pending.clear();
    }
}
