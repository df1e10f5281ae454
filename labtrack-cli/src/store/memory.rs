//! In-memory record store
//!
//! Backs unit tests and `--dry-run` style invocations that never touch the
//! database file. Seed it with `put_*`, inspect it with the accessor methods.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::models::{
    AssayKind, AssayResult, Participant, ParticipantGroup, Plate, Specimen, Tube, Well,
};
use super::session::Mutation;
use super::RecordStore;

#[derive(Debug, Default)]
struct Inner {
    groups: HashMap<String, ParticipantGroup>,
    participants: HashMap<String, Participant>,
    tubes: HashMap<String, Tube>,
    specimens: HashMap<String, Specimen>,
    plates: HashMap<String, Plate>,
    wells: HashMap<(String, String), Well>,
    results: Vec<AssayResult>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn put_group(&self, group: ParticipantGroup) {
        self.write().groups.insert(group.code.clone(), group);
    }

    pub fn put_participant(&self, participant: Participant) {
        self.write()
            .participants
            .insert(participant.external_id.clone(), participant);
    }

    pub fn put_tube(&self, tube: Tube) {
        self.write().tubes.insert(tube.accession.clone(), tube);
    }

    pub fn put_specimen(&self, specimen: Specimen) {
        self.write()
            .specimens
            .insert(specimen.accession.clone(), specimen);
    }

    pub fn put_plate(&self, plate: Plate) {
        self.write().plates.insert(plate.barcode.clone(), plate);
    }

    pub fn put_well(&self, well: Well) {
        self.write()
            .wells
            .insert((well.plate_barcode.clone(), well.position.clone()), well);
    }

    pub fn tube(&self, accession: &str) -> Option<Tube> {
        self.read().tubes.get(accession).cloned()
    }

    pub fn participant(&self, external_id: &str) -> Option<Participant> {
        self.read().participants.get(external_id).cloned()
    }

    pub fn specimen(&self, accession: &str) -> Option<Specimen> {
        self.read().specimens.get(accession).cloned()
    }

    pub fn well(&self, plate_barcode: &str, position: &str) -> Option<Well> {
        self.read()
            .wells
            .get(&(plate_barcode.to_string(), position.to_string()))
            .cloned()
    }

    pub fn results_for(&self, specimen_accession: &str) -> Vec<AssayResult> {
        self.read()
            .results
            .iter()
            .filter(|r| r.specimen_accession == specimen_accession)
            .cloned()
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("store lock poisoned")
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_group(&self, code: &str) -> Result<Option<ParticipantGroup>> {
        Ok(self.read().groups.get(code).cloned())
    }

    async fn find_participant(&self, external_id: &str) -> Result<Option<Participant>> {
        Ok(self.read().participants.get(external_id).cloned())
    }

    async fn find_tube(&self, accession: &str) -> Result<Option<Tube>> {
        Ok(self.read().tubes.get(accession).cloned())
    }

    async fn find_specimen(&self, accession: &str) -> Result<Option<Specimen>> {
        Ok(self.read().specimens.get(accession).cloned())
    }

    async fn find_plate(&self, barcode: &str) -> Result<Option<Plate>> {
        Ok(self.read().plates.get(barcode).cloned())
    }

    async fn find_well(&self, plate_barcode: &str, position: &str) -> Result<Option<Well>> {
        Ok(self
            .read()
            .wells
            .get(&(plate_barcode.to_string(), position.to_string()))
            .cloned())
    }

    async fn result_count(&self, specimen_accession: &str, assay: AssayKind) -> Result<i64> {
        Ok(self
            .read()
            .results
            .iter()
            .filter(|r| r.specimen_accession == specimen_accession && r.assay == assay)
            .count() as i64)
    }

    async fn apply(&self, mutations: &[Mutation]) -> Result<()> {
        let mut inner = self.write();
        for mutation in mutations {
            match mutation {
                Mutation::CreateParticipant(p) | Mutation::UpdateParticipant(p) => {
                    inner.participants.insert(p.external_id.clone(), p.clone());
                }
                Mutation::UpdateTube(t) => {
                    inner.tubes.insert(t.accession.clone(), t.clone());
                }
                Mutation::CreateResult(r) => {
                    inner.results.push(r.clone());
                }
                Mutation::UpdateSpecimen(s) => {
                    inner.specimens.insert(s.accession.clone(), s.clone());
                }
                Mutation::UpsertWell(w) => {
                    inner
                        .wells
                        .insert((w.plate_barcode.clone(), w.position.clone()), w.clone());
                }
                Mutation::UpdatePlate(p) => {
                    inner.plates.insert(p.barcode.clone(), p.clone());
                }
            }
        }
        Ok(())
    }
}
