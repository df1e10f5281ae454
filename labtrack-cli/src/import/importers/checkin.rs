//! Check-in decision importer
//!
//! Headerless sheet, one row per tube: accession, ACCEPTED/REJECTED decision,
//! destination plate barcode, kit name, technician. Accepted tubes are
//! assigned to their plate; rejected tubes keep no plate assignment.

use anyhow::Result;
use chrono::Utc;

use crate::import::cache::ResolutionCache;
use crate::import::columns::ColumnMap;
use crate::import::output::{Classification, RecordRef};
use crate::import::pipeline::{RowImporter, RunContext, resolve_cached};
use crate::import::validate::FieldCheck;
use crate::import::worksheet::Worksheet;
use crate::store::{Mutation, Plate, RecordStore, Tube, TubeStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Accepted,
    Rejected,
}

pub struct CheckinImporter {
    columns: ColumnMap,
    tubes: ResolutionCache<Tube>,
    plates: ResolutionCache<Plate>,
}

impl CheckinImporter {
    pub fn new() -> Self {
        CheckinImporter {
            columns: ColumnMap::new(&[
                ("tube accession", "A"),
                ("decision", "B"),
                ("plate barcode", "C"),
                ("kit name", "D"),
                ("technician", "E"),
            ]),
            tubes: ResolutionCache::new(),
            plates: ResolutionCache::new(),
        }
    }
}

impl Default for CheckinImporter {
    fn default() -> Self {
        CheckinImporter::new()
    }
}

impl<S: RecordStore> RowImporter<S> for CheckinImporter {
    fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    // Check-in sheets come straight off the bench scanner with no header row
    fn first_data_row(&self) -> u32 {
        1
    }

    async fn import_row(
        &mut self,
        sheet: &Worksheet,
        row: u32,
        ctx: &mut RunContext<'_, S>,
    ) -> Result<()> {
        let mut check = FieldCheck::new(row, ctx.messages);

        let accession = check.required_text(sheet.value(row, "A"), "A", "tube accession");
        let decision = check.required_text(sheet.value(row, "B"), "B", "decision");
        let decision = check.one_of(decision, &["ACCEPTED", "REJECTED"], "B", "decision");
        let plate_barcode = check.optional_text(sheet.value(row, "C"), "C", "plate barcode");
        let kit = check.required_text(sheet.value(row, "D"), "D", "kit name");
        let technician = check.required_text(sheet.value(row, "E"), "E", "technician");

        let (Some(accession), Some(decision), Some(plate_barcode), Some(kit), Some(technician)) =
            (accession, decision, plate_barcode, kit, technician)
        else {
            return Ok(());
        };

        let decision = if decision == "ACCEPTED" {
            Decision::Accepted
        } else {
            Decision::Rejected
        };
        let plate_barcode = match (decision, plate_barcode) {
            (Decision::Accepted, None) => {
                check.fail("C", "plate barcode is required for accepted tubes");
                return Ok(());
            }
            (Decision::Rejected, Some(_)) => {
                check.note("C", "plate barcode is ignored for rejected tubes");
                None
            }
            (_, plate_barcode) => plate_barcode,
        };

        let store = ctx.store;
        let tube = resolve_cached(&mut self.tubes, &accession, || store.find_tube(&accession))
            .await?;
        let Some(mut tube) = tube else {
            ctx.messages.error(
                Some(row),
                Some("A"),
                format!("tube {} not found", accession),
            );
            return Ok(());
        };
        if !self.tubes.claim(&accession) {
            ctx.messages.error(
                Some(row),
                Some("A"),
                format!("tube {} occurs more than once in this sheet", accession),
            );
            return Ok(());
        }
        if !tube.may_record_checkin() {
            ctx.messages.error(
                Some(row),
                Some("A"),
                format!("tube {} is already {}", accession, tube.status.as_str()),
            );
            return Ok(());
        }

        if let Some(barcode) = &plate_barcode {
            let plate =
                resolve_cached(&mut self.plates, barcode, || store.find_plate(barcode)).await?;
            match plate {
                None => {
                    ctx.messages.error(
                        Some(row),
                        Some("C"),
                        format!("plate {} not found", barcode),
                    );
                    return Ok(());
                }
                Some(plate) if !plate.may_accept_tubes() => {
                    ctx.messages.error(
                        Some(row),
                        Some("C"),
                        format!("plate {} is not accepting tubes", barcode),
                    );
                    return Ok(());
                }
                Some(_) => {}
            }
        }

        tube.kit_name = Some(kit);
        tube.technician = Some(technician);
        tube.checked_in_at = Some(Utc::now());
        let classification = match decision {
            Decision::Accepted => {
                tube.status = TubeStatus::CheckedIn;
                tube.plate_barcode = plate_barcode;
                Classification::Accepted
            }
            Decision::Rejected => {
                tube.status = TubeStatus::Rejected;
                tube.plate_barcode = None;
                Classification::Rejected
            }
        };
        ctx.session.stage(Mutation::UpdateTube(tube));
        ctx.output.add(classification, RecordRef::tube(accession));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::cell::CellValue;
    use crate::import::pipeline::ImportRun;
    use crate::store::MemoryStore;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn add_row(sheet: &mut Worksheet, row: u32, cells: &[(&str, &str)]) {
        for (column, value) in cells {
            if !value.is_empty() {
                sheet.add_cell_at(row, column, text(value));
            }
        }
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.put_tube(Tube::new("T001"));
        store.put_tube(Tube::new("T002"));
        store.put_plate(Plate::new("PLATE-9"));
        store
    }

    fn decision_sheet() -> Worksheet {
        let mut sheet = Worksheet::new("Decisions");
        add_row(
            &mut sheet,
            1,
            &[("A", "T001"), ("B", "ACCEPTED"), ("C", "PLATE-9"), ("D", "KitA"), ("E", "tech1")],
        );
        add_row(
            &mut sheet,
            2,
            &[("A", "T002"), ("B", "REJECTED"), ("D", "KitA"), ("E", "tech1")],
        );
        // Duplicate of row 1; must be reported against this row
        add_row(
            &mut sheet,
            3,
            &[("A", "T001"), ("B", "ACCEPTED"), ("C", "PLATE-9"), ("D", "KitA"), ("E", "tech1")],
        );
        sheet
    }

    #[tokio::test]
    async fn test_decisions_with_duplicate_row() {
        let store = seeded_store();
        let mut run = ImportRun::new(CheckinImporter::new(), &store, decision_sheet());
        run.process(false).await.unwrap();

        assert_eq!(
            run.output().records(Classification::Accepted),
            &[RecordRef::tube("T001")]
        );
        assert_eq!(
            run.output().records(Classification::Rejected),
            &[RecordRef::tube("T002")]
        );
        assert_eq!(run.messages().error_count(), 1);
        let error = &run.messages().all()[0];
        assert_eq!(error.row, Some(3));
        assert_eq!(error.column.as_deref(), Some("A"));
        assert!(error.text.contains("occurs more than once"));
    }

    #[tokio::test]
    async fn test_preview_writes_nothing() {
        let store = seeded_store();
        let mut run = ImportRun::new(CheckinImporter::new(), &store, decision_sheet());
        run.process(false).await.unwrap();

        assert_eq!(store.tube("T001").unwrap().status, TubeStatus::Registered);
        assert_eq!(store.tube("T002").unwrap().status, TubeStatus::Registered);
    }

    #[tokio::test]
    async fn test_commit_applies_decisions() {
        let store = seeded_store();
        let mut run = ImportRun::new(CheckinImporter::new(), &store, decision_sheet());
        run.process(true).await.unwrap();

        let accepted = store.tube("T001").unwrap();
        assert_eq!(accepted.status, TubeStatus::CheckedIn);
        assert_eq!(accepted.plate_barcode.as_deref(), Some("PLATE-9"));
        assert_eq!(accepted.kit_name.as_deref(), Some("KitA"));
        assert!(accepted.checked_in_at.is_some());

        let rejected = store.tube("T002").unwrap();
        assert_eq!(rejected.status, TubeStatus::Rejected);
        assert_eq!(rejected.plate_barcode, None);
    }

    #[tokio::test]
    async fn test_commit_guard_keeps_dirty_sheet_out_of_storage() {
        use crate::import::pipeline::{RunState, process_guarded};

        // The sheet carries a duplicate-row error, so a requested commit is
        // withheld and no decision reaches the store.
        let store = seeded_store();
        let run = process_guarded(CheckinImporter::new, &store, decision_sheet(), true)
            .await
            .unwrap();

        assert_eq!(run.state(), RunState::Processed { committed: false });
        assert!(run.messages().has_errors());
        assert_eq!(store.tube("T001").unwrap().status, TubeStatus::Registered);
        assert_eq!(store.tube("T002").unwrap().status, TubeStatus::Registered);
    }

    #[tokio::test]
    async fn test_preview_and_commit_classify_identically() {
        let store = seeded_store();
        let mut preview = ImportRun::new(CheckinImporter::new(), &store, decision_sheet());
        preview.process(false).await.unwrap();

        let store2 = seeded_store();
        let mut commit = ImportRun::new(CheckinImporter::new(), &store2, decision_sheet());
        commit.process(true).await.unwrap();

        assert_eq!(
            preview.output().classified_keys(),
            commit.output().classified_keys()
        );
        assert_eq!(preview.messages().len(), commit.messages().len());
    }

    #[tokio::test]
    async fn test_accepted_without_plate_fails() {
        let store = seeded_store();
        let mut sheet = Worksheet::new("Decisions");
        add_row(
            &mut sheet,
            1,
            &[("A", "T001"), ("B", "ACCEPTED"), ("D", "KitA"), ("E", "tech1")],
        );
        let mut run = ImportRun::new(CheckinImporter::new(), &store, sheet);
        run.process(true).await.unwrap();

        assert!(run.output().is_empty());
        let error = &run.messages().all()[0];
        assert_eq!(error.column.as_deref(), Some("C"));
        assert!(error.text.contains("required for accepted"));
        assert_eq!(store.tube("T001").unwrap().status, TubeStatus::Registered);
    }

    #[tokio::test]
    async fn test_rejected_with_plate_gets_info_note() {
        let store = seeded_store();
        let mut sheet = Worksheet::new("Decisions");
        add_row(
            &mut sheet,
            1,
            &[("A", "T001"), ("B", "REJECTED"), ("C", "PLATE-9"), ("D", "KitA"), ("E", "tech1")],
        );
        let mut run = ImportRun::new(CheckinImporter::new(), &store, sheet);
        run.process(true).await.unwrap();

        assert_eq!(run.output().count(Classification::Rejected), 1);
        assert!(!run.messages().has_errors());
        assert_eq!(run.messages().len(), 1);
        assert!(run.messages().all()[0].text.contains("ignored"));
        assert_eq!(store.tube("T001").unwrap().plate_barcode, None);
    }

    #[tokio::test]
    async fn test_unknown_tube_and_already_checked_in() {
        let store = seeded_store();
        let mut checked_in = store.tube("T002").unwrap();
        checked_in.status = TubeStatus::CheckedIn;
        store.put_tube(checked_in);

        let mut sheet = Worksheet::new("Decisions");
        add_row(
            &mut sheet,
            1,
            &[("A", "T404"), ("B", "ACCEPTED"), ("C", "PLATE-9"), ("D", "KitA"), ("E", "tech1")],
        );
        add_row(
            &mut sheet,
            2,
            &[("A", "T002"), ("B", "ACCEPTED"), ("C", "PLATE-9"), ("D", "KitA"), ("E", "tech1")],
        );
        let mut run = ImportRun::new(CheckinImporter::new(), &store, sheet);
        run.process(false).await.unwrap();

        assert!(run.output().is_empty());
        assert_eq!(run.messages().error_count(), 2);
        assert!(run.messages().all()[0].text.contains("not found"));
        assert!(run.messages().all()[1].text.contains("already checked-in"));
    }

    #[tokio::test]
    async fn test_plate_not_accepting_tubes() {
        let store = seeded_store();
        let mut plate = Plate::new("PLATE-X");
        plate.status = crate::store::PlateStatus::Read;
        store.put_plate(plate);

        let mut sheet = Worksheet::new("Decisions");
        add_row(
            &mut sheet,
            1,
            &[("A", "T001"), ("B", "ACCEPTED"), ("C", "PLATE-X"), ("D", "KitA"), ("E", "tech1")],
        );
        let mut run = ImportRun::new(CheckinImporter::new(), &store, sheet);
        run.process(false).await.unwrap();

        assert!(run.output().is_empty());
        assert!(run.messages().all()[0].text.contains("not accepting tubes"));
    }

    #[tokio::test]
    async fn test_row_reports_all_field_errors_at_once() {
        let store = seeded_store();
        let mut sheet = Worksheet::new("Decisions");
        // Missing accession, bad decision, missing kit and technician
        add_row(&mut sheet, 1, &[("B", "MAYBE")]);
        let mut run = ImportRun::new(CheckinImporter::new(), &store, sheet);
        run.process(false).await.unwrap();

        assert_eq!(run.messages().error_count(), 4);
        let columns: Vec<_> = run
            .messages()
            .all()
            .iter()
            .map(|m| m.column.clone().unwrap())
            .collect();
        assert_eq!(columns, vec!["A", "B", "D", "E"]);
    }
}
