//! ELISA result importer
//!
//! Header row then one row per specimen: accession, optical density, assay
//! cutoff, interpretation, resulted-at timestamp, technician. The stated
//! interpretation must agree with the OD/cutoff comparison.

use anyhow::Result;

use crate::import::cache::ResolutionCache;
use crate::import::columns::ColumnMap;
use crate::import::output::{Classification, RecordRef};
use crate::import::pipeline::{RowImporter, RunContext, resolve_cached};
use crate::import::validate::FieldCheck;
use crate::import::worksheet::Worksheet;
use crate::store::{AssayKind, AssayResult, Mutation, RecordStore, Specimen, SpecimenStatus};

pub struct ElisaImporter {
    columns: ColumnMap,
    specimens: ResolutionCache<Specimen>,
}

impl ElisaImporter {
    pub fn new() -> Self {
        ElisaImporter {
            columns: ColumnMap::new(&[
                ("specimen accession", "A"),
                ("optical density", "B"),
                ("cutoff", "C"),
                ("interpretation", "D"),
                ("resulted at", "E"),
                ("technician", "F"),
            ]),
            specimens: ResolutionCache::new(),
        }
    }
}

impl Default for ElisaImporter {
    fn default() -> Self {
        ElisaImporter::new()
    }
}

impl<S: RecordStore> RowImporter<S> for ElisaImporter {
    fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    async fn import_row(
        &mut self,
        sheet: &Worksheet,
        row: u32,
        ctx: &mut RunContext<'_, S>,
    ) -> Result<()> {
        let mut check = FieldCheck::new(row, ctx.messages);

        let accession = check.required_text(sheet.value(row, "A"), "A", "specimen accession");
        let od = check.required_decimal(sheet.value(row, "B"), "B", "optical density", 0.0, 10.0);
        let cutoff = check.required_decimal(sheet.value(row, "C"), "C", "cutoff", 0.001, 10.0);
        let interpretation = check.required_text(sheet.value(row, "D"), "D", "interpretation");
        let interpretation = check.one_of(
            interpretation,
            &["REACTIVE", "NON-REACTIVE", "EQUIVOCAL"],
            "D",
            "interpretation",
        );
        let resulted_at = check.required_datetime(sheet.value(row, "E"), "E", "resulted at");
        let technician = check.required_text(sheet.value(row, "F"), "F", "technician");

        let (Some(accession), Some(od), Some(cutoff), Some(interpretation), Some(resulted_at), Some(technician)) =
            (accession, od, cutoff, interpretation, resulted_at, technician)
        else {
            return Ok(());
        };

        match interpretation.as_str() {
            "REACTIVE" if od < cutoff => {
                check.fail("D", "interpretation does not match optical density");
                return Ok(());
            }
            "NON-REACTIVE" if od >= cutoff => {
                check.fail("D", "interpretation does not match optical density");
                return Ok(());
            }
            "EQUIVOCAL" => {
                check.note("D", "equivocal interpretation; retest may be needed");
            }
            _ => {}
        }

        let store = ctx.store;
        let specimen =
            resolve_cached(&mut self.specimens, &accession, || store.find_specimen(&accession))
                .await?;
        let Some(mut specimen) = specimen else {
            ctx.messages.error(
                Some(row),
                Some("A"),
                format!("specimen {} not found", accession),
            );
            return Ok(());
        };
        if !self.specimens.claim(&accession) {
            ctx.messages.error(
                Some(row),
                Some("A"),
                format!("specimen {} occurs more than once in this sheet", accession),
            );
            return Ok(());
        }
        if !specimen.may_attach_result() {
            ctx.messages.error(
                Some(row),
                Some("A"),
                format!("specimen {} is disposed", accession),
            );
            return Ok(());
        }

        let prior = specimen.is_resulted()
            || store.result_count(&accession, AssayKind::Elisa).await? > 0;

        let mut result =
            AssayResult::new(&accession, AssayKind::Elisa, interpretation, technician, resulted_at);
        result.measure = Some(od);
        ctx.session.stage(Mutation::CreateResult(result));

        if !specimen.is_resulted() {
            specimen.status = SpecimenStatus::Resulted;
            ctx.session.stage(Mutation::UpdateSpecimen(specimen.clone()));
            self.specimens.store(&accession, Some(specimen));
        }

        let classification = if prior {
            Classification::Updated
        } else {
            Classification::Created
        };
        ctx.output.add(classification, RecordRef::specimen(accession));
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
        store.put_specimen(Specimen::new("S001"));
        store
    }

    #[tokio::test]
    async fn test_reactive_result_is_recorded() {
        let store = seeded_store();
        let mut sheet = Worksheet::new("ELISA");
        add_row(
            &mut sheet,
            2,
            &[("A", "S001"), ("B", "1.82"), ("C", "0.9"), ("D", "reactive"),
              ("E", "2024-03-15T09:30:00"), ("F", "tech1")],
        );
        let mut run = ImportRun::new(ElisaImporter::new(), &store, sheet);
        run.process(true).await.unwrap();

        assert_eq!(
            run.output().records(Classification::Created),
            &[RecordRef::specimen("S001")]
        );
        let results = store.results_for("S001");
        assert_eq!(results[0].value, "REACTIVE");
        assert_eq!(results[0].measure, Some(1.82));
        assert_eq!(store.specimen("S001").unwrap().status, SpecimenStatus::Resulted);
    }

    #[tokio::test]
    async fn test_interpretation_must_match_od() {
        let store = seeded_store();
        let mut sheet = Worksheet::new("ELISA");
        // REACTIVE but OD below cutoff
        add_row(
            &mut sheet,
            2,
            &[("A", "S001"), ("B", "0.4"), ("C", "0.9"), ("D", "REACTIVE"),
              ("E", "2024-03-15T09:30:00"), ("F", "tech1")],
        );
        let mut run = ImportRun::new(ElisaImporter::new(), &store, sheet);
        run.process(true).await.unwrap();

        assert!(run.output().is_empty());
        let error = &run.messages().all()[0];
        assert_eq!(error.column.as_deref(), Some("D"));
        assert!(error.text.contains("does not match"));
        assert!(store.results_for("S001").is_empty());
    }

    #[tokio::test]
    async fn test_non_reactive_above_cutoff_fails() {
        let store = seeded_store();
        let mut sheet = Worksheet::new("ELISA");
        add_row(
            &mut sheet,
            2,
            &[("A", "S001"), ("B", "1.5"), ("C", "0.9"), ("D", "NON-REACTIVE"),
              ("E", "2024-03-15T09:30:00"), ("F", "tech1")],
        );
        let mut run = ImportRun::new(ElisaImporter::new(), &store, sheet);
        run.process(false).await.unwrap();

        assert!(run.output().is_empty());
        assert!(run.messages().all()[0].text.contains("does not match"));
    }

    #[tokio::test]
    async fn test_equivocal_is_noted_and_recorded() {
        let store = seeded_store();
        let mut sheet = Worksheet::new("ELISA");
        add_row(
            &mut sheet,
            2,
            &[("A", "S001"), ("B", "0.88"), ("C", "0.9"), ("D", "EQUIVOCAL"),
              ("E", "2024-03-15T09:30:00"), ("F", "tech1")],
        );
        let mut run = ImportRun::new(ElisaImporter::new(), &store, sheet);
        run.process(true).await.unwrap();

        assert_eq!(run.output().count(Classification::Created), 1);
        assert!(!run.messages().has_errors());
        assert!(run.messages().all()[0].text.contains("equivocal"));
        assert_eq!(store.results_for("S001")[0].value, "EQUIVOCAL");
    }

    #[tokio::test]
    async fn test_duplicate_specimen_rows() {
        let store = seeded_store();
        let mut sheet = Worksheet::new("ELISA");
        for row in [2, 3] {
            add_row(
                &mut sheet,
                row,
                &[("A", "S001"), ("B", "1.82"), ("C", "0.9"), ("D", "REACTIVE"),
                  ("E", "2024-03-15T09:30:00"), ("F", "tech1")],
            );
        }
        let mut run = ImportRun::new(ElisaImporter::new(), &store, sheet);
        run.process(true).await.unwrap();

        assert_eq!(run.output().total(), 1);
        assert_eq!(run.messages().error_count(), 1);
        assert_eq!(run.messages().all()[0].row, Some(3));
        assert_eq!(store.results_for("S001").len(), 1);
    }

    #[tokio::test]
    async fn test_cutoff_must_be_positive() {
        let store = seeded_store();
        let mut sheet = Worksheet::new("ELISA");
        add_row(
            &mut sheet,
            2,
            &[("A", "S001"), ("B", "1.82"), ("C", "0"), ("D", "REACTIVE"),
              ("E", "2024-03-15T09:30:00"), ("F", "tech1")],
        );
        let mut run = ImportRun::new(ElisaImporter::new(), &store, sheet);
        run.process(false).await.unwrap();

        assert!(run.output().is_empty());
        let error = &run.messages().all()[0];
        assert_eq!(error.column.as_deref(), Some("C"));
        assert!(error.text.contains("between"));
    }
}
