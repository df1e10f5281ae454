//! qPCR result importer
//!
//! Header row then one row per (specimen, target gene) pair: accession,
//! target, ct value, qualitative call, resulted-at timestamp, technician.
//! A specimen receiving its first result moves to the resulted state;
//! further results against it classify as updates.

use anyhow::Result;

use crate::import::cache::ResolutionCache;
use crate::import::columns::ColumnMap;
use crate::import::output::{Classification, RecordRef};
use crate::import::pipeline::{RowImporter, RunContext, resolve_cached};
use crate::import::validate::FieldCheck;
use crate::import::worksheet::Worksheet;
use crate::store::{AssayKind, AssayResult, Mutation, RecordStore, Specimen, SpecimenStatus};

pub struct QpcrImporter {
    columns: ColumnMap,
    specimens: ResolutionCache<Specimen>,
}

impl QpcrImporter {
    pub fn new() -> Self {
        QpcrImporter {
            columns: ColumnMap::new(&[
                ("specimen accession", "A"),
                ("target gene", "B"),
                ("ct value", "C"),
                ("call", "D"),
                ("resulted at", "E"),
                ("technician", "F"),
            ]),
            specimens: ResolutionCache::new(),
        }
    }
}

impl Default for QpcrImporter {
    fn default() -> Self {
        QpcrImporter::new()
    }
}

impl<S: RecordStore> RowImporter<S> for QpcrImporter {
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
        let target = check.required_text(sheet.value(row, "B"), "B", "target gene");
        let ct = check.optional_decimal(sheet.value(row, "C"), "C", "ct value", 0.0, 50.0);
        let call = check.required_text(sheet.value(row, "D"), "D", "call");
        let call = check.one_of(call, &["POSITIVE", "NEGATIVE", "INDETERMINATE"], "D", "call");
        let resulted_at = check.required_datetime(sheet.value(row, "E"), "E", "resulted at");
        let technician = check.required_text(sheet.value(row, "F"), "F", "technician");

        let (Some(accession), Some(target), Some(ct), Some(call), Some(resulted_at), Some(technician)) =
            (accession, target, ct, call, resulted_at, technician)
        else {
            return Ok(());
        };

        if call == "POSITIVE" && ct.is_none() {
            check.fail("C", "ct value is required for a positive call");
            return Ok(());
        }
        if call == "NEGATIVE" && ct.is_some() {
            check.note("C", "ct value recorded for a negative call");
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
        let claim_key = format!("{}:{}", accession, target);
        if !self.specimens.claim(&claim_key) {
            ctx.messages.error(
                Some(row),
                Some("B"),
                format!(
                    "target {} for specimen {} occurs more than once in this sheet",
                    target, accession
                ),
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
            || store.result_count(&accession, AssayKind::Qpcr).await? > 0;

        let mut result =
            AssayResult::new(&accession, AssayKind::Qpcr, call, technician, resulted_at);
        result.measure = ct;
        ctx.session.stage(Mutation::CreateResult(result));

        if !specimen.is_resulted() {
            specimen.status = SpecimenStatus::Resulted;
            ctx.session.stage(Mutation::UpdateSpecimen(specimen.clone()));
            // Later rows for the same specimen must see the new state
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
        store.put_specimen(Specimen::new("S002"));
        store
    }

    #[tokio::test]
    async fn test_first_result_creates_and_resolves_specimen() {
        let store = seeded_store();
        let mut sheet = Worksheet::new("qPCR");
        add_row(
            &mut sheet,
            2,
            &[
                ("A", "S001"),
                ("B", "ORF1ab"),
                ("C", "23.4"),
                ("D", "positive"),
                ("E", "2024-03-15T09:30:00"),
                ("F", "tech1"),
            ],
        );
        let mut run = ImportRun::new(QpcrImporter::new(), &store, sheet);
        run.process(true).await.unwrap();

        assert_eq!(
            run.output().records(Classification::Created),
            &[RecordRef::specimen("S001")]
        );
        assert_eq!(store.specimen("S001").unwrap().status, SpecimenStatus::Resulted);

        let results = store.results_for("S001");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].value, "POSITIVE");
        assert_eq!(results[0].measure, Some(23.4));
        assert_eq!(results[0].assay, AssayKind::Qpcr);
    }

    #[tokio::test]
    async fn test_second_target_same_specimen_is_updated() {
        let store = seeded_store();
        let mut sheet = Worksheet::new("qPCR");
        add_row(
            &mut sheet,
            2,
            &[("A", "S001"), ("B", "ORF1ab"), ("C", "23.4"), ("D", "POSITIVE"),
              ("E", "2024-03-15T09:30:00"), ("F", "tech1")],
        );
        add_row(
            &mut sheet,
            3,
            &[("A", "S001"), ("B", "N2"), ("C", "25.1"), ("D", "POSITIVE"),
              ("E", "2024-03-15T09:31:00"), ("F", "tech1")],
        );
        let mut run = ImportRun::new(QpcrImporter::new(), &store, sheet);
        run.process(true).await.unwrap();

        assert_eq!(run.output().count(Classification::Created), 1);
        assert_eq!(run.output().count(Classification::Updated), 1);
        assert_eq!(store.results_for("S001").len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_target_for_specimen() {
        let store = seeded_store();
        let mut sheet = Worksheet::new("qPCR");
        for row in [2, 3] {
            add_row(
                &mut sheet,
                row,
                &[("A", "S001"), ("B", "ORF1ab"), ("C", "23.4"), ("D", "POSITIVE"),
                  ("E", "2024-03-15T09:30:00"), ("F", "tech1")],
            );
        }
        let mut run = ImportRun::new(QpcrImporter::new(), &store, sheet);
        run.process(true).await.unwrap();

        assert_eq!(run.output().total(), 1);
        assert_eq!(run.messages().error_count(), 1);
        let error = &run.messages().all()[0];
        assert_eq!(error.row, Some(3));
        assert!(error.text.contains("occurs more than once"));
        assert_eq!(store.results_for("S001").len(), 1);
    }

    #[tokio::test]
    async fn test_positive_call_requires_ct() {
        let store = seeded_store();
        let mut sheet = Worksheet::new("qPCR");
        add_row(
            &mut sheet,
            2,
            &[("A", "S001"), ("B", "ORF1ab"), ("D", "POSITIVE"),
              ("E", "2024-03-15T09:30:00"), ("F", "tech1")],
        );
        let mut run = ImportRun::new(QpcrImporter::new(), &store, sheet);
        run.process(true).await.unwrap();

        assert!(run.output().is_empty());
        let error = &run.messages().all()[0];
        assert_eq!(error.column.as_deref(), Some("C"));
        assert!(error.text.contains("required for a positive call"));
    }

    #[tokio::test]
    async fn test_negative_call_with_ct_is_noted() {
        let store = seeded_store();
        let mut sheet = Worksheet::new("qPCR");
        add_row(
            &mut sheet,
            2,
            &[("A", "S002"), ("B", "ORF1ab"), ("C", "38.0"), ("D", "NEGATIVE"),
              ("E", "2024-03-15T09:30:00"), ("F", "tech1")],
        );
        let mut run = ImportRun::new(QpcrImporter::new(), &store, sheet);
        run.process(true).await.unwrap();

        assert_eq!(run.output().count(Classification::Created), 1);
        assert!(!run.messages().has_errors());
        assert!(run.messages().all()[0].text.contains("negative call"));
    }

    #[tokio::test]
    async fn test_disposed_specimen_rejects_result() {
        let store = seeded_store();
        let mut disposed = Specimen::new("S003");
        disposed.status = SpecimenStatus::Disposed;
        store.put_specimen(disposed);

        let mut sheet = Worksheet::new("qPCR");
        add_row(
            &mut sheet,
            2,
            &[("A", "S003"), ("B", "ORF1ab"), ("C", "23.4"), ("D", "POSITIVE"),
              ("E", "2024-03-15T09:30:00"), ("F", "tech1")],
        );
        let mut run = ImportRun::new(QpcrImporter::new(), &store, sheet);
        run.process(true).await.unwrap();

        assert!(run.output().is_empty());
        assert!(run.messages().all()[0].text.contains("disposed"));
        assert!(store.results_for("S003").is_empty());
    }

    #[tokio::test]
    async fn test_already_resulted_specimen_is_updated() {
        let store = seeded_store();
        let mut resulted = store.specimen("S001").unwrap();
        resulted.status = SpecimenStatus::Resulted;
        store.put_specimen(resulted);

        let mut sheet = Worksheet::new("qPCR");
        add_row(
            &mut sheet,
            2,
            &[("A", "S001"), ("B", "ORF1ab"), ("C", "23.4"), ("D", "POSITIVE"),
              ("E", "2024-03-15T09:30:00"), ("F", "tech1")],
        );
        let mut run = ImportRun::new(QpcrImporter::new(), &store, sheet);
        run.process(false).await.unwrap();

        assert_eq!(
            run.output().records(Classification::Updated),
            &[RecordRef::specimen("S001")]
        );
    }
}
