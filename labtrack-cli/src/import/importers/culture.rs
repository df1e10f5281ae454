//! Culture result importer
//!
//! Header row then one row per specimen: accession, growth flag, organism,
//! days to positivity, resulted-at timestamp, technician. Growth rows must
//! name the organism and the incubation time; no-growth rows record a fixed
//! NO GROWTH value.

use anyhow::Result;

use crate::import::cache::ResolutionCache;
use crate::import::columns::ColumnMap;
use crate::import::output::{Classification, RecordRef};
use crate::import::pipeline::{RowImporter, RunContext, resolve_cached};
use crate::import::validate::FieldCheck;
use crate::import::worksheet::Worksheet;
use crate::store::{AssayKind, AssayResult, Mutation, RecordStore, Specimen, SpecimenStatus};

const NO_GROWTH: &str = "NO GROWTH";

pub struct CultureImporter {
    columns: ColumnMap,
    specimens: ResolutionCache<Specimen>,
}

impl CultureImporter {
    pub fn new() -> Self {
        CultureImporter {
            columns: ColumnMap::new(&[
                ("specimen accession", "A"),
                ("growth", "B"),
                ("organism", "C"),
                ("days to positivity", "D"),
                ("resulted at", "E"),
                ("technician", "F"),
            ]),
            specimens: ResolutionCache::new(),
        }
    }
}

impl Default for CultureImporter {
    fn default() -> Self {
        CultureImporter::new()
    }
}

impl<S: RecordStore> RowImporter<S> for CultureImporter {
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
        let growth = check.required_bool(sheet.value(row, "B"), "B", "growth");
        let organism = check.optional_text(sheet.value(row, "C"), "C", "organism");
        let organism = match organism {
            Some(Some(o)) => check.max_len(Some(o), 120, "C", "organism").map(Some),
            other => other,
        };
        let days = check.optional_int(sheet.value(row, "D"), "D", "days to positivity", 0, 42);
        let resulted_at = check.required_datetime(sheet.value(row, "E"), "E", "resulted at");
        let technician = check.required_text(sheet.value(row, "F"), "F", "technician");

        let (Some(accession), Some(growth), Some(organism), Some(days), Some(resulted_at), Some(technician)) =
            (accession, growth, organism, days, resulted_at, technician)
        else {
            return Ok(());
        };

        let value = if growth {
            let mut usable = true;
            if organism.is_none() {
                check.fail("C", "organism is required when growth is reported");
                usable = false;
            }
            if days.is_none() {
                check.fail("D", "days to positivity is required when growth is reported");
                usable = false;
            }
            if !usable {
                return Ok(());
            }
            organism.clone().unwrap_or_default()
        } else {
            if organism.is_some() {
                check.note("C", "organism is ignored for a no-growth culture");
            }
            NO_GROWTH.to_string()
        };

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
            || store.result_count(&accession, AssayKind::Culture).await? > 0;

        let mut result =
            AssayResult::new(&accession, AssayKind::Culture, value, technician, resulted_at);
        result.measure = if growth { days.map(|d| d as f64) } else { None };
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
