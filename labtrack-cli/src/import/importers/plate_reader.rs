//! Plate-reader export importer
//!
//! The instrument export carries the plate barcode in header cell B1, a
//! column-heading row, then one row per well: position, specimen accession,
//! reading. An unreadable header is a structural failure that aborts the
//! whole run; row problems accumulate per row as usual.

use anyhow::{Result, bail};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::import::cache::ResolutionCache;
use crate::import::columns::ColumnMap;
use crate::import::output::{Classification, RecordRef};
use crate::import::pipeline::{RowImporter, RunContext, resolve_cached};
use crate::import::validate::FieldCheck;
use crate::import::worksheet::Worksheet;
use crate::store::{Mutation, Plate, PlateStatus, RecordStore, Specimen, Well};

static WELL_POSITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-H])(0?[1-9]|1[0-2])$").expect("valid well pattern"));

/// Accepts "A1" and zero-padded "A01" forms; yields the canonical "A1" form
fn normalize_position(raw: &str) -> Option<String> {
    let upper = raw.to_uppercase();
    let caps = WELL_POSITION.captures(&upper)?;
    Some(format!("{}{}", &caps[1], caps[2].trim_start_matches('0')))
}

pub struct PlateReaderImporter {
    columns: ColumnMap,
    specimens: ResolutionCache<Specimen>,
    wells: ResolutionCache<Well>,
    plate: Option<Plate>,
}

impl PlateReaderImporter {
    pub fn new() -> Self {
        PlateReaderImporter {
            columns: ColumnMap::new(&[
                ("well position", "A"),
                ("specimen accession", "B"),
                ("reading", "C"),
            ]),
            specimens: ResolutionCache::new(),
            wells: ResolutionCache::new(),
            plate: None,
        }
    }
}

impl Default for PlateReaderImporter {
    fn default() -> Self {
        PlateReaderImporter::new()
    }
}

impl<S: RecordStore> RowImporter<S> for PlateReaderImporter {
    fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    // Row 1 is the instrument header, row 2 the column headings
    fn first_data_row(&self) -> u32 {
        3
    }

    async fn prepare(&mut self, sheet: &Worksheet, ctx: &mut RunContext<'_, S>) -> Result<()> {
        let barcode = match sheet.value(1, "B") {
            Some(cell) => match cell.as_text() {
                Some(text) => text.to_string(),
                None => bail!("plate barcode cell B1 does not hold text"),
            },
            None => bail!("plate barcode cell B1 is missing"),
        };
        let plate = ctx.store.find_plate(&barcode).await?;
        let Some(plate) = plate else {
            bail!("plate {} is not registered", barcode);
        };
        if !plate.may_record_readings() {
            bail!("plate {} is archived and cannot receive readings", barcode);
        }
        if plate.status != PlateStatus::Read {
            let mut read = plate.clone();
            read.status = PlateStatus::Read;
            ctx.session.stage(Mutation::UpdatePlate(read));
        }
        self.plate = Some(plate);
        Ok(())
    }

    async fn import_row(
        &mut self,
        sheet: &Worksheet,
        row: u32,
        ctx: &mut RunContext<'_, S>,
    ) -> Result<()> {
        let barcode = match &self.plate {
            Some(plate) => plate.barcode.clone(),
            None => bail!("plate reader import was not prepared"),
        };

        let mut check = FieldCheck::new(row, ctx.messages);
        let raw_position = check.required_text(sheet.value(row, "A"), "A", "well position");
        let accession = check.required_text(sheet.value(row, "B"), "B", "specimen accession");
        let reading = check.required_decimal(sheet.value(row, "C"), "C", "reading", 0.0, 10.0);

        let (Some(raw_position), Some(accession), Some(reading)) =
            (raw_position, accession, reading)
        else {
            return Ok(());
        };

        let Some(position) = normalize_position(&raw_position) else {
            check.fail("A", "well position must be in the A1 to H12 range");
            return Ok(());
        };

        let store = ctx.store;
        let specimen =
            resolve_cached(&mut self.specimens, &accession, || store.find_specimen(&accession))
                .await?;
        let Some(specimen) = specimen else {
            ctx.messages.error(
                Some(row),
                Some("B"),
                format!("specimen {} not found", accession),
            );
            return Ok(());
        };
        if !specimen.may_attach_result() {
            ctx.messages.error(
                Some(row),
                Some("B"),
                format!("specimen {} is disposed", accession),
            );
            return Ok(());
        }

        let existing = resolve_cached(&mut self.wells, &position, || {
            store.find_well(&barcode, &position)
        })
        .await?;
        if !self.wells.claim(&position) {
            ctx.messages.error(
                Some(row),
                Some("A"),
                format!("well {} occurs more than once in this sheet", position),
            );
            return Ok(());
        }

        let (mut well, classification) = match existing {
            Some(well) if well.has_reading() => (well, Classification::Updated),
            Some(well) => (well, Classification::Created),
            None => (Well::new(&barcode, &position), Classification::Created),
        };
        well.specimen_accession = Some(accession);
        well.reading = Some(reading);
        well.read_at = Some(Utc::now());
        ctx.session.stage(Mutation::UpsertWell(well));
        ctx.output
            .add(classification, RecordRef::well(&barcode, &position));
        Ok(())
    }
}
