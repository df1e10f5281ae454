//! SQLite-backed record store
//!
//! The durable persistence layer behind the import engine. Lookups are by
//! natural key; `apply` writes a whole run's staged mutations inside one
//! transaction so a commit is all-or-nothing.

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::models::{
    AssayKind, AssayResult, GroupStatus, Participant, ParticipantGroup, Plate, PlateStatus,
    Specimen, SpecimenStatus, Tube, TubeStatus, Well,
};
use super::session::Mutation;
use super::RecordStore;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database file and ensure the schema
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open database: {}", path.display()))?;
        init_schema(&pool).await?;
        Ok(SqliteStore { pool })
    }

    /// In-memory database, used by tests
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("failed to open in-memory database")?;
        init_schema(&pool).await?;
        Ok(SqliteStore { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn init_schema(pool: &SqlitePool) -> Result<()> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS participant_groups (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            status TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS participants (
            id TEXT PRIMARY KEY,
            external_id TEXT NOT NULL UNIQUE,
            family_name TEXT NOT NULL,
            given_name TEXT,
            date_of_birth TEXT,
            group_code TEXT NOT NULL,
            enrolled INTEGER NOT NULL DEFAULT 1
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS tubes (
            id TEXT PRIMARY KEY,
            accession TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL,
            plate_barcode TEXT,
            kit_name TEXT,
            technician TEXT,
            checked_in_at TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS specimens (
            id TEXT PRIMARY KEY,
            accession TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS plates (
            id TEXT PRIMARY KEY,
            barcode TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS wells (
            id TEXT PRIMARY KEY,
            plate_barcode TEXT NOT NULL,
            position TEXT NOT NULL,
            specimen_accession TEXT,
            reading REAL,
            read_at TEXT,
            UNIQUE (plate_barcode, position)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS assay_results (
            id TEXT PRIMARY KEY,
            specimen_accession TEXT NOT NULL,
            assay TEXT NOT NULL,
            value TEXT NOT NULL,
            measure REAL,
            technician TEXT NOT NULL,
            resulted_at TEXT NOT NULL
        )
        "#,
    ];
    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("failed to initialize schema")?;
    }
    Ok(())
}

fn parse_id(row: &SqliteRow) -> Result<Uuid> {
    let id: String = row.try_get("id")?;
    Uuid::from_str(&id).context("malformed record id")
}

fn group_from_row(row: &SqliteRow) -> Result<ParticipantGroup> {
    let status: String = row.try_get("status")?;
    Ok(ParticipantGroup {
        id: parse_id(row)?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        status: GroupStatus::parse(&status)?,
    })
}

fn participant_from_row(row: &SqliteRow) -> Result<Participant> {
    Ok(Participant {
        id: parse_id(row)?,
        external_id: row.try_get("external_id")?,
        family_name: row.try_get("family_name")?,
        given_name: row.try_get("given_name")?,
        date_of_birth: row.try_get::<Option<NaiveDate>, _>("date_of_birth")?,
        group_code: row.try_get("group_code")?,
        enrolled: row.try_get::<i64, _>("enrolled")? != 0,
    })
}

fn tube_from_row(row: &SqliteRow) -> Result<Tube> {
    let status: String = row.try_get("status")?;
    Ok(Tube {
        id: parse_id(row)?,
        accession: row.try_get("accession")?,
        status: TubeStatus::parse(&status)?,
        plate_barcode: row.try_get("plate_barcode")?,
        kit_name: row.try_get("kit_name")?,
        technician: row.try_get("technician")?,
        checked_in_at: row.try_get::<Option<DateTime<Utc>>, _>("checked_in_at")?,
    })
}

fn specimen_from_row(row: &SqliteRow) -> Result<Specimen> {
    let status: String = row.try_get("status")?;
    Ok(Specimen {
        id: parse_id(row)?,
        accession: row.try_get("accession")?,
        status: SpecimenStatus::parse(&status)?,
    })
}

fn plate_from_row(row: &SqliteRow) -> Result<Plate> {
    let status: String = row.try_get("status")?;
    Ok(Plate {
        id: parse_id(row)?,
        barcode: row.try_get("barcode")?,
        status: PlateStatus::parse(&status)?,
    })
}

fn well_from_row(row: &SqliteRow) -> Result<Well> {
    Ok(Well {
        id: parse_id(row)?,
        plate_barcode: row.try_get("plate_barcode")?,
        position: row.try_get("position")?,
        specimen_accession: row.try_get("specimen_accession")?,
        reading: row.try_get("reading")?,
        read_at: row.try_get::<Option<DateTime<Utc>>, _>("read_at")?,
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn find_group(&self, code: &str) -> Result<Option<ParticipantGroup>> {
        let row = sqlx::query("SELECT id, code, name, status FROM participant_groups WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .context("failed to look up participant group")?;
        row.as_ref().map(group_from_row).transpose()
    }

    async fn find_participant(&self, external_id: &str) -> Result<Option<Participant>> {
        let row = sqlx::query(
            r#"
            SELECT id, external_id, family_name, given_name, date_of_birth, group_code, enrolled
            FROM participants WHERE external_id = ?
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to look up participant")?;
        row.as_ref().map(participant_from_row).transpose()
    }

    async fn find_tube(&self, accession: &str) -> Result<Option<Tube>> {
        let row = sqlx::query(
            r#"
            SELECT id, accession, status, plate_barcode, kit_name, technician, checked_in_at
            FROM tubes WHERE accession = ?
            "#,
        )
        .bind(accession)
        .fetch_optional(&self.pool)
        .await
        .context("failed to look up tube")?;
        row.as_ref().map(tube_from_row).transpose()
    }

    async fn find_specimen(&self, accession: &str) -> Result<Option<Specimen>> {
        let row = sqlx::query("SELECT id, accession, status FROM specimens WHERE accession = ?")
            .bind(accession)
            .fetch_optional(&self.pool)
            .await
            .context("failed to look up specimen")?;
        row.as_ref().map(specimen_from_row).transpose()
    }

    async fn find_plate(&self, barcode: &str) -> Result<Option<Plate>> {
        let row = sqlx::query("SELECT id, barcode, status FROM plates WHERE barcode = ?")
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await
            .context("failed to look up plate")?;
        row.as_ref().map(plate_from_row).transpose()
    }

    async fn find_well(&self, plate_barcode: &str, position: &str) -> Result<Option<Well>> {
        let row = sqlx::query(
            r#"
            SELECT id, plate_barcode, position, specimen_accession, reading, read_at
            FROM wells WHERE plate_barcode = ? AND position = ?
            "#,
        )
        .bind(plate_barcode)
        .bind(position)
        .fetch_optional(&self.pool)
        .await
        .context("failed to look up well")?;
        row.as_ref().map(well_from_row).transpose()
    }

    async fn result_count(&self, specimen_accession: &str, assay: AssayKind) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM assay_results WHERE specimen_accession = ? AND assay = ?",
        )
        .bind(specimen_accession)
        .bind(assay.as_str())
        .fetch_one(&self.pool)
        .await
        .context("failed to count results")?;
        Ok(row.try_get("n")?)
    }

    async fn apply(&self, mutations: &[Mutation]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("failed to start transaction")?;

        for mutation in mutations {
            match mutation {
                Mutation::CreateParticipant(p) => {
                    sqlx::query(
                        r#"
                        INSERT INTO participants
                            (id, external_id, family_name, given_name, date_of_birth, group_code, enrolled)
                        VALUES (?, ?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(p.id.to_string())
                    .bind(&p.external_id)
                    .bind(&p.family_name)
                    .bind(&p.given_name)
                    .bind(p.date_of_birth)
                    .bind(&p.group_code)
                    .bind(if p.enrolled { 1i64 } else { 0i64 })
                    .execute(&mut *tx)
                    .await
                    .context("failed to insert participant")?;
                }
                Mutation::UpdateParticipant(p) => {
                    sqlx::query(
                        r#"
                        UPDATE participants
                        SET family_name = ?, given_name = ?, date_of_birth = ?, group_code = ?, enrolled = ?
                        WHERE external_id = ?
                        "#,
                    )
                    .bind(&p.family_name)
                    .bind(&p.given_name)
                    .bind(p.date_of_birth)
                    .bind(&p.group_code)
                    .bind(if p.enrolled { 1i64 } else { 0i64 })
                    .bind(&p.external_id)
                    .execute(&mut *tx)
                    .await
                    .context("failed to update participant")?;
                }
                Mutation::UpdateTube(t) => {
                    sqlx::query(
                        r#"
                        UPDATE tubes
                        SET status = ?, plate_barcode = ?, kit_name = ?, technician = ?, checked_in_at = ?
                        WHERE accession = ?
                        "#,
                    )
                    .bind(t.status.as_str())
                    .bind(&t.plate_barcode)
                    .bind(&t.kit_name)
                    .bind(&t.technician)
                    .bind(t.checked_in_at)
                    .bind(&t.accession)
                    .execute(&mut *tx)
                    .await
                    .context("failed to update tube")?;
                }
                Mutation::CreateResult(r) => {
                    sqlx::query(
                        r#"
                        INSERT INTO assay_results
                            (id, specimen_accession, assay, value, measure, technician, resulted_at)
                        VALUES (?, ?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(r.id.to_string())
                    .bind(&r.specimen_accession)
                    .bind(r.assay.as_str())
                    .bind(&r.value)
                    .bind(r.measure)
                    .bind(&r.technician)
                    .bind(r.resulted_at)
                    .execute(&mut *tx)
                    .await
                    .context("failed to insert result")?;
                }
                Mutation::UpdateSpecimen(s) => {
                    sqlx::query("UPDATE specimens SET status = ? WHERE accession = ?")
                        .bind(s.status.as_str())
                        .bind(&s.accession)
                        .execute(&mut *tx)
                        .await
                        .context("failed to update specimen")?;
                }
                Mutation::UpsertWell(w) => {
                    sqlx::query(
                        r#"
                        INSERT INTO wells
                            (id, plate_barcode, position, specimen_accession, reading, read_at)
                        VALUES (?, ?, ?, ?, ?, ?)
                        ON CONFLICT (plate_barcode, position) DO UPDATE
                        SET specimen_accession = excluded.specimen_accession,
                            reading = excluded.reading,
                            read_at = excluded.read_at
                        "#,
                    )
                    .bind(w.id.to_string())
                    .bind(&w.plate_barcode)
                    .bind(&w.position)
                    .bind(&w.specimen_accession)
                    .bind(w.reading)
                    .bind(w.read_at)
                    .execute(&mut *tx)
                    .await
                    .context("failed to upsert well")?;
                }
                Mutation::UpdatePlate(p) => {
                    sqlx::query("UPDATE plates SET status = ? WHERE barcode = ?")
                        .bind(p.status.as_str())
                        .bind(&p.barcode)
                        .execute(&mut *tx)
                        .await
                        .context("failed to update plate")?;
                }
            }
        }

        tx.commit().await.context("failed to commit transaction")?;
        Ok(())
    }
}

/// Seed helpers used by setup tooling and tests
impl SqliteStore {
    pub async fn insert_group(&self, group: &ParticipantGroup) -> Result<()> {
        sqlx::query("INSERT INTO participant_groups (id, code, name, status) VALUES (?, ?, ?, ?)")
            .bind(group.id.to_string())
            .bind(&group.code)
            .bind(&group.name)
            .bind(group.status.as_str())
            .execute(&self.pool)
            .await
            .context("failed to insert group")?;
        Ok(())
    }

    pub async fn insert_tube(&self, tube: &Tube) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tubes (id, accession, status, plate_barcode, kit_name, technician, checked_in_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tube.id.to_string())
        .bind(&tube.accession)
        .bind(tube.status.as_str())
        .bind(&tube.plate_barcode)
        .bind(&tube.kit_name)
        .bind(&tube.technician)
        .bind(tube.checked_in_at)
        .execute(&self.pool)
        .await
        .context("failed to insert tube")?;
        Ok(())
    }

    pub async fn insert_specimen(&self, specimen: &Specimen) -> Result<()> {
        sqlx::query("INSERT INTO specimens (id, accession, status) VALUES (?, ?, ?)")
            .bind(specimen.id.to_string())
            .bind(&specimen.accession)
            .bind(specimen.status.as_str())
            .execute(&self.pool)
            .await
            .context("failed to insert specimen")?;
        Ok(())
    }

    pub async fn insert_plate(&self, plate: &Plate) -> Result<()> {
        sqlx::query("INSERT INTO plates (id, barcode, status) VALUES (?, ?, ?)")
            .bind(plate.id.to_string())
            .bind(&plate.barcode)
            .bind(plate.status.as_str())
            .execute(&self.pool)
            .await
            .context("failed to insert plate")?;
        Ok(())
    }
}
