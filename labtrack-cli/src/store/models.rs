//! Domain records referenced by imports
//!
//! Each record type carries its own workflow guard predicates ("may this
//! check-in decision be recorded now"). The import engine calls these and
//! treats `false` as a validation failure; it never overrides them.

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Enrollment state of a participant group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    /// Accepting new participants
    Enrolling,
    /// Closed to enrollment
    Closed,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Enrolling => "enrolling",
            GroupStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "enrolling" => Ok(GroupStatus::Enrolling),
            "closed" => Ok(GroupStatus::Closed),
            other => bail!("unknown group status: {}", other),
        }
    }
}

/// A participant group (study cohort)
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantGroup {
    pub id: Uuid,
    /// Natural key used on roster sheets
    pub code: String,
    pub name: String,
    pub status: GroupStatus,
}

impl ParticipantGroup {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        ParticipantGroup {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            status: GroupStatus::Enrolling,
        }
    }

    /// May a roster import enroll a participant into this group now?
    pub fn may_enroll(&self) -> bool {
        self.status == GroupStatus::Enrolling
    }
}

/// A study participant
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: Uuid,
    /// Natural key: the site-assigned participant identifier
    pub external_id: String,
    pub family_name: String,
    pub given_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub group_code: String,
    pub enrolled: bool,
}

impl Participant {
    pub fn new(external_id: impl Into<String>, family_name: impl Into<String>) -> Self {
        Participant {
            id: Uuid::new_v4(),
            external_id: external_id.into(),
            family_name: family_name.into(),
            given_name: None,
            date_of_birth: None,
            group_code: String::new(),
            enrolled: true,
        }
    }
}

/// Workflow state of a tube
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TubeStatus {
    /// Registered at collection, awaiting lab check-in
    Registered,
    /// Checked in and assigned to a plate
    CheckedIn,
    /// Rejected at check-in
    Rejected,
}

impl TubeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TubeStatus::Registered => "registered",
            TubeStatus::CheckedIn => "checked-in",
            TubeStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "registered" => Ok(TubeStatus::Registered),
            "checked-in" => Ok(TubeStatus::CheckedIn),
            "rejected" => Ok(TubeStatus::Rejected),
            other => bail!("unknown tube status: {}", other),
        }
    }
}

/// A physical specimen tube
#[derive(Debug, Clone, PartialEq)]
pub struct Tube {
    pub id: Uuid,
    /// Natural key: the accession identifier printed on the tube
    pub accession: String,
    pub status: TubeStatus,
    pub plate_barcode: Option<String>,
    pub kit_name: Option<String>,
    pub technician: Option<String>,
    pub checked_in_at: Option<DateTime<Utc>>,
}

impl Tube {
    pub fn new(accession: impl Into<String>) -> Self {
        Tube {
            id: Uuid::new_v4(),
            accession: accession.into(),
            status: TubeStatus::Registered,
            plate_barcode: None,
            kit_name: None,
            technician: None,
            checked_in_at: None,
        }
    }

    /// May a check-in decision be recorded for this tube now?
    pub fn may_record_checkin(&self) -> bool {
        self.status == TubeStatus::Registered
    }
}

/// Workflow state of a specimen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecimenStatus {
    /// Received and available for testing
    Received,
    /// At least one result has been recorded
    Resulted,
    /// Disposed; no further results may be attached
    Disposed,
}

impl SpecimenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecimenStatus::Received => "received",
            SpecimenStatus::Resulted => "resulted",
            SpecimenStatus::Disposed => "disposed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "received" => Ok(SpecimenStatus::Received),
            "resulted" => Ok(SpecimenStatus::Resulted),
            "disposed" => Ok(SpecimenStatus::Disposed),
            other => bail!("unknown specimen status: {}", other),
        }
    }
}

/// A specimen derived from a checked-in tube
#[derive(Debug, Clone, PartialEq)]
pub struct Specimen {
    pub id: Uuid,
    /// Natural key: the specimen accession identifier
    pub accession: String,
    pub status: SpecimenStatus,
}

impl Specimen {
    pub fn new(accession: impl Into<String>) -> Self {
        Specimen {
            id: Uuid::new_v4(),
            accession: accession.into(),
            status: SpecimenStatus::Received,
        }
    }

    /// May a new result be attached to this specimen now?
    pub fn may_attach_result(&self) -> bool {
        self.status != SpecimenStatus::Disposed
    }

    /// Has this specimen already been resulted at least once?
    pub fn is_resulted(&self) -> bool {
        self.status == SpecimenStatus::Resulted
    }
}

/// Workflow state of a well plate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateStatus {
    /// Being loaded with specimens
    Loading,
    /// Readings recorded by a plate reader
    Read,
    /// Archived; readings are frozen
    Archived,
}

impl PlateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlateStatus::Loading => "loading",
            PlateStatus::Read => "read",
            PlateStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "loading" => Ok(PlateStatus::Loading),
            "read" => Ok(PlateStatus::Read),
            "archived" => Ok(PlateStatus::Archived),
            other => bail!("unknown plate status: {}", other),
        }
    }
}

/// A well plate
#[derive(Debug, Clone, PartialEq)]
pub struct Plate {
    pub id: Uuid,
    /// Natural key: the plate barcode
    pub barcode: String,
    pub status: PlateStatus,
}

impl Plate {
    pub fn new(barcode: impl Into<String>) -> Self {
        Plate {
            id: Uuid::new_v4(),
            barcode: barcode.into(),
            status: PlateStatus::Loading,
        }
    }

    /// May plate-reader output be recorded against this plate now?
    pub fn may_record_readings(&self) -> bool {
        self.status != PlateStatus::Archived
    }

    /// May a check-in assign a tube to this plate now?
    pub fn may_accept_tubes(&self) -> bool {
        self.status == PlateStatus::Loading
    }
}

/// One well on a plate
#[derive(Debug, Clone, PartialEq)]
pub struct Well {
    pub id: Uuid,
    pub plate_barcode: String,
    /// Normalized position, e.g. "A1" .. "H12"
    pub position: String,
    pub specimen_accession: Option<String>,
    pub reading: Option<f64>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Well {
    pub fn new(plate_barcode: impl Into<String>, position: impl Into<String>) -> Self {
        Well {
            id: Uuid::new_v4(),
            plate_barcode: plate_barcode.into(),
            position: position.into(),
            specimen_accession: None,
            reading: None,
            read_at: None,
        }
    }

    pub fn has_reading(&self) -> bool {
        self.reading.is_some()
    }
}

/// Assay type a result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssayKind {
    Qpcr,
    Elisa,
    Culture,
}

impl AssayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssayKind::Qpcr => "qpcr",
            AssayKind::Elisa => "elisa",
            AssayKind::Culture => "culture",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "qpcr" => Ok(AssayKind::Qpcr),
            "elisa" => Ok(AssayKind::Elisa),
            "culture" => Ok(AssayKind::Culture),
            other => bail!("unknown assay kind: {}", other),
        }
    }
}

impl std::fmt::Display for AssayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recorded assay result
#[derive(Debug, Clone, PartialEq)]
pub struct AssayResult {
    pub id: Uuid,
    pub specimen_accession: String,
    pub assay: AssayKind,
    /// Qualitative call (e.g. POSITIVE, REACTIVE, an organism name)
    pub value: String,
    /// Quantitative measure where the assay has one (ct, OD, days)
    pub measure: Option<f64>,
    pub technician: String,
    pub resulted_at: DateTime<Utc>,
}

impl AssayResult {
    pub fn new(
        specimen_accession: impl Into<String>,
        assay: AssayKind,
        value: impl Into<String>,
        technician: impl Into<String>,
        resulted_at: DateTime<Utc>,
    ) -> Self {
        AssayResult {
            id: Uuid::new_v4(),
            specimen_accession: specimen_accession.into(),
            assay,
            value: value.into(),
            measure: None,
            technician: technician.into(),
            resulted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tube_checkin_guard() {
        let mut tube = Tube::new("T001");
        assert!(tube.may_record_checkin());

        tube.status = TubeStatus::CheckedIn;
        assert!(!tube.may_record_checkin());

        tube.status = TubeStatus::Rejected;
        assert!(!tube.may_record_checkin());
    }

    #[test]
    fn test_specimen_result_guard() {
        let mut specimen = Specimen::new("S001");
        assert!(specimen.may_attach_result());
        assert!(!specimen.is_resulted());

        specimen.status = SpecimenStatus::Resulted;
        assert!(specimen.may_attach_result());
        assert!(specimen.is_resulted());

        specimen.status = SpecimenStatus::Disposed;
        assert!(!specimen.may_attach_result());
    }

    #[test]
    fn test_plate_guards() {
        let mut plate = Plate::new("PLATE-9");
        assert!(plate.may_accept_tubes());
        assert!(plate.may_record_readings());

        plate.status = PlateStatus::Read;
        assert!(!plate.may_accept_tubes());
        assert!(plate.may_record_readings());

        plate.status = PlateStatus::Archived;
        assert!(!plate.may_record_readings());
    }

    #[test]
    fn test_status_round_trips() {
        for status in [TubeStatus::Registered, TubeStatus::CheckedIn, TubeStatus::Rejected] {
            assert_eq!(TubeStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(TubeStatus::parse("float-away").is_err());
        for kind in [AssayKind::Qpcr, AssayKind::Elisa, AssayKind::Culture] {
            assert_eq!(AssayKind::parse(kind.as_str()).unwrap(), kind);
        }
    }
}
