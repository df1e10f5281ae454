//! Participant roster importer
//!
//! Header row then one row per participant: external id, family name, given
//! name, date of birth, group code, enrolled flag. Known participants are
//! updated in place; unknown ones are created in their group.

use anyhow::Result;

use crate::import::cache::ResolutionCache;
use crate::import::columns::ColumnMap;
use crate::import::output::{Classification, RecordRef};
use crate::import::pipeline::{RowImporter, RunContext, resolve_cached};
use crate::import::validate::FieldCheck;
use crate::import::worksheet::Worksheet;
use crate::store::{Mutation, Participant, ParticipantGroup, RecordStore};

pub struct RosterImporter {
    columns: ColumnMap,
    groups: ResolutionCache<ParticipantGroup>,
    participants: ResolutionCache<Participant>,
}

impl RosterImporter {
    pub fn new() -> Self {
        RosterImporter {
            columns: ColumnMap::new(&[
                ("participant id", "A"),
                ("family name", "B"),
                ("given name", "C"),
                ("date of birth", "D"),
                ("group code", "E"),
                ("enrolled", "F"),
            ]),
            groups: ResolutionCache::new(),
            participants: ResolutionCache::new(),
        }
    }
}

impl Default for RosterImporter {
    fn default() -> Self {
        RosterImporter::new()
    }
}

impl<S: RecordStore> RowImporter<S> for RosterImporter {
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

        let external_id = check.required_text(sheet.value(row, "A"), "A", "participant id");
        let family_name = check.required_text(sheet.value(row, "B"), "B", "family name");
        let family_name = check.max_len(family_name, 80, "B", "family name");
        let given_name = check.optional_text(sheet.value(row, "C"), "C", "given name");
        let date_of_birth = check.optional_datetime(sheet.value(row, "D"), "D", "date of birth");
        let group_code = check.required_text(sheet.value(row, "E"), "E", "group code");
        let enrolled = check.optional_bool(sheet.value(row, "F"), "F", "enrolled");

        let (
            Some(external_id),
            Some(family_name),
            Some(given_name),
            Some(date_of_birth),
            Some(group_code),
            Some(enrolled),
        ) = (external_id, family_name, given_name, date_of_birth, group_code, enrolled)
        else {
            return Ok(());
        };

        if given_name.is_none() {
            check.note("C", "given name is blank");
        }

        let store = ctx.store;
        let group =
            resolve_cached(&mut self.groups, &group_code, || store.find_group(&group_code))
                .await?;
        let Some(group) = group else {
            ctx.messages.error(
                Some(row),
                Some("E"),
                format!("group {} not found", group_code),
            );
            return Ok(());
        };
        if !group.may_enroll() {
            ctx.messages.error(
                Some(row),
                Some("E"),
                format!("group {} is closed to enrollment", group_code),
            );
            return Ok(());
        }

        let existing = resolve_cached(&mut self.participants, &external_id, || {
            store.find_participant(&external_id)
        })
        .await?;
        if !self.participants.claim(&external_id) {
            ctx.messages.error(
                Some(row),
                Some("A"),
                format!("participant {} occurs more than once in this sheet", external_id),
            );
            return Ok(());
        }

        let date_of_birth = date_of_birth.map(|dt| dt.date_naive());
        match existing {
            Some(mut participant) => {
                participant.family_name = family_name;
                participant.given_name = given_name;
                participant.date_of_birth = date_of_birth;
                participant.group_code = group_code;
                if let Some(enrolled) = enrolled {
                    participant.enrolled = enrolled;
                }
                ctx.session.stage(Mutation::UpdateParticipant(participant));
                ctx.output
                    .add(Classification::Updated, RecordRef::participant(external_id));
            }
            None => {
                let mut participant = Participant::new(&external_id, family_name);
                participant.given_name = given_name;
                participant.date_of_birth = date_of_birth;
                participant.group_code = group_code;
                participant.enrolled = enrolled.unwrap_or(true);
                ctx.session.stage(Mutation::CreateParticipant(participant));
                ctx.output
                    .add(Classification::Created, RecordRef::participant(external_id));
            }
        }
        Ok(())
    }
}
