//! Import output classification
//!
//! Each successfully processed row lands in exactly one classification
//! bucket. The output is built once per run and memoized by the pipeline;
//! callers render it as the preview table or the commit receipt.

use std::collections::BTreeMap;

/// Named bucket an importer sorts each successful row's record into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Classification {
    /// A new record was built
    Created,
    /// An existing record was mutated (e.g. a second result recorded
    /// against an already-resulted specimen)
    Updated,
    /// A check-in decision accepting the record
    Accepted,
    /// A check-in decision rejecting the record
    Rejected,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Created => write!(f, "created"),
            Classification::Updated => write!(f, "updated"),
            Classification::Accepted => write!(f, "accepted"),
            Classification::Rejected => write!(f, "rejected"),
        }
    }
}

/// Kind of domain record an output entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKind {
    Participant,
    Tube,
    Specimen,
    Plate,
    Well,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Participant => write!(f, "participant"),
            RecordKind::Tube => write!(f, "tube"),
            RecordKind::Specimen => write!(f, "specimen"),
            RecordKind::Plate => write!(f, "plate"),
            RecordKind::Well => write!(f, "well"),
        }
    }
}

/// Reference to an affected domain record by natural key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordRef {
    pub kind: RecordKind,
    pub key: String,
}

impl RecordRef {
    pub fn participant(key: impl Into<String>) -> Self {
        RecordRef {
            kind: RecordKind::Participant,
            key: key.into(),
        }
    }

    pub fn tube(key: impl Into<String>) -> Self {
        RecordRef {
            kind: RecordKind::Tube,
            key: key.into(),
        }
    }

    pub fn specimen(key: impl Into<String>) -> Self {
        RecordRef {
            kind: RecordKind::Specimen,
            key: key.into(),
        }
    }

    pub fn well(plate: &str, position: &str) -> Self {
        RecordRef {
            kind: RecordKind::Well,
            key: format!("{}:{}", plate, position),
        }
    }
}

impl std::fmt::Display for RecordRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.key)
    }
}

/// Classification map built by one import run
#[derive(Debug, Default)]
pub struct ImportOutput {
    buckets: BTreeMap<Classification, Vec<RecordRef>>,
}

impl ImportOutput {
    pub fn new() -> Self {
        ImportOutput::default()
    }

    pub fn add(&mut self, classification: Classification, record: RecordRef) {
        self.buckets.entry(classification).or_default().push(record);
    }

    /// Records under one classification, in row order
    pub fn records(&self, classification: Classification) -> &[RecordRef] {
        self.buckets
            .get(&classification)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn count(&self, classification: Classification) -> usize {
        self.records(classification).len()
    }

    pub fn total(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Iterate populated classifications in stable order
    pub fn classifications(&self) -> impl Iterator<Item = (Classification, &[RecordRef])> {
        self.buckets
            .iter()
            .map(|(classification, records)| (*classification, records.as_slice()))
    }

    /// Flatten to (classification, natural key) pairs, sorted; used to compare
    /// a preview run against a commit run.
    pub fn classified_keys(&self) -> Vec<(Classification, String)> {
        let mut pairs: Vec<(Classification, String)> = self
            .buckets
            .iter()
            .flat_map(|(classification, records)| {
                records
                    .iter()
                    .map(move |r| (*classification, r.key.clone()))
            })
            .collect();
        pairs.sort();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_accumulate_in_order() {
        let mut output = ImportOutput::new();
        output.add(Classification::Accepted, RecordRef::tube("T001"));
        output.add(Classification::Rejected, RecordRef::tube("T002"));
        output.add(Classification::Accepted, RecordRef::tube("T003"));

        let accepted: Vec<&str> = output
            .records(Classification::Accepted)
            .iter()
            .map(|r| r.key.as_str())
            .collect();
        assert_eq!(accepted, vec!["T001", "T003"]);
        assert_eq!(output.count(Classification::Rejected), 1);
        assert_eq!(output.count(Classification::Created), 0);
        assert_eq!(output.total(), 3);
    }

    #[test]
    fn test_classified_keys_sorted() {
        let mut output = ImportOutput::new();
        output.add(Classification::Updated, RecordRef::specimen("S9"));
        output.add(Classification::Created, RecordRef::specimen("S1"));

        assert_eq!(
            output.classified_keys(),
            vec![
                (Classification::Created, "S1".to_string()),
                (Classification::Updated, "S9".to_string()),
            ]
        );
    }

    #[test]
    fn test_well_ref_key_format() {
        let record = RecordRef::well("PLATE-9", "A1");
        assert_eq!(record.key, "PLATE-9:A1");
        assert_eq!(record.to_string(), "well PLATE-9:A1");
    }
}
