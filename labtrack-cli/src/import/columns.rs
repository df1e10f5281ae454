//! Column addressing for worksheets
//!
//! Worksheets are addressed by (1-based row, column letter). Each importer
//! declares a fixed `ColumnMap` from logical field name to column letter;
//! lab sheet layouts are fixed per document type, so there is no header
//! sniffing.

/// Convert a column label to a 0-based index ("A" -> 0, "Z" -> 25, "AA" -> 26)
pub fn column_index(label: &str) -> Option<u32> {
    if label.is_empty() {
        return None;
    }
    let mut index: u32 = 0;
    for ch in label.chars() {
        let ch = ch.to_ascii_uppercase();
        if !ch.is_ascii_uppercase() {
            return None;
        }
        index = index
            .checked_mul(26)?
            .checked_add(ch as u32 - 'A' as u32 + 1)?;
    }
    Some(index - 1)
}

/// Convert a 0-based index to a column label (0 -> "A", 26 -> "AA")
pub fn column_label(index: u32) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        out.push(b'A' + ((n - 1) % 26) as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Mapping from logical field name to column letter for one importer.
///
/// Static for the importer's lifetime; never mutated during a run. The field
/// names document the sheet layout; the letters drive blank-row detection.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    fields: Vec<(&'static str, &'static str)>,
}

impl ColumnMap {
    pub fn new(fields: &[(&'static str, &'static str)]) -> Self {
        ColumnMap {
            fields: fields.to_vec(),
        }
    }

    /// Iterate over all mapped column letters
    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(_, col)| *col)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_index_single_letter() {
        assert_eq!(column_index("A"), Some(0));
        assert_eq!(column_index("B"), Some(1));
        assert_eq!(column_index("Z"), Some(25));
    }

    #[test]
    fn test_column_index_multi_letter() {
        assert_eq!(column_index("AA"), Some(26));
        assert_eq!(column_index("AB"), Some(27));
        assert_eq!(column_index("AZ"), Some(51));
        assert_eq!(column_index("BA"), Some(52));
    }

    #[test]
    fn test_column_index_lowercase() {
        assert_eq!(column_index("a"), Some(0));
        assert_eq!(column_index("aa"), Some(26));
    }

    #[test]
    fn test_column_index_invalid() {
        assert_eq!(column_index(""), None);
        assert_eq!(column_index("1"), None);
        assert_eq!(column_index("A1"), None);
    }

    #[test]
    fn test_column_label_round_trip() {
        for index in 0..200 {
            let label = column_label(index);
            assert_eq!(column_index(&label), Some(index), "label {}", label);
        }
    }

    #[test]
    fn test_column_map_letters() {
        let map = ColumnMap::new(&[("tube", "A"), ("decision", "B")]);
        assert_eq!(map.len(), 2);
        let columns: Vec<_> = map.columns().collect();
        assert_eq!(columns, vec!["A", "B"]);
    }
}
