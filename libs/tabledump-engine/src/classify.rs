use tabledump_api::{ColumnInfo, ScanKind};

/// How a column's values are rendered into the dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Decimal digits, unquoted.
    Integer,
    /// Escaped, single-quoted string.
    Text,
    /// Escaped payload behind a `_binary` marker; empty payloads become `NULL`.
    Binary,
}

/// Per-column metadata captured once when a table's cursor is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub ordinal: usize,
    pub name: String,
    pub type_name: String,
    pub scan: Option<ScanKind>,
    pub strategy: Strategy,
}

impl ColumnDescriptor {
    pub fn new(ordinal: usize, info: &ColumnInfo) -> Self {
        Self {
            ordinal,
            name: info.name.clone(),
            type_name: info.type_name.clone(),
            scan: info.scan,
            strategy: classify(&info.type_name, info.scan),
        }
    }
}

/// Type names that denote a binary large object.
const BLOB_TYPES: &[&str] = &["BLOB", "TINYBLOB", "MEDIUMBLOB", "LONGBLOB"];

/// Pick the encoding strategy for a column. First match wins:
/// blob type name, then signed integer scan kind, then text.
pub fn classify(type_name: &str, scan: Option<ScanKind>) -> Strategy {
    let type_name = type_name.trim();
    if BLOB_TYPES.iter().any(|b| b.eq_ignore_ascii_case(type_name)) {
        Strategy::Binary
    } else if scan.is_some_and(ScanKind::is_signed_integer) {
        Strategy::Integer
    } else {
        Strategy::Text
    }
}

/// Describe every column of a freshly opened cursor.
pub fn describe(columns: &[ColumnInfo]) -> Vec<ColumnDescriptor> {
    columns
        .iter()
        .enumerate()
        .map(|(i, info)| ColumnDescriptor::new(i, info))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_name_wins_over_integer_scan() {
        assert_eq!(classify("BLOB", Some(ScanKind::Int64)), Strategy::Binary);
        assert_eq!(classify("longblob", None), Strategy::Binary);
    }

    #[test]
    fn signed_integers_only() {
        for kind in [ScanKind::Int8, ScanKind::Int16, ScanKind::Int32, ScanKind::Int64] {
            assert_eq!(classify("INT", Some(kind)), Strategy::Integer);
        }
        assert_eq!(classify("INT", Some(ScanKind::UInt64)), Strategy::Text);
        assert_eq!(classify("DECIMAL", Some(ScanKind::Decimal)), Strategy::Text);
    }

    #[test]
    fn unknown_scan_is_text() {
        assert_eq!(classify("INT", None), Strategy::Text);
        assert_eq!(classify("VARCHAR", Some(ScanKind::Text)), Strategy::Text);
        assert_eq!(classify("", None), Strategy::Text);
    }

    #[test]
    fn describe_keeps_ordinals() {
        let cols = vec![
            ColumnInfo::new("id", "INT", Some(ScanKind::Int64)),
            ColumnInfo::new("payload", "BLOB", Some(ScanKind::Bytes)),
            ColumnInfo::new("note", "TEXT", None),
        ];
        let desc = describe(&cols);
        assert_eq!(desc.len(), 3);
        assert_eq!(desc[1].ordinal, 1);
        assert_eq!(desc[1].name, "payload");
        let strategies: Vec<_> = desc.iter().map(|d| d.strategy).collect();
        assert_eq!(
            strategies,
            vec![Strategy::Integer, Strategy::Binary, Strategy::Text]
        );
    }
}
