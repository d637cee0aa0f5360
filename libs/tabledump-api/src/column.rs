/// Language-level category a driver decodes a column into.
///
/// Sources report it when they know it; the classifier only cares whether it
/// is a signed integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Decimal,
    Bool,
    Text,
    Bytes,
    Time,
    Other,
}

impl ScanKind {
    pub fn is_signed_integer(self) -> bool {
        matches!(
            self,
            ScanKind::Int8 | ScanKind::Int16 | ScanKind::Int32 | ScanKind::Int64
        )
    }
}

/// Column metadata reported by a cursor when it is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Database type name as reported by the server (`"BLOB"`, `"INT"`, ...).
    pub type_name: String,
    /// `None` when the driver cannot tell.
    pub scan: Option<ScanKind>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, scan: Option<ScanKind>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            scan,
        }
    }
}
