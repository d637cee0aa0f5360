use crate::column::ColumnInfo;
use crate::error::SourceError;
use crate::value::Row;

/// Result of asking the server for a table's creation statement.
///
/// `table` is the name the server reported back, which the engine compares
/// against the requested one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateStatement {
    pub table: String,
    pub sql: String,
}

/// Forward-only, row-at-a-time reader over one table.
///
/// Dropping the cursor closes it.
pub trait RowCursor: Send {
    /// Column metadata, fixed for the lifetime of the cursor.
    fn columns(&self) -> &[ColumnInfo];

    /// Fetch the next row. `Ok(None)` once the table is exhausted.
    fn next_row(&mut self) -> Result<Option<Row>, SourceError>;
}

/// One table of a source.
pub trait TableHandle: Send {
    /// Name the handle was opened for.
    fn name(&self) -> &str;

    /// Ready-made `CREATE TABLE` statement.
    fn create_statement(&self) -> Result<CreateStatement, SourceError>;

    /// Open a cursor over all rows of the table.
    fn open_cursor(&mut self) -> Result<Box<dyn RowCursor>, SourceError>;
}

/// A database the engine can dump.
///
/// The engine doesn't know concrete implementations; a source is just this
/// trait. Connection setup happens before the source is handed over.
pub trait TableSource: Send + Sync {
    /// Server version string, stamped into the dump header.
    fn server_version(&self) -> Result<String, SourceError>;

    /// Names of all tables, in dump order.
    fn table_names(&self) -> Result<Vec<String>, SourceError>;

    /// Open a handle for one table.
    fn table(&self, name: &str) -> Result<Box<dyn TableHandle>, SourceError>;
}
