use tabledump_api::{RowCursor, TableHandle};

use crate::classify::{ColumnDescriptor, Strategy, describe};
use crate::encode::encode_row_into;
use crate::error::DumpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Cursor not opened yet.
    Idle,
    Open,
    /// Cursor exhausted and closed.
    Drained,
    /// Cursor closed after an error.
    Failed,
}

/// Streaming session over one table.
///
/// Owns the table's cursor and the column strategies computed when it was
/// opened. The cursor is dropped (closed) exactly once: on exhaustion or on
/// the first error.
pub struct TableSession {
    name: String,
    handle: Box<dyn TableHandle>,
    cursor: Option<Box<dyn RowCursor>>,
    columns: Vec<ColumnDescriptor>,
    strategies: Vec<Strategy>,
    state: State,
    rows: u64,
}

impl std::fmt::Debug for TableSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableSession")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("rows", &self.rows)
            .finish()
    }
}

impl TableSession {
    pub fn new(handle: Box<dyn TableHandle>) -> Self {
        Self {
            name: handle.name().to_string(),
            handle,
            cursor: None,
            columns: Vec::new(),
            strategies: Vec::new(),
            state: State::Idle,
            rows: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Rows read so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Fetch the table's creation statement, checking that the server
    /// answered for the table we asked about.
    pub fn create_statement(&self) -> Result<String, DumpError> {
        let stmt = self.handle.create_statement().map_err(|e| DumpError::Schema {
            table: self.name.clone(),
            detail: e.to_string(),
        })?;
        if stmt.table != self.name {
            return Err(DumpError::Schema {
                table: self.name.clone(),
                detail: format!("server returned create statement for '{}'", stmt.table),
            });
        }
        Ok(stmt.sql)
    }

    /// Open the cursor and classify its columns.
    pub fn init(&mut self) -> Result<(), DumpError> {
        if self.state != State::Idle {
            return Err(DumpError::Reinitialization(self.name.clone()));
        }

        let cursor = match self.handle.open_cursor() {
            Ok(c) => c,
            Err(e) => {
                self.state = State::Failed;
                return Err(DumpError::cursor(&self.name, e));
            }
        };
        if cursor.columns().is_empty() {
            self.state = State::Failed;
            return Err(DumpError::NoColumns(self.name.clone()));
        }

        self.columns = describe(cursor.columns());
        self.strategies = self.columns.iter().map(|c| c.strategy).collect();
        self.cursor = Some(cursor);
        self.state = State::Open;
        tracing::debug!(table = %self.name, columns = self.columns.len(), "opened table cursor");
        Ok(())
    }

    /// Read the next row and encode it into `out` (cleared first).
    ///
    /// Returns `Ok(false)` once the table is exhausted. Opens the cursor on
    /// first use.
    pub fn next_tuple(&mut self, out: &mut Vec<u8>) -> Result<bool, DumpError> {
        match self.state {
            State::Idle => self.init()?,
            State::Open => {}
            State::Drained | State::Failed => return Ok(false),
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(false);
        };

        let row = match cursor.next_row() {
            Ok(Some(row)) => row,
            Ok(None) => {
                self.close(State::Drained);
                return Ok(false);
            }
            Err(e) => {
                self.close(State::Failed);
                return Err(DumpError::cursor(&self.name, e));
            }
        };

        out.clear();
        if let Err(e) = encode_row_into(out, &row, &self.strategies) {
            self.close(State::Failed);
            return Err(DumpError::cursor(&self.name, e.with_context(format!("row {}", self.rows + 1))));
        }
        self.rows += 1;
        Ok(true)
    }

    fn close(&mut self, state: State) {
        self.cursor = None;
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabledump_api::{ColumnInfo, ScanKind, Value};
    use tabledump_source_memory::{MemoryTable, MemoryTableHandle};

    fn orders() -> MemoryTable {
        MemoryTable::new(
            "orders",
            vec![
                ColumnInfo::new("id", "INT", Some(ScanKind::Int64)),
                ColumnInfo::new("note", "VARCHAR", Some(ScanKind::Text)),
            ],
        )
        .with_row(vec![Value::Int64(1), "first".into()])
        .with_row(vec![Value::Int64(2), Value::Null])
    }

    fn session(table: MemoryTable) -> TableSession {
        TableSession::new(Box::new(MemoryTableHandle::new(table.into())))
    }

    #[test]
    fn reads_and_encodes_rows() {
        let mut s = session(orders());
        let mut buf = Vec::new();
        assert!(s.next_tuple(&mut buf).unwrap());
        assert_eq!(buf, b"(1,'first')");
        assert!(s.next_tuple(&mut buf).unwrap());
        assert_eq!(buf, b"(2,NULL)");
        assert!(!s.next_tuple(&mut buf).unwrap());
        assert!(!s.next_tuple(&mut buf).unwrap());
        assert_eq!(s.rows(), 2);
        assert_eq!(s.columns()[0].strategy, Strategy::Integer);
    }

    #[test]
    fn init_twice_is_an_error() {
        let mut s = session(orders());
        s.init().unwrap();
        assert!(matches!(s.init(), Err(DumpError::Reinitialization(t)) if t == "orders"));
    }

    #[test]
    fn zero_columns_is_an_error() {
        let mut s = session(MemoryTable::new("empty", vec![]));
        let mut buf = Vec::new();
        assert!(matches!(s.next_tuple(&mut buf), Err(DumpError::NoColumns(t)) if t == "empty"));
        assert!(!s.next_tuple(&mut buf).unwrap());
    }

    #[test]
    fn create_statement_name_mismatch() {
        let s = session(orders().with_reported_name("orders_old"));
        let err = s.create_statement().unwrap_err();
        assert!(matches!(err, DumpError::Schema { ref table, .. } if table == "orders"));
        assert!(err.to_string().contains("orders_old"));
    }

    #[test]
    fn cursor_failure_stops_session() {
        let mut s = session(orders().with_failure_after(1));
        let mut buf = Vec::new();
        assert!(s.next_tuple(&mut buf).unwrap());
        assert!(matches!(s.next_tuple(&mut buf), Err(DumpError::Cursor { .. })));
        assert!(!s.next_tuple(&mut buf).unwrap());
        assert_eq!(s.rows(), 1);
    }

    #[test]
    fn scan_failure_is_cursor_error() {
        let table = MemoryTable::new(
            "bad",
            vec![ColumnInfo::new("id", "INT", Some(ScanKind::Int32))],
        )
        .with_row(vec!["not a number".into()]);
        let mut s = session(table);
        let err = s.next_tuple(&mut Vec::new()).unwrap_err();
        let DumpError::Cursor { table, source } = err else {
            panic!("expected cursor error");
        };
        assert_eq!(table, "bad");
        assert!(source.message.starts_with("row 1: column 0"));
    }
}
