use std::sync::Arc;

use tabledump_api::{
    ColumnInfo, CreateStatement, Row, RowCursor, SourceError, TableHandle, TableSource, Value,
};

// ═══════════════════════════════════════════════════════════════
//  MemoryTable
// ═══════════════════════════════════════════════════════════════

/// A table held entirely in memory.
///
/// Besides plain data it can simulate two server misbehaviours: reporting a
/// different table name in its create statement, and failing the cursor
/// after a number of rows.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    columns: Vec<ColumnInfo>,
    rows: Vec<Row>,
    create_sql: Option<String>,
    reported_name: Option<String>,
    fail_after: Option<usize>,
}

impl MemoryTable {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
            create_sql: None,
            reported_name: None,
            fail_after: None,
        }
    }

    pub fn with_row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(Row(values));
        self
    }

    pub fn with_rows(mut self, rows: impl IntoIterator<Item = Vec<Value>>) -> Self {
        self.rows.extend(rows.into_iter().map(Row));
        self
    }

    pub fn with_create_sql(mut self, sql: impl Into<String>) -> Self {
        self.create_sql = Some(sql.into());
        self
    }

    /// Name returned alongside the create statement.
    pub fn with_reported_name(mut self, name: impl Into<String>) -> Self {
        self.reported_name = Some(name.into());
        self
    }

    /// Make the cursor fail instead of returning row `n` (0-based).
    pub fn with_failure_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Create statement synthesised from the column list.
    fn default_create_sql(&self) -> String {
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("  `{}` {}", c.name.replace('`', "``"), c.type_name))
            .collect();
        format!(
            "CREATE TABLE `{}` (\n{}\n)",
            self.name.replace('`', "``"),
            cols.join(",\n")
        )
    }
}

// ═══════════════════════════════════════════════════════════════
//  Handle + cursor
// ═══════════════════════════════════════════════════════════════

pub struct MemoryTableHandle {
    table: Arc<MemoryTable>,
}

impl MemoryTableHandle {
    pub fn new(table: Arc<MemoryTable>) -> Self {
        Self { table }
    }
}

impl TableHandle for MemoryTableHandle {
    fn name(&self) -> &str {
        &self.table.name
    }

    fn create_statement(&self) -> Result<CreateStatement, SourceError> {
        let table = self
            .table
            .reported_name
            .clone()
            .unwrap_or_else(|| self.table.name.clone());
        let sql = self
            .table
            .create_sql
            .clone()
            .unwrap_or_else(|| self.table.default_create_sql());
        Ok(CreateStatement { table, sql })
    }

    fn open_cursor(&mut self) -> Result<Box<dyn RowCursor>, SourceError> {
        Ok(Box::new(MemoryCursor {
            table: self.table.clone(),
            pos: 0,
        }))
    }
}

struct MemoryCursor {
    table: Arc<MemoryTable>,
    pos: usize,
}

impl RowCursor for MemoryCursor {
    fn columns(&self) -> &[ColumnInfo] {
        &self.table.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>, SourceError> {
        if self.table.fail_after == Some(self.pos) {
            return Err(SourceError::io(format!(
                "connection lost while reading row {}",
                self.pos + 1
            )));
        }
        let row = self.table.rows.get(self.pos).cloned();
        if row.is_some() {
            self.pos += 1;
        }
        Ok(row)
    }
}

impl Drop for MemoryCursor {
    fn drop(&mut self) {
        tracing::trace!(table = %self.table.name, rows = self.pos, "memory cursor closed");
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemorySource
// ═══════════════════════════════════════════════════════════════

/// In-memory database. Tables are listed in insertion order.
#[derive(Debug, Clone)]
pub struct MemorySource {
    server_version: String,
    tables: Vec<Arc<MemoryTable>>,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self {
            server_version: "memory".to_string(),
            tables: Vec::new(),
        }
    }
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server_version(mut self, version: impl Into<String>) -> Self {
        self.server_version = version.into();
        self
    }

    pub fn with_table(mut self, table: MemoryTable) -> Self {
        self.tables.push(Arc::new(table));
        self
    }
}

impl TableSource for MemorySource {
    fn server_version(&self) -> Result<String, SourceError> {
        Ok(self.server_version.clone())
    }

    fn table_names(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.tables.iter().map(|t| t.name.clone()).collect())
    }

    fn table(&self, name: &str) -> Result<Box<dyn TableHandle>, SourceError> {
        let table = self
            .tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| SourceError::schema(format!("table not found: {name}")))?;
        Ok(Box::new(MemoryTableHandle::new(table.clone())))
    }
}
