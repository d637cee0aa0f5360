mod config;

pub use config::SqliteSourceConfig;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension};

use tabledump_api::{
    ColumnInfo, CreateStatement, Row, RowCursor, ScanKind, SourceError, TableHandle, TableSource,
    Value,
};

type SharedConn = Arc<Mutex<Connection>>;

fn db_err(e: rusqlite::Error) -> SourceError {
    SourceError::io(e.to_string())
}

fn lock(conn: &SharedConn) -> MutexGuard<'_, Connection> {
    match conn.lock() {
        Ok(g) => g,
        Err(poisoned) => {
            tracing::warn!("sqlite connection lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Scan kind implied by a declared column type, following SQLite's column
/// affinity rules.
fn affinity(decl: &str) -> ScanKind {
    let decl = decl.to_ascii_uppercase();
    if decl.contains("INT") {
        ScanKind::Int64
    } else if decl.contains("CHAR") || decl.contains("CLOB") || decl.contains("TEXT") {
        ScanKind::Text
    } else if decl.is_empty() || decl.contains("BLOB") {
        ScanKind::Bytes
    } else if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
        ScanKind::Float64
    } else {
        ScanKind::Decimal
    }
}

fn to_value(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(t) => Value::Text(t.to_vec()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

// ═══════════════════════════════════════════════════════════════
//  SqliteSource
// ═══════════════════════════════════════════════════════════════

/// SQLite database as a dump source.
pub struct SqliteSource {
    conn: SharedConn,
    page_size: usize,
}

impl std::fmt::Debug for SqliteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSource")
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl SqliteSource {
    /// Open the database file read-only.
    pub fn open(config: &SqliteSourceConfig) -> Result<Self, SourceError> {
        if config.page_size == 0 {
            return Err(SourceError::config("page_size must be at least 1"));
        }
        let conn = Connection::open_with_flags(
            &config.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| db_err(e).with_context(config.path.display()))?;
        tracing::info!(path = %config.path.display(), "opened sqlite database");
        Ok(Self::from_connection(conn, config.page_size))
    }

    /// Wrap an already open connection.
    pub fn from_connection(conn: Connection, page_size: usize) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            page_size: page_size.max(1),
        }
    }
}

impl TableSource for SqliteSource {
    fn server_version(&self) -> Result<String, SourceError> {
        let conn = lock(&self.conn);
        let version: String = conn
            .query_row("SELECT sqlite_version()", [], |r| r.get(0))
            .map_err(db_err)?;
        Ok(format!("SQLite {version}"))
    }

    fn table_names(&self) -> Result<Vec<String>, SourceError> {
        let conn = lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
                 ORDER BY name",
            )
            .map_err(db_err)?;
        let names = stmt
            .query_map([], |r| r.get::<_, String>(0))
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(names)
    }

    fn table(&self, name: &str) -> Result<Box<dyn TableHandle>, SourceError> {
        Ok(Box::new(SqliteTable {
            conn: self.conn.clone(),
            name: name.to_string(),
            page_size: self.page_size,
        }))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Table handle
// ═══════════════════════════════════════════════════════════════

struct SqliteTable {
    conn: SharedConn,
    name: String,
    page_size: usize,
}

impl TableHandle for SqliteTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_statement(&self) -> Result<CreateStatement, SourceError> {
        let conn = lock(&self.conn);
        let found: Option<(String, Option<String>)> = conn
            .query_row(
                "SELECT name, sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [&self.name],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .map_err(db_err)?;
        match found {
            Some((table, Some(sql))) => Ok(CreateStatement { table, sql }),
            Some((_, None)) => Err(SourceError::schema(format!(
                "no create statement recorded for '{}'",
                self.name
            ))),
            None => Err(SourceError::schema(format!("table not found: {}", self.name))),
        }
    }

    fn open_cursor(&mut self) -> Result<Box<dyn RowCursor>, SourceError> {
        let ident = quote_ident(&self.name);
        let conn = lock(&self.conn);

        let stmt = conn
            .prepare(&format!("SELECT * FROM {ident} LIMIT 0"))
            .map_err(db_err)?;
        let columns: Vec<ColumnInfo> = stmt
            .columns()
            .iter()
            .map(|c| {
                let decl = c.decl_type().unwrap_or("").trim().to_ascii_uppercase();
                let scan = affinity(&decl);
                ColumnInfo::new(c.name(), decl, Some(scan))
            })
            .collect();
        drop(stmt);

        let paging = if conn
            .prepare(&format!("SELECT rowid FROM {ident} LIMIT 0"))
            .is_ok()
        {
            Paging::Rowid {
                first: format!("SELECT rowid, * FROM {ident} ORDER BY rowid LIMIT ?1"),
                next: format!("SELECT rowid, * FROM {ident} WHERE rowid > ?1 ORDER BY rowid LIMIT ?2"),
                last: None,
            }
        } else {
            tracing::debug!(table = %self.name, "table has no rowid, paging by offset");
            Paging::Offset {
                sql: format!("SELECT * FROM {ident} LIMIT ?1 OFFSET ?2"),
                offset: 0,
            }
        };
        drop(conn);

        Ok(Box::new(SqliteCursor {
            conn: self.conn.clone(),
            table: self.name.clone(),
            columns,
            paging,
            page: VecDeque::new(),
            page_size: self.page_size,
            exhausted: false,
        }))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Cursor
// ═══════════════════════════════════════════════════════════════

enum Paging {
    /// Keyset pagination on the implicit rowid. `last` is `None` until the
    /// first page has been read, so `i64::MIN` is a valid rowid.
    Rowid { first: String, next: String, last: Option<i64> },
    /// `WITHOUT ROWID` tables.
    Offset { sql: String, offset: u64 },
}

/// Forward-only cursor that reads the table in pages so that no statement
/// stays open between calls.
struct SqliteCursor {
    conn: SharedConn,
    table: String,
    columns: Vec<ColumnInfo>,
    paging: Paging,
    page: VecDeque<Row>,
    page_size: usize,
    exhausted: bool,
}

impl SqliteCursor {
    fn fetch_page(&mut self) -> Result<(), SourceError> {
        let ncols = self.columns.len();
        let limit = self.page_size as i64;
        let conn = lock(&self.conn);

        let fetched = match &mut self.paging {
            Paging::Rowid { first, next, last } => {
                let sql = if last.is_some() { next } else { first };
                let mut stmt = conn.prepare_cached(sql).map_err(db_err)?;
                let mut rows = match *last {
                    Some(after) => stmt.query(rusqlite::params![after, limit]),
                    None => stmt.query(rusqlite::params![limit]),
                }
                .map_err(db_err)?;
                let mut n = 0;
                while let Some(row) = rows.next().map_err(db_err)? {
                    *last = Some(row.get(0).map_err(db_err)?);
                    let mut values = Vec::with_capacity(ncols);
                    for i in 1..=ncols {
                        values.push(to_value(row.get_ref(i).map_err(db_err)?));
                    }
                    self.page.push_back(Row(values));
                    n += 1;
                }
                n
            }
            Paging::Offset { sql, offset } => {
                let mut stmt = conn.prepare_cached(sql).map_err(db_err)?;
                let mut rows = stmt
                    .query(rusqlite::params![limit, *offset as i64])
                    .map_err(db_err)?;
                let mut n = 0;
                while let Some(row) = rows.next().map_err(db_err)? {
                    let mut values = Vec::with_capacity(ncols);
                    for i in 0..ncols {
                        values.push(to_value(row.get_ref(i).map_err(db_err)?));
                    }
                    self.page.push_back(Row(values));
                    n += 1;
                }
                *offset += n as u64;
                n
            }
        };

        if fetched < self.page_size {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl RowCursor for SqliteCursor {
    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>, SourceError> {
        if self.page.is_empty() && !self.exhausted {
            self.fetch_page()
                .map_err(|e| e.with_context(format!("table '{}'", self.table)))?;
        }
        Ok(self.page.pop_front())
    }
}
