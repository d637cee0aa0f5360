use std::path::{Path, PathBuf};
use std::sync::Arc;

use tabledump_api::TableSource;

use crate::batch::quote_ident;
use crate::config::DumpConfig;
use crate::error::DumpError;
use crate::stream::{StreamStats, stream_table};
use crate::table::TableSession;

const HEADER: &str = include_str!("../sql/header.sql");
const TABLE_HEAD: &str = include_str!("../sql/table_head.sql");
const TABLE_TAIL: &str = include_str!("../sql/table_tail.sql");
const FOOTER: &str = include_str!("../sql/footer.sql");

/// Counters for one dumped table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub name: String,
    pub stats: StreamStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpSummary {
    pub tables: Vec<TableSummary>,
    /// Tables left out because of `ignore_tables`.
    pub ignored: Vec<String>,
    /// Size of the whole dump.
    pub bytes: u64,
}

impl DumpSummary {
    pub fn rows(&self) -> u64 {
        self.tables.iter().map(|t| t.stats.rows).sum()
    }

    pub fn statements(&self) -> u64 {
        self.tables.iter().map(|t| t.stats.statements).sum()
    }
}

/// A finished dump held in memory.
#[derive(Debug)]
pub struct Dump {
    pub data: Vec<u8>,
    pub summary: DumpSummary,
}

/// Drives full exports of a source.
///
/// Tables are dumped one after another; each table's rows are streamed by a
/// single producer task. The output is assembled in a buffer owned by the
/// call and only handed out (or written to disk) once every table succeeded.
pub struct Dumper {
    source: Arc<dyn TableSource>,
    config: DumpConfig,
}

impl std::fmt::Debug for Dumper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dumper").field("config", &self.config).finish()
    }
}

impl Dumper {
    pub fn new(source: Arc<dyn TableSource>, config: DumpConfig) -> Result<Self, DumpError> {
        Ok(Self {
            source,
            config: config.normalized()?,
        })
    }

    pub fn config(&self) -> &DumpConfig {
        &self.config
    }

    /// Run one export into memory.
    pub async fn dump(&self) -> Result<Dump, DumpError> {
        let mut out = Vec::new();
        let mut summary = DumpSummary::default();

        let server_version = self
            .source
            .server_version()
            .map_err(|e| DumpError::Source(e.with_context("server version")))?;
        out.extend_from_slice(render_header(&server_version, &self.config.charset).as_bytes());

        let tables = self
            .source
            .table_names()
            .map_err(|e| DumpError::Source(e.with_context("list tables")))?;

        for name in tables {
            if self.config.is_ignored(&name) {
                tracing::info!(table = %name, "skipping ignored table");
                summary.ignored.push(name);
                continue;
            }
            let stats = self.dump_table(&name, &mut out).await?;
            summary.tables.push(TableSummary { name, stats });
        }

        let completed_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        out.extend_from_slice(render(FOOTER, &[("completed_at", &completed_at)]).as_bytes());

        summary.bytes = out.len() as u64;
        tracing::info!(
            tables = summary.tables.len(),
            ignored = summary.ignored.len(),
            rows = summary.rows(),
            statements = summary.statements(),
            bytes = summary.bytes,
            "dump complete"
        );
        Ok(Dump { data: out, summary })
    }

    /// Run one export and return it as text. Fails if any table holds bytes
    /// that are not valid UTF-8.
    pub async fn dump_to_string(&self) -> Result<String, DumpError> {
        let dump = self.dump().await?;
        Ok(String::from_utf8(dump.data)?)
    }

    /// Run one export into `<dir>/<name>.sql`.
    ///
    /// `dir` must exist. Nothing is written unless the whole dump succeeded;
    /// the file is first written under a temporary name and then renamed.
    pub async fn dump_to_file(&self, dir: &Path, name: &str) -> Result<(PathBuf, DumpSummary), DumpError> {
        let meta = std::fs::metadata(dir)
            .map_err(|e| DumpError::Config(format!("output directory '{}': {e}", dir.display())))?;
        if !meta.is_dir() {
            return Err(DumpError::Config(format!(
                "output path '{}' is not a directory",
                dir.display()
            )));
        }
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(DumpError::Config(format!("invalid dump name '{name}'")));
        }

        let dump = self.dump().await?;

        let path = dir.join(format!("{name}.sql"));
        let tmp = dir.join(format!(".{name}.sql.tmp"));
        if let Err(e) = std::fs::write(&tmp, &dump.data) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        tracing::info!(path = %path.display(), bytes = dump.summary.bytes, "wrote dump file");
        Ok((path, dump.summary))
    }

    async fn dump_table(&self, name: &str, out: &mut Vec<u8>) -> Result<StreamStats, DumpError> {
        let handle = self
            .source
            .table(name)
            .map_err(|e| DumpError::Source(e.with_context(format!("table '{name}'"))))?;
        let session = TableSession::new(handle);
        let create_sql = session.create_statement()?;

        let ident = quote_ident(name);
        out.extend_from_slice(render_table_head(&ident, &self.config.charset, &create_sql).as_bytes());

        let mut stream = stream_table(session, self.config.max_allowed_packet, self.config.stream_buffer);
        while let Some(stmt) = stream.next().await {
            out.extend_from_slice(&stmt);
            out.push(b'\n');
        }
        let stats = stream.finish().await?;

        out.extend_from_slice(render(TABLE_TAIL, &[("table", &ident)]).as_bytes());
        tracing::info!(
            table = %name,
            rows = stats.rows,
            statements = stats.statements,
            bytes = stats.bytes,
            "dumped table"
        );
        Ok(stats)
    }
}

/// Fill `{name}` placeholders in one pass over `template`. Substituted text
/// is never scanned again, so table names and create statements may contain
/// braces. Unknown placeholders are left as they are.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after
            .find('}')
            .and_then(|close| vars.iter().find(|(k, _)| *k == &after[..close]).map(|(_, v)| (close, *v)));
        match value {
            Some((close, v)) => {
                out.push_str(v);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn render_header(server_version: &str, charset: &str) -> String {
    let server_version = server_version.replace(['\r', '\n'], " ");
    render(HEADER, &[("charset", charset), ("server_version", &server_version)])
}

fn render_table_head(ident: &str, charset: &str, create_sql: &str) -> String {
    let create_sql = create_sql.trim_end().trim_end_matches(';');
    render(
        TABLE_HEAD,
        &[("table", ident), ("charset", charset), ("create_sql", create_sql)],
    )
}
