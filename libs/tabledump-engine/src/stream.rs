use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::batch::Batcher;
use crate::error::DumpError;
use crate::table::TableSession;

/// Counters for one streamed table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub rows: u64,
    pub statements: u64,
    pub bytes: u64,
}

/// Statements of one table, produced by a background task.
///
/// Drain with [`TableStream::next`], then call [`TableStream::finish`] to
/// collect the producer's outcome. An error is reported only by `finish`;
/// no statement is sent after it happened.
pub struct TableStream {
    table: String,
    rx: mpsc::Receiver<Vec<u8>>,
    producer: JoinHandle<Result<StreamStats, DumpError>>,
}

impl std::fmt::Debug for TableStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableStream").field("table", &self.table).finish()
    }
}

impl TableStream {
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Next complete statement, `None` once the producer stopped.
    pub async fn next(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    /// Wait for the producer and return its counters or recorded error.
    ///
    /// Statements not yet received are dropped.
    pub async fn finish(self) -> Result<StreamStats, DumpError> {
        drop(self.rx);
        match self.producer.await {
            Ok(result) => result,
            Err(e) => Err(DumpError::Producer {
                table: self.table,
                detail: e.to_string(),
            }),
        }
    }
}

/// Start streaming a table's rows as batched `INSERT` statements.
///
/// A single blocking task owns the session (and with it the cursor) and hands
/// statements over through a channel of `buffer` slots; it waits whenever the
/// channel is full. Must be called from within a tokio runtime.
pub fn stream_table(session: TableSession, max_allowed_packet: usize, buffer: usize) -> TableStream {
    let table = session.name().to_string();
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let batcher = Batcher::new(&table, max_allowed_packet);
    let producer = tokio::task::spawn_blocking(move || produce(session, batcher, tx));
    TableStream {
        table,
        rx,
        producer,
    }
}

fn produce(
    mut session: TableSession,
    mut batcher: Batcher,
    tx: mpsc::Sender<Vec<u8>>,
) -> Result<StreamStats, DumpError> {
    let mut stats = StreamStats::default();
    let mut tuple = Vec::new();

    loop {
        match session.next_tuple(&mut tuple) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                batcher.discard();
                tracing::debug!(table = %session.name(), error = %e, "table stream stopped");
                return Err(e);
            }
        }
        stats.rows += 1;

        if let Some(stmt) = batcher.push(&tuple) {
            if !send(&tx, stmt, &mut stats) {
                tracing::debug!(table = %session.name(), "statement receiver dropped");
                return Ok(stats);
            }
        }
    }

    if let Some(stmt) = batcher.finish() {
        send(&tx, stmt, &mut stats);
    }
    Ok(stats)
}

fn send(tx: &mpsc::Sender<Vec<u8>>, stmt: Vec<u8>, stats: &mut StreamStats) -> bool {
    let len = stmt.len() as u64;
    if tx.blocking_send(stmt).is_err() {
        return false;
    }
    stats.statements += 1;
    stats.bytes += len;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabledump_api::{ColumnInfo, ScanKind, Value};
    use tabledump_source_memory::{MemoryTable, MemoryTableHandle};

    fn table(rows: usize) -> MemoryTable {
        let mut t = MemoryTable::new(
            "t",
            vec![
                ColumnInfo::new("id", "INT", Some(ScanKind::Int64)),
                ColumnInfo::new("name", "VARCHAR", Some(ScanKind::Text)),
            ],
        );
        for i in 0..rows {
            t = t.with_row(vec![Value::Int64(i as i64), "c".repeat(i + 1).into()]);
        }
        t
    }

    fn start(t: MemoryTable, packet: usize) -> TableStream {
        let session = TableSession::new(Box::new(MemoryTableHandle::new(t.into())));
        stream_table(session, packet, 1)
    }

    async fn collect(mut stream: TableStream) -> (Vec<String>, Result<StreamStats, DumpError>) {
        let mut out = Vec::new();
        while let Some(stmt) = stream.next().await {
            out.push(String::from_utf8(stmt).unwrap());
        }
        (out, stream.finish().await)
    }

    #[tokio::test]
    async fn empty_table_emits_nothing() {
        let (stmts, stats) = collect(start(table(0), 1024)).await;
        assert!(stmts.is_empty());
        assert_eq!(stats.unwrap(), StreamStats::default());
    }

    #[tokio::test]
    async fn small_table_is_one_statement() {
        let (stmts, stats) = collect(start(table(3), 1024)).await;
        assert_eq!(
            stmts,
            vec!["INSERT INTO `t` VALUES (0,'c'),(1,'cc'),(2,'ccc');".to_string()]
        );
        let stats = stats.unwrap();
        assert_eq!(stats.rows, 3);
        assert_eq!(stats.statements, 1);
        assert_eq!(stats.bytes, stmts[0].len() as u64);
    }

    #[tokio::test]
    async fn packet_limit_splits_statements() {
        let (stmts, stats) = collect(start(table(3), 40)).await;
        assert_eq!(
            stmts,
            vec![
                "INSERT INTO `t` VALUES (0,'c');",
                "INSERT INTO `t` VALUES (1,'cc');",
                "INSERT INTO `t` VALUES (2,'ccc');",
            ]
        );
        assert!(stmts.iter().all(|s| s.len() <= 39));
        assert_eq!(stats.unwrap().statements, 3);
    }

    #[tokio::test]
    async fn many_rows_through_single_slot_channel() {
        let (stmts, stats) = collect(start(table(500), 256)).await;
        let stats = stats.unwrap();
        assert_eq!(stats.rows, 500);
        assert_eq!(stats.statements as usize, stmts.len());
        assert!(stmts.iter().all(|s| s.len() <= 255 || !s.contains("),(")));
        let tuples: usize = stmts.iter().map(|s| s.matches("),(").count() + 1).sum();
        assert_eq!(tuples, 500);
    }

    #[tokio::test]
    async fn error_is_recorded_and_pending_batch_dropped() {
        let (stmts, result) = collect(start(table(10).with_failure_after(5), 1024)).await;
        assert!(stmts.is_empty());
        assert!(matches!(result, Err(DumpError::Cursor { ref table, .. }) if table == "t"));
    }

    #[tokio::test]
    async fn statements_before_error_are_kept_but_error_reported() {
        let (stmts, result) = collect(start(table(10).with_failure_after(5), 40)).await;
        assert_eq!(stmts.len(), 4);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn zero_columns_fail_the_stream() {
        let (stmts, result) = collect(start(MemoryTable::new("t", vec![]), 1024)).await;
        assert!(stmts.is_empty());
        assert!(matches!(result, Err(DumpError::NoColumns(_))));
    }

    #[tokio::test]
    async fn finish_without_draining_stops_producer() {
        let stream = start(table(200), 64);
        assert!(stream.finish().await.is_ok());
    }
}
