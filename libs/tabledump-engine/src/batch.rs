//! Accumulation of encoded tuples into size-bounded `INSERT` statements.

use std::mem;

/// Quote an identifier with backticks, doubling embedded backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Builds `INSERT INTO <table> VALUES (..),(..);` statements that stay within
/// a packet budget.
///
/// The budget check counts the whole statement: preamble, separators, tuples
/// and the terminating `;`. A sealed statement is at most
/// `max_allowed_packet - 1` bytes long unless it holds a single tuple that is
/// too large on its own.
#[derive(Debug)]
pub struct Batcher {
    preamble: Vec<u8>,
    limit: usize,
    buf: Vec<u8>,
    rows_in_batch: usize,
}

impl Batcher {
    pub fn new(table: &str, max_allowed_packet: usize) -> Self {
        Self {
            preamble: format!("INSERT INTO {} VALUES ", quote_ident(table)).into_bytes(),
            limit: max_allowed_packet.saturating_sub(1),
            buf: Vec::new(),
            rows_in_batch: 0,
        }
    }

    /// Append one encoded tuple. Returns the previous statement if it had to
    /// be sealed to make room.
    pub fn push(&mut self, tuple: &[u8]) -> Option<Vec<u8>> {
        let mut sealed = None;
        // separator + tuple + terminator
        if !self.buf.is_empty() && self.buf.len() + 1 + tuple.len() + 1 > self.limit {
            sealed = self.seal();
        }

        if self.buf.is_empty() {
            self.buf.extend_from_slice(&self.preamble);
        } else {
            self.buf.push(b',');
        }
        self.buf.extend_from_slice(tuple);
        self.rows_in_batch += 1;
        sealed
    }

    /// Seal whatever is pending. `None` if nothing was pushed since the last
    /// seal.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        self.seal()
    }

    /// Discard the pending statement.
    pub fn discard(&mut self) {
        self.buf.clear();
        self.rows_in_batch = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current length of the pending statement, without terminator.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    fn seal(&mut self) -> Option<Vec<u8>> {
        if self.buf.is_empty() {
            return None;
        }
        self.buf.push(b';');
        tracing::debug!(
            rows = self.rows_in_batch,
            bytes = self.buf.len(),
            "sealed insert statement"
        );
        self.rows_in_batch = 0;
        Some(mem::take(&mut self.buf))
    }
}
