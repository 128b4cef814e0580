/// Chunk-to-row reassembly
///
/// Consumes the cell chunks of one streaming attempt, in arrival order, and
/// produces complete rows. The reassembler validates the chunk grammar and
/// the strictly increasing key order; any violation is a malformed stream.
///
/// State machine: `Idle -> Accumulating(key) -> RowReady -> Idle`, with
/// `EndOfStream` reachable from every state.

use crate::chunk::{CellChunk, ChunkStatus};
use crate::error::{Error, Result};
use crate::types::{Cell, Row, RowKey};
use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

/// Observable reassembler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblerState {
    /// No row in progress
    Idle,
    /// Chunks of an uncommitted row have been received
    Accumulating,
    /// A committed row is waiting to be taken
    RowReady,
    /// The stream has ended
    EndOfStream,
}

/// Row being assembled
#[derive(Debug)]
struct PartialRow {
    key: RowKey,
    cells: Vec<Cell>,
    /// Column in scope; later cells inherit it
    family: Option<String>,
    qualifier: Option<Bytes>,
}

/// Cell whose value is still arriving in fragments
#[derive(Debug)]
struct PartialCell {
    family: String,
    qualifier: Bytes,
    timestamp_micros: i64,
    labels: Vec<String>,
    value: BytesMut,
}

impl PartialCell {
    fn finish(self) -> Cell {
        Cell {
            family: self.family,
            qualifier: self.qualifier,
            timestamp_micros: self.timestamp_micros,
            labels: self.labels,
            value: self.value.freeze(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ChunkReassembler {
    last_emitted: Option<RowKey>,
    last_scanned: Option<RowKey>,
    row: Option<PartialRow>,
    cell: Option<PartialCell>,
    ready: Option<Row>,
    ended: bool,
    rows_emitted: u64,
}

impl ChunkReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A reassembler that only accepts rows strictly after `key`.
    ///
    /// Used when resuming a read so ordering holds across attempts.
    pub fn resume_after(key: Option<RowKey>) -> Self {
        Self {
            last_emitted: key,
            ..Self::default()
        }
    }

    pub fn state(&self) -> ReassemblerState {
        if self.ready.is_some() {
            ReassemblerState::RowReady
        } else if self.ended {
            ReassemblerState::EndOfStream
        } else if self.row.is_some() {
            ReassemblerState::Accumulating
        } else {
            ReassemblerState::Idle
        }
    }

    /// Feed the next chunk of the stream.
    ///
    /// A committed row must be taken with [`next_row`](Self::next_row)
    /// before more chunks are fed.
    pub fn handle_chunk(&mut self, chunk: CellChunk) -> Result<()> {
        if self.ended {
            return Err(Error::Internal("chunk received after end of stream".into()));
        }
        if self.ready.is_some() {
            return Err(Error::Internal(
                "chunk received before the previous row was taken".into(),
            ));
        }
        if chunk.row_key.as_ref().is_some_and(RowKey::is_empty) {
            return Err(Error::malformed("chunk carries an empty row key"));
        }
        if chunk.is_reset() {
            return self.reset_row(chunk);
        }

        if self.row.is_none() {
            let key = chunk.row_key.clone().ok_or_else(|| {
                Error::malformed("first chunk of a row must carry a row key")
            })?;
            trace!(row_key = %key, "starting row");
            self.row = Some(PartialRow {
                key,
                cells: Vec::new(),
                family: None,
                qualifier: None,
            });
        }
        let Some(row) = self.row.as_mut() else {
            return Err(Error::Internal("no row in progress".into()));
        };
        if let Some(key) = &chunk.row_key {
            if *key != row.key {
                return Err(Error::malformed(format!(
                    "row key changed from {} to {} without a commit",
                    row.key, key
                )));
            }
        }

        let status = chunk.status;
        let value_size = chunk.value_size;
        match self.cell.as_mut() {
            None => {
                if let Some(family) = chunk.family {
                    if chunk.qualifier.is_none() {
                        return Err(Error::malformed(
                            "new column family must specify a qualifier",
                        ));
                    }
                    row.family = Some(family);
                }
                if let Some(qualifier) = chunk.qualifier {
                    row.qualifier = Some(qualifier);
                }
                let family = row.family.clone().ok_or_else(|| {
                    Error::malformed(format!("cell in row {} has no column family", row.key))
                })?;
                let qualifier = row.qualifier.clone().ok_or_else(|| {
                    Error::malformed(format!("cell in row {} has no column qualifier", row.key))
                })?;
                let mut value = BytesMut::with_capacity(value_size.max(0) as usize);
                value.extend_from_slice(&chunk.value);
                self.cell = Some(PartialCell {
                    family,
                    qualifier,
                    timestamp_micros: chunk.timestamp_micros,
                    labels: chunk.labels,
                    value,
                });
            }
            Some(cell) => {
                let family_changed = chunk.family.as_ref().is_some_and(|f| *f != cell.family);
                let qualifier_changed =
                    chunk.qualifier.as_ref().is_some_and(|q| *q != cell.qualifier);
                if family_changed || qualifier_changed {
                    return Err(Error::malformed(format!(
                        "column changed in the middle of a split cell in row {}",
                        row.key
                    )));
                }
                cell.value.extend_from_slice(&chunk.value);
            }
        }

        if value_size == 0 {
            if let Some(cell) = self.cell.take() {
                row.cells.push(cell.finish());
            }
        }

        if status == ChunkStatus::CommitRow {
            if self.cell.is_some() {
                return Err(Error::malformed(format!(
                    "commit of row {} while a split cell is incomplete",
                    row.key
                )));
            }
            return self.commit_row();
        }
        Ok(())
    }

    fn reset_row(&mut self, chunk: CellChunk) -> Result<()> {
        if chunk.has_cell_data() {
            return Err(Error::malformed("reset_row chunk must not carry cell data"));
        }
        let Some(row) = self.row.as_ref() else {
            return Err(Error::malformed("reset_row with no row in progress"));
        };
        if let Some(key) = &chunk.row_key {
            if *key != row.key {
                return Err(Error::malformed(format!(
                    "reset_row for {} while row {} is in progress",
                    key, row.key
                )));
            }
        }
        debug!(row_key = %row.key, "server reset in-progress row");
        self.row = None;
        self.cell = None;
        Ok(())
    }

    fn commit_row(&mut self) -> Result<()> {
        let Some(row) = self.row.take() else {
            return Err(Error::Internal("commit with no row in progress".into()));
        };
        if let Some(last) = &self.last_emitted {
            if row.key <= *last {
                return Err(Error::malformed(format!(
                    "row keys must be strictly increasing: {} received after {}",
                    row.key, last
                )));
            }
        }
        trace!(row_key = %row.key, cells = row.cells.len(), "row committed");
        self.last_emitted = Some(row.key.clone());
        self.ready = Some(Row::new(row.key, row.cells));
        Ok(())
    }

    /// Record the server's "last scanned row key" hint.
    pub fn handle_scanned_key(&mut self, key: RowKey) {
        if key.is_empty() {
            return;
        }
        match &self.last_scanned {
            Some(current) if *current >= key => {}
            _ => self.last_scanned = Some(key),
        }
    }

    /// Take the last scanned key reported since the previous call.
    pub fn take_last_scanned(&mut self) -> Option<RowKey> {
        self.last_scanned.take()
    }

    pub fn has_next(&self) -> bool {
        self.ready.is_some()
    }

    pub fn next_row(&mut self) -> Option<Row> {
        let row = self.ready.take()?;
        self.rows_emitted += 1;
        Some(row)
    }

    /// Rows taken from this reassembler so far
    pub fn rows_emitted(&self) -> u64 {
        self.rows_emitted
    }

    /// Signal the end of the attempt.
    ///
    /// With a clean (OK) end, a row that was started but never committed is a
    /// malformed stream, unless the row limit was already satisfied and the
    /// server simply stopped early. A failed end is not inspected: the
    /// transport error wins.
    pub fn handle_end_of_stream(&mut self, clean: bool, limit_satisfied: bool) -> Result<()> {
        self.ended = true;
        self.cell = None;
        let partial = self.row.take();
        if !clean {
            return Ok(());
        }
        match partial {
            Some(row) if !limit_satisfied => Err(Error::malformed(format!(
                "stream ended in the middle of row {}",
                row.key
            ))),
            Some(row) => {
                debug!(row_key = %row.key, "discarding partial row after row limit was reached");
                Ok(())
            }
            None => Ok(()),
        }
    }
}
