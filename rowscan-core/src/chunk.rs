/// Cell chunks: the wire unit of a streaming read
///
/// The server splits rows into chunks. A chunk may start a row (it carries a
/// key), switch column (family and/or qualifier), carry all or part of a cell
/// value, and finally either commit the row or reset it.

use crate::types::RowKey;
use bytes::Bytes;

/// Row-level signal carried by a chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChunkStatus {
    /// More chunks for the same row follow
    #[default]
    InProgress,
    /// Discard everything received for the current row
    ResetRow,
    /// The current row is complete
    CommitRow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellChunk {
    /// Present on the first chunk of a row; later chunks inherit it
    pub row_key: Option<RowKey>,
    /// Present when the column family changes
    pub family: Option<String>,
    /// Present when the column changes
    pub qualifier: Option<Bytes>,
    pub timestamp_micros: i64,
    pub labels: Vec<String>,
    /// Value bytes, possibly only a fragment of the cell value
    pub value: Bytes,
    /// Non-zero when the cell value continues in the next chunk
    pub value_size: i32,
    pub status: ChunkStatus,
}

impl CellChunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_key(mut self, key: impl Into<RowKey>) -> Self {
        self.row_key = Some(key.into());
        self
    }

    pub fn family(mut self, family: impl Into<String>) -> Self {
        self.family = Some(family.into());
        self
    }

    pub fn qualifier(mut self, qualifier: impl Into<Bytes>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn timestamp(mut self, micros: i64) -> Self {
        self.timestamp_micros = micros;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn value(mut self, value: impl Into<Bytes>) -> Self {
        self.value = value.into();
        self
    }

    /// Mark the value as a fragment of a cell of `total` bytes.
    pub fn split(mut self, total: i32) -> Self {
        self.value_size = total;
        self
    }

    pub fn commit(mut self) -> Self {
        self.status = ChunkStatus::CommitRow;
        self
    }

    pub fn reset(mut self) -> Self {
        self.status = ChunkStatus::ResetRow;
        self
    }

    pub fn is_commit(&self) -> bool {
        self.status == ChunkStatus::CommitRow
    }

    pub fn is_reset(&self) -> bool {
        self.status == ChunkStatus::ResetRow
    }

    /// True if the chunk carries anything besides the row key and status.
    pub fn has_cell_data(&self) -> bool {
        self.family.is_some()
            || self.qualifier.is_some()
            || self.timestamp_micros != 0
            || !self.labels.is_empty()
            || !self.value.is_empty()
            || self.value_size != 0
    }
}
