use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Row key - an opaque byte string ordered lexicographically
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowKey(Bytes);

impl RowKey {
    pub fn new(key: impl Into<Bytes>) -> Self {
        Self(key.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// The smallest key strictly greater than this one (`self` followed by a zero byte).
    pub fn successor(&self) -> RowKey {
        let mut buf = BytesMut::with_capacity(self.0.len() + 1);
        buf.put(self.0.clone());
        buf.put_u8(0);
        RowKey(buf.freeze())
    }

    /// The smallest key greater than every key that starts with `self`.
    ///
    /// Returns None when no such key exists (empty prefix, or all bytes 0xFF).
    pub fn prefix_end(&self) -> Option<RowKey> {
        let mut end = self.0.to_vec();
        while let Some(last) = end.pop() {
            if last < 0xFF {
                end.push(last + 1);
                return Some(RowKey(Bytes::from(end)));
            }
        }
        None
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<&str> for RowKey {
    fn from(s: &str) -> Self {
        RowKey(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for RowKey {
    fn from(s: String) -> Self {
        RowKey(Bytes::from(s.into_bytes()))
    }
}

impl From<&[u8]> for RowKey {
    fn from(b: &[u8]) -> Self {
        RowKey(Bytes::copy_from_slice(b))
    }
}

impl<const N: usize> From<&[u8; N]> for RowKey {
    fn from(b: &[u8; N]) -> Self {
        RowKey(Bytes::copy_from_slice(b))
    }
}

impl From<Vec<u8>> for RowKey {
    fn from(b: Vec<u8>) -> Self {
        RowKey(Bytes::from(b))
    }
}

impl From<Bytes> for RowKey {
    fn from(b: Bytes) -> Self {
        RowKey(b)
    }
}

impl AsRef<[u8]> for RowKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A single cell: one value of one column at one timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub family: String,
    pub qualifier: Bytes,
    pub timestamp_micros: i64,
    pub labels: Vec<String>,
    pub value: Bytes,
}

impl Cell {
    pub fn new(
        family: impl Into<String>,
        qualifier: impl Into<Bytes>,
        timestamp_micros: i64,
        value: impl Into<Bytes>,
    ) -> Self {
        Self {
            family: family.into(),
            qualifier: qualifier.into(),
            timestamp_micros,
            labels: Vec::new(),
            value: value.into(),
        }
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }
}

/// A complete row as committed by the server. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    key: RowKey,
    cells: Vec<Cell>,
}

impl Row {
    pub fn new(key: RowKey, cells: Vec<Cell>) -> Self {
        Self { key, cells }
    }

    pub fn key(&self) -> &RowKey {
        &self.key
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Cells of one column family, in arrival order
    pub fn family_cells<'a>(&'a self, family: &'a str) -> impl Iterator<Item = &'a Cell> + 'a {
        self.cells.iter().filter(move |c| c.family == family)
    }

    pub fn into_parts(self) -> (RowKey, Vec<Cell>) {
        (self.key, self.cells)
    }
}
