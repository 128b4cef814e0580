/// Read request builder
use bytes::Bytes;
use rowscan_core::{RowKey, RowRange, RowSet};

/// Parameters that stay fixed for every attempt of a read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadParams {
    pub table_name: String,
    pub app_profile_id: Option<String>,
    /// Pre-encoded filter, passed through untouched
    pub filter: Option<Bytes>,
}

impl ReadParams {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            app_profile_id: None,
            filter: None,
        }
    }
}

/// Streaming read builder
///
/// # Example
/// ```no_run
/// # use rowscan_client::ReadRows;
/// # use rowscan_core::RowRange;
/// let read = ReadRows::new("projects/p/instances/i/tables/users")
///     .range(RowRange::prefix("user#"))
///     .limit(100);
/// ```
#[derive(Debug, Clone)]
pub struct ReadRows {
    params: ReadParams,
    row_set: RowSet,
    rows_limit: Option<u64>,
}

impl ReadRows {
    /// Read every row of `table_name`
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            params: ReadParams::new(table_name),
            row_set: RowSet::all_rows(),
            rows_limit: None,
        }
    }

    /// Add a single row key to the rows to read
    pub fn key(mut self, key: impl Into<RowKey>) -> Self {
        self.row_set.append_row_key(key);
        self
    }

    /// Add a row range to the rows to read
    pub fn range(mut self, range: RowRange) -> Self {
        self.row_set.append_range(range);
        self
    }

    /// Replace the rows to read
    pub fn row_set(mut self, row_set: RowSet) -> Self {
        self.row_set = row_set;
        self
    }

    /// Set the maximum number of rows to return (0 means no limit)
    pub fn limit(mut self, limit: u64) -> Self {
        self.rows_limit = if limit == 0 { None } else { Some(limit) };
        self
    }

    /// Attach an encoded row filter
    pub fn filter(mut self, filter: impl Into<Bytes>) -> Self {
        self.params.filter = Some(filter.into());
        self
    }

    /// Route the read through an app profile
    pub fn app_profile_id(mut self, id: impl Into<String>) -> Self {
        self.params.app_profile_id = Some(id.into());
        self
    }

    pub fn params(&self) -> &ReadParams {
        &self.params
    }

    pub fn rows(&self) -> &RowSet {
        &self.row_set
    }

    pub fn rows_limit(&self) -> Option<u64> {
        self.rows_limit
    }

    pub fn into_parts(self) -> (ReadParams, RowSet, Option<u64>) {
        (self.params, self.row_set, self.rows_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_read_everything() {
        let read = ReadRows::new("t");
        assert!(read.rows().is_all_rows());
        assert_eq!(read.rows_limit(), None);
        assert_eq!(read.params().filter, None);
    }

    #[test]
    fn test_builder() {
        let read = ReadRows::new("t")
            .key("r1")
            .range(RowRange::starting_at("x"))
            .limit(10)
            .filter(Bytes::from_static(b"\x0a\x02cf"))
            .app_profile_id("batch");
        assert!(read.rows().contains(&RowKey::from("r1")));
        assert!(read.rows().contains(&RowKey::from("xyz")));
        assert!(!read.rows().contains(&RowKey::from("r2")));
        assert_eq!(read.rows_limit(), Some(10));
        assert_eq!(read.params().app_profile_id.as_deref(), Some("batch"));
    }

    #[test]
    fn test_zero_limit_means_unlimited() {
        assert_eq!(ReadRows::new("t").limit(0).rows_limit(), None);
    }
}
