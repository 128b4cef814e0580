/// Read progress and resume planning
///
/// After a transient failure the next attempt must ask only for rows that
/// come strictly after everything already delivered or already scanned by
/// the server, and for no more rows than the limit still allows.

use crate::row_set::RowSet;
use crate::types::RowKey;

/// Progress of one logical read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadState {
    rows_returned: u64,
    last_returned_key: Option<RowKey>,
    last_scanned_key: Option<RowKey>,
    rows_limit: Option<u64>,
}

impl ReadState {
    /// `rows_limit` of None means no limit.
    pub fn new(rows_limit: Option<u64>) -> Self {
        Self {
            rows_limit,
            ..Self::default()
        }
    }

    /// Record a row handed to the consumer.
    pub fn record_row(&mut self, key: &RowKey) {
        self.rows_returned += 1;
        self.last_returned_key = Some(key.clone());
    }

    /// Record a "last scanned row key" hint from the server.
    pub fn record_scanned(&mut self, key: RowKey) {
        if self.last_scanned_key.as_ref().map_or(true, |k| *k < key) {
            self.last_scanned_key = Some(key);
        }
    }

    pub fn rows_returned(&self) -> u64 {
        self.rows_returned
    }

    pub fn last_returned_key(&self) -> Option<&RowKey> {
        self.last_returned_key.as_ref()
    }

    pub fn last_scanned_key(&self) -> Option<&RowKey> {
        self.last_scanned_key.as_ref()
    }

    pub fn rows_limit(&self) -> Option<u64> {
        self.rows_limit
    }

    /// Rows the limit still allows, or None for an unlimited read
    pub fn remaining_limit(&self) -> Option<u64> {
        self.rows_limit
            .map(|limit| limit.saturating_sub(self.rows_returned))
    }

    pub fn limit_satisfied(&self) -> bool {
        self.remaining_limit() == Some(0)
    }

    /// The greater of the last delivered key and the last scanned key.
    pub fn resume_floor(&self) -> Option<&RowKey> {
        match (&self.last_returned_key, &self.last_scanned_key) {
            (Some(returned), Some(scanned)) => Some(returned.max(scanned)),
            (Some(returned), None) => Some(returned),
            (None, Some(scanned)) => Some(scanned),
            (None, None) => None,
        }
    }
}

/// Why no further attempt is needed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every row of the requested set lies at or before the resume floor
    RowSetExhausted,
    /// The row limit has been reached
    LimitReached,
}

/// What the next attempt should request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumePlan {
    Complete(Completion),
    Resume {
        row_set: RowSet,
        /// None means no limit
        rows_limit: Option<u64>,
    },
}

/// Computes the request of each attempt from the original row set.
#[derive(Debug, Clone)]
pub struct ResumePlanner {
    original: RowSet,
}

impl ResumePlanner {
    pub fn new(original: RowSet) -> Self {
        Self { original }
    }

    pub fn original(&self) -> &RowSet {
        &self.original
    }

    pub fn plan(&self, state: &ReadState) -> ResumePlan {
        let rows_limit = state.remaining_limit();
        if rows_limit == Some(0) {
            return ResumePlan::Complete(Completion::LimitReached);
        }

        let row_set = match state.resume_floor() {
            None => self.original.clone(),
            Some(floor) => self.original.after(floor),
        };
        if row_set.is_empty() {
            return ResumePlan::Complete(Completion::RowSetExhausted);
        }
        ResumePlan::Resume {
            row_set,
            rows_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::RowRange;

    fn key(s: &str) -> RowKey {
        RowKey::from(s)
    }

    #[test]
    fn test_untouched_read_resumes_with_original() {
        let original = RowSet::from_keys(["r1", "r2"]).with_range(RowRange::starting_at("x"));
        let planner = ResumePlanner::new(original.clone());
        assert_eq!(
            planner.plan(&ReadState::new(None)),
            ResumePlan::Resume {
                row_set: original,
                rows_limit: None
            }
        );
    }

    #[test]
    fn test_floor_is_max_of_returned_and_scanned() {
        let mut state = ReadState::new(None);
        assert_eq!(state.resume_floor(), None);

        state.record_row(&key("r1"));
        assert_eq!(state.resume_floor(), Some(&key("r1")));

        state.record_scanned(key("r2"));
        assert_eq!(state.resume_floor(), Some(&key("r2")));

        state.record_row(&key("r3"));
        assert_eq!(state.resume_floor(), Some(&key("r3")));

        // scanned hints never move backwards
        state.record_scanned(key("r0"));
        assert_eq!(state.last_scanned_key(), Some(&key("r2")));
    }

    #[test]
    fn test_scanned_key_narrows_request() {
        let planner = ResumePlanner::new(RowSet::from_keys(["r1", "r2", "r3"]));
        let mut state = ReadState::new(None);
        state.record_row(&key("r1"));
        state.record_scanned(key("r2"));

        assert_eq!(
            planner.plan(&state),
            ResumePlan::Resume {
                row_set: RowSet::from_keys(["r3"]),
                rows_limit: None
            }
        );
    }

    #[test]
    fn test_ranges_are_clipped_open() {
        let planner = ResumePlanner::new(RowSet::from_range(RowRange::closed("a", "z")));
        let mut state = ReadState::new(None);
        state.record_row(&key("m"));
        assert_eq!(
            planner.plan(&state),
            ResumePlan::Resume {
                row_set: RowSet::from_range(RowRange::left_open("m", "z")),
                rows_limit: None
            }
        );
    }

    #[test]
    fn test_all_rows_resumes_after_floor() {
        let planner = ResumePlanner::new(RowSet::all_rows());
        let mut state = ReadState::new(None);
        state.record_row(&key("k"));
        assert_eq!(
            planner.plan(&state),
            ResumePlan::Resume {
                row_set: RowSet::from_range(RowRange::after("k")),
                rows_limit: None
            }
        );
    }

    #[test]
    fn test_exhausted_row_set_completes() {
        let planner = ResumePlanner::new(RowSet::from_keys(["r1", "r2"]));
        let mut state = ReadState::new(None);
        state.record_row(&key("r1"));
        state.record_row(&key("r2"));
        assert_eq!(
            planner.plan(&state),
            ResumePlan::Complete(Completion::RowSetExhausted)
        );
    }

    #[test]
    fn test_limit_shrinks_and_completes() {
        let planner = ResumePlanner::new(RowSet::all_rows());
        let mut state = ReadState::new(Some(3));
        state.record_row(&key("a"));
        match planner.plan(&state) {
            ResumePlan::Resume { rows_limit, .. } => assert_eq!(rows_limit, Some(2)),
            other => panic!("unexpected plan {:?}", other),
        }

        state.record_row(&key("b"));
        state.record_row(&key("c"));
        assert!(state.limit_satisfied());
        assert_eq!(
            planner.plan(&state),
            ResumePlan::Complete(Completion::LimitReached)
        );
    }

    #[test]
    fn test_unlimited_never_satisfied() {
        let mut state = ReadState::new(None);
        for i in 0..10 {
            state.record_row(&key(&format!("k{}", i)));
        }
        assert_eq!(state.remaining_limit(), None);
        assert!(!state.limit_satisfied());
        assert_eq!(state.rows_returned(), 10);
    }
}
