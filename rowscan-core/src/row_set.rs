/// Row sets: the rows a read asks for
///
/// A set is a union of individual keys and ranges. A set with neither keys
/// nor ranges selects every row in the table. A set that selects nothing is
/// spelled with a single empty range, which is also how the server expects
/// "no rows" on the wire.

use crate::range::RowRange;
use crate::types::RowKey;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    row_keys: BTreeSet<RowKey>,
    row_ranges: Vec<RowRange>,
}

impl RowSet {
    /// A set selecting every row.
    pub fn all_rows() -> Self {
        Self::default()
    }

    /// A set selecting no rows.
    pub fn none() -> Self {
        Self {
            row_keys: BTreeSet::new(),
            row_ranges: vec![RowRange::empty()],
        }
    }

    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<RowKey>,
    {
        Self {
            row_keys: keys.into_iter().map(Into::into).collect(),
            row_ranges: Vec::new(),
        }
    }

    pub fn from_range(range: RowRange) -> Self {
        Self {
            row_keys: BTreeSet::new(),
            row_ranges: vec![range],
        }
    }

    /// Add a single key. Duplicate keys collapse.
    pub fn append_row_key(&mut self, key: impl Into<RowKey>) {
        self.row_keys.insert(key.into());
    }

    /// Add a range. Overlapping ranges are kept as given and read as a union.
    pub fn append_range(&mut self, range: RowRange) {
        self.row_ranges.push(range);
    }

    pub fn with_row_key(mut self, key: impl Into<RowKey>) -> Self {
        self.append_row_key(key);
        self
    }

    pub fn with_range(mut self, range: RowRange) -> Self {
        self.append_range(range);
        self
    }

    /// Keys in ascending order
    pub fn row_keys(&self) -> impl Iterator<Item = &RowKey> {
        self.row_keys.iter()
    }

    pub fn row_ranges(&self) -> &[RowRange] {
        &self.row_ranges
    }

    /// True if this set places no restriction on rows.
    pub fn is_all_rows(&self) -> bool {
        self.row_keys.is_empty() && self.row_ranges.is_empty()
    }

    /// True if this set selects no rows at all.
    pub fn is_empty(&self) -> bool {
        if !self.row_keys.is_empty() {
            return false;
        }
        if self.row_ranges.iter().any(|r| !r.is_empty()) {
            return false;
        }
        !self.row_ranges.is_empty()
    }

    pub fn contains(&self, key: &RowKey) -> bool {
        if self.is_all_rows() {
            return true;
        }
        self.row_keys.contains(key) || self.row_ranges.iter().any(|r| r.contains(key))
    }

    /// Restrict this set to the keys inside `range`.
    ///
    /// Keys outside the range are dropped and every range is clipped; ranges
    /// that end up empty disappear. The result never silently widens to
    /// "all rows": if nothing survives, `RowSet::none()` is returned.
    pub fn intersect(&self, range: &RowRange) -> RowSet {
        if self.is_all_rows() {
            return if range.is_empty() {
                RowSet::none()
            } else {
                RowSet::from_range(range.clone())
            };
        }

        let row_keys: BTreeSet<RowKey> = self
            .row_keys
            .iter()
            .filter(|k| range.contains(k))
            .cloned()
            .collect();
        let row_ranges: Vec<RowRange> = self
            .row_ranges
            .iter()
            .filter_map(|r| r.intersect(range))
            .collect();

        if row_keys.is_empty() && row_ranges.is_empty() {
            return RowSet::none();
        }
        RowSet {
            row_keys,
            row_ranges,
        }
    }

    /// Everything in this set strictly after `floor`.
    pub fn after(&self, floor: &RowKey) -> RowSet {
        self.intersect(&RowRange::after(floor.clone()))
    }
}

impl<K: Into<RowKey>> FromIterator<K> for RowSet {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        RowSet::from_keys(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> RowKey {
        RowKey::from(s)
    }

    #[test]
    fn test_default_is_all_rows() {
        let set = RowSet::default();
        assert!(set.is_all_rows());
        assert!(!set.is_empty());
        assert!(set.contains(&key("anything")));
    }

    #[test]
    fn test_none_selects_nothing() {
        let set = RowSet::none();
        assert!(set.is_empty());
        assert!(!set.is_all_rows());
        assert!(!set.contains(&key("")));
    }

    #[test]
    fn test_keys_are_unique_and_sorted() {
        let set = RowSet::from_keys(["r3", "r1", "r2", "r1"]);
        let keys: Vec<_> = set.row_keys().cloned().collect();
        assert_eq!(keys, vec![key("r1"), key("r2"), key("r3")]);
    }

    #[test]
    fn test_contains_union_of_keys_and_ranges() {
        let set = RowSet::from_keys(["a"])
            .with_range(RowRange::closed("m", "p"))
            .with_range(RowRange::closed("o", "r"));
        assert!(set.contains(&key("a")));
        assert!(!set.contains(&key("b")));
        assert!(set.contains(&key("n")));
        assert!(set.contains(&key("q")));
        assert!(!set.contains(&key("s")));
    }

    #[test]
    fn test_intersect_all_rows_returns_range() {
        let set = RowSet::all_rows().intersect(&RowRange::after("k"));
        assert_eq!(set, RowSet::from_range(RowRange::after("k")));
    }

    #[test]
    fn test_intersect_drops_and_clips() {
        let set = RowSet::from_keys(["a", "c", "e"])
            .with_range(RowRange::closed("a", "b"))
            .with_range(RowRange::closed("b", "f"));
        let clipped = set.after(&key("c"));

        let keys: Vec<_> = clipped.row_keys().cloned().collect();
        assert_eq!(keys, vec![key("e")]);
        assert_eq!(clipped.row_ranges(), &[RowRange::left_open("c", "f")]);
    }

    #[test]
    fn test_intersect_to_nothing_is_none_not_all() {
        let set = RowSet::from_keys(["a", "b"]);
        let clipped = set.after(&key("b"));
        assert!(clipped.is_empty());
        assert!(!clipped.is_all_rows());
    }

    #[test]
    fn test_intersect_with_empty_range() {
        assert!(RowSet::all_rows().intersect(&RowRange::empty()).is_empty());
    }

    #[test]
    fn test_set_with_only_empty_ranges_is_empty() {
        let set = RowSet::from_range(RowRange::closed("b", "a"));
        assert!(set.is_empty());
    }
}
