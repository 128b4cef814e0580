/// Row ranges over the lexicographic row key order
///
/// A range is a pair of bounds, each inclusive, exclusive or unbounded.
/// Ranges whose start lies after their end are legal values; they simply
/// contain no keys and report `is_empty()`.

use crate::types::RowKey;
use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowRange {
    start: Bound<RowKey>,
    end: Bound<RowKey>,
}

impl RowRange {
    pub fn new(start: Bound<RowKey>, end: Bound<RowKey>) -> Self {
        Self { start, end }
    }

    /// Every row key
    pub fn infinite() -> Self {
        Self::new(Bound::Unbounded, Bound::Unbounded)
    }

    /// `[start, +inf)`
    pub fn starting_at(start: impl Into<RowKey>) -> Self {
        Self::new(Bound::Included(start.into()), Bound::Unbounded)
    }

    /// `(-inf, end]`
    pub fn ending_at(end: impl Into<RowKey>) -> Self {
        Self::new(Bound::Unbounded, Bound::Included(end.into()))
    }

    /// `[start, end]`
    pub fn closed(start: impl Into<RowKey>, end: impl Into<RowKey>) -> Self {
        Self::new(Bound::Included(start.into()), Bound::Included(end.into()))
    }

    /// `(start, end)`
    pub fn open(start: impl Into<RowKey>, end: impl Into<RowKey>) -> Self {
        Self::new(Bound::Excluded(start.into()), Bound::Excluded(end.into()))
    }

    /// `[start, end)`
    pub fn right_open(start: impl Into<RowKey>, end: impl Into<RowKey>) -> Self {
        Self::new(Bound::Included(start.into()), Bound::Excluded(end.into()))
    }

    /// `(start, end]`
    pub fn left_open(start: impl Into<RowKey>, end: impl Into<RowKey>) -> Self {
        Self::new(Bound::Excluded(start.into()), Bound::Included(end.into()))
    }

    /// `(start, +inf)`
    pub fn after(start: impl Into<RowKey>) -> Self {
        Self::new(Bound::Excluded(start.into()), Bound::Unbounded)
    }

    /// All keys beginning with `prefix`
    pub fn prefix(prefix: impl Into<RowKey>) -> Self {
        let prefix = prefix.into();
        match prefix.prefix_end() {
            Some(end) => Self::new(Bound::Included(prefix), Bound::Excluded(end)),
            None => Self::new(Bound::Included(prefix), Bound::Unbounded),
        }
    }

    /// A range that contains no keys
    pub fn empty() -> Self {
        Self::new(Bound::Excluded(RowKey::default()), Bound::Excluded(RowKey::default()))
    }

    pub fn start(&self) -> &Bound<RowKey> {
        &self.start
    }

    pub fn end(&self) -> &Bound<RowKey> {
        &self.end
    }

    pub fn into_bounds(self) -> (Bound<RowKey>, Bound<RowKey>) {
        (self.start, self.end)
    }

    /// Returns true if no row key can fall inside the range.
    pub fn is_empty(&self) -> bool {
        // An unbounded start is the same as a closed start at the empty key.
        let empty_key = RowKey::default();
        let (start, start_open) = match &self.start {
            Bound::Unbounded => (&empty_key, false),
            Bound::Included(k) => (k, false),
            Bound::Excluded(k) => (k, true),
        };
        let (end, end_open) = match &self.end {
            Bound::Unbounded => return false,
            Bound::Included(k) => (k, false),
            Bound::Excluded(k) => (k, true),
        };

        // (k, k\0) holds nothing: there is no key between consecutive keys.
        if start_open && end_open && *end == start.successor() {
            return true;
        }

        match start.cmp(end) {
            Ordering::Less => false,
            Ordering::Equal => start_open || end_open,
            Ordering::Greater => true,
        }
    }

    /// True if `key` is after the start bound.
    pub fn above_start(&self, key: &RowKey) -> bool {
        match &self.start {
            Bound::Unbounded => true,
            Bound::Included(s) => key >= s,
            Bound::Excluded(s) => key > s,
        }
    }

    /// True if `key` is before the end bound.
    pub fn below_end(&self, key: &RowKey) -> bool {
        match &self.end {
            Bound::Unbounded => true,
            Bound::Included(e) => key <= e,
            Bound::Excluded(e) => key < e,
        }
    }

    pub fn contains(&self, key: &RowKey) -> bool {
        self.above_start(key) && self.below_end(key)
    }

    /// Intersection of two ranges, or None if they do not overlap.
    pub fn intersect(&self, other: &RowRange) -> Option<RowRange> {
        if self.is_empty() || other.is_empty() {
            return None;
        }
        let start = match compare_starts(&self.start, &other.start) {
            Ordering::Less => other.start.clone(),
            _ => self.start.clone(),
        };
        let end = match compare_ends(&self.end, &other.end) {
            Ordering::Greater => other.end.clone(),
            _ => self.end.clone(),
        };
        let result = RowRange::new(start, end);
        if result.is_empty() {
            None
        } else {
            Some(result)
        }
    }
}

/// Orders start bounds by the first key they admit.
fn compare_starts(a: &Bound<RowKey>, b: &Bound<RowKey>) -> Ordering {
    match (a, b) {
        (Bound::Unbounded, Bound::Unbounded) => Ordering::Equal,
        (Bound::Unbounded, _) => Ordering::Less,
        (_, Bound::Unbounded) => Ordering::Greater,
        (Bound::Included(x), Bound::Included(y)) | (Bound::Excluded(x), Bound::Excluded(y)) => {
            x.cmp(y)
        }
        (Bound::Included(x), Bound::Excluded(y)) => x.cmp(y).then(Ordering::Less),
        (Bound::Excluded(x), Bound::Included(y)) => x.cmp(y).then(Ordering::Greater),
    }
}

/// Orders end bounds by the last key they admit.
fn compare_ends(a: &Bound<RowKey>, b: &Bound<RowKey>) -> Ordering {
    match (a, b) {
        (Bound::Unbounded, Bound::Unbounded) => Ordering::Equal,
        (Bound::Unbounded, _) => Ordering::Greater,
        (_, Bound::Unbounded) => Ordering::Less,
        (Bound::Included(x), Bound::Included(y)) | (Bound::Excluded(x), Bound::Excluded(y)) => {
            x.cmp(y)
        }
        (Bound::Included(x), Bound::Excluded(y)) => x.cmp(y).then(Ordering::Greater),
        (Bound::Excluded(x), Bound::Included(y)) => x.cmp(y).then(Ordering::Less),
    }
}

impl fmt::Display for RowRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.start {
            Bound::Unbounded => write!(f, "(-inf")?,
            Bound::Included(k) => write!(f, "[{}", k)?,
            Bound::Excluded(k) => write!(f, "({}", k)?,
        }
        match &self.end {
            Bound::Unbounded => write!(f, ", +inf)"),
            Bound::Included(k) => write!(f, ", {}]", k),
            Bound::Excluded(k) => write!(f, ", {})", k),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> RowKey {
        RowKey::from(s)
    }

    #[test]
    fn test_is_empty() {
        assert!(!RowRange::infinite().is_empty());
        assert!(RowRange::empty().is_empty());
        assert!(!RowRange::closed("a", "a").is_empty());
        assert!(RowRange::right_open("a", "a").is_empty());
        assert!(RowRange::left_open("a", "a").is_empty());
        assert!(RowRange::closed("b", "a").is_empty());
        assert!(!RowRange::open("a", "c").is_empty());
        // nothing fits between "a" and "a\0"
        assert!(RowRange::open("a", "a\0").is_empty());
        assert!(!RowRange::left_open("a", "a\0").is_empty());
        // "" is the smallest key
        assert!(RowRange::new(Bound::Unbounded, Bound::Excluded(key(""))).is_empty());
        assert!(!RowRange::ending_at("").is_empty());
    }

    #[test]
    fn test_contains() {
        let r = RowRange::right_open("b", "d");
        assert!(!r.contains(&key("a")));
        assert!(r.contains(&key("b")));
        assert!(r.contains(&key("c")));
        assert!(!r.contains(&key("d")));

        let r = RowRange::left_open("b", "d");
        assert!(!r.contains(&key("b")));
        assert!(r.contains(&key("d")));

        assert!(RowRange::infinite().contains(&key("")));
        assert!(!RowRange::empty().contains(&key("")));
    }

    #[test]
    fn test_prefix() {
        let r = RowRange::prefix("user#");
        assert!(r.contains(&key("user#")));
        assert!(r.contains(&key("user#123")));
        assert!(!r.contains(&key("user$")));
        assert!(!r.contains(&key("user")));

        let r = RowRange::prefix(&[0xFFu8][..]);
        assert_eq!(r.end(), &Bound::Unbounded);
    }

    #[test]
    fn test_intersect_overlapping() {
        let a = RowRange::closed("a", "m");
        let b = RowRange::right_open("f", "z");
        assert_eq!(a.intersect(&b), Some(RowRange::closed("f", "m")));
        assert_eq!(b.intersect(&a), Some(RowRange::closed("f", "m")));
    }

    #[test]
    fn test_intersect_prefers_tighter_bound_kind() {
        let a = RowRange::closed("a", "m");
        let b = RowRange::open("a", "m");
        assert_eq!(a.intersect(&b), Some(RowRange::open("a", "m")));

        let c = RowRange::after("a");
        assert_eq!(a.intersect(&c), Some(RowRange::left_open("a", "m")));
    }

    #[test]
    fn test_intersect_disjoint() {
        let a = RowRange::right_open("a", "c");
        let b = RowRange::closed("c", "d");
        assert_eq!(a.intersect(&b), None);
        assert_eq!(RowRange::empty().intersect(&RowRange::infinite()), None);
    }

    #[test]
    fn test_intersect_with_infinite_is_identity() {
        let r = RowRange::left_open("k1", "k9");
        assert_eq!(r.intersect(&RowRange::infinite()), Some(r.clone()));
    }

    #[test]
    fn test_display() {
        assert_eq!(RowRange::right_open("a", "b").to_string(), "[a, b)");
        assert_eq!(RowRange::after("a").to_string(), "(a, +inf)");
        assert_eq!(RowRange::ending_at("z").to_string(), "(-inf, z]");
    }
}
