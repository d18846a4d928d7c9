/// Filter operation for interval containment queries.
///
/// Controls how interval boundaries are treated when deciding whether an
/// outer interval contains an inner one.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum FilterOp {
    /// Inclusive containment: `outer.start <= inner.start && inner.end <= outer.end`.
    #[default]
    Weak = 0,
    /// Exclusive containment: the inner interval may not touch either boundary.
    Strict = 1,
}

impl FilterOp {
    /// Whether `[outer_start, outer_end]` contains `[start, end]`.
    pub fn contains(&self, outer_start: i32, outer_end: i32, start: i32, end: i32) -> bool {
        match self {
            FilterOp::Weak => outer_start <= start && end <= outer_end,
            FilterOp::Strict => outer_start < start && end < outer_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_accepts_shared_boundaries() {
        assert!(FilterOp::Weak.contains(50, 300, 50, 300));
        assert!(FilterOp::Weak.contains(50, 300, 100, 200));
        assert!(!FilterOp::Weak.contains(50, 300, 49, 200));
        assert!(!FilterOp::Weak.contains(50, 300, 100, 301));
    }

    #[test]
    fn strict_rejects_shared_boundaries() {
        assert!(!FilterOp::Strict.contains(50, 300, 50, 200));
        assert!(!FilterOp::Strict.contains(50, 300, 100, 300));
        assert!(FilterOp::Strict.contains(50, 300, 51, 299));
    }
}
