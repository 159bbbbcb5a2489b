//! Coverage counters.

use std::fmt;
use std::ops::AddAssign;

/// Diagnostic tallies for one annotation run. They never influence
/// matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverageCounters {
    /// Plan nodes turned into events.
    pub processed: usize,
    /// Plan nodes passed through without an event.
    pub transparent: usize,
    /// Structural nodes that received an annotation.
    pub matched: usize,
}

impl CoverageCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan nodes seen in total.
    pub fn plan_nodes(&self) -> usize {
        self.processed + self.transparent
    }
}

impl AddAssign for CoverageCounters {
    fn add_assign(&mut self, other: Self) {
        self.processed += other.processed;
        self.transparent += other.transparent;
        self.matched += other.matched;
    }
}

impl fmt::Display for CoverageCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed: {}, transparent: {}, matched: {}",
            self.processed, self.transparent, self.matched
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate() {
        let mut total = CoverageCounters::new();
        total += CoverageCounters { processed: 2, transparent: 1, matched: 0 };
        total += CoverageCounters { processed: 1, transparent: 0, matched: 3 };
        assert_eq!(total, CoverageCounters { processed: 3, transparent: 1, matched: 3 });
        assert_eq!(total.plan_nodes(), 4);
        assert_eq!(total.to_string(), "processed: 3, transparent: 1, matched: 3");
    }
}
