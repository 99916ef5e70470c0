//! Year and year-range primitives shared by every timeline component.

use serde::{Deserialize, Serialize};

/// Calendar year on the timeline.
pub type Year = i32;

/// First year the timeline can show.
pub const FULL_START: Year = 1607;

/// Last year the timeline can show.
pub const FULL_END: Year = 1999;

/// Inclusive year window `[start, end]`.
///
/// Used both for the full timeline and for the current zoom window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoomRange {
    pub start: Year,
    pub end: Year,
}

impl ZoomRange {
    /// Build a range, swapping the bounds if given in reverse.
    pub fn new(start: Year, end: Year) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// The whole 1607..=1999 timeline.
    pub fn full() -> Self {
        Self::new(FULL_START, FULL_END)
    }

    /// `end - start`, the width used by tick density and zoom math.
    pub fn width(&self) -> i32 {
        self.end - self.start
    }

    pub fn contains(&self, year: Year) -> bool {
        year >= self.start && year <= self.end
    }

    pub fn clamp(&self, year: Year) -> Year {
        year.clamp(self.start, self.end)
    }

    /// Intersect with `outer`. Falls back to `outer` when disjoint.
    pub fn within(&self, outer: ZoomRange) -> ZoomRange {
        let start = self.start.max(outer.start);
        let end = self.end.min(outer.end);
        if end < start { outer } else { ZoomRange { start, end } }
    }

    pub fn years(&self) -> std::ops::RangeInclusive<Year> {
        self.start..=self.end
    }
}

impl Default for ZoomRange {
    fn default() -> Self {
        Self::full()
    }
}

impl std::fmt::Display for ZoomRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}..={}]", self.start, self.end)
    }
}
