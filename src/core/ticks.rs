//! Timeline tick marks and the zoom window.
//!
//! Zoom levels double from 1 (full timeline) up to the configured maximum.
//! Zooming in takes `floor(full / level)` years, zooming out `ceil(full / level)`,
//! so a zoom-in followed by a zoom-out never narrows the window.

use log::{debug, info};
use std::collections::BTreeSet;

use crate::core::error::{TimelineError, TimelineResult};
use crate::core::year::{Year, ZoomRange};

/// Default deepest zoom level.
pub const MAX_ZOOM_LEVEL: u32 = 8;

/// One mark on the timeline. Unavailable ticks render but are not clickable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tick {
    pub year: Year,
    pub is_major: bool,
    pub available: bool,
}

/// Major and minor tick spacing in years.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickDensity {
    pub major: i32,
    pub minor: i32,
}

/// Spacing for a window `width` years wide.
pub fn density(width: i32) -> TickDensity {
    let (major, minor) = match width {
        w if w <= 30 => (5, 1),
        w if w <= 60 => (10, 5),
        w if w <= 120 => (20, 10),
        _ => (50, 10),
    };
    TickDensity { major, minor }
}

/// Ticks for `range`, sorted by year.
///
/// Minor ticks fall on multiples of the minor spacing. Both range bounds are
/// always marked so the window edges stay labelled.
pub fn ticks(range: ZoomRange, available: impl Fn(Year) -> bool) -> Vec<Tick> {
    let TickDensity { major, minor } = density(range.width());

    let first = range.start + (minor - range.start.rem_euclid(minor)) % minor;
    let mut years: BTreeSet<Year> = (first..=range.end).step_by(minor as usize).collect();
    years.insert(range.start);
    years.insert(range.end);

    years
        .into_iter()
        .map(|year| Tick {
            year,
            is_major: year.rem_euclid(major) == 0,
            available: available(year),
        })
        .collect()
}

/// Zoom window state.
#[derive(Clone, Debug)]
pub struct ZoomManager {
    full: ZoomRange,
    range: ZoomRange,
    level: u32,
    max_level: u32,
}

impl Default for ZoomManager {
    fn default() -> Self {
        Self::new(ZoomRange::full(), MAX_ZOOM_LEVEL)
    }
}

impl ZoomManager {
    pub fn new(full: ZoomRange, max_level: u32) -> Self {
        Self {
            full,
            range: full,
            level: 1,
            max_level: max_level.max(1),
        }
    }

    pub fn full(&self) -> ZoomRange {
        self.full
    }

    pub fn range(&self) -> ZoomRange {
        self.range
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// Halve the window around `current`. Errors at the deepest level and
    /// leaves the window untouched.
    pub fn zoom_in(&mut self, current: Year) -> TimelineResult<ZoomRange> {
        let next = self.level * 2;
        if next > self.max_level {
            debug!("Zoom in refused at level {}", self.level);
            return Err(TimelineError::InvalidZoom { level: next });
        }
        let width = self.full.width() / next as i32;
        self.apply(next, width, current)
    }

    /// Double the window around `current`. Errors when already at full range.
    pub fn zoom_out(&mut self, current: Year) -> TimelineResult<ZoomRange> {
        if self.level <= 1 {
            debug!("Zoom out refused at full range");
            return Err(TimelineError::InvalidZoom { level: 0 });
        }
        let next = self.level / 2;
        let width = (self.full.width() + next as i32 - 1) / next as i32;
        self.apply(next, width, current)
    }

    /// Back to the full timeline at level 1.
    pub fn reset(&mut self) -> ZoomRange {
        if self.level != 1 {
            info!("Zoom reset to {}", self.full);
        }
        self.level = 1;
        self.range = self.full;
        self.range
    }

    /// Ticks for the current window.
    pub fn ticks(&self, available: impl Fn(Year) -> bool) -> Vec<Tick> {
        ticks(self.range, available)
    }

    fn apply(&mut self, level: u32, width: i32, current: Year) -> TimelineResult<ZoomRange> {
        self.level = level;
        self.range = if level == 1 {
            self.full
        } else {
            centered(self.full, self.full.clamp(current), width)
        };
        info!("Zoom level {} -> {}", self.level, self.range);
        Ok(self.range)
    }
}

/// Window of `width` years centred on `center`, shifted to stay inside `full`.
fn centered(full: ZoomRange, center: Year, width: i32) -> ZoomRange {
    let width = width.min(full.width());
    let mut start = full.start.max(center - width / 2);
    let mut end = full.end.min(start + width);
    if end == full.end {
        start = full.start.max(full.end - width);
    }
    if start == full.start {
        end = full.end.min(full.start + width);
    }
    ZoomRange { start, end }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_density_rule() {
        assert_eq!(density(30), TickDensity { major: 5, minor: 1 });
        assert_eq!(density(31), TickDensity { major: 10, minor: 5 });
        assert_eq!(density(60), TickDensity { major: 10, minor: 5 });
        assert_eq!(density(120), TickDensity { major: 20, minor: 10 });
        assert_eq!(density(392), TickDensity { major: 50, minor: 10 });
    }

    #[test]
    fn test_ticks_sorted_with_bounds() {
        for (s, e) in [(1607, 1999), (1790, 1820), (1803, 1851), (1850, 1850)] {
            let range = ZoomRange::new(s, e);
            let t = ticks(range, |_| true);
            assert_eq!(t.first().map(|t| t.year), Some(s));
            assert_eq!(t.last().map(|t| t.year), Some(e));
            assert!(t.windows(2).all(|w| w[0].year <= w[1].year));
        }
    }

    #[test]
    fn test_ticks_full_range_layout() {
        let t = ticks(ZoomRange::full(), |y| y % 10 == 0);
        let years: Vec<Year> = t.iter().map(|t| t.year).collect();
        assert_eq!(&years[..3], &[1607, 1610, 1620]);
        assert_eq!(&years[years.len() - 2..], &[1990, 1999]);

        let majors: Vec<Year> = t.iter().filter(|t| t.is_major).map(|t| t.year).collect();
        assert_eq!(majors, vec![1650, 1700, 1750, 1800, 1850, 1900, 1950]);

        assert!(!t[0].available);
        assert!(t[1].available);
    }

    #[test]
    fn test_zoom_in_centres_on_year() {
        let mut zoom = ZoomManager::default();
        let range = zoom.zoom_in(1850).unwrap();
        assert_eq!(zoom.level(), 2);
        assert_eq!(range.width(), 392 / 2);
        assert!(range.contains(1850));
    }

    #[test]
    fn test_zoom_clamps_and_keeps_width() {
        let mut zoom = ZoomManager::default();
        let range = zoom.zoom_in(1610).unwrap();
        assert_eq!(range, ZoomRange::new(1607, 1607 + 196));

        zoom.reset();
        let range = zoom.zoom_in(1999).unwrap();
        assert_eq!(range, ZoomRange::new(1999 - 196, 1999));
    }

    #[test]
    fn test_zoom_out_after_zoom_in_never_narrows() {
        for year in (1607..=1999).step_by(7) {
            let mut zoom = ZoomManager::default();
            for _ in 0..2 {
                let before = zoom.range().width();
                zoom.zoom_in(year).unwrap();
                let after = zoom.zoom_out(year).unwrap();
                assert!(after.width() >= before, "year {}", year);
                zoom.zoom_in(year).unwrap();
            }
        }
    }

    #[test]
    fn test_zoom_bounds_are_errors() {
        let mut zoom = ZoomManager::default();
        assert_eq!(zoom.zoom_out(1850), Err(TimelineError::InvalidZoom { level: 0 }));
        for _ in 0..3 {
            zoom.zoom_in(1850).unwrap();
        }
        assert_eq!(zoom.level(), 8);
        let range = zoom.range();
        assert!(zoom.zoom_in(1850).is_err());
        assert_eq!(zoom.range(), range);
        assert_eq!(zoom.level(), 8);
    }

    #[test]
    fn test_zoom_out_to_level_one_is_full() {
        let mut zoom = ZoomManager::default();
        zoom.zoom_in(1700).unwrap();
        assert_eq!(zoom.zoom_out(1700).unwrap(), ZoomRange::full());
        assert_eq!(zoom.level(), 1);
    }
}
