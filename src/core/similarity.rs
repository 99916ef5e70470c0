//! Boundary similarity check and per-provider label placement cache.
//!
//! Label placement is the most expensive step of a year load. Consecutive
//! census years usually share near-identical region boundaries, so when the
//! freshly loaded regions overlap the cached ones by more than the threshold
//! the cached labels are reused verbatim.
//!
//! Overlap is measured on the aggregate union of each region set, not per
//! region. A single heavily changed region inside an otherwise stable set can
//! therefore still be reused.

use geo::{Area, BooleanOps, Centroid, CoordsIter, MultiPolygon, Point};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::year::Year;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.95;

/// One named region (state, county, territory) of a year's boundary set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub shape: MultiPolygon<f64>,
}

impl Region {
    pub fn new(name: impl Into<String>, shape: impl Into<MultiPolygon<f64>>) -> Self {
        Self {
            name: name.into(),
            shape: shape.into(),
        }
    }
}

/// Derived label anchor for a region.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelPoint {
    pub name: String,
    pub position: Point<f64>,
}

/// Most recently rendered region set plus the labels derived from it.
#[derive(Clone, Debug)]
pub struct BoundarySnapshot {
    /// Year the labels were computed for.
    pub year: Year,
    pub regions: Arc<Vec<Region>>,
    pub labels: Arc<Vec<LabelPoint>>,
}

/// Intersection area of the two sets divided by the smaller total area.
///
/// Returns None for empty, non-finite or zero-area input.
pub fn similarity(previous: &[Region], next: &[Region]) -> Option<f64> {
    let a = aggregate(previous)?;
    let b = aggregate(next)?;

    let area_a = a.unsigned_area();
    let area_b = b.unsigned_area();
    let smaller = area_a.min(area_b);
    if !(smaller.is_finite() && smaller > 0.0) {
        return None;
    }

    let overlap = match catch_unwind(AssertUnwindSafe(|| a.intersection(&b))) {
        Ok(shape) => shape.unsigned_area(),
        Err(_) => {
            warn!("Boundary intersection failed, treating sets as dissimilar");
            return None;
        }
    };
    Some((overlap / smaller).clamp(0.0, 1.0))
}

/// Decide whether labels computed for `previous` can be reused for `next`.
///
/// True when the overlap ratio exceeds `threshold`. Identical sets are always
/// reusable for any threshold up to 1.0. Malformed input is never reusable.
pub fn should_reuse(previous: &[Region], next: &[Region], threshold: f64) -> bool {
    if previous.is_empty() || next.is_empty() {
        return false;
    }
    if previous == next && threshold <= 1.0 {
        return aggregate(next).is_some();
    }
    similarity(previous, next).is_some_and(|ratio| ratio > threshold)
}

/// Union of every region shape, or None when the set is unusable.
fn aggregate(regions: &[Region]) -> Option<MultiPolygon<f64>> {
    if regions.is_empty() {
        return None;
    }
    let finite = regions
        .iter()
        .all(|r| r.shape.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite()));
    if !finite {
        return None;
    }

    let merged = catch_unwind(AssertUnwindSafe(|| {
        regions
            .iter()
            .fold(MultiPolygon::new(Vec::new()), |acc, r| acc.union(&r.shape))
    }))
    .ok()?;

    if merged.unsigned_area() > 0.0 { Some(merged) } else { None }
}

/// Label anchors: centroid of each region's largest polygon.
pub fn place_labels(regions: &[Region]) -> Vec<LabelPoint> {
    regions
        .iter()
        .filter_map(|region| {
            let largest = region.shape.iter().max_by(|a, b| {
                a.unsigned_area()
                    .partial_cmp(&b.unsigned_area())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })?;
            Some(LabelPoint {
                name: region.name.clone(),
                position: largest.centroid()?,
            })
        })
        .collect()
}

/// Label reuse counters.
#[derive(Debug, Default)]
pub struct ReuseStats {
    reused: AtomicU64,
    recomputed: AtomicU64,
}

impl ReuseStats {
    pub fn record_reuse(&self) {
        self.reused.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recompute(&self) {
        self.recomputed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reused(&self) -> u64 {
        self.reused.load(Ordering::Relaxed)
    }

    pub fn recomputed(&self) -> u64 {
        self.recomputed.load(Ordering::Relaxed)
    }
}

/// Per-provider snapshot holder.
#[derive(Debug)]
pub struct BoundaryCache {
    snapshot: Option<BoundarySnapshot>,
    threshold: f64,
    stats: ReuseStats,
}

impl Default for BoundaryCache {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl BoundaryCache {
    pub fn new(threshold: f64) -> Self {
        Self {
            snapshot: None,
            threshold,
            stats: ReuseStats::default(),
        }
    }

    pub fn snapshot(&self) -> Option<&BoundarySnapshot> {
        self.snapshot.as_ref()
    }

    pub fn stats(&self) -> &ReuseStats {
        &self.stats
    }

    /// Labels for `regions`: cached ones when similar enough, otherwise freshly
    /// placed. Returns the labels and whether they were reused. Nothing is
    /// recorded until [`commit`](Self::commit).
    pub fn labels_for(&self, year: Year, regions: &[Region]) -> (Arc<Vec<LabelPoint>>, bool) {
        if let Some(snapshot) = &self.snapshot
            && should_reuse(&snapshot.regions, regions, self.threshold)
        {
            debug!("Reusing labels from {} for {}", snapshot.year, year);
            return (Arc::clone(&snapshot.labels), true);
        }
        let labels = Arc::new(place_labels(regions));
        debug!("Placed {} labels for {}", labels.len(), year);
        (labels, false)
    }

    /// Record an applied load. A reused snapshot is kept verbatim, otherwise
    /// it is replaced wholesale.
    pub fn commit(&mut self, year: Year, regions: Arc<Vec<Region>>, labels: Arc<Vec<LabelPoint>>, reused: bool) {
        if reused && self.snapshot.is_some() {
            self.stats.record_reuse();
            return;
        }
        self.stats.record_recompute();
        self.snapshot = Some(BoundarySnapshot { year, regions, labels });
    }

    /// [`labels_for`](Self::labels_for) followed by [`commit`](Self::commit).
    pub fn refresh(&mut self, year: Year, regions: Arc<Vec<Region>>) -> (Arc<Vec<LabelPoint>>, bool) {
        let (labels, reused) = self.labels_for(year, &regions);
        self.commit(year, regions, Arc::clone(&labels), reused);
        (labels, reused)
    }}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Rect;

    fn square(name: &str, x: f64, y: f64, size: f64) -> Region {
        Region::new(name, Rect::new((x, y), (x + size, y + size)).to_polygon())
    }

    #[test]
    fn test_identical_sets_reuse_at_any_threshold() {
        let set = vec![square("Ohio", 0.0, 0.0, 10.0), square("Indiana", 10.0, 0.0, 10.0)];
        for threshold in [0.0, 0.5, 0.95, 0.999, 1.0] {
            assert!(should_reuse(&set, &set.clone(), threshold), "threshold {}", threshold);
        }
    }

    #[test]
    fn test_disjoint_sets_never_reuse() {
        let a = vec![square("A", 0.0, 0.0, 10.0)];
        let b = vec![square("B", 50.0, 50.0, 10.0)];
        for threshold in [0.0001, 0.5, 0.95, 1.0] {
            assert!(!should_reuse(&a, &b, threshold));
        }
    }

    #[test]
    fn test_similarity_uses_smaller_area() {
        let big = vec![square("Big", 0.0, 0.0, 10.0)];
        let small = vec![square("Small", 0.0, 0.0, 5.0)];
        // The smaller set lies fully inside the bigger one.
        let ratio = similarity(&big, &small).unwrap();
        assert!((ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_overlap_below_threshold() {
        let a = vec![square("A", 0.0, 0.0, 10.0)];
        let b = vec![square("A", 5.0, 0.0, 10.0)];
        let ratio = similarity(&a, &b).unwrap();
        assert!((ratio - 0.5).abs() < 1e-9);
        assert!(!should_reuse(&a, &b, 0.95));
        assert!(should_reuse(&a, &b, 0.4));
    }

    #[test]
    fn test_malformed_input_fails_safe() {
        let ok = vec![square("A", 0.0, 0.0, 10.0)];
        let nan = vec![square("Bad", f64::NAN, 0.0, 10.0)];
        let flat = vec![square("Flat", 0.0, 0.0, 0.0)];

        assert!(!should_reuse(&[], &ok, 0.5));
        assert!(!should_reuse(&ok, &[], 0.5));
        assert!(!should_reuse(&ok, &nan, 0.5));
        assert!(!should_reuse(&flat, &flat.clone(), 0.5));
        assert!(similarity(&ok, &flat).is_none());
    }

    #[test]
    fn test_labels_use_largest_polygon() {
        let shape = MultiPolygon::new(vec![
            Rect::new((0.0, 0.0), (2.0, 2.0)).to_polygon(),
            Rect::new((10.0, 10.0), (20.0, 20.0)).to_polygon(),
        ]);
        let labels = place_labels(&[Region::new("Michigan", shape)]);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].name, "Michigan");
        assert!((labels[0].position.x() - 15.0).abs() < 1e-9);
        assert!((labels[0].position.y() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_cache_reuses_then_replaces() {
        let mut cache = BoundaryCache::new(0.95);
        let base = Arc::new(vec![square("A", 0.0, 0.0, 100.0)]);
        let nudged = Arc::new(vec![square("A", 1.0, 0.0, 100.0)]);
        let moved = Arc::new(vec![square("A", 60.0, 0.0, 100.0)]);

        let (first, reused) = cache.refresh(1800, base);
        assert!(!reused);

        let (second, reused) = cache.refresh(1810, nudged);
        assert!(reused);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.snapshot().unwrap().year, 1800);

        let (third, reused) = cache.refresh(1820, moved);
        assert!(!reused);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(cache.snapshot().unwrap().year, 1820);

        assert_eq!(cache.stats().reused(), 1);
        assert_eq!(cache.stats().recomputed(), 2);
    }
}
