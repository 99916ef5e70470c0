//! Which years have data for the active context, and nearest-year snapping.

use log::{debug, trace};
use std::sync::Arc;

use crate::core::provider::{DataProvider, ProviderId, ProviderRegistry};
use crate::core::year::{Year, ZoomRange};

/// Sorted years in `range` for which `provider` has data.
pub fn available_years(provider: &dyn DataProvider, range: ZoomRange) -> Vec<Year> {
    range.years().filter(|&y| provider.has_data(y)).collect()
}

/// Nearest year to `target` inside `range` with data.
///
/// The target is clamped into `range` first. The search then widens by one
/// year per step, trying the earlier year before the later one at each radius.
/// When nothing in range has data the clamped target is returned.
pub fn nearest(provider: &dyn DataProvider, target: Year, range: ZoomRange) -> Year {
    let target = range.clamp(target);
    if provider.has_data(target) {
        return target;
    }

    let max_radius = (target - range.start).max(range.end - target);
    for radius in 1..=max_radius {
        let before = target - radius;
        if before >= range.start && provider.has_data(before) {
            return before;
        }
        let after = target + radius;
        if after <= range.end && provider.has_data(after) {
            return after;
        }
    }

    trace!("No {} data in {}, keeping {}", provider.id(), range, target);
    target
}

/// Availability view for the active context.
///
/// Non-data-dependent contexts treat every year as available and snapping as
/// identity (apart from clamping into the range).
#[derive(Clone)]
pub struct AvailabilityIndex {
    primary: Option<Arc<dyn DataProvider>>,
    data_dependent: bool,
}

impl AvailabilityIndex {
    /// Resolve the primary provider. An unknown primary in a data-dependent
    /// context reports no data at all.
    pub fn new(registry: &ProviderRegistry, primary: Option<&ProviderId>, data_dependent: bool) -> Self {
        let primary = primary.and_then(|id| registry.get(id).ok());
        Self {
            primary,
            data_dependent,
        }
    }

    pub fn is_data_dependent(&self) -> bool {
        self.data_dependent
    }

    pub fn is_available(&self, year: Year) -> bool {
        if !self.data_dependent {
            return true;
        }
        self.primary.as_ref().is_some_and(|p| p.has_data(year))
    }

    pub fn nearest(&self, target: Year, range: ZoomRange) -> Year {
        match (&self.primary, self.data_dependent) {
            (Some(primary), true) => {
                let snapped = nearest(primary.as_ref(), target, range);
                if snapped != target {
                    debug!("Snapped {} -> {} ({})", target, snapped, primary.id());
                }
                snapped
            }
            _ => range.clamp(target),
        }
    }

    pub fn available_years(&self, range: ZoomRange) -> Vec<Year> {
        range.years().filter(|&y| self.is_available(y)).collect()
    }

    /// Closest available year strictly before (`forward == false`) or after
    /// `from` within `range`.
    pub fn step(&self, from: Year, forward: bool, range: ZoomRange) -> Option<Year> {
        if forward {
            (from.max(range.start - 1) + 1..=range.end).find(|&y| self.is_available(y))
        } else {
            (range.start..from.min(range.end + 1)).rev().find(|&y| self.is_available(y))
        }
    }
}
