//! Concrete providers and their geometry sources.

pub mod catalog;
pub mod catalog_file;

use anyhow::{Result, anyhow};
use std::collections::BTreeMap;

use crate::core::similarity::Region;
use crate::core::year::Year;

pub use catalog::CatalogProvider;
pub use catalog_file::{Catalog, ProviderSpec};

/// Opaque fetch and parse of one year's boundary geometry.
///
/// Runs on a loader thread. Errors become `LoadFailure` notices.
pub trait RegionSource: Send + Sync {
    fn fetch(&self, year: Year) -> Result<Vec<Region>>;
}

impl<F> RegionSource for F
where
    F: Fn(Year) -> Result<Vec<Region>> + Send + Sync,
{
    fn fetch(&self, year: Year) -> Result<Vec<Region>> {
        self(year)
    }
}

/// In-memory geometry keyed by year, with optional simulated failures.
#[derive(Clone, Debug, Default)]
pub struct StaticRegions {
    regions: BTreeMap<Year, Vec<Region>>,
    failures: BTreeMap<Year, String>,
}

impl StaticRegions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, year: Year, regions: Vec<Region>) {
        self.regions.insert(year, regions);
    }

    /// Make every fetch of `year` fail with `reason`.
    pub fn fail_on(&mut self, year: Year, reason: impl Into<String>) {
        self.failures.insert(year, reason.into());
    }
}

impl RegionSource for StaticRegions {
    /// Years without geometry load as an empty set.
    fn fetch(&self, year: Year) -> Result<Vec<Region>> {
        if let Some(reason) = self.failures.get(&year) {
            return Err(anyhow!("{}", reason));
        }
        Ok(self.regions.get(&year).cloned().unwrap_or_default())
    }
}
