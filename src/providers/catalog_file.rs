//! JSON provider catalog: provider availability, geometry and UI contexts.
//!
//! ```json
//! {
//!   "providers": [
//!     { "id": "density", "years": [1790, 1800], "regions": { "1790": [...] } }
//!   ],
//!   "contexts": [
//!     { "name": "population", "data_dependent": true, "primary": "density" }
//!   ],
//!   "default_context": "population"
//! }
//! ```
//! Region shapes use the geo-types serde layout.

use anyhow::{Context, Result};
use geo::Rect;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use crate::core::controller::ActiveContext;
use crate::core::event_bus::Notifier;
use crate::core::provider::{LoadExecutor, ProviderId, ProviderRegistry};
use crate::core::similarity::Region;
use crate::core::year::Year;
use crate::providers::{CatalogProvider, StaticRegions};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSpec {
    pub id: ProviderId,
    /// Years with data. Years listed under `regions` or `failures` are added.
    pub years: Vec<Year>,
    pub regions: BTreeMap<Year, Vec<Region>>,
    /// Years whose load fails with the given reason.
    pub failures: BTreeMap<Year, String>,
}

impl ProviderSpec {
    pub fn available_years(&self) -> BTreeSet<Year> {
        self.years
            .iter()
            .copied()
            .chain(self.regions.keys().copied())
            .chain(self.failures.keys().copied())
            .collect()
    }

    fn source(&self) -> StaticRegions {
        let mut source = StaticRegions::new();
        for (year, regions) in &self.regions {
            source.insert(*year, regions.clone());
        }
        for (year, reason) in &self.failures {
            source.fail_on(*year, reason.clone());
        }
        source
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub providers: Vec<ProviderSpec>,
    pub contexts: Vec<ActiveContext>,
    pub default_context: Option<String>,
}

impl Catalog {
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
        let catalog: Catalog = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse catalog: {}", path.display()))?;
        info!(
            "Catalog {}: {} providers, {} contexts",
            path.display(),
            catalog.providers.len(),
            catalog.contexts.len()
        );
        Ok(catalog)
    }

    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize catalog")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write catalog: {}", path.display()))?;
        Ok(())
    }

    pub fn context(&self, name: &str) -> Option<&ActiveContext> {
        self.contexts.iter().find(|c| c.name == name)
    }

    /// Named default context, else the first one listed.
    pub fn initial_context(&self) -> Option<&ActiveContext> {
        self.default_context
            .as_deref()
            .and_then(|name| self.context(name))
            .or_else(|| self.contexts.first())
    }

    /// Build a [`CatalogProvider`] per entry and register it. Returns the
    /// concrete providers for callers that need more than the trait surface.
    pub fn register_all(
        &self,
        registry: &mut ProviderRegistry,
        executor: Arc<dyn LoadExecutor>,
        notifier: &Notifier,
        threshold: f64,
    ) -> Vec<Arc<CatalogProvider>> {
        self.providers
            .iter()
            .map(|spec| {
                let provider = Arc::new(
                    CatalogProvider::new(
                        spec.id.clone(),
                        spec.available_years(),
                        Arc::new(spec.source()),
                        Arc::clone(&executor),
                        notifier.clone(),
                    )
                    .with_threshold(threshold),
                );
                registry.register(provider.clone());
                provider
            })
            .collect()
    }

    /// Built-in sample used when no catalog file is given.
    pub fn demo() -> Self {
        let decades: Vec<Year> = (1790..=1990).step_by(10).collect();

        let density = ProviderSpec {
            id: "density".into(),
            regions: decades.iter().map(|&y| (y, demo_states(y))).collect(),
            ..ProviderSpec::default()
        };
        let railroads = ProviderSpec {
            id: "railroads".into(),
            years: (1830..=1890).step_by(10).collect(),
            ..ProviderSpec::default()
        };
        let race = |id: &str, years: Vec<Year>| ProviderSpec {
            id: id.into(),
            years,
            ..ProviderSpec::default()
        };

        Catalog {
            providers: vec![
                density,
                railroads,
                race("Percent-Black", decades.clone()),
                race("Percent-White", decades.clone()),
                race("Percent-Hispanic", vec![1980, 1990]),
                race("Percent-Asian", vec![1980, 1990]),
            ],
            contexts: vec![
                ActiveContext::new("population")
                    .with_primary("density")
                    .with_active("railroads"),
                ActiveContext::new("narrative").with_narrative(true),
                ActiveContext::new("race")
                    .with_primary("Percent-Black")
                    .with_subset(Some("Percent-Black".into())),
                ActiveContext::new("territories"),
            ],
            default_context: Some("population".into()),
        }
    }
}

/// One unit square per state, thirteen in 1790 and two more each decade.
fn demo_states(year: Year) -> Vec<Region> {
    let count = 13 + (year - 1790) / 10 * 2;
    (0..count)
        .map(|i| {
            let x = f64::from(i % 10);
            let y = f64::from(i / 10);
            Region::new(format!("State {}", i + 1), Rect::new((x, y), (x + 1.0, y + 1.0)).to_polygon())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider::{DataProvider, InlineExecutor};

    #[test]
    fn test_available_years_merge_sources() {
        let spec: ProviderSpec = serde_json::from_str(
            r#"{ "id": "canals", "years": [1830], "failures": { "1840": "gone" } }"#,
        )
        .unwrap();
        assert_eq!(spec.available_years().into_iter().collect::<Vec<_>>(), vec![1830, 1840]);
    }

    #[test]
    fn test_json_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("timemap_catalog_{}.json", std::process::id()));
        let demo = Catalog::demo();
        demo.to_json(&path).unwrap();
        let loaded = Catalog::from_json(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded.providers.len(), demo.providers.len());
        assert_eq!(loaded.initial_context().map(|c| c.name.as_str()), Some("population"));
        assert_eq!(loaded.providers[0].regions[&1850].len(), demo.providers[0].regions[&1850].len());
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = Catalog::from_json("/nonexistent/catalog.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read catalog"));
    }

    #[test]
    fn test_register_all() {
        let mut registry = ProviderRegistry::new();
        let providers = Catalog::demo().register_all(
            &mut registry,
            Arc::new(InlineExecutor),
            &Notifier::silent(),
            0.95,
        );
        assert_eq!(providers.len(), registry.len());
        let density = registry.get(&"density".into()).unwrap();
        assert!(density.has_data(1850));
        assert!(!density.has_data(1855));
        density.load(1850);
        assert_eq!(density.rendered_year(), Some(1850));
    }

    #[test]
    fn test_initial_context_falls_back_to_first() {
        let catalog = Catalog {
            contexts: vec![ActiveContext::new("a"), ActiveContext::new("b")],
            default_context: Some("missing".into()),
            ..Catalog::default()
        };
        assert_eq!(catalog.initial_context().map(|c| c.name.as_str()), Some("a"));
    }
}
