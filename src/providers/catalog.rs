//! Generic year-keyed provider.
//!
//! `CatalogProvider` answers availability from an in-memory year set and loads
//! region geometry through an opaque [`RegionSource`] on a [`LoadExecutor`].
//!
//! # Locking
//!
//! - `render` holds the visible state and the in-flight handle. `load()` only
//!   ever takes this lock, and only briefly.
//! - `cache` holds the boundary snapshot and is locked by jobs for the label
//!   computation. Jobs lock `cache` before `render`, never the reverse.
//!
//! New tickets are issued under the `render` lock and jobs re-check their
//! ticket under the same lock before applying, so a superseded result can
//! never become visible.

use log::{debug, trace, warn};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, RwLock};

use crate::core::error::TimelineError;
use crate::core::event_bus::Notifier;
use crate::core::events::{AvailabilityChangedEvent, LoadAppliedEvent, LoadFailedEvent};
use crate::core::provider::{DataProvider, LoadExecutor, LoadHandle, LoadSequence, ProviderId};
use crate::core::similarity::{BoundaryCache, LabelPoint, Region};
use crate::core::year::Year;
use crate::providers::RegionSource;

#[derive(Default)]
struct RenderState {
    rendered: Option<Year>,
    regions: Arc<Vec<Region>>,
    labels: Arc<Vec<LabelPoint>>,
    in_flight: Option<LoadHandle>,
    last_error: Option<TimelineError>,
}

impl RenderState {
    fn clear(&mut self) {
        self.rendered = None;
        self.regions = Arc::default();
        self.labels = Arc::default();
    }
}

pub struct CatalogProvider {
    id: ProviderId,
    years: RwLock<BTreeSet<Year>>,
    source: Arc<dyn RegionSource>,
    executor: Arc<dyn LoadExecutor>,
    sequence: LoadSequence,
    render: Arc<Mutex<RenderState>>,
    cache: Arc<Mutex<BoundaryCache>>,
    notifier: Notifier,
}

impl CatalogProvider {
    pub fn new(
        id: impl Into<ProviderId>,
        years: impl IntoIterator<Item = Year>,
        source: Arc<dyn RegionSource>,
        executor: Arc<dyn LoadExecutor>,
        notifier: Notifier,
    ) -> Self {
        Self {
            id: id.into(),
            years: RwLock::new(years.into_iter().collect()),
            source,
            executor,
            sequence: LoadSequence::new(),
            render: Arc::default(),
            cache: Arc::default(),
            notifier,
        }
    }

    /// Use `threshold` for label reuse instead of the default.
    pub fn with_threshold(self, threshold: f64) -> Self {
        *self.cache.lock().unwrap_or_else(|e| e.into_inner()) = BoundaryCache::new(threshold);
        self
    }

    /// Replace the availability map. Ticks depend on it, so a change is
    /// published as [`AvailabilityChangedEvent`].
    pub fn set_availability(&self, years: impl IntoIterator<Item = Year>) {
        let years: BTreeSet<Year> = years.into_iter().collect();
        {
            let mut current = self.years.write().unwrap_or_else(|e| e.into_inner());
            if *current == years {
                return;
            }
            *current = years;
        }
        debug!("Availability of {} changed", self.id);
        self.notifier.emit(AvailabilityChangedEvent(self.id.clone()));
    }

    pub fn years(&self) -> Vec<Year> {
        self.years
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .copied()
            .collect()
    }

    /// Drop the rendered artefacts without touching any load in flight.
    pub fn unload(&self) {
        let mut render = self.render.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(year) = render.rendered {
            debug!("Unloading {} ({})", self.id, year);
        }
        render.clear();
    }

    pub fn regions(&self) -> Arc<Vec<Region>> {
        Arc::clone(&self.render.lock().unwrap_or_else(|e| e.into_inner()).regions)
    }

    pub fn labels(&self) -> Arc<Vec<LabelPoint>> {
        Arc::clone(&self.render.lock().unwrap_or_else(|e| e.into_inner()).labels)
    }

    /// Failure of the most recent load, cleared by the next success.
    pub fn last_error(&self) -> Option<TimelineError> {
        self.render.lock().unwrap_or_else(|e| e.into_inner()).last_error.clone()
    }

    /// (reused, recomputed) label counts.
    pub fn label_stats(&self) -> (u64, u64) {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        (cache.stats().reused(), cache.stats().recomputed())
    }

    fn spawn_job(&self, handle: LoadHandle) {
        let id = self.id.clone();
        let source = Arc::clone(&self.source);
        let render = Arc::clone(&self.render);
        let cache = Arc::clone(&self.cache);
        let notifier = self.notifier.clone();

        self.executor.spawn(Box::new(move || {
            let year = handle.year();
            if !handle.is_current() {
                trace!("{} load for {} superseded before fetch", id, year);
                handle.mark_finished();
                return;
            }

            let outcome = match source.fetch(year) {
                Ok(regions) => {
                    let regions = Arc::new(regions);
                    let mut cache = cache.lock().unwrap_or_else(|e| e.into_inner());
                    let (labels, reused) = cache.labels_for(year, &regions);

                    let mut state = render.lock().unwrap_or_else(|e| e.into_inner());
                    if handle.is_current() {
                        cache.commit(year, Arc::clone(&regions), Arc::clone(&labels), reused);
                        state.rendered = Some(year);
                        state.regions = regions;
                        state.labels = labels;
                        state.last_error = None;
                        Some(Ok(reused))
                    } else {
                        None
                    }
                }
                Err(e) => {
                    let error = TimelineError::LoadFailure {
                        provider: id.clone(),
                        year,
                        reason: format!("{:#}", e),
                    };
                    let mut state = render.lock().unwrap_or_else(|e| e.into_inner());
                    if handle.is_current() {
                        state.last_error = Some(error.clone());
                        Some(Err(error))
                    } else {
                        None
                    }
                }
            };
            handle.mark_finished();

            match outcome {
                Some(Ok(labels_reused)) => {
                    debug!("{} rendered {}", id, year);
                    notifier.emit(LoadAppliedEvent {
                        provider: id,
                        year,
                        labels_reused,
                    });
                }
                Some(Err(error)) => {
                    warn!("{}", error);
                    notifier.emit(LoadFailedEvent(error));
                }
                None => trace!("{} discarded stale result for {}", id, year),
            }
        }));
    }
}

impl DataProvider for CatalogProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn has_data(&self, year: Year) -> bool {
        self.years
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&year)
    }

    fn load(&self, year: Year) -> LoadHandle {
        let has_data = self.has_data(year);
        let handle = {
            let mut state = self.render.lock().unwrap_or_else(|e| e.into_inner());

            if let Some(pending) = &state.in_flight
                && pending.year() == year
                && pending.is_pending()
            {
                return pending.clone();
            }

            // Any other request supersedes what is in flight.
            if let Some(previous) = state.in_flight.take() {
                previous.cancel();
            }
            let ticket = self.sequence.issue();

            if state.rendered == Some(year) {
                return LoadHandle::completed(self.id.clone(), year, ticket);
            }
            if !has_data {
                if state.rendered.is_some() {
                    debug!("{} has no data for {}, clearing", self.id, year);
                }
                state.clear();
                return LoadHandle::completed(self.id.clone(), year, ticket);
            }

            let handle = LoadHandle::new(self.id.clone(), year, ticket);
            state.in_flight = Some(handle.clone());
            handle
        };

        trace!("{} loading {}", self.id, year);
        self.spawn_job(handle.clone());
        handle
    }

    fn rendered_year(&self) -> Option<Year> {
        self.render.lock().unwrap_or_else(|e| e.into_inner()).rendered
    }

    fn needs_repair(&self, year: Year) -> bool {
        if !self.has_data(year) {
            return false;
        }
        let state = self.render.lock().unwrap_or_else(|e| e.into_inner());
        let loading = state.in_flight.as_ref().is_some_and(|h| h.is_pending());
        let failed = matches!(&state.last_error, Some(TimelineError::LoadFailure { year: y, .. }) if *y == year);
        state.rendered != Some(year) && !loading && !failed
    }
}
