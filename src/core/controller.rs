//! Timeline controller: sole owner of the canonical year and the zoom window.
//!
//! **Architecture**: the controller never blocks. `set_year` snaps the request,
//! fires `load` on every active provider and returns; providers apply their
//! results in the background and report through the event bus.
//!
//! Playback lives in [`AnimationScheduler`], which drives the controller
//! through the same command surface as manual interaction.
//!
//! [`AnimationScheduler`]: crate::core::scheduler::AnimationScheduler

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::TimelineSettings;
use crate::core::availability::AvailabilityIndex;
use crate::core::error::TimelineResult;
use crate::core::event_bus::Notifier;
use crate::core::events::{PlaybackStateChangedEvent, TicksChangedEvent, YearChangedEvent, ZoomChangedEvent};
use crate::core::provider::{DataProvider, LoadHandle, ProviderId, ProviderRegistry};
use crate::core::scheduler::PlaybackMode;
use crate::core::ticks::{Tick, ZoomManager};
use crate::core::year::{Year, ZoomRange};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
}

/// What the UI currently shows: which providers are active and which one
/// governs year snapping.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveContext {
    pub name: String,
    /// Years are snapped to the primary provider's data.
    pub data_dependent: bool,
    pub primary: Option<ProviderId>,
    /// Providers loaded on every year change. The primary and the selected
    /// subset are implied.
    pub active: Vec<ProviderId>,
    /// Historical narrative context (earlier decade-mode floor).
    pub narrative: bool,
    /// Selected overlay subset, if any. Selects sparse-jump playback.
    pub selected_subset: Option<ProviderId>,
}

impl ActiveContext {
    /// Free-year context with no providers.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Snap years to `primary` and load it on every change.
    pub fn with_primary(mut self, primary: impl Into<ProviderId>) -> Self {
        self.data_dependent = true;
        self.primary = Some(primary.into());
        self
    }

    pub fn with_active(mut self, id: impl Into<ProviderId>) -> Self {
        let id = id.into();
        if !self.active.contains(&id) {
            self.active.push(id);
        }
        self
    }

    pub fn with_narrative(mut self, narrative: bool) -> Self {
        self.narrative = narrative;
        self
    }

    pub fn with_subset(mut self, subset: Option<ProviderId>) -> Self {
        self.selected_subset = subset;
        self
    }

    /// Primary first, then the selected subset, then the other active
    /// providers, without duplicates.
    pub fn providers(&self) -> Vec<ProviderId> {
        let mut ids: Vec<ProviderId> = self.primary.iter().cloned().collect();
        for id in self.selected_subset.iter().chain(&self.active) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

pub struct TimelineController {
    settings: TimelineSettings,
    registry: ProviderRegistry,
    context: ActiveContext,
    year: Year,
    zoom: ZoomManager,
    ticks: Vec<Tick>,
    state: PlaybackState,
    mode: Option<PlaybackMode>,
    /// Latest handle per provider, used to skip duplicate requests.
    in_flight: HashMap<ProviderId, LoadHandle>,
    notifier: Notifier,
}

impl TimelineController {
    pub fn new(settings: TimelineSettings, registry: ProviderRegistry, notifier: Notifier) -> Self {
        let zoom = ZoomManager::new(settings.full_range, settings.max_zoom_level);
        let year = settings.full_range.clamp(settings.default_min_year);
        let mut controller = Self {
            settings,
            registry,
            context: ActiveContext::new("default"),
            year,
            zoom,
            ticks: Vec::new(),
            state: PlaybackState::Idle,
            mode: None,
            in_flight: HashMap::new(),
            notifier,
        };
        controller.ticks = controller.compute_ticks();
        controller
    }

    // === Queries ===

    pub fn year(&self) -> Year {
        self.year
    }

    pub fn zoom_range(&self) -> ZoomRange {
        self.zoom.range()
    }

    pub fn zoom_level(&self) -> u32 {
        self.zoom.level()
    }

    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    pub fn context(&self) -> &ActiveContext {
        &self.context
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn mode(&self) -> Option<&PlaybackMode> {
        self.mode.as_ref()
    }

    pub fn settings(&self) -> &TimelineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ProviderRegistry {
        &mut self.registry
    }

    pub fn provider(&self, id: &ProviderId) -> TimelineResult<std::sync::Arc<dyn DataProvider>> {
        self.registry.get(id)
    }

    /// Availability view for the active context.
    pub fn availability(&self) -> AvailabilityIndex {
        AvailabilityIndex::new(&self.registry, self.context.primary.as_ref(), self.context.data_dependent)
    }

    pub fn is_available(&self, year: Year) -> bool {
        self.availability().is_available(year)
    }

    /// Decade-mode floor for the active context.
    pub fn context_minimum(&self) -> Year {
        if self.context.narrative {
            self.settings.narrative_min_year
        } else {
            self.settings.default_min_year
        }
    }

    /// Number of provider loads still pending.
    pub fn pending_loads(&self) -> usize {
        self.in_flight.values().filter(|h| h.is_pending()).count()
    }

    // === Year ===

    /// Move to `requested`, snapped to the nearest year with data in the zoom
    /// window when the context is data dependent. Returns the applied year.
    pub fn set_year(&mut self, requested: Year) -> Year {
        let actual = self.availability().nearest(requested, self.zoom.range());
        self.apply_year(actual, requested)
    }

    /// Move to `year` as given (clamped into the zoom window). Used by
    /// sparse-jump playback whose years come from the availability list.
    pub fn set_year_exact(&mut self, year: Year) -> Year {
        let actual = self.zoom.range().clamp(year);
        self.apply_year(actual, year)
    }

    /// Previous (`forward == false`) or next available year inside the zoom
    /// window. Returns None and keeps the year when there is none.
    pub fn step(&mut self, forward: bool) -> Option<Year> {
        let target = self.availability().step(self.year, forward, self.zoom.range())?;
        Some(self.set_year_exact(target))
    }

    fn apply_year(&mut self, actual: Year, requested: Year) -> Year {
        if actual != self.year {
            debug!("Year {} -> {} (requested {})", self.year, actual, requested);
        }
        self.year = actual;
        self.load_active();
        self.refresh_ticks();
        self.notifier.emit(YearChangedEvent { year: actual, requested });
        actual
    }

    /// Fire `load(year)` on every active provider. Requests for the year
    /// already in flight are skipped.
    fn load_active(&mut self) {
        for id in self.context.providers() {
            if let Some(handle) = self.in_flight.get(&id)
                && handle.year() == self.year
                && handle.is_pending()
            {
                continue;
            }
            match self.registry.get(&id) {
                Ok(provider) => {
                    let handle = provider.load(self.year);
                    self.in_flight.insert(id, handle);
                }
                Err(e) => warn!("{}", e),
            }
        }
    }

    /// Reissue `load` for active providers whose rendering vanished.
    /// Returns how many providers were repaired.
    pub fn repair_active(&mut self) -> usize {
        let mut repaired = 0;
        for id in self.context.providers() {
            let Ok(provider) = self.registry.get(&id) else { continue };
            if provider.needs_repair(self.year) {
                warn!("Rendering of {} for {} missing, reloading", id, self.year);
                let handle = provider.load(self.year);
                self.in_flight.insert(id, handle);
                repaired += 1;
            }
        }
        repaired
    }

    // === Zoom ===

    /// Halve the zoom window around the current year. False when already at
    /// the deepest level.
    pub fn zoom_in(&mut self) -> bool {
        let result = self.zoom.zoom_in(self.year);
        self.after_zoom(result)
    }

    /// Double the zoom window. False when already at full range.
    pub fn zoom_out(&mut self) -> bool {
        let result = self.zoom.zoom_out(self.year);
        self.after_zoom(result)
    }

    pub fn reset_zoom(&mut self) {
        let level = self.zoom.level();
        let range = self.zoom.reset();
        if level != 1 {
            self.notifier.emit(ZoomChangedEvent { range, level: 1 });
        }
        self.refresh_ticks();
    }

    fn after_zoom(&mut self, result: TimelineResult<ZoomRange>) -> bool {
        match result {
            Ok(range) => {
                self.notifier.emit(ZoomChangedEvent {
                    range,
                    level: self.zoom.level(),
                });
                if range.contains(self.year) {
                    self.refresh_ticks();
                } else {
                    self.set_year(self.year);
                }
                true
            }
            Err(e) => {
                debug!("{}", e);
                false
            }
        }
    }

    // === Context ===

    /// Switch the active context. Ticks are regenerated and the current year
    /// is re-applied so the new providers load.
    pub fn set_context(&mut self, context: ActiveContext) {
        info!("Context '{}' -> '{}'", self.context.name, context.name);
        self.context = context;
        self.in_flight.clear();
        self.ticks.clear();
        self.set_year(self.year);
    }

    /// Full zoom and the context's minimum year.
    pub fn reset_context(&mut self) {
        self.zoom.reset();
        self.notifier.emit(ZoomChangedEvent {
            range: self.zoom.range(),
            level: 1,
        });
        let minimum = self.context_minimum();
        self.set_year(minimum);
    }

    // === Ticks ===

    /// Recompute ticks. Publishes and returns true when they changed.
    pub fn refresh_ticks(&mut self) -> bool {
        let ticks = self.compute_ticks();
        if ticks == self.ticks {
            return false;
        }
        self.ticks = ticks;
        self.notifier.emit(TicksChangedEvent(self.ticks.clone()));
        true
    }

    fn compute_ticks(&self) -> Vec<Tick> {
        let availability = self.availability();
        self.zoom.ticks(|y| availability.is_available(y))
    }

    // === Playback state ===

    /// Record the playback state. Only the scheduler calls this.
    pub fn set_playback_state(&mut self, state: PlaybackState, mode: Option<PlaybackMode>) {
        if self.state == state && self.mode == mode {
            return;
        }
        info!("Playback {:?} -> {:?}", self.state, state);
        self.state = state;
        self.mode = mode.clone();
        self.notifier.emit(PlaybackStateChangedEvent { state, mode });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event_bus::{EventBus, downcast_event};
    use crate::core::provider::{LoadSequence, LoadTicket};
    use std::collections::BTreeSet;
    use std::sync::{Arc, Mutex};

    /// Records every load call, completes immediately.
    struct Recording {
        id: ProviderId,
        years: BTreeSet<Year>,
        sequence: LoadSequence,
        calls: Mutex<Vec<Year>>,
    }

    impl Recording {
        fn new(id: &str, years: impl IntoIterator<Item = Year>) -> Arc<Self> {
            Arc::new(Self {
                id: id.into(),
                years: years.into_iter().collect(),
                sequence: LoadSequence::new(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Year> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl DataProvider for Recording {
        fn id(&self) -> &ProviderId {
            &self.id
        }
        fn has_data(&self, year: Year) -> bool {
            self.years.contains(&year)
        }
        fn load(&self, year: Year) -> LoadHandle {
            self.calls.lock().unwrap().push(year);
            let ticket: LoadTicket = self.sequence.issue();
            LoadHandle::completed(self.id.clone(), year, ticket)
        }
    }

    fn setup() -> (TimelineController, Arc<Recording>, Arc<Recording>, EventBus) {
        let density = Recording::new("density", (1790..=1990).step_by(10));
        let railroads = Recording::new("railroads", [1830, 1850, 1870]);
        let mut registry = ProviderRegistry::new();
        registry.register(density.clone());
        registry.register(railroads.clone());

        let bus = EventBus::new();
        let mut ctl = TimelineController::new(TimelineSettings::default(), registry, Notifier::from(&bus));
        ctl.set_context(
            ActiveContext::new("population")
                .with_primary("density")
                .with_active("railroads"),
        );
        bus.poll();
        (ctl, density, railroads, bus)
    }

    #[test]
    fn test_set_year_snaps_and_loads_all_active() {
        let (mut ctl, density, railroads, bus) = setup();
        assert_eq!(ctl.set_year(1855), 1850);
        assert_eq!(ctl.year(), 1850);
        assert_eq!(density.calls().last(), Some(&1850));
        assert_eq!(railroads.calls().last(), Some(&1850));

        let events = bus.poll();
        let year = events
            .iter()
            .find_map(|e| downcast_event::<YearChangedEvent>(e))
            .unwrap();
        assert_eq!(year, &YearChangedEvent { year: 1850, requested: 1855 });
    }

    #[test]
    fn test_free_context_does_not_snap() {
        let (mut ctl, _, _, _) = setup();
        ctl.set_context(ActiveContext::new("territories").with_active("railroads"));
        assert_eq!(ctl.set_year(1855), 1855);
        assert!(ctl.ticks().iter().all(|t| t.available));
    }

    #[test]
    fn test_ticks_tagged_by_primary() {
        let (ctl, _, _, _) = setup();
        let t1800 = ctl.ticks().iter().find(|t| t.year == 1800).unwrap();
        let t1607 = ctl.ticks().iter().find(|t| t.year == 1607).unwrap();
        assert!(t1800.available);
        assert!(!t1607.available);
    }

    #[test]
    fn test_zoom_clamps_year_into_window() {
        let (mut ctl, _, _, _) = setup();
        ctl.set_year(1990);
        assert!(ctl.zoom_in());
        assert!(ctl.zoom_range().contains(1990));
        ctl.zoom.reset();
        ctl.set_year(1610);
        assert_eq!(ctl.year(), 1790);
        assert!(ctl.zoom_in());
        assert!(ctl.zoom_range().contains(ctl.year()));
    }

    #[test]
    fn test_zoom_limits_return_false() {
        let (mut ctl, _, _, _) = setup();
        assert!(!ctl.zoom_out());
        for _ in 0..3 {
            assert!(ctl.zoom_in());
        }
        assert!(!ctl.zoom_in());
        ctl.reset_zoom();
        assert_eq!(ctl.zoom_range(), ZoomRange::full());
    }

    #[test]
    fn test_step_moves_to_adjacent_available() {
        let (mut ctl, _, _, _) = setup();
        ctl.set_year(1850);
        assert_eq!(ctl.step(true), Some(1860));
        assert_eq!(ctl.step(false), Some(1850));
        ctl.set_year(1790);
        assert_eq!(ctl.step(false), None);
        assert_eq!(ctl.year(), 1790);
    }

    #[test]
    fn test_reset_context_uses_minimum() {
        let (mut ctl, _, _, _) = setup();
        ctl.zoom_in();
        ctl.set_year(1900);
        ctl.reset_context();
        assert_eq!(ctl.zoom_level(), 1);
        assert_eq!(ctl.year(), 1790);

        let narrative = ctl.context().clone().with_narrative(true);
        ctl.set_context(narrative);
        assert_eq!(ctl.context_minimum(), 1780);
    }

    #[test]
    fn test_selected_subset_is_loaded() {
        let (mut ctl, density, railroads, _) = setup();
        let context = ActiveContext::new("race")
            .with_primary("density")
            .with_active("density")
            .with_subset(Some("railroads".into()));
        assert_eq!(context.providers(), vec![ProviderId::from("density"), ProviderId::from("railroads")]);

        ctl.set_context(context);
        ctl.set_year_exact(1870);
        assert_eq!(density.calls().last(), Some(&1870));
        assert_eq!(railroads.calls().last(), Some(&1870));
    }

    #[test]
    fn test_unknown_provider_is_skipped() {
        let (mut ctl, density, _, _) = setup();
        ctl.set_context(ActiveContext::new("x").with_primary("density").with_active("canals"));
        assert_eq!(ctl.set_year(1800), 1800);
        assert_eq!(density.calls().last(), Some(&1800));
    }

    #[test]
    fn test_playback_state_event_once() {
        let (mut ctl, _, _, bus) = setup();
        ctl.set_playback_state(PlaybackState::Playing, Some(PlaybackMode::Decade));
        ctl.set_playback_state(PlaybackState::Playing, Some(PlaybackMode::Decade));
        let count = bus
            .poll()
            .iter()
            .filter(|e| downcast_event::<PlaybackStateChangedEvent>(e).is_some())
            .count();
        assert_eq!(count, 1);
    }
}
