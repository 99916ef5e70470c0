//! Host-facing timeline: controller, scheduler, conditions and watchdog wired
//! to one event bus.
//!
//! The UI layer calls the commands below and drains notifications with
//! [`EventBus::poll`]. `update(now)` is called from the host loop (60 Hz is
//! plenty; playback cadence is 1.5 s or 2 s).

use log::{debug, info};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::config::TimelineSettings;
use crate::core::conditions::{ConditionBoard, DisablingCondition};
use crate::core::controller::{ActiveContext, PlaybackState, TimelineController};
use crate::core::error::TimelineResult;
use crate::core::event_bus::{EventBus, Notifier};
use crate::core::events::AvailabilityChangedEvent;
use crate::core::provider::ProviderRegistry;
use crate::core::scheduler::{AnimationScheduler, PlaybackMode};
use crate::core::ticks::Tick;
use crate::core::watchdog::Watchdog;
use crate::core::year::{Year, ZoomRange};

pub struct Timeline {
    controller: TimelineController,
    scheduler: AnimationScheduler,
    conditions: ConditionBoard,
    watchdog: Watchdog,
    /// Set when a provider's availability changed, consumed by `update`.
    ticks_dirty: Arc<AtomicBool>,
}

impl Timeline {
    pub fn new(settings: TimelineSettings, registry: ProviderRegistry, bus: &EventBus) -> Self {
        let notifier = Notifier::from(bus);
        let conditions = ConditionBoard::new(notifier.clone());
        let scheduler = AnimationScheduler::new(conditions.clone(), notifier.clone());
        scheduler.observe(bus);

        let ticks_dirty = Arc::new(AtomicBool::new(false));
        let dirty = Arc::clone(&ticks_dirty);
        bus.subscribe::<AvailabilityChangedEvent, _>(move |_| {
            dirty.store(true, Ordering::SeqCst);
        });

        let watchdog = Watchdog::new(settings.watchdog_interval_ms);
        Self {
            controller: TimelineController::new(settings, registry, notifier),
            scheduler,
            conditions,
            watchdog,
            ticks_dirty,
        }
    }

    // === Playback ===

    pub fn play(&mut self, now: Instant) -> TimelineResult<PlaybackMode> {
        self.scheduler.play(&mut self.controller, now)
    }

    pub fn pause(&mut self) -> bool {
        self.scheduler.pause(&mut self.controller)
    }

    /// Play/pause button. Returns the new state.
    pub fn toggle_play(&mut self, now: Instant) -> PlaybackState {
        if self.scheduler.is_playing() {
            self.pause();
        } else {
            let _ = self.play(now);
        }
        self.controller.state()
    }

    /// Drive playback, tick regeneration and the watchdog. Returns the year
    /// applied by playback, if a step was due.
    pub fn update(&mut self, now: Instant) -> Option<Year> {
        if self.ticks_dirty.swap(false, Ordering::SeqCst) {
            debug!("Availability changed, regenerating ticks");
            self.controller.refresh_ticks();
        }

        let stepped = self.scheduler.update(&mut self.controller, now);

        if self.watchdog.tick(now) {
            let repaired = self.controller.repair_active();
            if repaired > 0 {
                info!("Watchdog reissued {} load(s)", repaired);
            }
        }
        stepped
    }

    // === Manual interaction (always stops playback) ===

    pub fn set_year(&mut self, year: Year) -> Year {
        self.scheduler.interrupt(&mut self.controller);
        self.controller.set_year(year)
    }

    /// Left arrow: previous available year in the zoom window.
    pub fn step_backward(&mut self) -> Option<Year> {
        self.scheduler.interrupt(&mut self.controller);
        self.controller.step(false)
    }

    /// Right arrow: next available year in the zoom window.
    pub fn step_forward(&mut self) -> Option<Year> {
        self.scheduler.interrupt(&mut self.controller);
        self.controller.step(true)
    }

    // === Zoom ===

    pub fn zoom_in(&mut self) -> bool {
        self.controller.zoom_in()
    }

    pub fn zoom_out(&mut self) -> bool {
        self.controller.zoom_out()
    }

    pub fn reset_zoom(&mut self) {
        self.controller.reset_zoom()
    }

    // === Context and conditions ===

    /// Tab switch: stops playback, regenerates ticks.
    pub fn set_context(&mut self, context: ActiveContext) {
        self.scheduler.interrupt(&mut self.controller);
        self.controller.set_context(context);
    }

    /// Full zoom and the context's minimum year.
    pub fn reset_context(&mut self) {
        self.scheduler.interrupt(&mut self.controller);
        self.controller.reset_context();
    }

    /// Push a UI condition. Turning one on stops playback at once.
    pub fn set_condition(&mut self, condition: DisablingCondition, active: bool) {
        if self.conditions.set(condition, active) && active && self.scheduler.is_playing() {
            info!("Stopping playback: {}", condition);
            self.scheduler.pause(&mut self.controller);
        }
    }

    /// Notice for a disabled play control, if any condition holds.
    pub fn play_notice(&self) -> Option<&'static str> {
        self.conditions.first_active().map(|c| c.notice())
    }

    // === Queries ===

    pub fn year(&self) -> Year {
        self.controller.year()
    }

    pub fn zoom_range(&self) -> ZoomRange {
        self.controller.zoom_range()
    }

    pub fn zoom_level(&self) -> u32 {
        self.controller.zoom_level()
    }

    pub fn ticks(&self) -> &[Tick] {
        self.controller.ticks()
    }

    pub fn state(&self) -> PlaybackState {
        self.controller.state()
    }

    pub fn mode(&self) -> Option<&PlaybackMode> {
        self.scheduler.mode()
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_playing()
    }

    pub fn context(&self) -> &ActiveContext {
        self.controller.context()
    }

    pub fn conditions(&self) -> &ConditionBoard {
        &self.conditions
    }

    pub fn controller(&self) -> &TimelineController {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event_bus::downcast_event;
    use crate::core::events::PlaybackStateChangedEvent;
    use crate::core::provider::{DataProvider, InlineExecutor, LoadExecutor};
    use crate::providers::{CatalogProvider, StaticRegions};
    use std::time::Duration;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn setup() -> (Timeline, Arc<CatalogProvider>, EventBus) {
        let bus = EventBus::new();
        let executor: Arc<dyn LoadExecutor> = Arc::new(InlineExecutor);
        let density = Arc::new(CatalogProvider::new(
            "density",
            (1790..=1990).step_by(10),
            Arc::new(StaticRegions::new()),
            executor,
            Notifier::from(&bus),
        ));
        let mut registry = ProviderRegistry::new();
        registry.register(density.clone());

        let mut timeline = Timeline::new(TimelineSettings::default(), registry, &bus);
        timeline.set_context(ActiveContext::new("population").with_primary("density"));
        bus.poll();
        (timeline, density, bus)
    }

    fn states(bus: &EventBus) -> Vec<PlaybackState> {
        bus.poll()
            .iter()
            .filter_map(|e| downcast_event::<PlaybackStateChangedEvent>(e))
            .map(|e| e.state)
            .collect()
    }

    #[test]
    fn test_rendered_year_follows_playback() {
        let (mut timeline, density, _) = setup();
        let t0 = Instant::now();
        timeline.play(t0).unwrap();
        for i in 1..=25 {
            timeline.update(t0 + ms(1500 * i));
            assert_eq!(density.rendered_year(), Some(timeline.year()));
        }
    }

    #[test]
    fn test_play_pause_notifies() {
        let (mut timeline, _, bus) = setup();
        assert_eq!(timeline.toggle_play(Instant::now()), PlaybackState::Playing);
        assert_eq!(timeline.toggle_play(Instant::now()), PlaybackState::Idle);
        assert_eq!(states(&bus), vec![PlaybackState::Playing, PlaybackState::Idle]);
    }

    #[test]
    fn test_manual_interaction_stops_playback() {
        let (mut timeline, _, _) = setup();
        let t0 = Instant::now();

        timeline.play(t0).unwrap();
        assert_eq!(timeline.set_year(1903), 1900);
        assert!(!timeline.is_playing());
        assert_eq!(timeline.update(t0 + ms(1500)), None);

        timeline.play(t0).unwrap();
        assert_eq!(timeline.step_forward(), Some(1910));
        assert!(!timeline.is_playing());

        timeline.play(t0).unwrap();
        timeline.set_context(ActiveContext::new("territories"));
        assert_eq!(timeline.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_condition_stops_and_blocks() {
        let (mut timeline, _, _) = setup();
        let t0 = Instant::now();
        timeline.play(t0).unwrap();

        timeline.set_condition(DisablingCondition::SecondaryOverlay, true);
        assert_eq!(timeline.state(), PlaybackState::Idle);
        assert!(timeline.play(t0).is_err());
        assert!(timeline.play_notice().is_some());

        timeline.set_condition(DisablingCondition::SecondaryOverlay, false);
        assert!(timeline.play_notice().is_none());
        assert!(timeline.play(t0).is_ok());
    }

    #[test]
    fn test_condition_set_elsewhere_stops_on_update() {
        let (mut timeline, _, _) = setup();
        let t0 = Instant::now();
        timeline.play(t0).unwrap();

        let board = timeline.conditions().clone();
        board.set(DisablingCondition::NarrativeEnabled, true);
        assert!(timeline.is_playing());
        assert_eq!(timeline.update(t0 + ms(10)), None);
        assert!(!timeline.is_playing());
    }

    #[test]
    fn test_availability_change_regenerates_ticks() {
        let (mut timeline, density, _) = setup();
        let before = timeline.ticks().iter().find(|t| t.year == 1650).map(|t| t.available);
        assert_eq!(before, Some(false));

        density.set_availability((1650..=1990).step_by(10));
        timeline.update(Instant::now());
        let after = timeline.ticks().iter().find(|t| t.year == 1650).map(|t| t.available);
        assert_eq!(after, Some(true));
    }

    #[test]
    fn test_watchdog_repairs_unloaded_provider() {
        let (mut timeline, density, _) = setup();
        timeline.set_year(1850);
        density.unload();
        assert_eq!(density.rendered_year(), None);

        let t0 = Instant::now();
        timeline.update(t0);
        timeline.update(t0 + ms(500));
        assert_eq!(density.rendered_year(), Some(1850));
    }

    #[test]
    fn test_reset_context_and_zoom() {
        let (mut timeline, _, _) = setup();
        timeline.set_year(1950);
        assert!(timeline.zoom_in());
        assert!(timeline.zoom_in());
        assert_eq!(timeline.zoom_level(), 4);
        timeline.reset_context();
        assert_eq!(timeline.zoom_range(), ZoomRange::full());
        assert_eq!(timeline.year(), 1790);
    }
}
