//! Headless shell: wires settings, catalog, worker pool and timeline together
//! for the binary and for scripted runs.

use anyhow::{Result, bail};
use log::{info, warn};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::TimelineSettings;
use crate::core::event_bus::{BoxedEvent, EventBus, Notifier, downcast_event};
use crate::core::events::{
    AvailabilityChangedEvent, ConditionChangedEvent, LoadAppliedEvent, LoadFailedEvent,
    PlaybackRefusedEvent, PlaybackStateChangedEvent, TicksChangedEvent, YearChangedEvent,
    ZoomChangedEvent,
};
use crate::core::provider::{LoadExecutor, ProviderRegistry};
use crate::core::scheduler::PlaybackMode;
use crate::core::ticks::Tick;
use crate::core::workers::Workers;
use crate::core::year::Year;
use crate::providers::{Catalog, CatalogProvider};
use crate::timeline::Timeline;

/// Common shell state for the binary
pub struct Shell {
    pub timeline: Timeline,
    pub event_bus: EventBus,
    pub catalog: Catalog,
    pub providers: Vec<Arc<CatalogProvider>>,
    pub error_msg: Option<String>,
    settings: TimelineSettings,
}

impl Shell {
    pub fn new(settings: TimelineSettings, catalog: Catalog) -> Self {
        let threads = match settings.workers {
            0 => Workers::default_threads(),
            n => n,
        };
        let workers = Workers::new(threads);
        info!("Load pool: {} worker threads", workers.num_threads());
        let executor: Arc<dyn LoadExecutor> = Arc::new(workers);
        Self::with_executor(settings, catalog, executor)
    }

    /// Build with a caller-chosen executor (inline or deferred in tests).
    pub fn with_executor(settings: TimelineSettings, catalog: Catalog, executor: Arc<dyn LoadExecutor>) -> Self {
        let event_bus = EventBus::new();
        let notifier = Notifier::from(&event_bus);

        let mut registry = ProviderRegistry::new();
        let providers = catalog.register_all(&mut registry, executor, &notifier, settings.similarity_threshold);
        info!("Registered {} providers", providers.len());

        let mut timeline = Timeline::new(settings.clone(), registry, &event_bus);
        if let Some(context) = catalog.initial_context() {
            timeline.set_context(context.clone());
        }

        Self {
            timeline,
            event_bus,
            catalog,
            providers,
            error_msg: None,
            settings,
        }
    }

    /// Activate a catalog context by name.
    pub fn select_context(&mut self, name: &str) -> Result<()> {
        let Some(context) = self.catalog.context(name).cloned() else {
            let known: Vec<&str> = self.catalog.contexts.iter().map(|c| c.name.as_str()).collect();
            bail!("Unknown context '{}' (available: {})", name, known.join(", "));
        };
        self.timeline.set_context(context);
        Ok(())
    }

    /// Block until no provider load is pending or `timeout` elapses.
    pub fn wait_for_loads(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.timeline.controller().pending_loads() > 0 {
            if Instant::now() >= deadline {
                warn!("Loads still pending after {:?}", timeout);
                return false;
            }
            thread::sleep(Duration::from_millis(2));
        }
        true
    }

    /// Simulate `steps` playback steps on a virtual clock starting at `start`.
    /// Returns the years applied. Stops early when playback ends.
    pub fn run_playback(&mut self, start: Instant, steps: usize) -> Vec<Year> {
        let mut now = start;
        let mut years = Vec::with_capacity(steps);
        for _ in 0..steps {
            let interval = match self.timeline.mode() {
                Some(PlaybackMode::Decade) => self.settings.decade_interval_ms,
                Some(PlaybackMode::SparseJump { .. }) => self.settings.sparse_interval_ms,
                None => break,
            };
            now += Duration::from_millis(interval);
            if let Some(year) = self.timeline.update(now) {
                years.push(year);
            }
            self.wait_for_loads(Duration::from_secs(2));
        }
        years
    }

    /// Drain the bus into printable lines. Failures and refusals are also
    /// kept in `error_msg`.
    pub fn process_events(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        for event in self.event_bus.poll() {
            if let Some(e) = downcast_event::<LoadFailedEvent>(&event) {
                self.error_msg = Some(e.0.to_string());
            } else if let Some(e) = downcast_event::<PlaybackRefusedEvent>(&event) {
                self.error_msg = Some(e.0.to_string());
            }
            if let Some(line) = describe_event(&event) {
                lines.push(line);
            }
        }
        lines
    }
}

/// One-line description of a timeline notification.
pub fn describe_event(event: &BoxedEvent) -> Option<String> {
    if let Some(e) = downcast_event::<YearChangedEvent>(event) {
        return Some(if e.year == e.requested {
            format!("year {}", e.year)
        } else {
            format!("year {} (requested {})", e.year, e.requested)
        });
    }
    if let Some(e) = downcast_event::<TicksChangedEvent>(event) {
        return Some(format!("ticks {}", e.0.len()));
    }
    if let Some(e) = downcast_event::<ZoomChangedEvent>(event) {
        return Some(format!("zoom x{} {}", e.level, e.range));
    }
    if let Some(e) = downcast_event::<PlaybackStateChangedEvent>(event) {
        return Some(match &e.mode {
            Some(mode) => format!("playback {:?} ({})", e.state, mode),
            None => format!("playback {:?}", e.state),
        });
    }
    if let Some(e) = downcast_event::<PlaybackRefusedEvent>(event) {
        return Some(format!("refused: {}", e.0));
    }
    if let Some(e) = downcast_event::<ConditionChangedEvent>(event) {
        return Some(format!("condition {} = {}", e.condition, e.active));
    }
    if let Some(e) = downcast_event::<LoadAppliedEvent>(event) {
        let reuse = if e.labels_reused { ", labels reused" } else { "" };
        return Some(format!("{} loaded {}{}", e.provider, e.year, reuse));
    }
    if let Some(e) = downcast_event::<LoadFailedEvent>(event) {
        return Some(format!("load failed: {}", e.0));
    }
    if let Some(e) = downcast_event::<AvailabilityChangedEvent>(event) {
        return Some(format!("availability changed: {}", e.0));
    }
    None
}

/// Text strip of the ticks: majors in brackets, unavailable ticks marked `~`.
pub fn format_ticks(ticks: &[Tick]) -> String {
    ticks
        .iter()
        .map(|t| {
            let mark = if t.available { "" } else { "~" };
            if t.is_major {
                format!("[{}{}]", t.year, mark)
            } else {
                format!("{}{}", t.year, mark)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider::InlineExecutor;

    fn shell() -> Shell {
        Shell::with_executor(TimelineSettings::default(), Catalog::demo(), Arc::new(InlineExecutor))
    }

    #[test]
    fn test_demo_starts_in_default_context() {
        let mut shell = shell();
        assert_eq!(shell.timeline.context().name, "population");
        assert_eq!(shell.timeline.year(), 1790);
        let lines = shell.process_events();
        assert!(lines.iter().any(|l| l == "density loaded 1790"));
    }

    #[test]
    fn test_unknown_context_is_error() {
        let mut shell = shell();
        let err = shell.select_context("weather").unwrap_err();
        assert!(err.to_string().contains("population"));
    }

    #[test]
    fn test_race_playback_jumps() {
        let mut shell = shell();
        shell.select_context("race").unwrap();
        shell.timeline.set_year(1805);
        shell.timeline.play(Instant::now()).unwrap();
        // 1805 snaps to the earlier of two equidistant decades.
        assert_eq!(shell.timeline.year(), 1800);

        let years = shell.run_playback(Instant::now(), 3);
        assert_eq!(years, vec![1810, 1820, 1830]);
    }

    #[test]
    fn test_run_playback_without_play_is_empty() {
        let mut shell = shell();
        assert!(shell.run_playback(Instant::now(), 5).is_empty());
    }

    #[test]
    fn test_describe_and_format() {
        let mut shell = shell();
        shell.process_events();
        shell.timeline.set_year(1855);
        let lines = shell.process_events();
        assert!(lines.contains(&"year 1850 (requested 1855)".to_string()));

        let strip = format_ticks(&[
            Tick { year: 1800, is_major: true, available: true },
            Tick { year: 1805, is_major: false, available: false },
        ]);
        assert_eq!(strip, "[1800] 1805~");
    }
}
