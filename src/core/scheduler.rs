//! Animation scheduler: automatic year advance with two stepping strategies.
//!
//! # Modes
//!
//! - **Decade**: +10 years every 1500 ms, each target snapped to the nearest
//!   year with data, wrapping to the context minimum past the window end.
//! - **Sparse jump**: for overlay subsets with enough data. The available
//!   years in the zoom window are listed once at play and stepped through
//!   every 2000 ms, wrapping after the last one.
//!
//! # Timing Model
//!
//! `update(now)` is called from the host loop. At most one step is taken per
//! call; a host that falls behind skips ahead instead of bursting.
//!
//! # Stopping
//!
//! Disabling conditions arrive through the event bus (see [`observe`]) and are
//! also re-read from the [`ConditionBoard`] on every update.
//!
//! [`observe`]: AnimationScheduler::observe

use log::{info, trace, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::core::availability::available_years;
use crate::core::conditions::ConditionBoard;
use crate::core::controller::{PlaybackState, TimelineController};
use crate::core::error::{TimelineError, TimelineResult};
use crate::core::event_bus::{EventBus, Notifier};
use crate::core::events::{ConditionChangedEvent, PlaybackRefusedEvent};
use crate::core::provider::ProviderId;
use crate::core::year::Year;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackMode {
    Decade,
    SparseJump { subset: ProviderId },
}

impl std::fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackMode::Decade => f.write_str("decade"),
            PlaybackMode::SparseJump { subset } => write!(f, "sparse-jump ({})", subset),
        }
    }
}

#[derive(Debug)]
enum Cursor {
    /// Unsnapped target year; snapping happens on apply.
    Decade { target: Year, minimum: Year, step: i32 },
    Sparse { years: Vec<Year>, index: usize },
}

#[derive(Debug)]
struct AnimationSession {
    mode: PlaybackMode,
    cursor: Cursor,
    interval: Duration,
    next_due: Instant,
}

pub struct AnimationScheduler {
    session: Option<AnimationSession>,
    conditions: ConditionBoard,
    /// Set by the condition observer, consumed by `update`.
    interrupted: Arc<AtomicBool>,
    notifier: Notifier,
}

impl AnimationScheduler {
    pub fn new(conditions: ConditionBoard, notifier: Notifier) -> Self {
        Self {
            session: None,
            conditions,
            interrupted: Arc::new(AtomicBool::new(false)),
            notifier,
        }
    }

    /// Subscribe to condition changes so a condition turning on interrupts
    /// playback at the next update even between board re-checks.
    pub fn observe(&self, bus: &EventBus) {
        let interrupted = Arc::clone(&self.interrupted);
        bus.subscribe::<ConditionChangedEvent, _>(move |e| {
            if e.active {
                interrupted.store(true, Ordering::SeqCst);
            }
        });
    }

    pub fn conditions(&self) -> &ConditionBoard {
        &self.conditions
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    pub fn mode(&self) -> Option<&PlaybackMode> {
        self.session.as_ref().map(|s| &s.mode)
    }

    /// Start playback. A second call while playing is a no-op returning the
    /// running mode. Refusals are also published as [`PlaybackRefusedEvent`].
    pub fn play(&mut self, ctl: &mut TimelineController, now: Instant) -> TimelineResult<PlaybackMode> {
        if let Some(session) = &self.session {
            return Ok(session.mode.clone());
        }
        self.interrupted.store(false, Ordering::SeqCst);

        let session = match self.prepare(ctl, now) {
            Ok(session) => session,
            Err(e) => {
                warn!("Playback refused: {}", e);
                self.notifier.emit(PlaybackRefusedEvent(e.clone()));
                return Err(e);
            }
        };

        let mode = session.mode.clone();
        info!("Playback started: {} from {}", mode, ctl.year());
        self.session = Some(session);
        ctl.set_playback_state(PlaybackState::Playing, Some(mode.clone()));
        Ok(mode)
    }

    fn prepare(&self, ctl: &mut TimelineController, now: Instant) -> TimelineResult<AnimationSession> {
        if let Some(condition) = self.conditions.first_active() {
            return Err(TimelineError::PlaybackBlocked(condition));
        }

        let settings = ctl.settings().clone();
        match ctl.context().selected_subset.clone() {
            Some(subset) if settings.is_sufficient(&subset) => {
                let provider = ctl.provider(&subset)?;
                let years = available_years(provider.as_ref(), ctl.zoom_range());
                if years.is_empty() {
                    return Err(TimelineError::EmptyPlaybackRange { provider: subset });
                }
                let index = years.iter().position(|&y| y >= ctl.year()).unwrap_or(0);
                ctl.set_year_exact(years[index]);
                Ok(AnimationSession {
                    mode: PlaybackMode::SparseJump { subset },
                    cursor: Cursor::Sparse { years, index },
                    interval: Duration::from_millis(settings.sparse_interval_ms),
                    next_due: now + Duration::from_millis(settings.sparse_interval_ms),
                })
            }
            Some(subset) => Err(TimelineError::InsufficientData(subset)),
            None => {
                let minimum = ctl.context_minimum();
                let current = ctl.year();
                let start = if current >= minimum && ctl.is_available(current) {
                    current
                } else {
                    minimum
                };
                let target = ctl.set_year(start);
                Ok(AnimationSession {
                    mode: PlaybackMode::Decade,
                    cursor: Cursor::Decade {
                        target,
                        minimum,
                        step: settings.decade_step,
                    },
                    interval: Duration::from_millis(settings.decade_interval_ms),
                    next_due: now + Duration::from_millis(settings.decade_interval_ms),
                })
            }
        }
    }

    /// Stop playback. Returns false when nothing was playing.
    pub fn pause(&mut self, ctl: &mut TimelineController) -> bool {
        self.halt(ctl, "paused")
    }

    fn halt(&mut self, ctl: &mut TimelineController, reason: &str) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        info!("Playback stopped ({}): {} at {}", reason, session.mode, ctl.year());
        ctl.set_playback_state(PlaybackState::Idle, None);
        true
    }

    /// Stop because a manual interaction took over the year.
    pub fn interrupt(&mut self, ctl: &mut TimelineController) -> bool {
        self.halt(ctl, "manual interaction")
    }

    /// Advance when the current step is due. Returns the applied year.
    pub fn update(&mut self, ctl: &mut TimelineController, now: Instant) -> Option<Year> {
        self.session.as_ref()?;

        let interrupted = self.interrupted.swap(false, Ordering::SeqCst);
        if let Some(condition) = self.conditions.first_active() {
            self.halt(ctl, &condition.to_string());
            return None;
        }
        // A condition raised and cleared between ticks still ends the session.
        if interrupted {
            self.halt(ctl, "condition raised");
            return None;
        }

        let session = self.session.as_mut()?;
        if now < session.next_due {
            return None;
        }
        session.next_due += session.interval;
        if session.next_due <= now {
            session.next_due = now + session.interval;
        }

        let year = Self::advance(session, ctl);
        trace!("Playback step -> {}", year);
        Some(year)
    }

    fn advance(session: &mut AnimationSession, ctl: &mut TimelineController) -> Year {
        match &mut session.cursor {
            Cursor::Decade { target, minimum, step } => {
                let range = ctl.zoom_range();
                *target += *step;
                if *target > range.end {
                    *target = range.clamp(*minimum);
                }
                ctl.set_year(*target)
            }
            Cursor::Sparse { years, index } => {
                *index = (*index + 1) % years.len();
                ctl.set_year_exact(years[*index])
            }
        }
    }
}
