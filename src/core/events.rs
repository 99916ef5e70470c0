//! Notifications published by the timeline engine.

use crate::core::conditions::DisablingCondition;
use crate::core::controller::PlaybackState;
use crate::core::error::TimelineError;
use crate::core::provider::ProviderId;
use crate::core::scheduler::PlaybackMode;
use crate::core::ticks::Tick;
use crate::core::year::{Year, ZoomRange};

// === Timeline state ===

/// Canonical year changed. `requested` is the year asked for before snapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct YearChangedEvent {
    pub year: Year,
    pub requested: Year,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TicksChangedEvent(pub Vec<Tick>);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoomChangedEvent {
    pub range: ZoomRange,
    pub level: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackStateChangedEvent {
    pub state: PlaybackState,
    pub mode: Option<PlaybackMode>,
}

/// play() refused; carries the reason for the "no play" notice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackRefusedEvent(pub TimelineError);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionChangedEvent {
    pub condition: DisablingCondition,
    pub active: bool,
}

// === Providers ===

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadAppliedEvent {
    pub provider: ProviderId,
    pub year: Year,
    pub labels_reused: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadFailedEvent(pub TimelineError);

/// A provider's availability map changed; ticks must be regenerated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AvailabilityChangedEvent(pub ProviderId);
