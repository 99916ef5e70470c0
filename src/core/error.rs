//! Timeline error taxonomy.
//!
//! Nothing in the engine is fatal. Every variant degrades to "keep the last
//! valid state" and is also published on the event bus so the UI can show a
//! notice.

use crate::core::conditions::DisablingCondition;
use crate::core::provider::ProviderId;
use crate::core::year::Year;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    /// Requested year has no data. Recovered by snapping, never surfaced to the UI.
    DataUnavailable { year: Year },
    /// Fetch or parse failure inside a provider. The map keeps its last good year.
    LoadFailure {
        provider: ProviderId,
        year: Year,
        reason: String,
    },
    /// Sparse-jump playback found no eligible year in the zoom window.
    EmptyPlaybackRange { provider: ProviderId },
    /// Zoom request beyond the allowed levels; the range is left as is.
    InvalidZoom { level: u32 },
    UnknownProvider(ProviderId),
    /// Playback refused because a disabling condition holds.
    PlaybackBlocked(DisablingCondition),
    /// Selected overlay subset lacks the data needed for animation.
    InsufficientData(ProviderId),
}

impl std::fmt::Display for TimelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimelineError::DataUnavailable { year } => write!(f, "No data for year {}", year),
            TimelineError::LoadFailure { provider, year, reason } => {
                write!(f, "Failed to load {} for {}: {}", provider, year, reason)
            }
            TimelineError::EmptyPlaybackRange { provider } => {
                write!(f, "No years with {} data in the current range", provider)
            }
            TimelineError::InvalidZoom { level } => write!(f, "Zoom level {} out of bounds", level),
            TimelineError::UnknownProvider(id) => write!(f, "Unknown provider: {}", id),
            TimelineError::PlaybackBlocked(condition) => {
                write!(f, "Playback disabled: {}", condition)
            }
            TimelineError::InsufficientData(subset) => {
                write!(f, "Few data available for {} to animate, explore interactively", subset)
            }
        }
    }
}

impl std::error::Error for TimelineError {}

pub type TimelineResult<T> = Result<T, TimelineError>;
