//! Core engine modules - availability, ticks, controller, scheduler, providers
//!
//! These modules form the timeline engine, independent of any UI.

pub mod availability;
pub mod conditions;
pub mod controller;
pub mod error;
pub mod event_bus;
pub mod events;
pub mod provider;
pub mod scheduler;
pub mod similarity;
pub mod ticks;
pub mod watchdog;
pub mod workers;
pub mod year;

// Re-exports for convenience
pub use availability::AvailabilityIndex;
pub use conditions::{ConditionBoard, DisablingCondition};
pub use controller::{ActiveContext, PlaybackState, TimelineController};
pub use error::{TimelineError, TimelineResult};
pub use event_bus::EventBus;
pub use provider::{DataProvider, LoadHandle, ProviderId, ProviderRegistry};
pub use scheduler::{AnimationScheduler, PlaybackMode};
pub use similarity::{BoundaryCache, Region};
pub use ticks::{Tick, ZoomManager};
pub use watchdog::Watchdog;
pub use workers::Workers;
pub use year::{Year, ZoomRange};
