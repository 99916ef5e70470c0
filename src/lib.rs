//! TIMEMAP - timeline synchronization and playback engine for a multi-layer
//! historical map.
//!
//! Re-exports all modules for use by the binary target.

// Core engine (availability, ticks, controller, scheduler, workers)
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod providers;
pub mod shell;
pub mod timeline;

// Re-export commonly used types from core
pub use core::controller::{ActiveContext, PlaybackState, TimelineController};
pub use core::error::{TimelineError, TimelineResult};
pub use core::event_bus::{BoxedEvent, EventBus, EventEmitter, Notifier, downcast_event};
pub use core::provider::{DataProvider, ProviderId, ProviderRegistry};
pub use core::scheduler::PlaybackMode;
pub use core::year::{Year, ZoomRange};

pub use config::TimelineSettings;
pub use providers::{Catalog, CatalogProvider};
pub use timeline::Timeline;
