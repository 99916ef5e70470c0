//! Externally sourced flags that stop playback or keep it from starting.
//!
//! The UI pushes changes through [`ConditionBoard::set`]; each change is
//! published as a [`ConditionChangedEvent`]. A condition that turns on stops
//! playback at the scheduler's next update, even if it was cleared again in
//! between. The scheduler also re-reads the board on every tick.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use crate::core::event_bus::Notifier;
use crate::core::events::ConditionChangedEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DisablingCondition {
    ModalOpen,
    PopupOpen,
    /// An overlay subset with too few years is selected.
    InsufficientDataOverlay,
    /// A transportation or territorial overlay is checked.
    SecondaryOverlay,
    /// Historical narrative display is on.
    NarrativeEnabled,
}

impl DisablingCondition {
    /// Notice shown next to the disabled play control.
    pub fn notice(&self) -> &'static str {
        match self {
            DisablingCondition::InsufficientDataOverlay => {
                "Few data available to view animation, explore interactively"
            }
            _ => "Close stories and overlays to play animation dynamically",
        }
    }
}

impl std::fmt::Display for DisablingCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DisablingCondition::ModalOpen => "modal open",
            DisablingCondition::PopupOpen => "popup open",
            DisablingCondition::InsufficientDataOverlay => "insufficient-data overlay selected",
            DisablingCondition::SecondaryOverlay => "secondary overlay checked",
            DisablingCondition::NarrativeEnabled => "narrative enabled",
        };
        f.write_str(name)
    }
}

/// Shared set of currently active conditions. Clones see the same state.
#[derive(Clone, Debug, Default)]
pub struct ConditionBoard {
    active: Arc<RwLock<BTreeSet<DisablingCondition>>>,
    notifier: Notifier,
}

impl ConditionBoard {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            active: Arc::default(),
            notifier,
        }
    }

    /// Set a condition. Returns true and publishes an event when it changed.
    pub fn set(&self, condition: DisablingCondition, active: bool) -> bool {
        let changed = {
            let mut set = self.active.write().unwrap_or_else(|e| e.into_inner());
            if active { set.insert(condition) } else { set.remove(&condition) }
        };
        if changed {
            debug!("Condition '{}' -> {}", condition, active);
            self.notifier.emit(ConditionChangedEvent { condition, active });
        }
        changed
    }

    pub fn is_active(&self, condition: DisablingCondition) -> bool {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&condition)
    }

    /// First active condition in declaration order, if any.
    pub fn first_active(&self) -> Option<DisablingCondition> {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .next()
            .copied()
    }
}
