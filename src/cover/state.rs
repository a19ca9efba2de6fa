//! Cover state machine
//!
//! Two states, player visible or cover visible. The transition is a pure
//! function of the current state and the pressed key; the controller wraps
//! it and pauses the audio graph in the same step that shows the cover, so
//! the graph is never playing while the cover is up.
//!
//! | Current        | Key                       | Next           |
//! |----------------|---------------------------|----------------|
//! | PlayerVisible  | trigger                   | CoverVisible   |
//! | CoverVisible   | trigger or universal esc. | PlayerVisible  |
//! | either         | anything else             | unchanged      |
//!
//! Leaving the cover does not resume playback.

use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::cover::keys::{Key, KeyEvent, TriggerKey};
use crate::engine::AudioGraph;

/// Which region is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoverState {
    #[default]
    PlayerVisible,
    CoverVisible,
}

impl fmt::Display for CoverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverState::PlayerVisible => write!(f, "PlayerVisible"),
            CoverState::CoverVisible => write!(f, "CoverVisible"),
        }
    }
}

/// What a key press did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing changed
    None,
    /// Player hidden, cover shown, playback paused
    EnterCover,
    /// Cover hidden, player shown
    ExitCover,
}

/// Next state for `pressed` given the configured keys
pub fn transition(state: CoverState, pressed: &Key, trigger: &Key, escape: &Key) -> (CoverState, Transition) {
    match state {
        CoverState::PlayerVisible if pressed == trigger => (CoverState::CoverVisible, Transition::EnterCover),
        CoverState::CoverVisible if pressed == trigger || pressed == escape => {
            (CoverState::PlayerVisible, Transition::ExitCover)
        }
        _ => (state, Transition::None),
    }
}

/// Owns the cover state and the key configuration
#[derive(Debug, Clone)]
pub struct CoverController {
    state: CoverState,
    trigger: TriggerKey,
    escape: Key,
}

impl CoverController {
    pub fn new(trigger: TriggerKey, escape: Key) -> Self {
        Self {
            state: CoverState::PlayerVisible,
            trigger,
            escape,
        }
    }

    /// Feed one raw key event
    ///
    /// Auto-repeat and key-up events are ignored. Entering the cover pauses
    /// `graph` before the state flips.
    pub fn handle_key(&mut self, event: &KeyEvent, graph: &mut AudioGraph) -> Transition {
        if !event.is_discrete_press() {
            return Transition::None;
        }

        let (next, change) = transition(self.state, &event.key, &self.trigger.key(), &self.escape);
        match change {
            Transition::EnterCover => {
                graph.pause();
                info!("[COVER] {} pressed, cover shown", event.key);
            }
            Transition::ExitCover => {
                info!("[COVER] {} pressed, player restored", event.key);
            }
            Transition::None => {}
        }
        self.state = next;
        change
    }

    /// Change the trigger; applies to the next key event
    pub fn set_trigger(&mut self, trigger: TriggerKey) {
        debug!("[COVER] Trigger {} -> {}", self.trigger, trigger);
        self.trigger = trigger;
    }

    pub fn trigger(&self) -> TriggerKey {
        self.trigger
    }

    pub fn escape(&self) -> &Key {
        &self.escape
    }

    pub fn state(&self) -> CoverState {
        self.state
    }

    pub fn is_cover_visible(&self) -> bool {
        self.state == CoverState::CoverVisible
    }
}

impl Default for CoverController {
    fn default() -> Self {
        Self::new(TriggerKey::default(), Key::Backquote)
    }
}
