//! The watch/reveal state machine and its side effects.

mod controller;
mod effects;

pub use controller::{
    Collaborators, ControllerPhase, ControllerStatus, PERSISTED_REVEAL_DELAY, SAMPLER_INTERVAL,
    WatchRevealController,
};
pub use effects::{ANCHOR_SCROLL_DELAY, PERSISTED_TRUE, RevealStep};
