#![forbid(unsafe_code)]

pub mod bootstrap;
pub mod error;
pub mod runtime;
pub mod simulated_player;
pub mod watch;

pub use reveal_core::Clock;

pub use bootstrap::{
    ConfigSource, EnvironmentReader, Initializer, StaticEnvironment, resolve_config,
};
pub use error::{BootstrapError, RevealStepError};
pub use runtime::TokioScheduler;
pub use simulated_player::{SimulatedPlayer, SimulatedPlayerHost};
pub use watch::{
    Collaborators, ControllerPhase, ControllerStatus, WatchRevealController,
};
