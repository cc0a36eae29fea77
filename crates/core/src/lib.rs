#![forbid(unsafe_code)]

pub mod config;
pub mod listener;
pub mod page;
pub mod player;
pub mod time;
pub mod trigger;

pub use config::{ConfigError, RevealConfig, RevealConfigDraft};
pub use listener::{ListenerError, ListenerShape};
pub use time::{Clock, Scheduler, TimerHandle, TimerQueue};
pub use trigger::RevealReason;
