//! Capabilities the external video player exposes to the controller.

use std::rc::Rc;

use thiserror::Error;

/// Event fired by players while the playback position moves.
pub const TIME_UPDATE_EVENT: &str = "timeupdate";

/// Progress listener. Identity (`Rc::ptr_eq`) is what unsubscribe matches on.
pub type ProgressCallback = Rc<dyn Fn()>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlayerError {
    #[error("listener shape not supported by this instance")]
    Unsupported,
    #[error("listener is not registered")]
    NotRegistered,
    #[error("player rejected the call: {0}")]
    Rejected(String),
}

/// `on(event, cb)` / `off(event, cb)` style subscription.
pub trait NamedEvents {
    fn on(&self, event: &str, callback: ProgressCallback) -> Result<(), PlayerError>;
    fn off(&self, event: &str, callback: &ProgressCallback) -> Result<(), PlayerError>;
}

/// DOM-style `addEventListener` / `removeEventListener` subscription.
pub trait EventTarget {
    fn add_event_listener(&self, event: &str, callback: ProgressCallback)
    -> Result<(), PlayerError>;
    fn remove_event_listener(
        &self,
        event: &str,
        callback: &ProgressCallback,
    ) -> Result<(), PlayerError>;
}

/// One playback instance discovered on the page.
///
/// Instances expose any subset of the listener shapes; the defaults report none.
pub trait PlayerInstance {
    /// Playback position in seconds, if the player can report one.
    fn current_time(&self) -> Option<f64>;

    /// True while the player is in its muted autoplay preview.
    fn autoplay_pending(&self) -> bool;

    fn named_events(&self) -> Option<&dyn NamedEvents> {
        None
    }

    fn event_target(&self) -> Option<&dyn EventTarget> {
        None
    }

    /// The underlying media element, for players that wrap one.
    fn media_element(&self) -> Option<Rc<dyn EventTarget>> {
        None
    }
}

/// Page-wide registry of player instances.
pub trait PlayerHost {
    fn instances(&self) -> Vec<Rc<dyn PlayerInstance>>;

    fn first_instance(&self) -> Option<Rc<dyn PlayerInstance>> {
        self.instances().into_iter().next()
    }
}
