//! A scriptable stand-in for the page's video player.
//!
//! Used by tests and by the desktop demo. Media time only moves when the host
//! advances it, and `timeupdate` fires every [`TIME_UPDATE_PERIOD`] of media time.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use reveal_core::ListenerShape;
use reveal_core::player::{
    EventTarget, NamedEvents, PlayerError, PlayerHost, PlayerInstance, ProgressCallback,
    TIME_UPDATE_EVENT,
};

/// Media time between two `timeupdate` events while playing.
pub const TIME_UPDATE_PERIOD: Duration = Duration::from_millis(250);

#[derive(Clone, Default)]
struct Listeners(Rc<RefCell<Vec<ProgressCallback>>>);

impl Listeners {
    fn add(&self, event: &str, callback: ProgressCallback) -> Result<(), PlayerError> {
        if event != TIME_UPDATE_EVENT {
            return Err(PlayerError::Rejected(format!("unknown event {event}")));
        }
        self.0.borrow_mut().push(callback);
        Ok(())
    }

    fn remove(&self, event: &str, callback: &ProgressCallback) -> Result<(), PlayerError> {
        if event != TIME_UPDATE_EVENT {
            return Err(PlayerError::NotRegistered);
        }
        let mut listeners = self.0.borrow_mut();
        let position = listeners
            .iter()
            .position(|existing| Rc::ptr_eq(existing, callback))
            .ok_or(PlayerError::NotRegistered)?;
        listeners.remove(position);
        Ok(())
    }

    fn snapshot(&self) -> Vec<ProgressCallback> {
        self.0.borrow().clone()
    }

    fn len(&self) -> usize {
        self.0.borrow().len()
    }
}

#[derive(Default)]
struct Playback {
    current_time: f64,
    playing: bool,
    autoplay_pending: bool,
    since_update: Duration,
}

/// The `<video>` element some players wrap.
pub struct SimulatedMedia {
    listeners: Listeners,
    rejecting: Rc<RefCell<HashSet<ListenerShape>>>,
}

impl EventTarget for SimulatedMedia {
    fn add_event_listener(&self, event: &str, callback: ProgressCallback) -> Result<(), PlayerError> {
        check(&self.rejecting, ListenerShape::NestedElement)?;
        self.listeners.add(event, callback)
    }

    fn remove_event_listener(
        &self,
        event: &str,
        callback: &ProgressCallback,
    ) -> Result<(), PlayerError> {
        check(&self.rejecting, ListenerShape::NestedElement)?;
        self.listeners.remove(event, callback)
    }
}

fn check(
    rejecting: &RefCell<HashSet<ListenerShape>>,
    shape: ListenerShape,
) -> Result<(), PlayerError> {
    if rejecting.borrow().contains(&shape) {
        return Err(PlayerError::Rejected(format!("{shape} disabled")));
    }
    Ok(())
}

pub struct SimulatedPlayer {
    playback: RefCell<Playback>,
    shapes: Vec<ListenerShape>,
    rejecting: Rc<RefCell<HashSet<ListenerShape>>>,
    listeners: Listeners,
    media: Rc<SimulatedMedia>,
}

impl Default for SimulatedPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPlayer {
    /// A paused player at 0s exposing every listener shape.
    #[must_use]
    pub fn new() -> Self {
        Self::with_shapes(&ListenerShape::ORDER)
    }

    /// A player exposing only `shapes`.
    #[must_use]
    pub fn with_shapes(shapes: &[ListenerShape]) -> Self {
        let listeners = Listeners::default();
        let rejecting = Rc::new(RefCell::new(HashSet::new()));
        Self {
            playback: RefCell::new(Playback::default()),
            shapes: shapes.to_vec(),
            rejecting: Rc::clone(&rejecting),
            media: Rc::new(SimulatedMedia {
                listeners: listeners.clone(),
                rejecting,
            }),
            listeners,
        }
    }

    /// Make calls through `shape` fail (or work again).
    pub fn set_rejecting(&self, shape: ListenerShape, rejecting: bool) {
        let mut set = self.rejecting.borrow_mut();
        if rejecting {
            set.insert(shape);
        } else {
            set.remove(&shape);
        }
    }

    /// Enter the muted autoplay preview: time stays at 0 and events keep firing.
    pub fn start_muted_autoplay(&self) {
        {
            let mut playback = self.playback.borrow_mut();
            playback.autoplay_pending = true;
            playback.playing = false;
            playback.current_time = 0.0;
        }
        self.emit();
    }

    pub fn play(&self) {
        let mut playback = self.playback.borrow_mut();
        playback.playing = true;
        playback.autoplay_pending = false;
    }

    pub fn pause(&self) {
        self.playback.borrow_mut().playing = false;
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playback.borrow().playing
    }

    /// Jump to `seconds` and fire `timeupdate`.
    pub fn seek(&self, seconds: f64) {
        {
            let mut playback = self.playback.borrow_mut();
            playback.current_time = seconds.max(0.0);
            playback.since_update = Duration::ZERO;
        }
        self.emit();
    }

    /// Let `elapsed` wall time pass. Only moves media time while playing.
    pub fn advance(&self, elapsed: Duration) {
        let due = {
            let mut playback = self.playback.borrow_mut();
            if !playback.playing {
                return;
            }
            playback.current_time += elapsed.as_secs_f64();
            playback.since_update += elapsed;
            if playback.since_update >= TIME_UPDATE_PERIOD {
                playback.since_update = Duration::ZERO;
                true
            } else {
                false
            }
        };
        if due {
            self.emit();
        }
    }

    /// Fire `timeupdate` to every registered listener.
    pub fn emit(&self) {
        for listener in self.listeners.snapshot() {
            listener();
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn exposes(&self, shape: ListenerShape) -> bool {
        self.shapes.contains(&shape)
    }
}

impl NamedEvents for SimulatedPlayer {
    fn on(&self, event: &str, callback: ProgressCallback) -> Result<(), PlayerError> {
        check(&self.rejecting, ListenerShape::NamedEvent)?;
        self.listeners.add(event, callback)
    }

    fn off(&self, event: &str, callback: &ProgressCallback) -> Result<(), PlayerError> {
        check(&self.rejecting, ListenerShape::NamedEvent)?;
        self.listeners.remove(event, callback)
    }
}

impl EventTarget for SimulatedPlayer {
    fn add_event_listener(&self, event: &str, callback: ProgressCallback) -> Result<(), PlayerError> {
        check(&self.rejecting, ListenerShape::GenericListener)?;
        self.listeners.add(event, callback)
    }

    fn remove_event_listener(
        &self,
        event: &str,
        callback: &ProgressCallback,
    ) -> Result<(), PlayerError> {
        check(&self.rejecting, ListenerShape::GenericListener)?;
        self.listeners.remove(event, callback)
    }
}

impl PlayerInstance for SimulatedPlayer {
    fn current_time(&self) -> Option<f64> {
        Some(self.playback.borrow().current_time)
    }

    fn autoplay_pending(&self) -> bool {
        self.playback.borrow().autoplay_pending
    }

    fn named_events(&self) -> Option<&dyn NamedEvents> {
        self.exposes(ListenerShape::NamedEvent)
            .then_some(self as &dyn NamedEvents)
    }

    fn event_target(&self) -> Option<&dyn EventTarget> {
        self.exposes(ListenerShape::GenericListener)
            .then_some(self as &dyn EventTarget)
    }

    fn media_element(&self) -> Option<Rc<dyn EventTarget>> {
        self.exposes(ListenerShape::NestedElement)
            .then(|| Rc::clone(&self.media) as Rc<dyn EventTarget>)
    }
}

/// Page-wide player registry. Instances can be loaded late to exercise retries.
#[derive(Default)]
pub struct SimulatedPlayerHost {
    players: RefCell<Vec<Rc<SimulatedPlayer>>>,
    lookups: Cell<u32>,
}

impl SimulatedPlayerHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, player: Rc<SimulatedPlayer>) {
        self.players.borrow_mut().push(player);
    }

    #[must_use]
    pub fn first_player(&self) -> Option<Rc<SimulatedPlayer>> {
        self.players.borrow().first().cloned()
    }

    /// How many times the instance list was queried.
    #[must_use]
    pub fn lookups(&self) -> u32 {
        self.lookups.get()
    }
}

impl PlayerHost for SimulatedPlayerHost {
    fn instances(&self) -> Vec<Rc<dyn PlayerInstance>> {
        self.lookups.set(self.lookups.get() + 1);
        self.players
            .borrow()
            .iter()
            .map(|player| Rc::clone(player) as Rc<dyn PlayerInstance>)
            .collect()
    }
}
