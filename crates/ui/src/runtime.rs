//! Single-threaded demo host: page model, simulated player and virtual timers.
//!
//! The UI drives it by calling [`DemoRuntime::pump`] with the wall time that
//! passed since the previous call.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use reveal_core::page::{ElementSnapshot, MemoryDocument, PageEvent};
use reveal_core::player::PlayerInstance;
use reveal_core::{ListenerShape, RevealConfig, RevealConfigDraft, Scheduler, TimerQueue};
use services::{
    BootstrapError, Collaborators, ControllerStatus, EnvironmentReader, Initializer,
    SimulatedPlayer, SimulatedPlayerHost, WatchRevealController, resolve_config,
};
use storage::repository::KeyValueStore;

use crate::page::build_landing_page;

/// How the simulated player behaves in the demo.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoOptions {
    /// Delay before the player shows up on the page.
    pub player_delay: Duration,
    /// Start in the muted autoplay preview.
    pub muted_autoplay: bool,
    pub shapes: Vec<ListenerShape>,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            player_delay: Duration::from_millis(1500),
            muted_autoplay: true,
            shapes: ListenerShape::ORDER.to_vec(),
        }
    }
}

/// Everything the views need for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoSnapshot {
    pub elements: Vec<ElementSnapshot>,
    pub current_time: f64,
    pub threshold: f64,
    pub playing: bool,
    pub autoplay_pending: bool,
    pub player_loaded: bool,
    pub elapsed: Duration,
    pub status: Option<ControllerStatus>,
}

pub struct DemoRuntime {
    config: RevealConfig,
    queue: TimerQueue,
    document: MemoryDocument,
    host: Rc<SimulatedPlayerHost>,
    player: Rc<SimulatedPlayer>,
    controller: Option<WatchRevealController>,
    scrolls: Rc<RefCell<Vec<String>>>,
}

impl DemoRuntime {
    /// Resolve the configuration, build the page and start the controller.
    ///
    /// Falls back to the default configuration when the environment carries
    /// none.
    ///
    /// # Errors
    ///
    /// Returns `BootstrapError` if the configuration is malformed or invalid.
    pub fn boot(
        env: &dyn EnvironmentReader,
        store: Arc<dyn KeyValueStore>,
        options: &DemoOptions,
    ) -> Result<Self, BootstrapError> {
        let draft = match resolve_config(env) {
            Ok(Some(draft)) => draft,
            Ok(None) => {
                tracing::info!("no configuration supplied, using defaults");
                RevealConfigDraft::new()
            }
            Err(err) => {
                tracing::error!(error = %err, "demo configuration rejected");
                return Err(err);
            }
        };
        let config = draft.clone().validate()?;

        let queue = TimerQueue::new();
        let document = build_landing_page(&config);
        let host = Rc::new(SimulatedPlayerHost::new());
        let player = Rc::new(SimulatedPlayer::with_shapes(&options.shapes));

        let scrolls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&scrolls);
        document.subscribe(move |event| {
            if let PageEvent::Scrolled { id: Some(id), .. } = event {
                sink.borrow_mut().push(id.clone());
            }
        });

        let late_host = Rc::clone(&host);
        let late_player = Rc::clone(&player);
        let muted_autoplay = options.muted_autoplay;
        queue.schedule(
            options.player_delay,
            Box::new(move || {
                late_host.load(Rc::clone(&late_player));
                if muted_autoplay {
                    late_player.start_muted_autoplay();
                }
            }),
        );

        let mut initializer = Initializer::new(Collaborators {
            player_host: host.clone(),
            document: Rc::new(document.clone()),
            store,
            scheduler: Rc::new(queue.clone()),
        });
        initializer.init(draft)?;
        let controller = initializer.mark_ready().into_iter().next();

        Ok(Self {
            config,
            queue,
            document,
            host,
            player,
            controller,
            scrolls,
        })
    }

    #[must_use]
    pub fn config(&self) -> &RevealConfig {
        &self.config
    }

    #[must_use]
    pub fn document(&self) -> &MemoryDocument {
        &self.document
    }

    /// Let `elapsed` pass for both the player and the timers.
    pub fn pump(&self, elapsed: Duration) {
        self.player.advance(elapsed);
        self.queue.advance(elapsed);
    }

    pub fn toggle_playback(&self) {
        if self.player.is_playing() {
            self.player.pause();
        } else {
            self.player.play();
        }
    }

    /// Jump forward by `seconds` of media time.
    pub fn seek_by(&self, seconds: f64) {
        let current = self.player.current_time().unwrap_or(0.0);
        self.player.seek(current + seconds);
    }

    pub fn force_reveal(&self) -> bool {
        self.controller
            .as_ref()
            .is_some_and(WatchRevealController::force_reveal)
    }

    /// Element ids scrolled into view since the last call.
    pub fn take_scrolls(&self) -> Vec<String> {
        std::mem::take(&mut *self.scrolls.borrow_mut())
    }

    #[must_use]
    pub fn snapshot(&self) -> DemoSnapshot {
        DemoSnapshot {
            elements: self.document.snapshot(),
            current_time: self.player.current_time().unwrap_or(0.0),
            threshold: self.config.seconds_to_display(),
            playing: self.player.is_playing(),
            autoplay_pending: self.player.autoplay_pending(),
            player_loaded: self.host.first_player().is_some(),
            elapsed: self.queue.now(),
            status: self.controller.as_ref().map(WatchRevealController::status),
        }
    }
}
