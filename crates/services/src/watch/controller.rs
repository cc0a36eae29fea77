use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use reveal_core::listener::attach_progress;
use reveal_core::page::Document;
use reveal_core::player::{PlayerHost, PlayerInstance, ProgressCallback};
use reveal_core::trigger::{
    DiscoveryStep, PlaybackSample, TickDecision, evaluate_tick, next_discovery_step,
    remaining_seconds,
};
use reveal_core::{ListenerShape, RevealConfig, RevealReason, Scheduler, TimerHandle};
use storage::repository::KeyValueStore;

use super::effects::{PERSISTED_TRUE, RevealEffects, RevealStep, Subscription, Teardown};

/// Delay between finding the persisted flag and revealing.
pub const PERSISTED_REVEAL_DELAY: Duration = Duration::from_millis(100);

/// Period of the diagnostic progress sampler.
pub const SAMPLER_INTERVAL: Duration = Duration::from_secs(1);

/// Everything the controller talks to on the host page.
#[derive(Clone)]
pub struct Collaborators {
    pub player_host: Rc<dyn PlayerHost>,
    pub document: Rc<dyn Document>,
    pub store: Arc<dyn KeyValueStore>,
    pub scheduler: Rc<dyn Scheduler>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerPhase {
    Discovering,
    Watching,
    Revealed,
    Stopped,
}

/// Point-in-time view of a controller, for hosts and logs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerStatus {
    pub phase: ControllerPhase,
    pub attempts: u32,
    pub listener: Option<&'static str>,
    pub reason: Option<String>,
    pub failed_steps: Vec<&'static str>,
}

#[derive(Default)]
struct ControllerState {
    attempts: u32,
    is_displayed: bool,
    destroyed: bool,
    source: Option<Rc<dyn PlayerInstance>>,
    subscription: Option<Subscription>,
    poll_handle: Option<TimerHandle>,
    pending: Option<TimerHandle>,
    reason: Option<RevealReason>,
    failed_steps: Vec<RevealStep>,
}

struct Inner {
    config: RevealConfig,
    deps: Collaborators,
    state: RefCell<ControllerState>,
}

/// Watches a player's progress and reveals delayed content exactly once.
///
/// Cloning yields another handle to the same controller. Scheduled tasks and
/// player callbacks only hold weak references, so once every handle is dropped
/// they do nothing.
#[derive(Clone)]
pub struct WatchRevealController {
    inner: Rc<Inner>,
}

impl std::fmt::Debug for WatchRevealController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchRevealController")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl WatchRevealController {
    /// Build a controller and start it.
    ///
    /// When the storage key already holds `"true"` the reveal is scheduled after
    /// [`PERSISTED_REVEAL_DELAY`] and the player is never looked up. Otherwise the
    /// first discovery pass runs immediately.
    #[must_use]
    pub fn start(config: RevealConfig, deps: Collaborators) -> Self {
        let controller = Self {
            inner: Rc::new(Inner {
                config,
                deps,
                state: RefCell::new(ControllerState::default()),
            }),
        };

        if controller.persisted_flag_set() {
            controller.diag(|| tracing::info!("persisted flag found, skipping discovery"));
            let weak = controller.downgrade();
            let handle = controller.inner.deps.scheduler.schedule(
                PERSISTED_REVEAL_DELAY,
                Box::new(move || {
                    if let Some(controller) = upgrade(&weak) {
                        if !controller.inner.state.borrow().destroyed {
                            controller.reveal(RevealReason::PersistedFlag);
                        }
                    }
                }),
            );
            controller.inner.state.borrow_mut().pending = Some(handle);
        } else {
            controller.discover();
        }

        controller
    }

    #[must_use]
    pub fn config(&self) -> &RevealConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn is_displayed(&self) -> bool {
        self.inner.state.borrow().is_displayed
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.inner.state.borrow().attempts
    }

    #[must_use]
    pub fn reveal_reason(&self) -> Option<RevealReason> {
        self.inner.state.borrow().reason
    }

    #[must_use]
    pub fn status(&self) -> ControllerStatus {
        let state = self.inner.state.borrow();
        let phase = if state.is_displayed {
            ControllerPhase::Revealed
        } else if state.destroyed {
            ControllerPhase::Stopped
        } else if state.source.is_some() {
            ControllerPhase::Watching
        } else {
            ControllerPhase::Discovering
        };
        ControllerStatus {
            phase,
            attempts: state.attempts,
            listener: state.subscription.as_ref().map(|s| s.shape.as_str()),
            reason: state.reason.map(|reason| reason.to_string()),
            failed_steps: state.failed_steps.iter().map(|step| step.as_str()).collect(),
        }
    }

    /// Look for the first player instance, retrying on the scheduler while the
    /// attempt budget lasts and revealing once it is spent.
    ///
    /// Does nothing once a player is being watched.
    pub fn discover(&self) {
        let pending = {
            let mut state = self.inner.state.borrow_mut();
            if state.is_displayed || state.destroyed || state.source.is_some() {
                return;
            }
            state.pending.take()
        };
        if let Some(handle) = pending {
            self.inner.deps.scheduler.cancel(handle);
        }

        let found = self.inner.deps.player_host.first_instance();
        let attempts = self.attempts();
        match next_discovery_step(found.is_some(), attempts, self.inner.config.max_attempts()) {
            DiscoveryStep::Attach => {
                if let Some(instance) = found {
                    self.observe(instance);
                }
            }
            DiscoveryStep::Retry { attempt } => {
                self.diag(|| tracing::info!(attempt, "player not found, retrying"));
                let weak = self.downgrade();
                let handle = self.inner.deps.scheduler.schedule(
                    self.inner.config.retry_delay(),
                    Box::new(move || {
                        if let Some(controller) = upgrade(&weak) {
                            controller.discover();
                        }
                    }),
                );
                let mut state = self.inner.state.borrow_mut();
                state.attempts = attempt;
                state.pending = Some(handle);
            }
            DiscoveryStep::Exhausted => {
                tracing::warn!(attempts, "no player found, revealing anyway");
                self.reveal(RevealReason::DiscoveryExhausted { attempts });
            }
        }
    }

    /// Close the latch and run the reveal side effects.
    ///
    /// Returns `false` without doing anything when content is already revealed.
    pub fn reveal(&self, reason: RevealReason) -> bool {
        let (teardown, pending) = {
            let mut state = self.inner.state.borrow_mut();
            if state.is_displayed {
                return false;
            }
            state.is_displayed = true;
            state.reason = Some(reason);
            let teardown = Teardown {
                sampler: state.poll_handle.take(),
                subscription: state.subscription.take(),
            };
            (teardown, state.pending.take())
        };
        tracing::info!(%reason, "revealing delayed content");

        if let Some(handle) = pending {
            self.inner.deps.scheduler.cancel(handle);
        }
        let effects = RevealEffects {
            config: &self.inner.config,
            document: &self.inner.deps.document,
            store: self.inner.deps.store.as_ref(),
            scheduler: self.inner.deps.scheduler.as_ref(),
        };
        let failures = effects.apply(teardown);

        self.inner.state.borrow_mut().failed_steps =
            failures.into_iter().map(|(step, _)| step).collect();
        true
    }

    /// Operator override. Works even after [`Self::destroy`].
    pub fn force_reveal(&self) -> bool {
        self.reveal(RevealReason::Manual)
    }

    /// Stop discovery, sampling and listening. The latch and the persisted flag
    /// are left as they are.
    pub fn destroy(&self) {
        let (sampler, pending, subscription) = {
            let mut state = self.inner.state.borrow_mut();
            state.destroyed = true;
            state.source = None;
            (
                state.poll_handle.take(),
                state.pending.take(),
                state.subscription.take(),
            )
        };
        for handle in [sampler, pending].into_iter().flatten() {
            self.inner.deps.scheduler.cancel(handle);
        }
        if let Some(subscription) = subscription {
            if let Err(err) = subscription.release() {
                tracing::warn!(error = %err, "failed to detach progress listener");
            }
        }
        self.diag(|| tracing::info!("controller destroyed"));
    }

    fn observe(&self, instance: Rc<dyn PlayerInstance>) {
        let weak = self.downgrade();
        let callback: ProgressCallback = Rc::new(move || {
            if let Some(controller) = upgrade(&weak) {
                controller.check_progress();
            }
        });

        let subscription = match attach_progress(instance.as_ref(), &callback) {
            Ok(shape) => {
                self.diag(|| tracing::info!(listener = %shape, "watching player progress"));
                Some(Subscription {
                    instance: Rc::clone(&instance),
                    callback,
                    shape,
                })
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not subscribe to player progress");
                None
            }
        };

        let weak = self.downgrade();
        let sampler = self.inner.deps.scheduler.schedule_repeating(
            SAMPLER_INTERVAL,
            Box::new(move || {
                if let Some(controller) = upgrade(&weak) {
                    controller.sample();
                }
            }),
        );

        {
            let mut state = self.inner.state.borrow_mut();
            state.source = Some(instance);
            state.subscription = subscription;
            state.poll_handle = Some(sampler);
        }

        self.check_progress();
    }

    fn check_progress(&self) {
        let (revealed, source) = {
            let state = self.inner.state.borrow();
            if state.destroyed {
                return;
            }
            (state.is_displayed, state.source.clone())
        };
        let Some(instance) = source else {
            return;
        };

        let sample = PlaybackSample::read(instance.as_ref());
        match evaluate_tick(revealed, sample, self.inner.config.seconds_to_display()) {
            TickDecision::Reached { at } => {
                self.reveal(RevealReason::ThresholdReached { at });
            }
            TickDecision::StalledAutoplay => {
                self.diag(|| tracing::info!("autoplay preview reports 0s, skipping"));
            }
            TickDecision::AlreadyRevealed | TickDecision::Waiting { .. } => {}
        }
    }

    fn sample(&self) {
        let (revealed, poll_handle, source) = {
            let state = self.inner.state.borrow();
            (state.is_displayed, state.poll_handle, state.source.clone())
        };
        if revealed {
            if let Some(handle) = poll_handle {
                self.inner.deps.scheduler.cancel(handle);
            }
            return;
        }
        let Some(instance) = source else {
            return;
        };

        let sample = PlaybackSample::read(instance.as_ref());
        let threshold = self.inner.config.seconds_to_display();
        self.diag(|| {
            tracing::info!(
                current = sample.current_time,
                threshold,
                remaining = remaining_seconds(sample.current_time, threshold),
                autoplay = sample.autoplay_pending,
                "watch progress"
            );
        });
    }

    fn persisted_flag_set(&self) -> bool {
        let Some(key) = self.inner.config.storage_key() else {
            return false;
        };
        match self.inner.deps.store.get(key) {
            Ok(value) => value.as_deref() == Some(PERSISTED_TRUE),
            Err(err) => {
                tracing::warn!(key, error = %err, "could not read persisted flag");
                false
            }
        }
    }

    /// Diagnostics only emitted when the configuration enables debug output.
    fn diag(&self, log: impl FnOnce()) {
        if self.inner.config.debug() {
            log();
        }
    }

    fn downgrade(&self) -> Weak<Inner> {
        Rc::downgrade(&self.inner)
    }
}

fn upgrade(weak: &Weak<Inner>) -> Option<WatchRevealController> {
    weak.upgrade().map(|inner| WatchRevealController { inner })
}
