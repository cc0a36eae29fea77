//! Side effects performed once when the latch closes.
//!
//! Every step is attempted on its own; a failure is logged and the remaining
//! steps still run.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use reveal_core::listener::detach_progress;
use reveal_core::page::{ANCHOR_ELEMENT_ID, ARIA_HIDDEN, Document, ScrollOptions};
use reveal_core::player::{PlayerInstance, ProgressCallback};
use reveal_core::{ListenerShape, RevealConfig, Scheduler, TimerHandle};
use storage::repository::KeyValueStore;

use crate::error::RevealStepError;

/// Delay before the anchor element is scrolled into view.
pub const ANCHOR_SCROLL_DELAY: Duration = Duration::from_millis(300);

/// Value written under the storage key once content has been revealed.
pub const PERSISTED_TRUE: &str = "true";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealStep {
    ClearDelayClass,
    ShowContainer,
    PersistFlag,
    ScrollToTarget,
    Unsubscribe,
}

impl RevealStep {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClearDelayClass => "clear-delay-class",
            Self::ShowContainer => "show-container",
            Self::PersistFlag => "persist-flag",
            Self::ScrollToTarget => "scroll-to-target",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

impl fmt::Display for RevealStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An active progress subscription on a discovered instance.
pub(crate) struct Subscription {
    pub(crate) instance: Rc<dyn PlayerInstance>,
    pub(crate) callback: ProgressCallback,
    pub(crate) shape: ListenerShape,
}

impl Subscription {
    /// Detach, walking every listener shape in order.
    pub(crate) fn release(self) -> Result<ListenerShape, RevealStepError> {
        let shape = detach_progress(self.instance.as_ref(), &self.callback)?;
        if shape != self.shape {
            tracing::debug!(
                attached = %self.shape,
                detached = %shape,
                "progress listener detached through a fallback shape"
            );
        }
        Ok(shape)
    }
}

/// Handles released by the controller when the latch closed.
pub(crate) struct Teardown {
    pub(crate) sampler: Option<TimerHandle>,
    pub(crate) subscription: Option<Subscription>,
}

/// Borrowed view of what the effects need.
pub(crate) struct RevealEffects<'a> {
    pub(crate) config: &'a RevealConfig,
    pub(crate) document: &'a Rc<dyn Document>,
    pub(crate) store: &'a dyn KeyValueStore,
    pub(crate) scheduler: &'a dyn Scheduler,
}

impl RevealEffects<'_> {
    /// Run every step and return the ones that failed.
    pub(crate) fn apply(&self, teardown: Teardown) -> Vec<(RevealStep, RevealStepError)> {
        let mut failures = Vec::new();
        let mut record = |step: RevealStep, result: Result<(), RevealStepError>| {
            if let Err(err) = result {
                tracing::warn!(step = %step, error = %err, "reveal step failed");
                failures.push((step, err));
            }
        };

        record(RevealStep::ClearDelayClass, self.clear_delay_class());
        record(RevealStep::ShowContainer, self.show_container());
        self.schedule_anchor_scroll();
        record(RevealStep::PersistFlag, self.persist_flag());
        record(RevealStep::ScrollToTarget, self.scroll_to_target());
        if let Some(handle) = teardown.sampler {
            self.scheduler.cancel(handle);
        }
        if let Some(subscription) = teardown.subscription {
            record(RevealStep::Unsubscribe, subscription.release().map(|_| ()));
        }

        failures
    }

    fn clear_delay_class(&self) -> Result<(), RevealStepError> {
        let elements = self.document.elements_by_class(self.config.delay_class());
        let total = elements.len();
        let mut failed = 0;
        for element in elements {
            if let Err(err) = element.remove_class(self.config.delay_class()) {
                tracing::debug!(error = %err, "element kept its delay class");
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(RevealStepError::Partial { failed, total });
        }
        Ok(())
    }

    fn show_container(&self) -> Result<(), RevealStepError> {
        let selector = self.config.delayed_content_selector();
        let Some(container) = self.document.query_selector(selector)? else {
            tracing::debug!(selector, "delayed content container not found");
            return Ok(());
        };
        container.add_class(self.config.show_class())?;
        container.set_attribute(ARIA_HIDDEN, "false")?;
        Ok(())
    }

    fn schedule_anchor_scroll(&self) {
        let document = Rc::clone(self.document);
        self.scheduler.schedule(
            ANCHOR_SCROLL_DELAY,
            Box::new(move || {
                let Some(anchor) = document.element_by_id(ANCHOR_ELEMENT_ID) else {
                    return;
                };
                if let Err(err) = anchor.scroll_into_view(ScrollOptions::to_top()) {
                    tracing::warn!(error = %err, "anchor scroll failed");
                }
            }),
        );
    }

    fn persist_flag(&self) -> Result<(), RevealStepError> {
        if let Some(key) = self.config.storage_key() {
            self.store.set(key, PERSISTED_TRUE)?;
        }
        Ok(())
    }

    fn scroll_to_target(&self) -> Result<(), RevealStepError> {
        let Some(target) = self.config.secondary_scroll_target() else {
            return Ok(());
        };
        match self.document.element_by_id(target) {
            Some(element) => element.scroll_into_view(ScrollOptions::to_top())?,
            None => tracing::debug!(scroll_to_id = target, "scroll target not found"),
        }
        Ok(())
    }
}
