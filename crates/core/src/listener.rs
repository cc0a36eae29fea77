//! Ordered subscribe/unsubscribe strategies across the listener shapes a player
//! may expose.

use std::fmt;

use thiserror::Error;

use crate::player::{PlayerError, PlayerInstance, ProgressCallback, TIME_UPDATE_EVENT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerShape {
    NamedEvent,
    GenericListener,
    NestedElement,
}

impl ListenerShape {
    /// Order in which shapes are tried, for both attach and detach.
    pub const ORDER: [ListenerShape; 3] = [
        ListenerShape::NamedEvent,
        ListenerShape::GenericListener,
        ListenerShape::NestedElement,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NamedEvent => "named-event",
            Self::GenericListener => "generic-listener",
            Self::NestedElement => "nested-element",
        }
    }

    fn attach(
        self,
        instance: &dyn PlayerInstance,
        callback: &ProgressCallback,
    ) -> Result<(), PlayerError> {
        match self {
            Self::NamedEvent => instance
                .named_events()
                .ok_or(PlayerError::Unsupported)?
                .on(TIME_UPDATE_EVENT, callback.clone()),
            Self::GenericListener => instance
                .event_target()
                .ok_or(PlayerError::Unsupported)?
                .add_event_listener(TIME_UPDATE_EVENT, callback.clone()),
            Self::NestedElement => instance
                .media_element()
                .ok_or(PlayerError::Unsupported)?
                .add_event_listener(TIME_UPDATE_EVENT, callback.clone()),
        }
    }

    fn detach(
        self,
        instance: &dyn PlayerInstance,
        callback: &ProgressCallback,
    ) -> Result<(), PlayerError> {
        match self {
            Self::NamedEvent => instance
                .named_events()
                .ok_or(PlayerError::Unsupported)?
                .off(TIME_UPDATE_EVENT, callback),
            Self::GenericListener => instance
                .event_target()
                .ok_or(PlayerError::Unsupported)?
                .remove_event_listener(TIME_UPDATE_EVENT, callback),
            Self::NestedElement => instance
                .media_element()
                .ok_or(PlayerError::Unsupported)?
                .remove_event_listener(TIME_UPDATE_EVENT, callback),
        }
    }
}

impl fmt::Display for ListenerShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every shape failed; carries each shape's failure in the order tried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("no listener shape accepted the call ({})", describe(.failures))]
pub struct ListenerError {
    pub failures: Vec<(ListenerShape, PlayerError)>,
}

fn describe(failures: &[(ListenerShape, PlayerError)]) -> String {
    failures
        .iter()
        .map(|(shape, err)| format!("{shape}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Subscribe `callback` to time updates using the first shape that works.
///
/// # Errors
///
/// Returns `ListenerError` when no shape accepted the subscription.
pub fn attach_progress(
    instance: &dyn PlayerInstance,
    callback: &ProgressCallback,
) -> Result<ListenerShape, ListenerError> {
    try_in_order(|shape| shape.attach(instance, callback))
}

/// Unsubscribe `callback`, stopping at the first shape that succeeds.
///
/// # Errors
///
/// Returns `ListenerError` when every shape failed.
pub fn detach_progress(
    instance: &dyn PlayerInstance,
    callback: &ProgressCallback,
) -> Result<ListenerShape, ListenerError> {
    try_in_order(|shape| shape.detach(instance, callback))
}

fn try_in_order(
    mut attempt: impl FnMut(ListenerShape) -> Result<(), PlayerError>,
) -> Result<ListenerShape, ListenerError> {
    let mut failures = Vec::new();
    for shape in ListenerShape::ORDER {
        match attempt(shape) {
            Ok(()) => return Ok(shape),
            Err(err) => failures.push((shape, err)),
        }
    }
    Err(ListenerError { failures })
}
