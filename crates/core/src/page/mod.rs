//! Page capabilities consumed by the reveal controller.
//!
//! The controller only ever talks to these traits; hosts plug in a real DOM
//! bridge or the in-memory [`MemoryDocument`].

use std::rc::Rc;

use thiserror::Error;

mod memory;

pub use memory::{ElementSnapshot, MemoryDocument, PageEvent};

/// Id of the element scrolled to the top of the viewport shortly after a reveal.
pub const ANCHOR_ELEMENT_ID: &str = "delayed-anchor";

/// Accessibility attribute toggled on the revealed container.
pub const ARIA_HIDDEN: &str = "aria-hidden";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PageError {
    #[error("element is no longer attached to the document")]
    Detached,
    #[error("unsupported selector: {0}")]
    UnsupportedSelector(String),
    #[error("page operation failed: {0}")]
    Operation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollBehavior {
    #[default]
    Smooth,
    Instant,
    Auto,
}

impl ScrollBehavior {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Smooth => "smooth",
            Self::Instant => "instant",
            Self::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollAlignment {
    Start,
    Center,
    End,
    #[default]
    Nearest,
}

impl ScrollAlignment {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Center => "center",
            Self::End => "end",
            Self::Nearest => "nearest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollOptions {
    pub behavior: ScrollBehavior,
    pub block: ScrollAlignment,
    pub inline: ScrollAlignment,
}

impl ScrollOptions {
    /// Smooth scroll that brings the element to the top of the viewport.
    #[must_use]
    pub const fn to_top() -> Self {
        Self {
            behavior: ScrollBehavior::Smooth,
            block: ScrollAlignment::Start,
            inline: ScrollAlignment::Nearest,
        }
    }
}

pub trait Element {
    fn id(&self) -> Option<String>;
    fn add_class(&self, class: &str) -> Result<(), PageError>;
    fn remove_class(&self, class: &str) -> Result<(), PageError>;
    fn set_attribute(&self, name: &str, value: &str) -> Result<(), PageError>;
    fn scroll_into_view(&self, options: ScrollOptions) -> Result<(), PageError>;
}

pub trait Document {
    /// Every element currently carrying `class`, in document order.
    fn elements_by_class(&self, class: &str) -> Vec<Rc<dyn Element>>;

    /// First element matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns `PageError::UnsupportedSelector` if the selector cannot be interpreted.
    fn query_selector(&self, selector: &str) -> Result<Option<Rc<dyn Element>>, PageError>;

    fn element_by_id(&self, id: &str) -> Option<Rc<dyn Element>>;
}

/// The subset of CSS selectors the page bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector<'a> {
    Id(&'a str),
    Class(&'a str),
    Tag(&'a str),
}

impl<'a> Selector<'a> {
    /// # Errors
    ///
    /// Returns `PageError::UnsupportedSelector` for anything other than a lone
    /// `#id`, `.class` or tag name.
    pub fn parse(raw: &'a str) -> Result<Self, PageError> {
        let trimmed = raw.trim();
        let parsed = if let Some(id) = trimmed.strip_prefix('#') {
            is_ident(id).then_some(Selector::Id(id))
        } else if let Some(class) = trimmed.strip_prefix('.') {
            is_ident(class).then_some(Selector::Class(class))
        } else {
            is_ident(trimmed).then_some(Selector::Tag(trimmed))
        };
        parsed.ok_or_else(|| PageError::UnsupportedSelector(raw.to_string()))
    }
}

/// The element id named by a plain `#id` selector.
#[must_use]
pub fn selector_id(selector: &str) -> Option<&str> {
    match Selector::parse(selector) {
        Ok(Selector::Id(id)) => Some(id),
        _ => None,
    }
}

fn is_ident(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_selectors() {
        assert_eq!(
            Selector::parse("#delayed-content").unwrap(),
            Selector::Id("delayed-content")
        );
        assert_eq!(Selector::parse(" .show ").unwrap(), Selector::Class("show"));
        assert_eq!(Selector::parse("section").unwrap(), Selector::Tag("section"));
    }

    #[test]
    fn rejects_compound_selectors() {
        assert!(Selector::parse("div > .x").is_err());
        assert!(Selector::parse("#").is_err());
        assert!(Selector::parse("").is_err());
    }

    #[test]
    fn selector_id_only_for_id_selectors() {
        assert_eq!(selector_id("#offer"), Some("offer"));
        assert_eq!(selector_id(".offer"), None);
    }

    #[test]
    fn to_top_scroll_uses_smooth_start_nearest() {
        let options = ScrollOptions::to_top();
        assert_eq!(options.behavior.as_str(), "smooth");
        assert_eq!(options.block.as_str(), "start");
        assert_eq!(options.inline.as_str(), "nearest");
    }
}
