use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::page::selector_id;
use crate::time::duration_from_millis;

pub const DEFAULT_SECONDS_TO_DISPLAY: f64 = 1729.0;
pub const DEFAULT_CONTENT_SELECTOR: &str = "#delayed-content";
pub const DEFAULT_DELAY_CLASS: &str = "atomicat-delay";
pub const DEFAULT_SHOW_CLASS: &str = "show";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;
pub const DEFAULT_RETRY_DELAY_MS: f64 = 1000.0;

/// Validated reveal configuration. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct RevealConfig {
    seconds_to_display: f64,
    delayed_content_selector: String,
    delay_class: String,
    show_class: String,
    storage_key: Option<String>,
    scroll_to_id: Option<String>,
    max_attempts: u32,
    retry_delay: Duration,
    debug: bool,
}

/// Loosely-typed configuration as it arrives from the page.
///
/// Every field is optional; missing fields fall back to the defaults above.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RevealConfigDraft {
    pub seconds_to_display: Option<f64>,
    pub delayed_content_selector: Option<String>,
    pub delay_class: Option<String>,
    pub show_class: Option<String>,
    pub storage_key: Option<String>,
    pub scroll_to_id: Option<String>,
    pub max_attempts: Option<u32>,
    pub retry_delay: Option<f64>,
    pub debug: Option<bool>,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("secondsToDisplay must be a finite number >= 0, got {provided}")]
    InvalidThreshold { provided: f64 },
    #[error("retryDelay must be a finite number >= 0, got {provided}")]
    InvalidRetryDelay { provided: f64 },
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("malformed configuration JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

impl RevealConfigDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a draft from a JSON document (e.g. a script attribute).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MalformedJson` if the text is not a JSON object of the
    /// expected shape.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Build a draft from an already-decoded JSON value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MalformedJson` if the value does not have the expected shape.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }

    #[must_use]
    pub fn with_seconds_to_display(mut self, seconds: f64) -> Self {
        self.seconds_to_display = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_scroll_to_id(mut self, id: impl Into<String>) -> Self {
        self.scroll_to_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    #[must_use]
    pub fn with_retry_delay_ms(mut self, millis: f64) -> Self {
        self.retry_delay = Some(millis);
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Validate and normalize the draft, filling in defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the threshold or retry delay is negative or not finite,
    /// or if a selector or class name is blank.
    pub fn validate(self) -> Result<RevealConfig, ConfigError> {
        let seconds_to_display = self
            .seconds_to_display
            .unwrap_or(DEFAULT_SECONDS_TO_DISPLAY);
        if !seconds_to_display.is_finite() || seconds_to_display < 0.0 {
            return Err(ConfigError::InvalidThreshold {
                provided: seconds_to_display,
            });
        }

        let retry_delay_ms = self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY_MS);
        if !retry_delay_ms.is_finite() || retry_delay_ms < 0.0 {
            return Err(ConfigError::InvalidRetryDelay {
                provided: retry_delay_ms,
            });
        }

        Ok(RevealConfig {
            seconds_to_display,
            delayed_content_selector: required(
                self.delayed_content_selector,
                DEFAULT_CONTENT_SELECTOR,
                "delayedContentSelector",
            )?,
            delay_class: required(self.delay_class, DEFAULT_DELAY_CLASS, "delayClass")?,
            show_class: required(self.show_class, DEFAULT_SHOW_CLASS, "showClass")?,
            storage_key: normalize_optional(self.storage_key),
            scroll_to_id: normalize_optional(self.scroll_to_id),
            max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            retry_delay: duration_from_millis(retry_delay_ms),
            debug: self.debug.unwrap_or(false),
        })
    }
}

impl RevealConfig {
    #[must_use]
    pub fn seconds_to_display(&self) -> f64 {
        self.seconds_to_display
    }

    #[must_use]
    pub fn delayed_content_selector(&self) -> &str {
        &self.delayed_content_selector
    }

    #[must_use]
    pub fn delay_class(&self) -> &str {
        &self.delay_class
    }

    #[must_use]
    pub fn show_class(&self) -> &str {
        &self.show_class
    }

    #[must_use]
    pub fn storage_key(&self) -> Option<&str> {
        self.storage_key.as_deref()
    }

    #[must_use]
    pub fn scroll_to_id(&self) -> Option<&str> {
        self.scroll_to_id.as_deref()
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// The secondary scroll target, unless it names the content container itself.
    #[must_use]
    pub fn secondary_scroll_target(&self) -> Option<&str> {
        let target = self.scroll_to_id()?;
        match selector_id(&self.delayed_content_selector) {
            Some(content_id) if content_id == target => None,
            _ => Some(target),
        }
    }
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            seconds_to_display: DEFAULT_SECONDS_TO_DISPLAY,
            delayed_content_selector: DEFAULT_CONTENT_SELECTOR.to_string(),
            delay_class: DEFAULT_DELAY_CLASS.to_string(),
            show_class: DEFAULT_SHOW_CLASS.to_string(),
            storage_key: None,
            scroll_to_id: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: duration_from_millis(DEFAULT_RETRY_DELAY_MS),
            debug: false,
        }
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

fn required(
    value: Option<String>,
    default: &str,
    field: &'static str,
) -> Result<String, ConfigError> {
    match value {
        None => Ok(default.to_string()),
        Some(raw) => normalize_optional(Some(raw)).ok_or(ConfigError::Empty { field }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_draft_uses_defaults() {
        let config = RevealConfigDraft::new().validate().unwrap();
        assert_eq!(config, RevealConfig::default());
        assert_eq!(config.seconds_to_display(), 1729.0);
        assert_eq!(config.delayed_content_selector(), "#delayed-content");
        assert_eq!(config.delay_class(), "atomicat-delay");
        assert_eq!(config.show_class(), "show");
        assert_eq!(config.max_attempts(), 20);
        assert_eq!(config.retry_delay(), Duration::from_millis(1000));
        assert!(config.storage_key().is_none());
        assert!(!config.debug());
    }

    #[test]
    fn parses_camel_case_json() {
        let draft = RevealConfigDraft::from_json(
            r#"{"secondsToDisplay": 5, "maxAttempts": 3, "retryDelay": 100, "storageKey": "x", "debug": true}"#,
        )
        .unwrap();
        let config = draft.validate().unwrap();
        assert_eq!(config.seconds_to_display(), 5.0);
        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.retry_delay(), Duration::from_millis(100));
        assert_eq!(config.storage_key(), Some("x"));
        assert!(config.debug());
    }

    #[test]
    fn ignores_unknown_fields() {
        let draft = RevealConfigDraft::from_json(r#"{"videoId": "abc", "showClass": "open"}"#)
            .unwrap();
        assert_eq!(draft.validate().unwrap().show_class(), "open");
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = RevealConfigDraft::from_json("{secondsToDisplay: 5").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedJson(_)));
    }

    #[test]
    fn rejects_negative_threshold() {
        let err = RevealConfigDraft::new()
            .with_seconds_to_display(-1.0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidThreshold { .. }));
    }

    #[test]
    fn rejects_non_finite_retry_delay() {
        let err = RevealConfigDraft::new()
            .with_retry_delay_ms(f64::INFINITY)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRetryDelay { .. }));
    }

    #[test]
    fn blank_optional_fields_normalize_to_none() {
        let config = RevealConfigDraft::new()
            .with_storage_key("   ")
            .with_scroll_to_id("")
            .validate()
            .unwrap();
        assert!(config.storage_key().is_none());
        assert!(config.scroll_to_id().is_none());
    }

    #[test]
    fn blank_class_is_rejected() {
        let draft = RevealConfigDraft {
            delay_class: Some(" ".to_string()),
            ..RevealConfigDraft::default()
        };
        let err = draft.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Empty { field: "delayClass" }));
    }

    #[test]
    fn secondary_scroll_target_skips_content_container() {
        let same = RevealConfigDraft::new()
            .with_scroll_to_id("delayed-content")
            .validate()
            .unwrap();
        assert_eq!(same.secondary_scroll_target(), None);

        let other = RevealConfigDraft::new()
            .with_scroll_to_id("offer")
            .validate()
            .unwrap();
        assert_eq!(other.secondary_scroll_target(), Some("offer"));
    }
}
