//! Initialization surface exposed to the host page.
//!
//! Configuration may come from an explicit call, from a global configuration
//! object, or from a JSON attribute on the page's script tag. Controllers
//! requested before the document is ready are queued and started by
//! [`Initializer::mark_ready`].

use reveal_core::{RevealConfig, RevealConfigDraft};

use crate::error::BootstrapError;
use crate::watch::{Collaborators, WatchRevealController};

/// Read access to ambient page state.
pub trait EnvironmentReader {
    /// The global configuration object, if the page defines one.
    fn global_config(&self) -> Option<serde_json::Value>;

    /// Raw JSON from the configuration attribute, if present.
    fn config_attribute(&self) -> Option<String>;
}

/// Environment captured up front, e.g. from process arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticEnvironment {
    pub global: Option<serde_json::Value>,
    pub attribute: Option<String>,
}

impl EnvironmentReader for StaticEnvironment {
    fn global_config(&self) -> Option<serde_json::Value> {
        self.global.clone()
    }

    fn config_attribute(&self) -> Option<String> {
        self.attribute.clone()
    }
}

/// Where auto-init found its configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    Global(serde_json::Value),
    Attribute(String),
}

impl ConfigSource {
    /// The global object wins over the attribute.
    #[must_use]
    pub fn locate(env: &dyn EnvironmentReader) -> Option<Self> {
        env.global_config()
            .map(Self::Global)
            .or_else(|| env.config_attribute().map(Self::Attribute))
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Global(_) => "global",
            Self::Attribute(_) => "attribute",
        }
    }

    /// # Errors
    ///
    /// Returns `BootstrapError::Config` when the payload is not a valid
    /// configuration object.
    pub fn parse(self) -> Result<RevealConfigDraft, BootstrapError> {
        let draft = match self {
            Self::Global(value) => RevealConfigDraft::from_value(value)?,
            Self::Attribute(raw) => RevealConfigDraft::from_json(&raw)?,
        };
        Ok(draft)
    }
}

/// Find and parse the page configuration. `Ok(None)` when the page has none.
///
/// # Errors
///
/// Returns `BootstrapError::Config` for malformed JSON.
pub fn resolve_config(
    env: &dyn EnvironmentReader,
) -> Result<Option<RevealConfigDraft>, BootstrapError> {
    ConfigSource::locate(env).map(ConfigSource::parse).transpose()
}

/// Starts controllers, deferring them until the document is ready.
pub struct Initializer {
    deps: Collaborators,
    ready: bool,
    queued: Vec<RevealConfig>,
    controllers: Vec<WatchRevealController>,
}

impl Initializer {
    #[must_use]
    pub fn new(deps: Collaborators) -> Self {
        Self {
            deps,
            ready: false,
            queued: Vec::new(),
            controllers: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued.len()
    }

    /// Every controller started so far, oldest first.
    #[must_use]
    pub fn controllers(&self) -> &[WatchRevealController] {
        &self.controllers
    }

    /// Validate `draft` and start a controller, or queue it until ready.
    ///
    /// # Errors
    ///
    /// Returns `BootstrapError::Config` if the draft does not validate.
    pub fn init(
        &mut self,
        draft: RevealConfigDraft,
    ) -> Result<Option<WatchRevealController>, BootstrapError> {
        let config = draft.validate()?;
        if !self.ready {
            tracing::debug!("document not ready, queueing controller");
            self.queued.push(config);
            return Ok(None);
        }
        Ok(Some(self.launch(config)))
    }

    /// Flip to ready and start everything queued. Later calls do nothing.
    pub fn mark_ready(&mut self) -> Vec<WatchRevealController> {
        if self.ready {
            return Vec::new();
        }
        self.ready = true;
        let queued = std::mem::take(&mut self.queued);
        queued
            .into_iter()
            .map(|config| self.launch(config))
            .collect()
    }

    /// Initialize from ambient page configuration.
    ///
    /// Does nothing when the page carries no configuration. Malformed input is
    /// logged and returned; nothing is started.
    ///
    /// # Errors
    ///
    /// Returns `BootstrapError::Config` when the configuration is malformed or
    /// invalid.
    pub fn auto_init(
        &mut self,
        env: &dyn EnvironmentReader,
    ) -> Result<Option<WatchRevealController>, BootstrapError> {
        let Some(source) = ConfigSource::locate(env) else {
            tracing::debug!("no page configuration found, auto-init skipped");
            return Ok(None);
        };
        let label = source.label();
        match source.parse().and_then(|draft| self.init(draft)) {
            Ok(controller) => Ok(controller),
            Err(err) => {
                tracing::error!(source = label, error = %err, "auto-init aborted");
                Err(err)
            }
        }
    }

    fn launch(&mut self, config: RevealConfig) -> WatchRevealController {
        let controller = WatchRevealController::start(config, self.deps.clone());
        self.controllers.push(controller.clone());
        controller
    }
}
