use std::sync::Arc;

use services::StaticEnvironment;
use storage::repository::KeyValueStore;

use crate::runtime::DemoOptions;

pub trait UiApp: Send + Sync {
    /// Page configuration sources captured by the composition root.
    fn environment(&self) -> StaticEnvironment;
    fn store(&self) -> Arc<dyn KeyValueStore>;
    fn demo_options(&self) -> DemoOptions;
}

#[derive(Clone)]
pub struct AppContext {
    environment: StaticEnvironment,
    store: Arc<dyn KeyValueStore>,
    demo_options: DemoOptions,
}

impl AppContext {
    #[must_use]
    pub fn new(app: &Arc<dyn UiApp>) -> Self {
        Self {
            environment: app.environment(),
            store: app.store(),
            demo_options: app.demo_options(),
        }
    }

    #[must_use]
    pub fn environment(&self) -> &StaticEnvironment {
        &self.environment
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    #[must_use]
    pub fn demo_options(&self) -> &DemoOptions {
        &self.demo_options
    }
}

// This context is provided by the application composition root (e.g. `crates/app`).

/// Build an `AppContext` from a UI-facing app implementation.
#[must_use]
pub fn build_app_context(app: &Arc<dyn UiApp>) -> AppContext {
    AppContext::new(app)
}
