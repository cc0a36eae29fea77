pub mod app;
pub mod context;
pub mod page;
pub mod runtime;
pub mod vm;
pub mod views;

pub use app::App;
pub use context::{AppContext, UiApp, build_app_context};
pub use runtime::{DemoOptions, DemoRuntime};
