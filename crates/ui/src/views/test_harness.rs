use std::sync::Arc;

use dioxus::core::NoOpMutations;
use dioxus::prelude::*;
use services::StaticEnvironment;
use storage::repository::{InMemoryRepository, KeyValueStore};

use crate::context::{UiApp, build_app_context};
use crate::runtime::DemoOptions;
use crate::views::LandingView;

#[derive(Clone)]
struct TestApp {
    environment: StaticEnvironment,
    store: Arc<InMemoryRepository>,
    options: DemoOptions,
}

impl UiApp for TestApp {
    fn environment(&self) -> StaticEnvironment {
        self.environment.clone()
    }

    fn store(&self) -> Arc<dyn KeyValueStore> {
        self.store.clone()
    }

    fn demo_options(&self) -> DemoOptions {
        self.options.clone()
    }
}

#[derive(Props, Clone)]
struct LandingHarnessProps {
    app: Arc<TestApp>,
}

impl PartialEq for LandingHarnessProps {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

#[component]
fn LandingHarness(props: LandingHarnessProps) -> Element {
    let app: Arc<dyn UiApp> = props.app.clone();
    use_context_provider(|| build_app_context(&app));
    rsx! { LandingView {} }
}

pub struct ViewHarness {
    pub dom: VirtualDom,
    pub store: Arc<InMemoryRepository>,
}

impl ViewHarness {
    pub fn rebuild(&mut self) {
        self.dom.rebuild_in_place();
        drive_dom(&mut self.dom);
    }

    pub fn render(&self) -> String {
        dioxus_ssr::render(&self.dom)
    }
}

pub fn drive_dom(dom: &mut VirtualDom) {
    dom.process_events();
    dom.render_immediate(&mut NoOpMutations);
    dom.process_events();
}

pub fn setup_landing(environment: StaticEnvironment, store: InMemoryRepository) -> ViewHarness {
    let store = Arc::new(store);
    let app = Arc::new(TestApp {
        environment,
        store: Arc::clone(&store),
        options: DemoOptions {
            muted_autoplay: false,
            ..DemoOptions::default()
        },
    });
    let dom = VirtualDom::new_with_props(LandingHarness, LandingHarnessProps { app });
    ViewHarness { dom, store }
}
