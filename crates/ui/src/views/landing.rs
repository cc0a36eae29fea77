use std::rc::Rc;
use std::time::Duration;

use dioxus::document::eval;
use dioxus::prelude::*;
use reveal_core::page::ScrollOptions;

use crate::context::AppContext;
use crate::runtime::DemoRuntime;
use crate::views::PlayerPanel;
use crate::vm::{map_page_elements, map_player_panel};

/// Wall time between two runtime pumps.
pub const PUMP_INTERVAL: Duration = Duration::from_millis(50);

/// Media seconds skipped by the seek button.
pub const SEEK_STEP_SECONDS: f64 = 60.0;

#[derive(Clone)]
struct RuntimeHandle(Rc<DemoRuntime>);

impl PartialEq for RuntimeHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[component]
pub fn LandingView() -> Element {
    let ctx = use_context::<AppContext>();
    let booted = use_hook(move || {
        DemoRuntime::boot(ctx.environment(), ctx.store(), ctx.demo_options())
            .map(|runtime| RuntimeHandle(Rc::new(runtime)))
            .map_err(|err| err.to_string())
    });

    match booted {
        Ok(handle) => rsx! {
            DemoPage { handle }
        },
        Err(message) => rsx! {
            div { class: "page config-error",
                h2 { "Configuration error" }
                p { "{message}" }
            }
        },
    }
}

#[component]
fn DemoPage(handle: RuntimeHandle) -> Element {
    let runtime = handle.0;
    let mut snapshot = use_signal({
        let runtime = Rc::clone(&runtime);
        move || runtime.snapshot()
    });

    let pump_runtime = Rc::clone(&runtime);
    use_future(move || {
        let runtime = Rc::clone(&pump_runtime);
        async move {
            let mut snapshot = snapshot;
            let mut ticks = tokio::time::interval(PUMP_INTERVAL);
            loop {
                ticks.tick().await;
                runtime.pump(PUMP_INTERVAL);
                flush_scrolls(&runtime);
                snapshot.set(runtime.snapshot());
            }
        }
    });

    let current = snapshot();
    let vm = map_player_panel(&current);
    let elements = map_page_elements(&current.elements, runtime.config().delay_class());

    let toggle_runtime = Rc::clone(&runtime);
    let seek_runtime = Rc::clone(&runtime);
    let force_runtime = Rc::clone(&runtime);

    rsx! {
        div { class: "page landing-page",
            PlayerPanel {
                vm,
                on_toggle: move |()| {
                    toggle_runtime.toggle_playback();
                    snapshot.set(toggle_runtime.snapshot());
                },
                on_seek: move |()| {
                    seek_runtime.seek_by(SEEK_STEP_SECONDS);
                    snapshot.set(seek_runtime.snapshot());
                },
                on_force: move |()| {
                    if !force_runtime.force_reveal() {
                        tracing::debug!("content was already revealed");
                    }
                    flush_scrolls(&force_runtime);
                    snapshot.set(force_runtime.snapshot());
                },
            }
            main { class: "landing-content",
                for element in elements {
                    div {
                        key: "{element.key}",
                        id: element.id.clone(),
                        class: "page-el page-el--{element.tag} {element.class}",
                        "aria-hidden": element.aria_hidden.clone(),
                        hidden: element.hidden,
                        "{element.text}"
                    }
                }
            }
        }
    }
}

fn flush_scrolls(runtime: &DemoRuntime) {
    let options = ScrollOptions::to_top();
    for id in runtime.take_scrolls() {
        let script = format!(
            "document.getElementById({id:?})?.scrollIntoView({{ behavior: '{}', block: '{}', inline: '{}' }});",
            options.behavior.as_str(),
            options.block.as_str(),
            options.inline.as_str(),
        );
        let _ = eval(&script);
    }
}
