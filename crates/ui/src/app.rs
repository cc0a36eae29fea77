use dioxus::prelude::*;

use crate::views::LandingView;

#[component]
pub fn App() -> Element {
    rsx! {
        document::Stylesheet { href: asset!("/assets/style.css") }
        document::Title { "Watch & Reveal" }

        div { class: "app-root",
            header { class: "app-header",
                span { class: "app-brand", "Watch & Reveal" }
                span { class: "app-tagline", "Content unlocks after enough of the video has played." }
            }
            ErrorBoundary {
                handle_error: |errors: ErrorContext| rsx! {
                    div { class: "fatal",
                        h1 { "The demo page failed to render" }
                        pre { "{errors:?}" }
                    }
                },
                LandingView {}
            }
        }
    }
}
