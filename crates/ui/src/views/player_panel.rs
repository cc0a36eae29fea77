use dioxus::prelude::*;

use crate::vm::PlayerPanelVm;

#[component]
pub fn PlayerPanel(
    vm: PlayerPanelVm,
    on_toggle: EventHandler<()>,
    on_seek: EventHandler<()>,
    on_force: EventHandler<()>,
) -> Element {
    let panel_class = if vm.revealed {
        "player-panel player-panel--revealed"
    } else {
        "player-panel"
    };

    rsx! {
        aside { class: "{panel_class}",
            div { class: "player-screen",
                span { class: "player-state", "{vm.state_label}" }
                span { class: "player-clock", "{vm.position_label} / {vm.threshold_label}" }
            }
            dl { class: "player-stats",
                dt { "Remaining" }
                dd { "{vm.remaining_label}" }
                dt { "Controller" }
                dd { "{vm.phase_label}" }
            }
            if !vm.detail_label.is_empty() {
                p { class: "player-detail", "{vm.detail_label}" }
            }
            div { class: "player-controls",
                button {
                    class: "btn btn-primary",
                    r#type: "button",
                    disabled: !vm.controls_enabled,
                    onclick: move |_| on_toggle.call(()),
                    "{vm.play_label}"
                }
                button {
                    class: "btn btn-secondary",
                    r#type: "button",
                    disabled: !vm.controls_enabled,
                    onclick: move |_| on_seek.call(()),
                    "Seek +60s"
                }
                button {
                    class: "btn btn-secondary",
                    r#type: "button",
                    disabled: vm.revealed,
                    onclick: move |_| on_force.call(()),
                    "Force reveal"
                }
            }
        }
    }
}
