use reveal_core::trigger::remaining_seconds;
use services::ControllerPhase;

use crate::runtime::DemoSnapshot;
use crate::vm::time_fmt::format_clock;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerPanelVm {
    pub position_label: String,
    pub threshold_label: String,
    pub remaining_label: String,
    pub state_label: &'static str,
    pub phase_label: &'static str,
    pub detail_label: String,
    pub play_label: &'static str,
    pub controls_enabled: bool,
    pub revealed: bool,
}

impl From<&DemoSnapshot> for PlayerPanelVm {
    fn from(snapshot: &DemoSnapshot) -> Self {
        let state_label = if !snapshot.player_loaded {
            "Loading player"
        } else if snapshot.autoplay_pending {
            "Muted preview"
        } else if snapshot.playing {
            "Playing"
        } else {
            "Paused"
        };

        let phase = snapshot.status.as_ref().map(|status| status.phase);
        let phase_label = match phase {
            Some(ControllerPhase::Discovering) => "Looking for the player",
            Some(ControllerPhase::Watching) => "Watching",
            Some(ControllerPhase::Revealed) => "Revealed",
            Some(ControllerPhase::Stopped) => "Stopped",
            None => "Not started",
        };

        let detail_label = match snapshot.status.as_ref() {
            Some(status) => match (&status.reason, status.listener) {
                (Some(reason), _) => format!("Reason: {reason}"),
                (None, Some(listener)) => format!("Listening via {listener}"),
                (None, None) => format!("Discovery attempts: {}", status.attempts),
            },
            None => String::new(),
        };

        Self {
            position_label: format_clock(snapshot.current_time),
            threshold_label: format_clock(snapshot.threshold),
            remaining_label: format_clock(remaining_seconds(
                snapshot.current_time,
                snapshot.threshold,
            )),
            state_label,
            phase_label,
            detail_label,
            play_label: if snapshot.playing { "Pause" } else { "Play" },
            controls_enabled: snapshot.player_loaded,
            revealed: phase == Some(ControllerPhase::Revealed),
        }
    }
}

#[must_use]
pub fn map_player_panel(snapshot: &DemoSnapshot) -> PlayerPanelVm {
    PlayerPanelVm::from(snapshot)
}
