mod landing;
mod player_panel;

#[cfg(test)]
mod test_harness;
#[cfg(test)]
mod view_smoke;

pub use landing::{LandingView, PUMP_INTERVAL, SEEK_STEP_SECONDS};
pub use player_panel::PlayerPanel;
