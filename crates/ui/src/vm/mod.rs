mod page_vm;
mod player_vm;
mod time_fmt;

pub use page_vm::{PageElementVm, map_page_elements};
pub use player_vm::{PlayerPanelVm, map_player_panel};
pub use time_fmt::format_clock;
