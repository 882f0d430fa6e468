mod controller;
mod scheduler;
mod state;

pub use controller::{ScreenTimeController, TrackerSnapshot};
pub use scheduler::{SYNC_INTERVAL, TICK_INTERVAL};
pub use state::{Phase, TrackerState};
