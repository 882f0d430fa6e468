mod status;

pub use status::{ChildId, ChildSettings, ScreenTimeStatus, SessionRequest, NO_SESSION};
