//! Screen-time session tracking core for the MeRelax companion app.
//!
//! The backend owns the session record; this crate keeps a locally rendered
//! elapsed-time counter consistent with it through anchor-based ticking,
//! periodic drift correction, and an out-of-band resync when the surface
//! returns to the foreground.

pub mod alert;
pub mod client;
pub mod models;
pub mod tracker;

pub use alert::AlertLevel;
pub use client::{ApiConfig, SessionClient};
pub use models::{ChildId, ScreenTimeStatus};
pub use tracker::{Phase, ScreenTimeController, TrackerSnapshot};
