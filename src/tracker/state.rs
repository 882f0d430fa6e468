use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::alert::AlertLevel;
use crate::models::{ScreenTimeStatus, NO_SESSION};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    /// No session; nothing is counted.
    Idle,
    /// Session open and counting; tick and sync cadences are live.
    Running,
    /// Display frozen at the pause snapshot; the server session stays open.
    Paused,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Idle
    }
}

/// Client-side projection of the session. Elapsed seconds are always
/// recomputed from `epoch_anchor` plus a baseline, never incremented, so
/// delayed or coalesced ticks self-correct the moment ticking resumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerState {
    pub phase: Phase,
    pub session_id: u64,
    pub elapsed_seconds: u64,
    pub alert_level: AlertLevel,
    pub message: String,
    pub started_at: Option<DateTime<Utc>>,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Seconds already on the clock when the anchor was last (re)based.
    #[serde(skip)]
    pub anchor_baseline_secs: u64,
    #[serde(skip)]
    pub epoch_anchor: Option<Instant>,
    /// Elapsed value captured at the moment of pause; meaningful only while
    /// `Paused`.
    #[serde(skip)]
    pub paused_snapshot_secs: u64,
}

impl Default for TrackerState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            session_id: NO_SESSION,
            elapsed_seconds: 0,
            alert_level: AlertLevel::Ok,
            message: String::new(),
            started_at: None,
            last_synced_at: None,
            anchor_baseline_secs: 0,
            epoch_anchor: None,
            paused_snapshot_secs: 0,
        }
    }
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Running
    }

    /// Elapsed seconds as of `now`, without mutating the record.
    pub fn elapsed_at(&self, now: Instant) -> u64 {
        match (self.phase, self.epoch_anchor) {
            (Phase::Running, Some(anchor)) => self
                .anchor_baseline_secs
                .saturating_add(now.saturating_duration_since(anchor).as_secs()),
            (Phase::Paused, _) => self.paused_snapshot_secs,
            _ => self.elapsed_seconds,
        }
    }

    /// Recompute `elapsed_seconds` and the alert level from the anchor.
    /// Called on every tick and before every snapshot handed to the surface.
    pub fn sync_from_anchor(&mut self, now: Instant) {
        if self.phase == Phase::Running {
            self.elapsed_seconds = self.elapsed_at(now);
            self.alert_level = AlertLevel::for_elapsed(self.elapsed_seconds);
        }
    }

    /// Enter `Running` with a fresh anchor, counting from `initial_secs`.
    pub fn begin(&mut self, session_id: u64, initial_secs: u64, message: String, now: Instant) {
        *self = Self {
            phase: Phase::Running,
            session_id,
            elapsed_seconds: initial_secs,
            alert_level: AlertLevel::for_elapsed(initial_secs),
            message,
            started_at: Some(Utc::now() - chrono::Duration::seconds(initial_secs as i64)),
            last_synced_at: None,
            anchor_baseline_secs: initial_secs,
            epoch_anchor: Some(now),
            paused_snapshot_secs: 0,
        };
    }

    /// Freeze the display at the current elapsed value. The anchor is
    /// dropped; the server-side session is deliberately left open.
    pub fn pause(&mut self, now: Instant) {
        if self.phase != Phase::Running {
            return;
        }
        let snapshot = self.elapsed_at(now);
        self.paused_snapshot_secs = snapshot;
        self.elapsed_seconds = snapshot;
        self.alert_level = AlertLevel::for_elapsed(snapshot);
        self.epoch_anchor = None;
        self.phase = Phase::Paused;
    }

    /// Rebase a fresh anchor on the pause snapshot and resume counting.
    pub fn resume(&mut self, now: Instant) {
        if self.phase != Phase::Paused {
            return;
        }
        self.anchor_baseline_secs = self.paused_snapshot_secs;
        self.elapsed_seconds = self.paused_snapshot_secs;
        self.epoch_anchor = Some(now);
        self.phase = Phase::Running;
    }

    /// Apply a canonical record fetched from the server. The fetched elapsed
    /// value wins over the local projection and the anchor is rebased on it.
    /// Returns false when the server reports the session closed, in which
    /// case the record drops back to `Idle` holding the final server value.
    pub fn apply_sync(&mut self, status: &ScreenTimeStatus, now: Instant) -> bool {
        if self.phase != Phase::Running {
            return self.phase != Phase::Idle;
        }

        self.session_id = status.screentime_id;
        self.elapsed_seconds = status.elapsed_seconds;
        self.alert_level = AlertLevel::for_elapsed(status.elapsed_seconds);
        self.message = status.message.clone();
        self.last_synced_at = Some(Utc::now());

        if status.is_active {
            self.anchor_baseline_secs = status.elapsed_seconds;
            self.epoch_anchor = Some(now);
            true
        } else {
            self.epoch_anchor = None;
            self.phase = Phase::Idle;
            false
        }
    }

    /// Drop everything back to the zeroed `Idle` record.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
