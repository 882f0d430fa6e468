use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use anyhow::{bail, Result};
use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Duration;

use crate::alert::AlertLevel;
use crate::client::SessionClient;
use crate::models::ChildId;

use super::scheduler::{sync_once, Scheduler, SYNC_INTERVAL, TICK_INTERVAL};
use super::state::{Phase, TrackerState};

/// Serializable view handed to the presentation layer on every render.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    pub phase: Phase,
    pub is_active: bool,
    pub session_id: u64,
    pub elapsed_seconds: u64,
    pub alert_level: AlertLevel,
    pub message: String,
}

/// Top-level session state machine. Translates surface intents (start,
/// pause, resume, reset, record, visibility) into transitions over the
/// single `{Idle, Running, Paused}` record and owns the scheduler task that
/// drives the tick and sync cadences while `Running`.
#[derive(Clone)]
pub struct ScreenTimeController {
    state: Arc<Mutex<TrackerState>>,
    client: SessionClient,
    child_id: Arc<RwLock<Option<ChildId>>>,
    scheduler: Arc<Mutex<Scheduler>>,
    tick_interval: Duration,
    sync_interval: Duration,
    visible: Arc<AtomicBool>,
}

impl ScreenTimeController {
    pub fn new(client: SessionClient) -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerState::new())),
            client,
            child_id: Arc::new(RwLock::new(None)),
            scheduler: Arc::new(Mutex::new(Scheduler::new())),
            tick_interval: TICK_INTERVAL,
            sync_interval: SYNC_INTERVAL,
            visible: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn for_child(client: SessionClient, child_id: ChildId) -> Self {
        let controller = Self::new(client);
        *controller.child_id.write().unwrap() = Some(child_id);
        controller
    }

    /// Compressed cadences for tests and debugging surfaces.
    pub fn with_cadence(mut self, tick_every: Duration, sync_every: Duration) -> Self {
        self.tick_interval = tick_every;
        self.sync_interval = sync_every;
        self
    }

    pub fn child_id(&self) -> Option<ChildId> {
        *self.child_id.read().unwrap()
    }

    /// Resolve the child and recover any session the backend still reports
    /// active (e.g. left open by a previous surface). Every failure here is
    /// non-fatal: the controller simply stays `Idle`.
    pub async fn bootstrap(&self, settings_key: &str) -> Result<TrackerSnapshot> {
        if self.child_id().is_none() {
            match self.client.default_child(settings_key).await {
                Ok(Some(child)) => *self.child_id.write().unwrap() = Some(child),
                Ok(None) => {}
                Err(err) => warn!("child resolution failed: {err:#}"),
            }
        }

        let Some(child) = self.child_id() else {
            warn!("no child configured, staying idle");
            return Ok(self.snapshot().await);
        };

        match self.client.fetch_status(child).await {
            Ok(status) if status.is_active && status.has_session() => {
                info!(
                    "recovered active session {} at {}s",
                    status.screentime_id, status.elapsed_seconds
                );
                {
                    let mut guard = self.state.lock().await;
                    guard.begin(
                        status.screentime_id,
                        status.elapsed_seconds,
                        status.message,
                        Instant::now(),
                    );
                    guard.last_synced_at = Some(chrono::Utc::now());
                }
                self.spawn_scheduler(child).await?;
            }
            Ok(_) => {}
            Err(err) => warn!("initial status fetch failed: {err:#}"),
        }

        Ok(self.snapshot().await)
    }

    /// `Idle -> Running`: open a server session and start counting at zero.
    pub async fn start(&self) -> Result<TrackerSnapshot> {
        let Some(child) = self.child_id() else {
            bail!("no child selected");
        };

        {
            let guard = self.state.lock().await;
            if guard.phase != Phase::Idle {
                bail!("session already active");
            }
        }

        let status = self.client.start_session(child).await?;
        {
            let mut guard = self.state.lock().await;
            guard.begin(
                status.screentime_id,
                status.elapsed_seconds,
                status.message,
                Instant::now(),
            );
        }
        self.spawn_scheduler(child).await?;

        Ok(self.snapshot().await)
    }

    /// `Running -> Paused`: freeze the display and silence both cadences.
    /// The server-side session is left open. The phase flips before the
    /// scheduler is torn down so that a sync already in flight drops its
    /// response instead of resurrecting a stale active record.
    pub async fn pause(&self) -> Result<TrackerSnapshot> {
        {
            let mut guard = self.state.lock().await;
            if guard.phase != Phase::Running {
                bail!("no running session to pause");
            }
            guard.pause(Instant::now());
        }
        self.scheduler.lock().await.stop().await?;

        Ok(self.snapshot().await)
    }

    /// `Paused -> Running`: rebase the anchor on the pause snapshot and
    /// restart the cadences. Deliberately local-only; the snapshot is not
    /// revalidated against the server first.
    pub async fn resume(&self) -> Result<TrackerSnapshot> {
        let Some(child) = self.child_id() else {
            bail!("no child selected");
        };

        {
            let mut guard = self.state.lock().await;
            if guard.phase != Phase::Paused {
                bail!("no paused session to resume");
            }
            guard.resume(Instant::now());
        }
        self.spawn_scheduler(child).await?;

        Ok(self.snapshot().await)
    }

    /// Discard the current session without keeping a record.
    pub async fn reset(&self) -> Result<TrackerSnapshot> {
        self.finish("reset").await
    }

    /// Close the current session so the day's usage is persisted.
    pub async fn record(&self) -> Result<TrackerSnapshot> {
        self.finish("record").await
    }

    // Both intents speak to the same end endpoint with the same payload;
    // whether the backend distinguishes discard from persist is a contract
    // gap tracked in DESIGN.md. Local state is zeroed unconditionally,
    // whatever the network does.
    async fn finish(&self, intent: &str) -> Result<TrackerSnapshot> {
        if let Some(child) = self.child_id() {
            if let Err(err) = self.client.end_session(child).await {
                error!("{intent}: end_session failed, resetting locally anyway: {err:#}");
            }
        }

        if let Err(err) = self.scheduler.lock().await.stop().await {
            error!("{intent}: scheduler teardown failed: {err:#}");
        }
        self.state.lock().await.clear();

        Ok(self.snapshot().await)
    }

    /// Report a visibility transition from the host surface. On the edge
    /// back to foreground while `Running`, one immediate resync corrects for
    /// time spent throttled or suspended in the background; the 10-second
    /// cadence is left undisturbed.
    pub async fn set_visible(&self, visible: bool) {
        let was_visible = self.visible.swap(visible, Ordering::SeqCst);
        if visible && !was_visible {
            if let Some(child) = self.child_id() {
                sync_once(&self.state, &self.client, child).await;
            }
        }
    }

    pub async fn snapshot(&self) -> TrackerSnapshot {
        let mut guard = self.state.lock().await;
        guard.sync_from_anchor(Instant::now());
        TrackerSnapshot {
            phase: guard.phase,
            is_active: guard.is_active(),
            session_id: guard.session_id,
            elapsed_seconds: guard.elapsed_seconds,
            alert_level: guard.alert_level,
            message: guard.message.clone(),
        }
    }

    async fn spawn_scheduler(&self, child: ChildId) -> Result<()> {
        self.scheduler.lock().await.start(
            self.state.clone(),
            self.client.clone(),
            child,
            self.tick_interval,
            self.sync_interval,
        )
    }
}
