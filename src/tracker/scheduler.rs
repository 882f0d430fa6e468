use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use log::{debug, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::SessionClient;
use crate::models::ChildId;

use super::state::{Phase, TrackerState};

/// Cadence of the local display recomputation.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
/// Cadence of the canonical re-fetch from the backend.
pub const SYNC_INTERVAL: Duration = Duration::from_secs(10);

/// Owns both repeating cadences of a running session as one task, so that
/// teardown is a single idempotent call instead of two clears that must stay
/// in step.
pub(crate) struct Scheduler {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn start(
        &mut self,
        state: Arc<Mutex<TrackerState>>,
        client: SessionClient,
        child_id: ChildId,
        tick_every: Duration,
        sync_every: Duration,
    ) -> Result<()> {
        // The loop exits on its own when the session closes server-side, so
        // only a still-live handle counts as "already running".
        if self.handle.as_ref().is_some_and(|h| !h.is_finished()) {
            bail!("scheduler already running");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(tracker_loop(
            state,
            client,
            child_id,
            tick_every,
            sync_every,
            token_clone,
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle.await.context("tracker loop task failed to join")
        } else {
            Ok(())
        }
    }
}

async fn tracker_loop(
    state: Arc<Mutex<TrackerState>>,
    client: SessionClient,
    child_id: ChildId,
    tick_every: Duration,
    sync_every: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = time::interval(tick_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The caller spawns this loop with a record it just wrote, so the first
    // canonical fetch waits a full period instead of firing immediately.
    let mut syncer = time::interval_at(time::Instant::now() + sync_every, sync_every);
    syncer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut guard = state.lock().await;
                if guard.phase == Phase::Idle {
                    break;
                }
                // Paused between the state write and our teardown: skip.
                guard.sync_from_anchor(Instant::now());
            }
            _ = syncer.tick() => {
                // A hung fetch must not block teardown, so the sync itself
                // races the cancel token.
                tokio::select! {
                    alive = sync_once(&state, &client, child_id) => {
                        if !alive {
                            debug!("session closed server-side, tracker loop exiting");
                            break;
                        }
                    }
                    _ = cancel_token.cancelled() => break,
                }
            }
            _ = cancel_token.cancelled() => {
                debug!("tracker loop shutting down");
                break;
            }
        }
    }
}

/// One canonical fetch with the guarded apply. Shared by the periodic sync
/// and the foreground-visibility resync. The phase is re-checked under the
/// lock *after* the await so that a pause issued while the fetch was in
/// flight cannot resurrect a stale active record. Returns false once the
/// session is gone.
pub(crate) async fn sync_once(
    state: &Arc<Mutex<TrackerState>>,
    client: &SessionClient,
    child_id: ChildId,
) -> bool {
    {
        let guard = state.lock().await;
        if guard.phase != Phase::Running {
            return guard.phase != Phase::Idle;
        }
    }

    match client.fetch_status(child_id).await {
        Ok(status) => {
            let mut guard = state.lock().await;
            if guard.phase != Phase::Running {
                return guard.phase != Phase::Idle;
            }
            guard.apply_sync(&status, Instant::now())
        }
        Err(err) => {
            // Keep the locally projected value; the next cycle will retry.
            warn!("status sync failed for child {child_id}: {err:#}");
            true
        }
    }
}
