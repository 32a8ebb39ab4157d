//! Eligibility sweeper: periodic bot backfill and room retirement.
//!
//! Every tick the sweeper looks at each loaded room:
//!
//! - a `waiting` room with bots enabled, a free seat and an age past its
//!   bot join delay gets a `pending-bot-join:<room>` marker and one bot is
//!   sent in through the admission controller;
//! - a room that has been `finished` for longer than its idle period is
//!   retired.
//!
//! The marker is the cancellation point. The room actor releases it when
//! the room fills by other means; the handoff renews it right before
//! committing, so a released marker means the bot stays out.

use std::sync::Arc;
use std::time::Duration;

use ludo_protocol::{RoomId, RoomStatus};
use ludo_tick::{IntervalConfig, IntervalScheduler};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use crate::lock::{LockToken, pending_bot_key};
use crate::{AdmissionController, Ledger, RoomError, RoomHandle, RoomInfo, RoomStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub interval: IntervalConfig,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: IntervalConfig::every(Duration::from_secs(5)),
        }
    }
}

/// What a single sweep pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// A bot took a seat.
    pub backfilled: Vec<RoomId>,
    /// The marker was released (or the room filled) before the bot got in.
    pub cancelled: Vec<RoomId>,
    /// Another sweeper already holds the room's marker.
    pub pending: Vec<RoomId>,
    pub retired: Vec<RoomId>,
    pub failed: Vec<RoomId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.backfilled.is_empty()
            && self.cancelled.is_empty()
            && self.pending.is_empty()
            && self.retired.is_empty()
            && self.failed.is_empty()
    }
}

enum Handoff {
    Backfilled,
    Cancelled,
    Failed,
}

pub struct EligibilitySweeper<S, L> {
    admission: Arc<AdmissionController<S, L>>,
    config: SweepConfig,
}

/// A running sweeper task.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the loop and waits for the current pass to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

impl<S: RoomStore, L: Ledger> EligibilitySweeper<S, L> {
    pub fn new(admission: Arc<AdmissionController<S, L>>, config: SweepConfig) -> Self {
        Self { admission, config }
    }

    /// Runs the sweep loop on its own task.
    pub fn spawn(self: Arc<Self>) -> SweeperHandle {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        SweeperHandle { shutdown, task }
    }

    /// Sweeps on every tick until `shutdown` changes or its sender drops.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut scheduler = IntervalScheduler::new(self.config.interval.clone());
        tracing::info!(period_ms = scheduler.period().as_millis() as u64, "eligibility sweeper started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                tick = scheduler.wait_for_tick() => {
                    let report = self.sweep_once().await;
                    if !report.is_empty() {
                        tracing::debug!(
                            tick = tick.tick,
                            backfilled = report.backfilled.len(),
                            cancelled = report.cancelled.len(),
                            pending = report.pending.len(),
                            retired = report.retired.len(),
                            failed = report.failed.len(),
                            "sweep pass"
                        );
                    }
                    scheduler.record_tick_end();
                }
            }
        }

        let metrics = scheduler.metrics();
        tracing::info!(
            ticks = metrics.total_ticks,
            overruns = metrics.total_overruns,
            max_pass_ms = metrics.max_pass_time.as_millis() as u64,
            "eligibility sweeper stopped"
        );
    }

    /// One pass over every loaded room. Backfills run concurrently; a
    /// failure in one room never stops the others.
    pub async fn sweep_once(&self) -> SweepReport {
        let registry = self.admission.registry();
        let mut report = SweepReport::default();
        let mut handoffs = JoinSet::new();

        for handle in registry.handles().await {
            let Ok(info) = handle.info().await else {
                continue;
            };
            let room_id = info.room_id;

            if should_retire(&info) {
                match registry.retire(room_id).await {
                    Ok(()) => report.retired.push(room_id),
                    Err(err) => {
                        tracing::warn!(%room_id, error = %err, "retiring room failed");
                        report.failed.push(room_id);
                    }
                }
                continue;
            }

            if !info.needs_backfill() {
                continue;
            }

            match self.mark(&handle, &info).await {
                Ok(Some(token)) => {
                    let admission = Arc::clone(&self.admission);
                    let ttl = info.backfill_ttl;
                    handoffs.spawn(async move { (room_id, handoff(admission, room_id, token, ttl).await) });
                }
                Ok(None) => {
                    tracing::debug!(%room_id, "bot join already pending, skipping");
                    report.pending.push(room_id);
                }
                Err(err) => {
                    tracing::warn!(%room_id, error = %err, "marking room for backfill failed");
                    report.failed.push(room_id);
                }
            }
        }

        while let Some(joined) = handoffs.join_next().await {
            match joined {
                Ok((room_id, Handoff::Backfilled)) => report.backfilled.push(room_id),
                Ok((room_id, Handoff::Cancelled)) => report.cancelled.push(room_id),
                Ok((room_id, Handoff::Failed)) => report.failed.push(room_id),
                Err(err) => tracing::error!(error = %err, "backfill task panicked"),
            }
        }

        report.backfilled.sort();
        report.cancelled.sort();
        report.failed.sort();
        report
    }

    /// Takes the room's pending-bot-join marker and tells the room about it.
    async fn mark(&self, handle: &RoomHandle, info: &RoomInfo) -> Result<Option<LockToken>, RoomError> {
        let lock = &self.admission.registry().services().lock;
        let Some(token) = lock.acquire(&pending_bot_key(info.room_id), info.backfill_ttl).await? else {
            return Ok(None);
        };
        if let Err(err) = handle.mark_backfill(token.clone()).await {
            let _ = lock.release(&token).await;
            return Err(err);
        }
        Ok(Some(token))
    }
}

fn should_retire(info: &RoomInfo) -> bool {
    info.status == RoomStatus::Finished && info.finished_for.is_some_and(|idle| idle >= info.idle_retire)
}

async fn handoff<S: RoomStore, L: Ledger>(
    admission: Arc<AdmissionController<S, L>>,
    room_id: RoomId,
    token: LockToken,
    ttl: Duration,
) -> Handoff {
    let lock = &admission.registry().services().lock;

    match lock.renew(&token, ttl).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!(%room_id, "backfill cancelled before commit");
            return Handoff::Cancelled;
        }
        Err(err) => {
            tracing::warn!(%room_id, error = %err, "renewing backfill marker failed");
            return Handoff::Failed;
        }
    }

    let outcome = match admission.admit_bot(room_id).await {
        Ok(admission) => {
            tracing::info!(%room_id, bot_id = %admission.player.id, name = %admission.player.name, "bot backfilled");
            Handoff::Backfilled
        }
        Err(RoomError::RoomFull(_) | RoomError::Conflict(_)) => Handoff::Cancelled,
        Err(err) => {
            tracing::warn!(%room_id, error = %err, "bot backfill failed");
            Handoff::Failed
        }
    };

    // May already be gone if the room filled and the actor released it.
    let _ = lock.release(&token).await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AdmissionConfig, MemoryLedger, MemoryStore, RoomConfig, RoomLock, RoomRegistry, RoomServices};
    use ludo_protocol::PlayerId;
    use ludo_tick::ReactionDelay;

    type Controller = AdmissionController<MemoryStore, MemoryLedger>;

    fn controller() -> Arc<Controller> {
        let (services, _events) = RoomServices::new(MemoryStore::new(), MemoryLedger::new(), RoomLock::local());
        let config = RoomConfig {
            capacity: 2,
            bot_join_delay: Duration::ZERO,
            bot_reaction: ReactionDelay::INSTANT,
            ..RoomConfig::default()
        };
        let registry = Arc::new(RoomRegistry::new(Arc::new(services), config));
        Arc::new(AdmissionController::new(registry, AdmissionConfig::default()))
    }

    #[tokio::test]
    async fn test_handoff_cancelled_when_room_fills_first() {
        let admission = controller();
        let room_id = admission.registry().create_room().await.unwrap();
        admission.admit_human(room_id, PlayerId(1), "ana").await.unwrap();

        let sweeper = EligibilitySweeper::new(Arc::clone(&admission), SweepConfig::default());
        let handle = admission.registry().get(room_id).await.unwrap();
        let info = handle.info().await.unwrap();
        let token = sweeper.mark(&handle, &info).await.unwrap().unwrap();
        assert!(handle.info().await.unwrap().backfill_pending);

        // A human takes the last seat while the bot is still queued.
        admission.admit_human(room_id, PlayerId(2), "ben").await.unwrap();

        let outcome = handoff(Arc::clone(&admission), room_id, token, info.backfill_ttl).await;
        assert!(matches!(outcome, Handoff::Cancelled));
        let info = handle.info().await.unwrap();
        assert_eq!(info.bot_count, 0);
        assert!(!info.backfill_pending);
    }

    #[tokio::test]
    async fn test_mark_on_full_room_releases_marker() {
        let admission = controller();
        let room_id = admission.registry().create_room().await.unwrap();
        admission.admit_human(room_id, PlayerId(1), "ana").await.unwrap();
        admission.admit_human(room_id, PlayerId(2), "ben").await.unwrap();

        let sweeper = EligibilitySweeper::new(Arc::clone(&admission), SweepConfig::default());
        let handle = admission.registry().get(room_id).await.unwrap();
        let info = handle.info().await.unwrap();
        let token = sweeper.mark(&handle, &info).await.unwrap().unwrap();

        // Round-trip so the actor has processed the marker.
        assert!(!handle.info().await.unwrap().backfill_pending);
        let lock = &admission.registry().services().lock;
        assert!(!lock.renew(&token, Duration::from_secs(1)).await.unwrap());
    }

    #[test]
    fn test_should_retire_only_after_idle_period() {
        let mut info = RoomInfo {
            room_id: RoomId(1),
            status: RoomStatus::Finished,
            players: Vec::new(),
            player_count: 0,
            capacity: 2,
            bot_count: 0,
            bots_enabled: true,
            current_turn: None,
            replaceable_bot: false,
            backfill_pending: false,
            bot_difficulty: Default::default(),
            bot_join_delay: Duration::from_secs(15),
            backfill_ttl: Duration::from_secs(30),
            idle_retire: Duration::from_secs(120),
            age: Duration::from_secs(600),
            finished_for: Some(Duration::from_secs(30)),
        };
        assert!(!should_retire(&info));
        info.finished_for = Some(Duration::from_secs(120));
        assert!(should_retire(&info));
        info.status = RoomStatus::Playing;
        assert!(!should_retire(&info));
    }
}
