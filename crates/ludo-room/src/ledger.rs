//! Stakes and payouts.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ludo_protocol::{PlayerId, RoomId};
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient funds for player {0}")]
    InsufficientFunds(PlayerId),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// The money side of a game.
///
/// Stakes are deducted from humans when a game starts and refunded if the
/// start is rolled back. A human winner is awarded
/// `2 × stake × (1 − cut/100)`; bots never touch the ledger.
pub trait Ledger: Send + Sync + 'static {
    fn deduct_stake(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        amount: u64,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;

    fn refund_stake(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        amount: u64,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;

    fn award_winnings(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        amount: u64,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEntryKind {
    Deduct,
    Refund,
    Award,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub kind: LedgerEntryKind,
    pub amount: u64,
}

/// Ledger that only records what it was asked to do.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<LedgerInner>,
}

#[derive(Default)]
struct LedgerInner {
    entries: Mutex<Vec<LedgerEntry>>,
    broke: Mutex<HashSet<PlayerId>>,
    failing: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Future deductions for this player fail with insufficient funds.
    pub async fn mark_broke(&self, player_id: PlayerId) {
        self.inner.broke.lock().await.insert(player_id);
    }

    /// Makes every call fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn entries(&self) -> Vec<LedgerEntry> {
        self.inner.entries.lock().await.clone()
    }

    /// Net amount moved for a player (awards and refunds minus deductions).
    pub async fn balance(&self, player_id: PlayerId) -> i64 {
        self.inner
            .entries
            .lock()
            .await
            .iter()
            .filter(|e| e.player_id == player_id)
            .map(|e| match e.kind {
                LedgerEntryKind::Deduct => -(e.amount as i64),
                LedgerEntryKind::Refund | LedgerEntryKind::Award => e.amount as i64,
            })
            .sum()
    }

    async fn record(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        kind: LedgerEntryKind,
        amount: u64,
    ) -> Result<(), LedgerError> {
        if self.inner.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("memory ledger set to fail".into()));
        }
        if kind == LedgerEntryKind::Deduct && self.inner.broke.lock().await.contains(&player_id) {
            return Err(LedgerError::InsufficientFunds(player_id));
        }
        self.inner.entries.lock().await.push(LedgerEntry {
            room_id,
            player_id,
            kind,
            amount,
        });
        Ok(())
    }
}

impl Ledger for MemoryLedger {
    async fn deduct_stake(&self, room_id: RoomId, player_id: PlayerId, amount: u64) -> Result<(), LedgerError> {
        self.record(room_id, player_id, LedgerEntryKind::Deduct, amount).await
    }

    async fn refund_stake(&self, room_id: RoomId, player_id: PlayerId, amount: u64) -> Result<(), LedgerError> {
        self.record(room_id, player_id, LedgerEntryKind::Refund, amount).await
    }

    async fn award_winnings(&self, room_id: RoomId, player_id: PlayerId, amount: u64) -> Result<(), LedgerError> {
        self.record(room_id, player_id, LedgerEntryKind::Award, amount).await
    }
}
