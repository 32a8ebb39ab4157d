//! Room actor: an isolated Tokio task that owns one room.
//!
//! Each room runs in its own task and is reached only through its
//! [`RoomHandle`]. Commands are processed one at a time, so every roll,
//! move and join is re-validated against the live state when it runs.
//! A command that was valid when sent but is stale by then (wrong turn,
//! piece moved, room no longer playing) is rejected without mutation.

use std::sync::Arc;
use std::time::Duration;

use ludo_engine::{
    BotSettings, Color, Dice, Difficulty, GameState, Move, MoveOutcome, Position, TurnOutcome, TurnResolution, bot,
    rules,
};
use ludo_protocol::{GameEvent, PlayerId, PlayerView, Recipient, RoomEvent, RoomId, RoomStatus};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::lock::LockToken;
use crate::model::{JoinRequest, LastRoll, Player, RoomRecord, now_millis};
use crate::naming::unique_bot_name;
use crate::{ErrorKind, Ledger, RoomConfig, RoomError, RoomLock, RoomStore};

/// Where rooms publish their events.
pub type EventSender = mpsc::UnboundedSender<RoomEvent>;

/// Collaborators shared by every room of a registry.
pub struct RoomServices<S, L> {
    pub store: S,
    pub ledger: L,
    pub lock: RoomLock,
    pub events: EventSender,
}

impl<S: RoomStore, L: Ledger> RoomServices<S, L> {
    /// Bundles the collaborators and returns the receiving end of the
    /// event channel.
    pub fn new(store: S, ledger: L, lock: RoomLock) -> (Self, mpsc::UnboundedReceiver<RoomEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                store,
                ledger,
                lock,
                events,
            },
            rx,
        )
    }
}

// ---------------------------------------------------------------------------
// Commands & replies
// ---------------------------------------------------------------------------

pub(crate) enum RoomCommand {
    Join {
        request: JoinRequest,
        reply: oneshot::Sender<Result<Admission, RoomError>>,
    },
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Roll {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<RollResult, RoomError>>,
    },
    Move {
        player_id: PlayerId,
        piece: usize,
        expected_from: Position,
        reply: oneshot::Sender<Result<MoveOutcome, RoomError>>,
    },
    /// Fired by a bot's reaction timer.
    BotTurn { player_id: PlayerId, turn_seq: u64 },
    /// Fired when a human's turn timeout runs out.
    TurnTimeout { player_id: PlayerId, turn_seq: u64 },
    /// The sweeper holds a pending-bot-join marker for this room.
    MarkBackfill { token: LockToken },
    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    Shutdown,
}

/// Result of a successful join.
#[derive(Debug, Clone)]
pub struct Admission {
    pub room_id: RoomId,
    pub player: PlayerView,
    /// The bot whose seat was taken over, if any.
    pub replaced: Option<PlayerId>,
    /// The player already had a seat; nothing changed.
    pub rejoined: bool,
    /// This join filled the room and started the game.
    pub started: bool,
}

/// Result of a roll.
#[derive(Debug, Clone)]
pub struct RollResult {
    pub value: u8,
    /// Legal moves for the roll. Empty means the turn already moved on.
    pub moves: Vec<Move>,
}

impl RollResult {
    pub fn passed(&self) -> bool {
        self.moves.is_empty()
    }
}

/// Room metadata, without piece positions.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub status: RoomStatus,
    /// Seated players, in join order.
    pub players: Vec<PlayerId>,
    pub player_count: usize,
    pub capacity: usize,
    pub bot_count: usize,
    pub bots_enabled: bool,
    pub current_turn: Option<PlayerId>,
    /// Playing, before the first roll, with at least one bot seated.
    pub replaceable_bot: bool,
    pub backfill_pending: bool,
    pub bot_difficulty: Difficulty,
    pub bot_join_delay: Duration,
    /// Lifetime of this room's pending-bot-join marker.
    pub backfill_ttl: Duration,
    /// Finished rooms are retired after this long.
    pub idle_retire: Duration,
    pub age: Duration,
    /// Time since the game ended.
    pub finished_for: Option<Duration>,
}

impl RoomInfo {
    /// A free seat is available.
    pub fn is_open(&self) -> bool {
        self.status.is_joinable() && self.player_count < self.capacity
    }

    /// Whether a join of this kind could succeed right now.
    pub fn admits(&self, is_bot: bool) -> bool {
        self.is_open() || (!is_bot && self.replaceable_bot)
    }

    /// The sweeper should send a bot in.
    pub fn needs_backfill(&self) -> bool {
        self.bots_enabled && self.is_open() && self.age >= self.bot_join_delay
    }
}

/// Full room state, for resyncing a client.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub record: RoomRecord,
    pub pieces: Option<GameState>,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running room actor.
///
/// Cheap to clone: it is an `mpsc::Sender` wrapper. The registry holds
/// one per room.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx.await.map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Seats a player. Only the admission controller should call this;
    /// it holds the room's admission lock around the call.
    pub(crate) async fn join(&self, request: JoinRequest) -> Result<Admission, RoomError> {
        self.request(|reply| RoomCommand::Join { request, reply }).await?
    }

    pub async fn leave(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Leave { player_id, reply }).await?
    }

    /// Rolls the die for a human whose turn it is.
    pub async fn roll(&self, player_id: PlayerId) -> Result<RollResult, RoomError> {
        self.request(|reply| RoomCommand::Roll { player_id, reply }).await?
    }

    /// Moves `piece` by the outstanding roll.
    ///
    /// `expected_from` is where the caller believes the piece is; a
    /// mismatch means the caller is out of date and the move is refused.
    pub async fn move_piece(
        &self,
        player_id: PlayerId,
        piece: usize,
        expected_from: Position,
    ) -> Result<MoveOutcome, RoomError> {
        self.request(|reply| RoomCommand::Move {
            player_id,
            piece,
            expected_from,
            reply,
        })
        .await?
    }

    pub(crate) async fn mark_backfill(&self, token: LockToken) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::MarkBackfill { token })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::GetInfo { reply }).await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct RoomActor<S, L> {
    room: RoomRecord,
    game: Option<GameState>,
    config: RoomConfig,
    services: Arc<RoomServices<S, L>>,
    dice: Dice,
    receiver: mpsc::Receiver<RoomCommand>,
    /// Lets bot timers reach the actor without keeping it alive.
    weak: mpsc::WeakSender<RoomCommand>,
    created: Instant,
    finished_at: Option<Instant>,
    /// Bumped whenever a bot turn is scheduled or the turn is taken away;
    /// a timer carrying an older value is stale.
    turn_seq: u64,
    event_seq: u64,
    backfill: Option<LockToken>,
    /// Players who left mid-game. They count as losers.
    forfeited: Vec<PlayerId>,
}

/// In-memory state to restore when a critical write fails.
struct Checkpoint {
    room: RoomRecord,
    game: Option<GameState>,
}

impl<S: RoomStore, L: Ledger> RoomActor<S, L> {
    async fn run(mut self) {
        tracing::info!(room_id = %self.room.room_id, status = %self.room.status, "room actor started");
        self.arm_turn_timer();

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join { request, reply } => {
                    let result = self.handle_join(request).await;
                    let _ = reply.send(result);
                }
                RoomCommand::Leave { player_id, reply } => {
                    let result = self.handle_leave(player_id).await;
                    let _ = reply.send(result);
                }
                RoomCommand::Roll { player_id, reply } => {
                    let result = self.handle_roll(player_id).await;
                    if let Err(err) = &result {
                        self.reject(player_id, err);
                    }
                    let _ = reply.send(result);
                }
                RoomCommand::Move {
                    player_id,
                    piece,
                    expected_from,
                    reply,
                } => {
                    let result = self.handle_move(player_id, piece, expected_from).await;
                    if let Err(err) = &result {
                        self.reject(player_id, err);
                    }
                    let _ = reply.send(result);
                }
                RoomCommand::BotTurn { player_id, turn_seq } => {
                    self.handle_bot_turn(player_id, turn_seq).await;
                }
                RoomCommand::TurnTimeout { player_id, turn_seq } => {
                    self.handle_turn_timeout(player_id, turn_seq).await;
                }
                RoomCommand::MarkBackfill { token } => {
                    self.handle_mark_backfill(token).await;
                }
                RoomCommand::GetInfo { reply } => {
                    let _ = reply.send(self.info());
                }
                RoomCommand::Snapshot { reply } => {
                    let _ = reply.send(RoomSnapshot {
                        record: self.room.clone(),
                        pieces: self.game.clone(),
                    });
                }
                RoomCommand::Shutdown => {
                    tracing::info!(room_id = %self.room.room_id, "room shutting down");
                    self.cancel_backfill().await;
                    break;
                }
            }
        }

        tracing::info!(room_id = %self.room.room_id, "room actor stopped");
    }

    // -- admission ----------------------------------------------------------

    async fn handle_join(&mut self, request: JoinRequest) -> Result<Admission, RoomError> {
        let room_id = self.room.room_id;

        if let Some(existing) = self.room.player(request.player_id) {
            return Ok(Admission {
                room_id,
                player: existing.view(),
                replaced: None,
                rejoined: true,
                started: false,
            });
        }
        if self.forfeited.contains(&request.player_id) {
            return Err(RoomError::InvalidState(format!(
                "player {} forfeited in room {room_id}",
                request.player_id
            )));
        }

        match self.room.status {
            RoomStatus::Finished => Err(RoomError::InvalidState(format!("room {room_id} has finished"))),
            RoomStatus::Playing if !request.is_bot() && self.room.has_replaceable_bot() => {
                self.replace_bot(request).await
            }
            RoomStatus::Playing => Err(RoomError::RoomFull(room_id)),
            RoomStatus::Waiting => self.seat(request).await,
        }
    }

    async fn seat(&mut self, request: JoinRequest) -> Result<Admission, RoomError> {
        let room_id = self.room.room_id;
        let color = self.room.free_color().ok_or(RoomError::RoomFull(room_id))?;
        let checkpoint = self.checkpoint();

        let player = self.new_player(request, color);
        self.room.players.push(player.clone());

        let started = self.room.is_full();
        let mut charged = Vec::new();
        if started {
            charged = match self.charge_stakes().await {
                Ok(charged) => charged,
                Err(err) => {
                    tracing::warn!(%room_id, player_id = %player.id, error = %err, "stake deduction failed, start rolled back");
                    self.restore(checkpoint);
                    return Err(err);
                }
            };
            self.start_game();
        }

        if let Err(err) = self.persist().await {
            tracing::error!(%room_id, player_id = %player.id, error = %err, "join commit failed, rolled back");
            self.refund(&charged).await;
            self.restore(checkpoint);
            return Err(err);
        }

        tracing::info!(
            %room_id,
            player_id = %player.id,
            %color,
            is_bot = player.is_bot,
            players = self.room.players.len(),
            "player joined"
        );
        self.emit(Recipient::All, GameEvent::PlayerJoined { player: player.view() });

        if player.is_bot {
            // The backfill this marker announced has landed; the sweeper
            // releases it.
            self.backfill = None;
        }
        if started {
            self.on_started().await;
        }

        Ok(Admission {
            room_id,
            player: player.view(),
            replaced: None,
            rejoined: false,
            started,
        })
    }

    /// A human takes the seat of the most recently joined bot.
    async fn replace_bot(&mut self, request: JoinRequest) -> Result<Admission, RoomError> {
        let room_id = self.room.room_id;
        let idx = self.room.newest_bot().ok_or(RoomError::RoomFull(room_id))?;
        let checkpoint = self.checkpoint();

        let bot = self.room.players[idx].clone();
        let player = self.new_player(request, bot.color);
        self.room.players[idx] = player.clone();
        if self.room.current_turn == Some(bot.id) {
            self.room.current_turn = Some(player.id);
        }
        // Any timer armed for the evicted bot is now stale.
        self.turn_seq += 1;

        let stake = self.config.stake;
        if stake > 0 {
            if let Err(err) = self.services.ledger.deduct_stake(room_id, player.id, stake).await {
                tracing::warn!(%room_id, player_id = %player.id, error = %err, "stake deduction failed, bot kept its seat");
                self.restore(checkpoint);
                self.arm_turn_timer();
                return Err(err.into());
            }
        }

        if let Err(err) = self.persist().await {
            tracing::error!(%room_id, player_id = %player.id, error = %err, "bot replacement commit failed, rolled back");
            if stake > 0 {
                self.refund(&[player.id]).await;
            }
            self.restore(checkpoint);
            self.arm_turn_timer();
            return Err(err);
        }

        tracing::info!(%room_id, player_id = %player.id, bot_id = %bot.id, color = %bot.color, "human replaced bot");
        self.emit(
            Recipient::All,
            GameEvent::PlayerLeft {
                player_id: bot.id,
                replaced_by: Some(player.id),
            },
        );
        self.emit(Recipient::All, GameEvent::PlayerJoined { player: player.view() });
        self.emit_room_updated();
        self.arm_turn_timer();

        Ok(Admission {
            room_id,
            player: player.view(),
            replaced: Some(bot.id),
            rejoined: false,
            started: false,
        })
    }

    fn new_player(&mut self, request: JoinRequest, color: Color) -> Player {
        let is_bot = request.is_bot();
        let name = match request.name {
            Some(name) => name,
            None => {
                let taken: Vec<&str> = self.room.players.iter().map(|p| p.name.as_str()).collect();
                unique_bot_name(&taken, &mut rand::rng())
            }
        };
        Player {
            id: request.player_id,
            name,
            color,
            is_bot,
            difficulty: request.bot,
            joined_at: now_millis(),
        }
    }

    /// Deducts the stake from every human. On failure, refunds the ones
    /// already charged.
    async fn charge_stakes(&self) -> Result<Vec<PlayerId>, RoomError> {
        let stake = self.config.stake;
        if stake == 0 {
            return Ok(Vec::new());
        }
        let room_id = self.room.room_id;
        let humans: Vec<PlayerId> = self.room.players.iter().filter(|p| !p.is_bot).map(|p| p.id).collect();

        let mut charged = Vec::with_capacity(humans.len());
        for player_id in humans {
            if let Err(err) = self.services.ledger.deduct_stake(room_id, player_id, stake).await {
                self.refund(&charged).await;
                return Err(err.into());
            }
            charged.push(player_id);
        }
        Ok(charged)
    }

    async fn refund(&self, players: &[PlayerId]) {
        let room_id = self.room.room_id;
        let stake = self.config.stake;
        for &player_id in players {
            let first = self.services.ledger.refund_stake(room_id, player_id, stake).await;
            if first.is_err() {
                if let Err(err) = self.services.ledger.refund_stake(room_id, player_id, stake).await {
                    tracing::error!(%room_id, %player_id, stake, error = %err, "stake refund failed");
                }
            }
        }
    }

    fn start_game(&mut self) {
        let colors: Vec<Color> = self.room.players.iter().map(|p| p.color).collect();
        self.game = Some(GameState::new(&colors));
        self.room.status = RoomStatus::Playing;
        self.room.current_turn = self.room.players.first().map(|p| p.id);
        self.room.last_roll = None;
        self.room.turn_number = 0;
    }

    async fn on_started(&mut self) {
        tracing::info!(
            room_id = %self.room.room_id,
            players = self.room.players.len(),
            bots = self.room.bot_count(),
            "game started"
        );
        self.cancel_backfill().await;
        self.emit_room_updated();
        self.save_pieces().await;
        self.arm_turn_timer();
    }

    async fn handle_mark_backfill(&mut self, token: LockToken) {
        self.backfill = Some(token);
        if !self.room.status.is_joinable() || self.room.is_full() {
            // Filled in the meantime; drop the marker straight away.
            self.cancel_backfill().await;
        }
    }

    /// Releases the pending-bot-join marker, which makes any queued bot
    /// join for this room drop out.
    async fn cancel_backfill(&mut self) {
        let Some(token) = self.backfill.take() else {
            return;
        };
        match self.services.lock.release(&token).await {
            Ok(true) => tracing::debug!(room_id = %self.room.room_id, "pending bot join cancelled"),
            Ok(false) => {}
            Err(err) => tracing::warn!(room_id = %self.room.room_id, error = %err, "failed to release backfill marker"),
        }
    }

    // -- leaving ------------------------------------------------------------

    async fn handle_leave(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        let room_id = self.room.room_id;
        let idx = self
            .room
            .players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or(RoomError::NotInRoom(player_id, room_id))?;

        let order = self.room.player_ids();
        let leaving = self.room.players.remove(idx);
        tracing::info!(%room_id, %player_id, players = self.room.players.len(), "player left");
        self.emit(
            Recipient::All,
            GameEvent::PlayerLeft {
                player_id,
                replaced_by: None,
            },
        );

        if self.room.status != RoomStatus::Playing {
            self.mirror().await;
            return Ok(());
        }

        // Leaving mid-game forfeits: the pieces come off the board and the
        // stake stays with the house.
        if let Some(game) = self.game.as_mut() {
            game.unseat(leaving.color);
        }
        self.forfeited.push(player_id);

        if let [last] = self.room.players.as_slice() {
            let winner = last.id;
            self.finish(winner).await;
        } else if self.room.players.is_empty() {
            self.finish_abandoned().await;
        } else if self.room.current_turn == Some(player_id) {
            let resolution = rules::resolve_turn(&order, player_id, TurnOutcome::Forfeit);
            self.apply_resolution(resolution).await;
        } else {
            self.mirror().await;
        }
        Ok(())
    }

    // -- turns --------------------------------------------------------------

    /// Checks that `player_id` may act now and returns their color.
    fn check_turn(&self, player_id: PlayerId) -> Result<Color, RoomError> {
        let player = self
            .room
            .player(player_id)
            .ok_or(RoomError::NotInRoom(player_id, self.room.room_id))?;
        if self.room.status != RoomStatus::Playing {
            return Err(RoomError::InvalidState(format!("room is {}", self.room.status)));
        }
        if self.room.current_turn != Some(player_id) {
            return Err(RoomError::NotYourTurn(player_id));
        }
        Ok(player.color)
    }

    fn game(&self) -> Result<&GameState, RoomError> {
        self.game
            .as_ref()
            .ok_or_else(|| RoomError::InvalidState("no game in progress".into()))
    }

    async fn handle_roll(&mut self, player_id: PlayerId) -> Result<RollResult, RoomError> {
        let color = self.check_turn(player_id)?;
        if self.room.player(player_id).is_some_and(|p| p.is_bot) {
            return Err(RoomError::InvalidState("bots roll on their own".into()));
        }
        if self.room.awaiting_move() {
            return Err(RoomError::InvalidState("already rolled, move a piece".into()));
        }
        let value = self.dice.roll();
        self.apply_roll(player_id, color, value).await
    }

    /// Records a roll. If it allows no move, the turn is completed here.
    async fn apply_roll(&mut self, player_id: PlayerId, color: Color, value: u8) -> Result<RollResult, RoomError> {
        let moves = rules::legal_moves(self.game()?, color, value);

        self.room.turn_number += 1;
        self.room.last_roll = Some(LastRoll {
            value,
            roller: player_id,
            moved: moves.is_empty(),
        });
        tracing::debug!(room_id = %self.room.room_id, %player_id, value, options = moves.len(), "dice rolled");
        self.emit(Recipient::All, GameEvent::DiceRolled { player_id, value });

        if moves.is_empty() {
            self.complete_turn(player_id, TurnOutcome::NoMove { roll: value }).await;
        } else {
            self.mirror().await;
        }
        Ok(RollResult { value, moves })
    }

    async fn handle_move(
        &mut self,
        player_id: PlayerId,
        piece: usize,
        expected_from: Position,
    ) -> Result<MoveOutcome, RoomError> {
        let color = self.check_turn(player_id)?;
        let roll = match self.room.last_roll {
            Some(roll) if self.room.awaiting_move() => roll.value,
            _ => return Err(RoomError::InvalidState("roll before moving".into())),
        };
        let required = self.config.required_pieces;
        let game = self
            .game
            .as_mut()
            .ok_or_else(|| RoomError::InvalidState("no game in progress".into()))?;

        let outcome = rules::apply_move(game, color, piece, expected_from, roll, required)?;
        let finished = game.win_zone_count(color);

        if let Some(last) = self.room.last_roll.as_mut() {
            last.moved = true;
        }

        let mv = outcome.mv;
        self.emit(
            Recipient::All,
            GameEvent::PieceMoved {
                player_id,
                color,
                piece,
                from: mv.from,
                to: mv.to,
            },
        );
        if let Some(capture) = outcome.captured {
            tracing::debug!(room_id = %self.room.room_id, %player_id, victim = %capture.color, "piece captured");
            self.emit(
                Recipient::All,
                GameEvent::PieceCaptured {
                    by: player_id,
                    color: capture.color,
                    piece: capture.piece,
                    from: capture.from,
                    to: capture.to,
                },
            );
        }
        if outcome.finished {
            self.emit(
                Recipient::All,
                GameEvent::PieceFinished {
                    player_id,
                    color,
                    piece,
                    finished,
                },
            );
        }

        self.complete_turn(player_id, TurnOutcome::from(&outcome)).await;
        Ok(outcome)
    }

    /// Hands the turn on. Every path that ends a turn goes through here.
    async fn complete_turn(&mut self, current: PlayerId, outcome: TurnOutcome) {
        let order = self.room.player_ids();
        let resolution = rules::resolve_turn(&order, current, outcome);
        self.apply_resolution(resolution).await;
    }

    async fn apply_resolution(&mut self, resolution: TurnResolution<PlayerId>) {
        match resolution {
            TurnResolution::GameOver(winner) => self.finish(winner).await,
            TurnResolution::Repeat(next) | TurnResolution::Pass(next) => {
                self.room.current_turn = Some(next);
                self.emit_room_updated();
                self.mirror().await;
                self.arm_turn_timer();
            }
        }
    }

    async fn finish(&mut self, winner: PlayerId) {
        let room_id = self.room.room_id;
        self.room.status = RoomStatus::Finished;
        self.room.current_turn = None;
        self.finished_at = Some(Instant::now());
        self.turn_seq += 1;

        let losers: Vec<PlayerId> = self
            .room
            .players
            .iter()
            .map(|p| p.id)
            .filter(|id| *id != winner)
            .chain(self.forfeited.iter().copied())
            .collect();
        let winner_is_human = self.room.player(winner).is_some_and(|p| !p.is_bot);
        tracing::info!(%room_id, %winner, human = winner_is_human, "game over");

        self.emit(
            Recipient::All,
            GameEvent::GameOver {
                winner,
                losers,
                pieces: self.game.clone().unwrap_or_default(),
            },
        );
        self.emit_room_updated();

        if winner_is_human {
            self.award(winner).await;
        }
        self.mirror().await;
    }

    /// Everyone left mid-game: end it with no winner and no payout.
    async fn finish_abandoned(&mut self) {
        tracing::info!(room_id = %self.room.room_id, "game abandoned");
        self.room.status = RoomStatus::Finished;
        self.room.current_turn = None;
        self.finished_at = Some(Instant::now());
        self.turn_seq += 1;
        self.emit_room_updated();
        self.mirror().await;
    }

    async fn award(&self, winner: PlayerId) {
        let amount = self.config.winnings();
        if amount == 0 {
            return;
        }
        let room_id = self.room.room_id;
        let ledger = &self.services.ledger;
        if let Err(err) = ledger.award_winnings(room_id, winner, amount).await {
            tracing::warn!(%room_id, %winner, error = %err, "award failed, retrying once");
            if let Err(err) = ledger.award_winnings(room_id, winner, amount).await {
                tracing::error!(%room_id, %winner, amount, error = %err, "award failed");
            }
        }
    }

    // -- bots ---------------------------------------------------------------

    /// Arms a reaction timer if the current player is a bot.
    /// Arms the timer for the current turn: the reaction delay for a bot,
    /// the turn timeout (if any) for a human.
    fn arm_turn_timer(&mut self) {
        if self.room.status != RoomStatus::Playing {
            return;
        }
        let Some(current) = self.room.current_turn.and_then(|id| self.room.player(id)) else {
            return;
        };
        let player_id = current.id;
        let is_bot = current.is_bot;
        let delay = if is_bot {
            let scale = current.difficulty.unwrap_or_default().latency_scale();
            self.config.bot_reaction.sample(scale)
        } else {
            match self.config.turn_timeout {
                Some(timeout) => timeout,
                None => return,
            }
        };

        self.turn_seq += 1;
        let turn_seq = self.turn_seq;
        let weak = self.weak.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(sender) = weak.upgrade() {
                let command = if is_bot {
                    RoomCommand::BotTurn { player_id, turn_seq }
                } else {
                    RoomCommand::TurnTimeout { player_id, turn_seq }
                };
                let _ = sender.send(command).await;
            }
        });
        tracing::trace!(
            room_id = %self.room.room_id,
            %player_id,
            is_bot,
            delay_ms = delay.as_millis() as u64,
            "turn timer armed"
        );
    }

    async fn handle_turn_timeout(&mut self, player_id: PlayerId, turn_seq: u64) {
        if turn_seq != self.turn_seq || self.check_turn(player_id).is_err() {
            return;
        }
        tracing::info!(room_id = %self.room.room_id, %player_id, "turn timed out, player forfeits");
        if let Err(err) = self.handle_leave(player_id).await {
            tracing::warn!(room_id = %self.room.room_id, %player_id, error = %err, "timeout forfeit failed");
        }
    }

    async fn handle_bot_turn(&mut self, player_id: PlayerId, turn_seq: u64) {
        if turn_seq != self.turn_seq || self.check_turn(player_id).is_err() {
            tracing::debug!(room_id = %self.room.room_id, %player_id, "stale bot turn dropped");
            return;
        }
        let Some(bot) = self.room.player(player_id).filter(|p| p.is_bot) else {
            return;
        };
        let color = bot.color;
        let settings = BotSettings {
            required_pieces: self.config.required_pieces,
            difficulty: bot.difficulty.unwrap_or_default(),
        };

        let value = match self.room.last_roll {
            // Hydrated mid-turn: the roll is already on the table.
            Some(roll) if self.room.awaiting_move() => roll.value,
            _ => {
                let value = match self.game.as_ref() {
                    Some(game) => self.dice.roll_for_bot(game, color),
                    None => return,
                };
                match self.apply_roll(player_id, color, value).await {
                    Ok(result) if !result.passed() => value,
                    _ => return,
                }
            }
        };

        let choice = self.game().ok().and_then(|game| bot::choose_move(game, color, value, &settings));
        let result = match choice {
            Some(mv) => self.handle_move(player_id, mv.piece, mv.from).await.map(|_| ()),
            None => Err(RoomError::InvalidState("bot found no move".into())),
        };
        if let Err(err) = result {
            tracing::error!(room_id = %self.room.room_id, %player_id, error = %err, "bot move failed, passing turn");
            if let Some(last) = self.room.last_roll.as_mut() {
                last.moved = true;
            }
            self.complete_turn(player_id, TurnOutcome::NoMove { roll: value }).await;
        }
    }

    // -- persistence & events -------------------------------------------------

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            room: self.room.clone(),
            game: self.game.clone(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.room = checkpoint.room;
        self.game = checkpoint.game;
    }

    /// Writes the room record, conditional on the version we last wrote.
    async fn persist(&mut self) -> Result<(), RoomError> {
        let expected = self.room.version;
        self.room.version += 1;
        if let Err(err) = self.services.store.update_room(&self.room, expected).await {
            self.room.version = expected;
            return Err(err.into());
        }
        Ok(())
    }

    /// Best-effort write-through after a turn. The actor stays
    /// authoritative if the store is down.
    async fn mirror(&mut self) {
        if let Err(err) = self.persist().await {
            tracing::warn!(room_id = %self.room.room_id, error = %err, "room write failed, retrying once");
            if let Err(err) = self.persist().await {
                tracing::error!(room_id = %self.room.room_id, error = %err, "room write failed, store is behind");
            }
        }
        self.save_pieces().await;
    }

    async fn save_pieces(&self) {
        let Some(game) = &self.game else {
            return;
        };
        let room_id = self.room.room_id;
        let store = &self.services.store;
        if store.save_game_state(room_id, game).await.is_err() {
            if let Err(err) = store.save_game_state(room_id, game).await {
                tracing::error!(%room_id, error = %err, "saving piece positions failed");
            }
        }
    }

    fn emit(&mut self, recipient: Recipient, event: GameEvent) {
        self.event_seq += 1;
        let event = RoomEvent {
            room_id: self.room.room_id,
            seq: self.event_seq,
            recipient,
            event,
        };
        if self.services.events.send(event).is_err() {
            tracing::trace!(room_id = %self.room.room_id, "event receiver dropped");
        }
    }

    fn emit_room_updated(&mut self) {
        let event = GameEvent::RoomUpdated {
            status: self.room.status,
            current_turn: self.room.current_turn,
        };
        self.emit(Recipient::All, event);
    }

    /// Tells the sender why their roll or move was refused.
    fn reject(&mut self, player_id: PlayerId, err: &RoomError) {
        tracing::debug!(room_id = %self.room.room_id, %player_id, error = %err, "command rejected");
        if err.kind() == ErrorKind::Validation {
            self.emit(
                Recipient::Player(player_id),
                GameEvent::MoveRejected {
                    player_id,
                    reason: err.to_string(),
                },
            );
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room.room_id,
            status: self.room.status,
            players: self.room.player_ids(),
            player_count: self.room.players.len(),
            capacity: self.room.settings.capacity,
            bot_count: self.room.bot_count(),
            bots_enabled: self.room.bots_enabled,
            current_turn: self.room.current_turn,
            replaceable_bot: self.room.has_replaceable_bot(),
            backfill_pending: self.backfill.is_some(),
            bot_difficulty: self.config.bot_difficulty,
            bot_join_delay: self.config.bot_join_delay,
            backfill_ttl: self.config.backfill_marker_ttl(),
            idle_retire: self.config.idle_retire,
            age: self.created.elapsed(),
            finished_for: self.finished_at.map(|t| t.elapsed()),
        }
    }
}

/// Spawns an actor for `room` and returns its handle.
///
/// `room` must already be in the store: the actor only ever updates it.
pub(crate) fn spawn_room<S: RoomStore, L: Ledger>(
    room: RoomRecord,
    game: Option<GameState>,
    config: RoomConfig,
    services: Arc<RoomServices<S, L>>,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let room_id = room.room_id;

    let age = Duration::from_millis(now_millis().saturating_sub(room.created_at));
    let now = Instant::now();
    let created = now.checked_sub(age).unwrap_or(now);
    let finished_at = (room.status == RoomStatus::Finished).then_some(now);

    let dice = match config.dice_seed {
        Some(seed) => Dice::seeded(config.dice.clone(), seed),
        None => Dice::new(config.dice.clone()),
    };

    let actor = RoomActor {
        room,
        game,
        config,
        services,
        dice,
        receiver: rx,
        weak: tx.downgrade(),
        created,
        finished_at,
        turn_seq: 0,
        event_seq: 0,
        backfill: None,
        forfeited: Vec::new(),
    };
    tokio::spawn(actor.run());

    RoomHandle { room_id, sender: tx }
}
