//! The Room actor: single-writer owner of one room's state.
//!
//! A Room runs as its own Tokio task. Every mutation flows through one
//! `tokio::select!` loop merging inbound [`RoomCommand`]s with the
//! single armed [`AlarmScheduler`] wakeup — there is no other path that
//! touches `Room` state, so nothing here needs a lock.
//!
//! Collaborators (the Judge, the snapshot store) are reached through
//! generic trait bounds rather than `dyn` objects, the same shape as
//! [`crate::judge::JudgeClient`] and [`crate::persistence::SnapshotStore`]
//! already commit to.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use coderoyale_protocol::{
    ActiveBuff as WireActiveBuff, ActiveDebuff as WireActiveDebuff, AttackReceivedPayload,
    AttackType, ChatMessage, ClientCommand, DebuffType, ErrorCode, ErrorPayload, EventLogEntry,
    JudgeKind, JudgeResultPayload, LogLevel, MatchEndPayload, MatchEndReason, MatchId, MatchPhase,
    MatchView, PlayerId, PlayerMe, PlayerPublic, PlayerRole, PlayerSelfPrivate, PlayerStatus,
    Problem, ProblemId, ProblemSummary, RoomId, RoomSettings, RoomSnapshot, ServerEnvelope,
    ServerEvent, SettingsPatch, ShopItem, SpectateView, Standing, TargetingMode,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, oneshot};

use crate::attack;
use crate::error::RoomError;
use crate::judge::{InFlightTracker, JudgeClient, JudgeError, ResultCache};
use crate::match_state;
use crate::models::{Match, Player, PlayerSender, RateLimitAction, Room};
use crate::persistence::{self, FinishedMatchRecord, MatchPlayerRecord, SnapshotStore};
use crate::problems::ProblemLibrary;
use crate::rate_limit;
use crate::scheduler;
use crate::shop;
use crate::targeting;

/// Bot player ids are minted from a range well above anything the
/// gateway hands out for humans, so the two id spaces never collide.
const BOT_ID_BASE: u64 = 1_000_000_000;

/// Reply to `RoomHandle::register`, the HTTP-side-channel registration
/// that mints a player record before the client's connection exists.
#[derive(Debug, Clone)]
pub struct RegisterOutcome {
    pub room_id: RoomId,
    pub settings: RoomSettings,
    pub phase: MatchPhase,
    pub player_count: usize,
    pub spectator_count: usize,
}

/// Reply to `RoomHandle::diagnostics`, the operator-facing `GET
/// /parties/coderoyale/:room_id/state` side channel.
#[derive(Debug, Clone)]
pub struct RoomDiagnostics {
    pub room_id: RoomId,
    pub phase: MatchPhase,
    pub player_count: usize,
    pub settings: RoomSettings,
}

/// Everything a Room actor accepts. `Dispatch` carries the full
/// `ClientCommand` table; `Register`/`Connect`/`Disconnect` model the
/// gateway-side registration and duplex-stream handshake that precede
/// it (the Room's own `playerToken` table is distinct from the
/// connection-layer session).
pub enum RoomCommand {
    Register {
        player_id: PlayerId,
        player_token: String,
        username: String,
        role: PlayerRole,
        is_host: bool,
        settings_patch: Option<SettingsPatch>,
        reply: oneshot::Sender<Result<RegisterOutcome, RoomError>>,
    },
    Connect {
        token: String,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<PlayerId, RoomError>>,
    },
    Disconnect {
        player_id: PlayerId,
    },
    Dispatch {
        player_id: PlayerId,
        request_id: Option<String>,
        command: ClientCommand,
    },
    JudgeCompleted {
        player_id: PlayerId,
        problem_id: ProblemId,
        kind: JudgeKind,
        request_id: Option<String>,
        fingerprint: String,
        outcome: Result<JudgeResultPayload, JudgeError>,
    },
    Diagnostics {
        reply: oneshot::Sender<RoomDiagnostics>,
    },
    Shutdown,
}

/// A cheap, cloneable front door to a running Room. Commands don't
/// carry the Room's `JudgeClient`/`SnapshotStore` type parameters, so
/// unlike the actor itself the handle is never generic.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn register(
        &self,
        player_id: PlayerId,
        player_token: String,
        username: String,
        role: PlayerRole,
        is_host: bool,
        settings_patch: Option<SettingsPatch>,
    ) -> Result<RegisterOutcome, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Register {
                player_id,
                player_token,
                username,
                role,
                is_host,
                settings_patch,
                reply,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        rx.await.map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    pub async fn connect(&self, token: String, sender: PlayerSender) -> Result<PlayerId, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Connect { token, sender, reply })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        rx.await.map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    pub async fn disconnect(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Disconnect { player_id })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    pub async fn dispatch(
        &self,
        player_id: PlayerId,
        request_id: Option<String>,
        command: ClientCommand,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Dispatch { player_id, request_id, command })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    pub async fn diagnostics(&self) -> Result<RoomDiagnostics, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Diagnostics { reply })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        rx.await.map_err(|_| RoomError::Unavailable(self.room_id))
    }

    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

/// One running room. Generic over the Judge and persistence
/// collaborators so the hot path never boxes a trait object; `J` and
/// `S` are resolved once, at `spawn_room`, by the server crate.
pub struct RoomActor<J: JudgeClient, S: SnapshotStore> {
    room: Room,
    problems: Arc<ProblemLibrary>,
    judge: Arc<J>,
    store: Arc<S>,
    alarm: coderoyale_alarm::AlarmScheduler,
    result_cache: ResultCache,
    inflight: InFlightTracker,
    self_tx: mpsc::Sender<RoomCommand>,
    receiver: mpsc::Receiver<RoomCommand>,
    rng: StdRng,
}

/// Spawns a room actor and returns a handle to it. The channel is
/// bounded; a slow or stuck room backs up its own senders rather than
/// growing without limit.
pub fn spawn_room<J, S>(
    room_id: RoomId,
    settings: RoomSettings,
    problems: Arc<ProblemLibrary>,
    judge: Arc<J>,
    store: Arc<S>,
    channel_size: usize,
) -> RoomHandle
where
    J: JudgeClient + 'static,
    S: SnapshotStore + 'static,
{
    let (tx, rx) = mpsc::channel(channel_size);
    let actor = RoomActor {
        room: Room::new(room_id, settings),
        problems,
        judge,
        store,
        alarm: coderoyale_alarm::AlarmScheduler::new(),
        result_cache: ResultCache::new(),
        inflight: InFlightTracker::new(),
        self_tx: tx.clone(),
        receiver: rx,
        rng: StdRng::from_os_rng(),
    };
    tokio::spawn(actor.run());
    RoomHandle { room_id, sender: tx }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Approximates the wall-clock millisecond value of a monotonic
/// `Instant`, for wire payloads that only need to be accurate to the
/// current process's clock (unlike `persistence`'s restart-surviving
/// conversion, which anchors against a fixed reference pair).
fn wall_clock_ms_for(instant: Instant) -> u64 {
    let now = Instant::now();
    if instant >= now {
        now_ms() + instant.duration_since(now).as_millis() as u64
    } else {
        now_ms().saturating_sub(now.duration_since(instant).as_millis() as u64)
    }
}

fn shop_item_wire_key(item: ShopItem) -> String {
    match serde_json::to_value(item) {
        Ok(serde_json::Value::String(s)) => s,
        _ => format!("{item:?}"),
    }
}

impl<J: JudgeClient, S: SnapshotStore> RoomActor<J, S> {
    pub async fn run(mut self) {
        tracing::info!(room_id = %self.room.id, "room actor started");
        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if !self.handle_command(cmd).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = self.alarm.wait() => {
                    self.handle_scheduler_wakeup().await;
                }
            }
        }
        tracing::info!(room_id = %self.room.id, "room actor stopped");
    }

    async fn handle_command(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Register {
                player_id,
                player_token,
                username,
                role,
                is_host,
                settings_patch,
                reply,
            } => {
                let result =
                    self.handle_register(player_id, player_token, username, role, is_host, settings_patch);
                let _ = reply.send(result);
                self.after_mutation().await;
            }
            RoomCommand::Connect { token, sender, reply } => {
                let result = self.handle_connect(token, sender);
                let _ = reply.send(result);
                self.after_mutation().await;
            }
            RoomCommand::Disconnect { player_id } => {
                self.handle_disconnect(player_id);
                self.after_mutation().await;
            }
            RoomCommand::Dispatch { player_id, request_id, command } => {
                self.handle_dispatch(player_id, request_id, command);
                self.after_mutation().await;
            }
            RoomCommand::JudgeCompleted { player_id, problem_id, kind, request_id, fingerprint, outcome } => {
                self.handle_judge_completed(player_id, problem_id, kind, request_id, fingerprint, outcome);
                self.after_mutation().await;
            }
            RoomCommand::Diagnostics { reply } => {
                let _ = reply.send(self.diagnostics());
            }
            RoomCommand::Shutdown => {
                tracing::info!(room_id = %self.room.id, "room shutting down");
                return false;
            }
        }
        true
    }

    fn diagnostics(&self) -> RoomDiagnostics {
        RoomDiagnostics {
            room_id: self.room.id,
            phase: self.room.match_.phase,
            player_count: self.room.players.len(),
            settings: self.room.settings,
        }
    }

    /// Persists a fresh snapshot and rearms the scheduler. Called after
    /// every command, including ones that turned out to be no-ops —
    /// simpler than threading a "did anything change" flag through
    /// every handler, and a redundant snapshot write is harmless.
    async fn after_mutation(&mut self) {
        let record = persistence::snapshot(&self.room, Instant::now(), SystemTime::now());
        if let Err(err) = self.store.save_snapshot(&record).await {
            tracing::warn!(room_id = %self.room.id, %err, "snapshot write failed");
        }
        self.rearm_alarm();
    }

    fn rearm_alarm(&mut self) {
        let now = Instant::now();
        let warmup_end = match (self.room.match_.phase, self.room.match_.start_at) {
            (MatchPhase::Warmup, Some(start)) => {
                Some(match_state::warmup_end(start, &self.room.match_.settings))
            }
            _ => None,
        };
        let eligible = self.room.players.values().filter(|p| p.is_alive_participant());
        match scheduler::next_wakeup(&self.room.match_, eligible, warmup_end, now) {
            Some(at) => self.alarm.arm_at(at),
            None => self.alarm.disarm(),
        }
    }

    // -- scheduler wakeup --------------------------------------------------

    async fn handle_scheduler_wakeup(&mut self) {
        let now = Instant::now();
        self.result_cache.evict_expired(now);

        if self.room.match_.phase == MatchPhase::Warmup {
            if let Some(start) = self.room.match_.start_at {
                if now >= match_state::warmup_end(start, &self.room.match_.settings) {
                    self.room.match_.phase = MatchPhase::Main;
                    self.broadcast(None, ServerEvent::MatchPhaseUpdate { phase: MatchPhase::Main });
                }
            }
        }

        self.expire_debuffs(now);
        self.process_due_arrivals(now);
        self.check_match_end(now);
        self.after_mutation().await;
    }

    /// Ends any debuff whose deadline has passed and opens the
    /// post-debuff grace window, per player.
    fn expire_debuffs(&mut self, now: Instant) {
        let expired: Vec<PlayerId> = self
            .room
            .players
            .values()
            .filter(|p| matches!(p.active_debuff, Some(d) if d.ends_at <= now))
            .map(|p| p.player_id)
            .collect();
        for player_id in expired {
            if let Some(player) = self.room.players.get_mut(&player_id) {
                attack::expire_debuff_and_start_grace(player, now);
            }
            self.broadcast_player_update(player_id);
        }
    }

    fn process_due_arrivals(&mut self, now: Instant) {
        if !self.room.match_.phase.is_active() {
            return;
        }
        let due = scheduler::due_players(
            self.room.match_.phase,
            self.room.players.values().filter(|p| p.is_alive_participant()),
            now,
        );
        for player_id in due {
            self.deliver_arrival(player_id, now);
        }
    }

    fn deliver_arrival(&mut self, player_id: PlayerId, now: Instant) {
        let profile = self.room.match_.settings.difficulty_profile;
        let seen = self.room.seen_problem_ids.entry(player_id).or_default();
        let Some(problem) = self.problems.sample_for_arrival(profile, seen, &mut self.rng) else {
            return;
        };
        let stack_limit = self.room.match_.settings.stack_limit;
        let Some(player) = self.room.players.get_mut(&player_id) else {
            return;
        };
        player.queued.push_back(problem);
        player.last_problem_arrival_at = now;

        if player.stack_size() >= stack_limit {
            self.eliminate(player_id, now);
        } else {
            self.broadcast_stack_update(player_id);
        }
    }

    /// Stack overflow: pushing a problem onto a queue already at
    /// `stackLimit` eliminates the player outright.
    fn eliminate(&mut self, player_id: PlayerId, now: Instant) {
        if let Some(player) = self.room.players.get_mut(&player_id) {
            player.status = PlayerStatus::Eliminated;
            player.active_debuff = None;
            player.active_buff = None;
        } else {
            return;
        }
        tracing::warn!(room_id = %self.room.id, %player_id, "player eliminated by stack overflow");
        self.room.append_event(EventLogEntry {
            level: LogLevel::Warn,
            message: format!("{player_id} was eliminated"),
            at_ms: now_ms(),
        });
        self.broadcast_player_update(player_id);
        self.check_match_end(now);
    }

    fn check_match_end(&mut self, now: Instant) {
        if !self.room.match_.phase.is_active() {
            return;
        }
        let Some(end_at) = self.room.match_.end_at else {
            return;
        };
        let alive = self.room.alive_participant_count();
        if let Some(reason) = match_state::should_end(end_at, alive, now) {
            self.end_match(reason);
        }
    }

    fn end_match(&mut self, reason: MatchEndReason) {
        self.room.match_.phase = MatchPhase::Ended;
        self.room.match_.end_reason = Some(reason);

        let inputs = match_state::standing_inputs_from_players(self.room.players.values());
        let ordered = match_state::order_standings(inputs);
        let winner = match_state::winner(&ordered);
        let standings: Vec<Standing> = ordered
            .iter()
            .enumerate()
            .map(|(i, s)| Standing {
                player_id: s.player_id,
                username: self.room.players.get(&s.player_id).map(|p| p.username.clone()).unwrap_or_default(),
                rank: i as u32 + 1,
                score: s.score,
                stack_size: s.stack_size,
                eliminated: s.eliminated,
            })
            .collect();

        self.broadcast(
            None,
            ServerEvent::MatchEnd(MatchEndPayload { reason, winner, standings: standings.clone() }),
        );
        self.persist_finished_match(&standings);
    }

    fn persist_finished_match(&self, standings: &[Standing]) {
        let (Some(match_id), Some(start_at)) = (self.room.match_.match_id, self.room.match_.start_at) else {
            return;
        };
        let record = FinishedMatchRecord {
            match_id,
            room_id: self.room.id,
            started_at_ms: wall_clock_ms_for(start_at),
            ended_at_ms: now_ms(),
            end_reason: self.room.match_.end_reason.unwrap_or(MatchEndReason::TimeExpired),
            settings: self.room.match_.settings,
        };
        let players: Vec<MatchPlayerRecord> = standings
            .iter()
            .map(|s| MatchPlayerRecord {
                match_id,
                player_id: s.player_id,
                username: s.username.clone(),
                role: self.room.players.get(&s.player_id).map(|p| p.role).unwrap_or(PlayerRole::Player),
                score: s.score,
                rank: s.rank,
                eliminated_at_ms: None,
            })
            .collect();

        let store = Arc::clone(&self.store);
        let room_id = self.room.id;
        tokio::spawn(async move {
            if let Err(err) = store.save_finished_match(&record, &players).await {
                tracing::warn!(%room_id, %err, "failed to persist finished match");
            }
        });
    }

    // -- registration / connection handshake --------------------------------

    fn handle_register(
        &mut self,
        player_id: PlayerId,
        player_token: String,
        username: String,
        role: PlayerRole,
        is_host: bool,
        settings_patch: Option<SettingsPatch>,
    ) -> Result<RegisterOutcome, RoomError> {
        if role != PlayerRole::Spectator && self.room.username_taken(&username) {
            return Err(RoomError::UsernameTaken(username));
        }
        if role != PlayerRole::Spectator && self.room.non_spectator_count() >= self.room.settings.player_cap as usize
        {
            return Err(RoomError::RoomFull(self.room.id));
        }

        if let Some(patch) = settings_patch {
            self.room.settings = self.room.settings.merge_patch(&patch);
        }

        let join_order = self.room.join_counter;
        self.room.join_counter += 1;
        let player = match role {
            PlayerRole::Spectator => Player::new_spectator(player_id, player_token.clone(), username, join_order),
            _ => Player::new_human(player_id, player_token.clone(), username, join_order, is_host),
        };
        self.room.players.insert(player_id, player);
        self.room.player_tokens.insert(player_token, player_id);

        Ok(RegisterOutcome {
            room_id: self.room.id,
            settings: self.room.settings,
            phase: self.room.match_.phase,
            player_count: self.room.non_spectator_count(),
            spectator_count: self.room.players.values().filter(|p| p.role == PlayerRole::Spectator).count(),
        })
    }

    fn handle_connect(&mut self, token: String, sender: PlayerSender) -> Result<PlayerId, RoomError> {
        let player_id = *self.room.player_tokens.get(&token).ok_or(RoomError::InvalidToken)?;
        let Some(player) = self.room.players.get_mut(&player_id) else {
            return Err(RoomError::InvalidToken);
        };
        player.connection = Some(sender);

        self.send_snapshot_to(player_id, None);
        self.broadcast_player_update(player_id);
        Ok(player_id)
    }

    fn handle_disconnect(&mut self, player_id: PlayerId) {
        let was_host = match self.room.players.get_mut(&player_id) {
            Some(player) => {
                player.connection = None;
                player.is_host
            }
            None => return,
        };
        if was_host {
            self.room.transfer_host_if_needed();
        }
        self.broadcast_player_update(player_id);
    }

    // -- command dispatch -----------------------------------------------

    fn handle_dispatch(&mut self, player_id: PlayerId, request_id: Option<String>, command: ClientCommand) {
        let now = Instant::now();
        let result = match command {
            ClientCommand::JoinRoom { .. } => Err(RoomError::BadRequest("already connected".into())),
            ClientCommand::SendChat { text } => self.handle_send_chat(player_id, text, now),
            ClientCommand::UpdateSettings { patch } => self.handle_update_settings(player_id, patch),
            ClientCommand::AddBots { count } => self.handle_add_bots(player_id, count),
            ClientCommand::StartMatch => self.handle_start_match(player_id, now),
            ClientCommand::SetTargetMode { mode } => self.handle_set_target_mode(player_id, mode),
            ClientCommand::RunCode { problem_id, code } => {
                self.prepare_judge_call(player_id, problem_id, code, None, JudgeKind::Run, request_id.clone(), now)
            }
            ClientCommand::SubmitCode { problem_id, code, option_id } => self.prepare_judge_call(
                player_id,
                problem_id,
                code.unwrap_or_default(),
                option_id,
                JudgeKind::Submit,
                request_id.clone(),
                now,
            ),
            ClientCommand::SpendPoints { item } => self.handle_spend_points(player_id, item, now),
            ClientCommand::SpectatePlayer { target_player_id } => {
                self.handle_spectate(player_id, Some(target_player_id), now)
            }
            ClientCommand::StopSpectate => self.handle_spectate(player_id, None, now),
            ClientCommand::CodeUpdate { code, version } => self.handle_code_update(player_id, code, version, now),
            ClientCommand::ReturnToLobby => self.handle_return_to_lobby(player_id),
        };
        if let Err(err) = result {
            self.send_error(player_id, request_id, err);
        }
    }

    fn require_host(&self, player_id: PlayerId) -> Result<(), RoomError> {
        match self.room.players.get(&player_id) {
            Some(p) if p.is_host => Ok(()),
            Some(_) => Err(RoomError::Forbidden(player_id)),
            None => Err(RoomError::NotInRoom(player_id, self.room.id)),
        }
    }

    fn check_rate_limit(&mut self, player_id: PlayerId, action: RateLimitAction, now: Instant) -> Result<(), RoomError> {
        let player = self.room.players.get_mut(&player_id).ok_or(RoomError::NotInRoom(player_id, self.room.id))?;
        let state = player.rate_limits.get(&action).copied();
        let outcome = rate_limit::check(action, state, now);
        player.rate_limits.insert(action, outcome.new_state);
        if outcome.allowed {
            Ok(())
        } else {
            Err(RoomError::RateLimited(outcome.retry_after_ms.unwrap_or(0)))
        }
    }

    fn handle_send_chat(&mut self, player_id: PlayerId, text: String, now: Instant) -> Result<(), RoomError> {
        if self.room.match_.phase != MatchPhase::Lobby {
            return Err(RoomError::MatchAlreadyStarted);
        }
        if text.len() > 500 {
            return Err(RoomError::PayloadTooLarge);
        }
        self.check_rate_limit(player_id, RateLimitAction::SendChat, now)?;
        let player = self.room.players.get(&player_id).ok_or(RoomError::NotInRoom(player_id, self.room.id))?;
        let msg = ChatMessage { player_id, username: player.username.clone(), text, sent_at_ms: now_ms() };
        self.room.append_chat(msg.clone());
        self.broadcast(None, ServerEvent::ChatAppend(msg));
        Ok(())
    }

    fn handle_update_settings(&mut self, player_id: PlayerId, patch: SettingsPatch) -> Result<(), RoomError> {
        self.require_host(player_id)?;
        if self.room.match_.phase != MatchPhase::Lobby {
            return Err(RoomError::MatchAlreadyStarted);
        }
        self.room.settings = self.room.settings.merge_patch(&patch);
        self.broadcast(None, ServerEvent::SettingsUpdate(self.room.settings));
        Ok(())
    }

    fn handle_add_bots(&mut self, player_id: PlayerId, count: u32) -> Result<(), RoomError> {
        self.require_host(player_id)?;
        if self.room.match_.phase != MatchPhase::Lobby {
            return Err(RoomError::MatchAlreadyStarted);
        }
        if !(1..=20).contains(&count) {
            return Err(RoomError::BadRequest("bot count must be between 1 and 20".into()));
        }
        if self.room.non_spectator_count() as u32 + count > self.room.settings.player_cap {
            return Err(RoomError::RoomFull(self.room.id));
        }

        for _ in 0..count {
            self.room.bot_counter += 1;
            let bot_id = PlayerId(BOT_ID_BASE + self.room.bot_counter);
            let join_order = self.room.join_counter;
            self.room.join_counter += 1;
            let username = format!("Bot-{}", self.room.bot_counter);
            self.room.players.insert(bot_id, Player::new_bot(bot_id, username, join_order));
        }
        self.send_snapshot_to_all_connected();
        Ok(())
    }

    fn handle_start_match(&mut self, player_id: PlayerId, now: Instant) -> Result<(), RoomError> {
        self.require_host(player_id)?;
        if self.room.match_.phase != MatchPhase::Lobby {
            return Err(RoomError::MatchAlreadyStarted);
        }
        if self.room.non_spectator_count() < 2 {
            return Err(RoomError::BadRequest("at least 2 participants are required to start".into()));
        }

        let settings = self.room.settings;
        self.room.match_counter += 1;
        self.room.match_ = Match {
            match_id: Some(MatchId(self.room.match_counter)),
            phase: MatchPhase::Warmup,
            start_at: Some(now),
            end_at: Some(match_state::match_end_at(now, &settings)),
            end_reason: None,
            settings,
            next_problem_arrival_at: None,
        };
        self.room.seen_problem_ids.clear();

        let profile = settings.difficulty_profile;
        let participant_ids: Vec<PlayerId> = self
            .room
            .players
            .values()
            .filter(|p| p.role != PlayerRole::Spectator)
            .map(|p| p.player_id)
            .collect();
        for pid in participant_ids {
            let seen = self.room.seen_problem_ids.entry(pid).or_default();
            let Some(current) = self.problems.sample(profile, seen, &mut self.rng) else {
                continue;
            };
            let mut queued = VecDeque::new();
            for _ in 0..settings.starting_queued {
                if let Some(next) = self.problems.sample(profile, seen, &mut self.rng) {
                    queued.push_back(next);
                }
            }
            if let Some(player) = self.room.players.get_mut(&pid) {
                player.status = PlayerStatus::Coding;
                player.code = current.starter_code.clone().unwrap_or_default();
                player.code_version = 1;
                player.revealed_hints.clear();
                player.current_problem = Some(current);
                player.queued = queued;
                player.last_problem_arrival_at = now;
                player.streak = 0;
            }
        }

        self.broadcast(None, ServerEvent::MatchStarted(self.build_match_view()));
        self.send_snapshot_to_all_connected();
        Ok(())
    }

    fn handle_set_target_mode(&mut self, player_id: PlayerId, mode: TargetingMode) -> Result<(), RoomError> {
        let player = self.room.players.get_mut(&player_id).ok_or(RoomError::NotInRoom(player_id, self.room.id))?;
        if player.role == PlayerRole::Spectator {
            return Err(RoomError::Forbidden(player_id));
        }
        player.targeting_mode = mode;
        self.broadcast_player_update(player_id);
        Ok(())
    }

    fn handle_spend_points(&mut self, player_id: PlayerId, item: ShopItem, now: Instant) -> Result<(), RoomError> {
        {
            let player = self.room.players.get(&player_id).ok_or(RoomError::NotInRoom(player_id, self.room.id))?;
            if player.is_eliminated() {
                return Err(RoomError::PlayerEliminated(player_id));
            }
            shop::can_purchase(player, item, now).map_err(|e| match e {
                crate::shop::ShopError::InsufficientScore(_) => RoomError::InsufficientScore,
                crate::shop::ShopError::OnCooldown(_, ms) => RoomError::ItemOnCooldown(ms),
            })?;
        }

        let mut replacement: Option<Problem> = None;
        if item == ShopItem::SkipProblem {
            let profile = self.room.match_.settings.difficulty_profile;
            let seen = self.room.seen_problem_ids.entry(player_id).or_default();
            replacement = self.problems.sample(profile, seen, &mut self.rng);
        }

        if let Some(player) = self.room.players.get_mut(&player_id) {
            shop::apply_purchase(player, item, now, |p| {
                if let Some(problem) = replacement.take() {
                    p.code = problem.starter_code.clone().unwrap_or_default();
                    p.code_version = 1;
                    p.revealed_hints.clear();
                    p.current_problem = Some(problem);
                } else {
                    p.current_problem = None;
                }
            });
        }
        self.broadcast_player_update(player_id);
        Ok(())
    }

    fn handle_spectate(&mut self, player_id: PlayerId, target: Option<PlayerId>, now: Instant) -> Result<(), RoomError> {
        {
            let player = self.room.players.get(&player_id).ok_or(RoomError::NotInRoom(player_id, self.room.id))?;
            if !(player.role == PlayerRole::Spectator || player.is_eliminated()) {
                return Err(RoomError::Forbidden(player_id));
            }
        }
        self.check_rate_limit(player_id, RateLimitAction::SpectatePlayer, now)?;

        match target {
            Some(target_id) => {
                if !self.room.players.contains_key(&target_id) {
                    return Err(RoomError::BadRequest("unknown spectate target".into()));
                }
                self.room.spectate_targets.insert(player_id, target_id);
            }
            None => {
                self.room.spectate_targets.remove(&player_id);
            }
        }

        let view = self.build_spectate_view(player_id);
        self.send_event(player_id, None, ServerEvent::SpectateState(view));
        Ok(())
    }

    fn handle_code_update(&mut self, player_id: PlayerId, code: String, version: u64, now: Instant) -> Result<(), RoomError> {
        self.check_rate_limit(player_id, RateLimitAction::CodeUpdate, now)?;
        if code.len() > 50_000 {
            return Err(RoomError::PayloadTooLarge);
        }
        {
            let player = self.room.players.get_mut(&player_id).ok_or(RoomError::NotInRoom(player_id, self.room.id))?;
            if player.is_eliminated() {
                return Err(RoomError::PlayerEliminated(player_id));
            }
            if version <= player.code_version {
                return Err(RoomError::BadRequest("code version must increase monotonically".into()));
            }
            player.code = code.clone();
            player.code_version = version;
        }

        let subscribers: Vec<PlayerId> = self
            .room
            .spectate_targets
            .iter()
            .filter(|(_, target)| **target == player_id)
            .map(|(spectator, _)| *spectator)
            .collect();
        for spectator in subscribers {
            self.send_event(spectator, None, ServerEvent::CodeUpdate { player_id, code: code.clone(), version });
        }
        Ok(())
    }

    fn handle_return_to_lobby(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        self.require_host(player_id)?;
        if self.room.match_.phase != MatchPhase::Ended {
            return Err(RoomError::MatchNotStarted);
        }

        let settings = self.room.settings;
        self.room.match_ = Match::lobby(settings);
        self.room.event_log.clear();
        self.room.seen_problem_ids.clear();
        self.room.spectate_targets.clear();
        for player in self.room.players.values_mut() {
            player.status = PlayerStatus::Lobby;
            player.current_problem = None;
            player.queued.clear();
            player.streak = 0;
            player.score = 0;
            player.code.clear();
            player.code_version = 0;
            player.revealed_hints.clear();
            player.active_debuff = None;
            player.active_buff = None;
            player.grace_end = None;
            player.recent_incoming_attacks.clear();
        }

        self.send_snapshot_to_all_connected();
        Ok(())
    }

    // -- judge orchestration ----------------------------------------------

    fn prepare_judge_call(
        &mut self,
        player_id: PlayerId,
        problem_id: ProblemId,
        code: String,
        option_id: Option<String>,
        kind: JudgeKind,
        request_id: Option<String>,
        now: Instant,
    ) -> Result<(), RoomError> {
        let action = match kind {
            JudgeKind::Run => RateLimitAction::RunCode,
            JudgeKind::Submit => RateLimitAction::SubmitCode,
        };
        self.check_rate_limit(player_id, action, now)?;

        let player = self.room.players.get(&player_id).ok_or(RoomError::NotInRoom(player_id, self.room.id))?;
        if player.is_eliminated() {
            return Err(RoomError::PlayerEliminated(player_id));
        }
        if matches!(player.active_debuff, Some(d) if d.debuff_type == DebuffType::Ddos && d.ends_at > now) {
            return Err(RoomError::BadRequest("blocked by an active ddos debuff".into()));
        }
        let Some(current) = player.current_problem.clone() else {
            return Err(RoomError::BadRequest("no current problem".into()));
        };
        if current.problem_id != problem_id {
            return Err(RoomError::BadRequest("problem id does not match current problem".into()));
        }

        let submission = match current.problem_type {
            coderoyale_protocol::ProblemType::Mcq => option_id.unwrap_or_default(),
            coderoyale_protocol::ProblemType::Code => code,
        };
        if submission.len() > 50_000 {
            return Err(RoomError::PayloadTooLarge);
        }

        let fingerprint = crate::judge::fingerprint(&submission, problem_id);
        if let Some(cached) = self.result_cache.get(&fingerprint, now).cloned() {
            self.deliver_judge_result(player_id, kind, cached, request_id);
            return Ok(());
        }
        if !self.inflight.try_start(player_id, problem_id) {
            return Err(RoomError::BadRequest("a judge call for this problem is already in flight".into()));
        }

        self.spawn_judge_worker(player_id, current, submission, kind, request_id, fingerprint);
        Ok(())
    }

    fn spawn_judge_worker(
        &self,
        player_id: PlayerId,
        problem: Problem,
        code: String,
        kind: JudgeKind,
        request_id: Option<String>,
        fingerprint: String,
    ) {
        let judge = Arc::clone(&self.judge);
        let tx = self.self_tx.clone();
        let timeout = crate::judge::outer_timeout(&problem);
        let problem_id = problem.problem_id;
        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, judge.judge(&problem, &code, kind)).await {
                Ok(result) => result,
                Err(_) => Err(JudgeError::Unavailable { retry_after_ms: None }),
            };
            let _ = tx
                .send(RoomCommand::JudgeCompleted { player_id, problem_id, kind, request_id, fingerprint, outcome })
                .await;
        });
    }

    fn handle_judge_completed(
        &mut self,
        player_id: PlayerId,
        problem_id: ProblemId,
        kind: JudgeKind,
        request_id: Option<String>,
        fingerprint: String,
        outcome: Result<JudgeResultPayload, JudgeError>,
    ) {
        self.inflight.finish(player_id, problem_id);
        match outcome {
            Ok(result) => {
                self.result_cache.insert_if_passing(fingerprint, result.clone(), Instant::now());
                self.deliver_judge_result(player_id, kind, result, request_id);
            }
            Err(err) => {
                let (code, retry_after_ms) = match err {
                    JudgeError::Unavailable { retry_after_ms } => (ErrorCode::JudgeUnavailable, retry_after_ms),
                    JudgeError::Internal(_) => (ErrorCode::InternalError, None),
                };
                self.send_error_code(player_id, request_id, code, "the judge call failed".into(), retry_after_ms);
            }
        }
    }

    fn deliver_judge_result(
        &mut self,
        player_id: PlayerId,
        kind: JudgeKind,
        result: JudgeResultPayload,
        request_id: Option<String>,
    ) {
        let passed = result.passed;
        self.send_event(player_id, request_id, ServerEvent::JudgeResult(result));
        if kind != JudgeKind::Submit {
            return;
        }
        let now = Instant::now();
        if passed {
            self.apply_passing_submit(player_id, now);
        } else {
            self.apply_failing_submit(player_id);
        }
    }

    fn apply_failing_submit(&mut self, player_id: PlayerId) {
        if let Some(player) = self.room.players.get_mut(&player_id) {
            player.streak = 0;
            player.status = PlayerStatus::Error;
        }
        self.broadcast_player_update(player_id);
        // Error is surfaced for exactly one PLAYER_UPDATE, then snaps
        // straight back to Coding — there's no separate timer for it.
        if let Some(player) = self.room.players.get_mut(&player_id) {
            player.status = PlayerStatus::Coding;
        }
        self.broadcast_player_update(player_id);
    }

    fn apply_passing_submit(&mut self, player_id: PlayerId, now: Instant) {
        let Some(problem) = self.room.players.get(&player_id).and_then(|p| p.current_problem.clone()) else {
            return;
        };
        let streak_before = self.room.players.get(&player_id).map(|p| p.streak).unwrap_or(0);
        let outcome = attack::resolve_submit(&problem, streak_before, &mut self.rng);

        if let Some(player) = self.room.players.get_mut(&player_id) {
            player.score += outcome.score_delta;
            player.streak = outcome.new_streak;
            player.status = PlayerStatus::Coding;
        }
        self.broadcast_player_update(player_id);

        if let Some(attack_type) = outcome.attack {
            self.launch_attack(player_id, attack_type, now);
        }
        self.advance_to_next_problem(player_id);
        self.check_match_end(now);
    }

    fn score_ranking(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self
            .room
            .players
            .values()
            .filter(|p| p.role != PlayerRole::Spectator)
            .map(|p| p.player_id)
            .collect();
        ids.sort_by(|a, b| self.room.players[b].score.cmp(&self.room.players[a].score).then(a.0.cmp(&b.0)));
        ids
    }

    fn launch_attack(&mut self, attacker_id: PlayerId, attack_type: AttackType, now: Instant) {
        let candidates = attack::eligible_targets(self.room.players.values(), attacker_id, now);
        if candidates.is_empty() {
            return;
        }

        let Some(attacker) = self.room.players.get(&attacker_id) else { return };
        let mode = attacker.targeting_mode;
        let cutoff = now.checked_sub(Duration::from_millis(crate::models::ATTACKERS_WINDOW_MS));
        let recent_attackers: Vec<PlayerId> = attacker
            .recent_incoming_attacks
            .iter()
            .filter(|(_, ts)| cutoff.is_none_or(|c| *ts >= c))
            .map(|(id, _)| *id)
            .collect();
        let stack_limit = self.room.match_.settings.stack_limit;
        let ranking = self.score_ranking();

        let Some(target_id) =
            targeting::select_target(mode, &candidates, &ranking, attacker_id, &recent_attackers, stack_limit, &mut self.rng)
        else {
            return;
        };

        let garbage = if attack_type == AttackType::GarbageDrop {
            self.problems.sample_garbage(&mut self.rng)
        } else {
            None
        };
        let intensity = self.room.match_.settings.attack_intensity;
        let ends_at = self
            .room
            .players
            .get_mut(&target_id)
            .and_then(|victim| attack::apply_attack(victim, attack_type, garbage, intensity, now));
        self.room.record_incoming_attack(target_id, attacker_id, now);

        let ends_at_ms = ends_at.map(wall_clock_ms_for);
        self.send_event(
            target_id,
            None,
            ServerEvent::AttackReceived(AttackReceivedPayload { attacker_id, attack_type, ends_at_ms }),
        );
        self.broadcast_player_update(target_id);

        if attack_type == AttackType::GarbageDrop {
            let stack_limit = self.room.match_.settings.stack_limit;
            let overflowed = self.room.players.get(&target_id).map(|p| p.stack_size() >= stack_limit).unwrap_or(false);
            if overflowed {
                self.eliminate(target_id, now);
            } else {
                self.broadcast_stack_update(target_id);
            }
        }
    }

    fn advance_to_next_problem(&mut self, player_id: PlayerId) {
        let popped = self.room.players.get_mut(&player_id).and_then(|p| p.queued.pop_front());
        let next = match popped {
            Some(problem) => Some(problem),
            None => {
                let profile = self.room.match_.settings.difficulty_profile;
                let seen = self.room.seen_problem_ids.entry(player_id).or_default();
                self.problems.sample(profile, seen, &mut self.rng)
            }
        };

        if let Some(player) = self.room.players.get_mut(&player_id) {
            match next {
                Some(problem) => {
                    player.code = problem.starter_code.clone().unwrap_or_default();
                    player.code_version = 1;
                    player.revealed_hints.clear();
                    player.current_problem = Some(problem);
                }
                None => player.current_problem = None,
            }
        }
        self.broadcast_player_update(player_id);
    }

    // -- broadcasting / view building ---------------------------------------

    fn connected_player_ids(&self) -> Vec<PlayerId> {
        self.room.players.values().filter(|p| p.connection.is_some()).map(|p| p.player_id).collect()
    }

    fn send_snapshot_to_all_connected(&self) {
        for pid in self.connected_player_ids() {
            self.send_snapshot_to(pid, None);
        }
    }

    fn send_snapshot_to(&self, player_id: PlayerId, request_id: Option<String>) {
        if let Some(snapshot) = self.build_snapshot(player_id) {
            self.send_event(player_id, request_id, ServerEvent::RoomSnapshot(snapshot));
        }
    }

    fn send_event(&self, player_id: PlayerId, request_id: Option<String>, event: ServerEvent) {
        let Some(player) = self.room.players.get(&player_id) else { return };
        let Some(sender) = &player.connection else { return };
        if sender.send(ServerEnvelope { request_id, event }).is_err() {
            tracing::debug!(room_id = %self.room.id, %player_id, "dropped outbound message: connection closed");
        }
    }

    fn broadcast(&self, request_id: Option<String>, event: ServerEvent) {
        for pid in self.connected_player_ids() {
            self.send_event(pid, request_id.clone(), event.clone());
        }
    }

    fn broadcast_player_update(&self, player_id: PlayerId) {
        if let Some(player) = self.room.players.get(&player_id) {
            self.broadcast(None, ServerEvent::PlayerUpdate(self.to_player_public(player)));
        }
    }

    fn broadcast_stack_update(&self, player_id: PlayerId) {
        if let Some(player) = self.room.players.get(&player_id) {
            self.broadcast(None, ServerEvent::StackUpdate { player_id, stack_size: player.stack_size() });
        }
    }

    fn send_error(&self, player_id: PlayerId, request_id: Option<String>, err: RoomError) {
        let retry_after_ms = err.retry_after_ms();
        self.send_error_code(player_id, request_id, err.code(), err.to_string(), retry_after_ms);
    }

    fn send_error_code(
        &self,
        player_id: PlayerId,
        request_id: Option<String>,
        code: ErrorCode,
        message: String,
        retry_after_ms: Option<u64>,
    ) {
        self.send_event(player_id, request_id, ServerEvent::Error(ErrorPayload { code, message, retry_after_ms }));
    }

    fn to_player_public(&self, player: &Player) -> PlayerPublic {
        let now = Instant::now();
        PlayerPublic {
            player_id: player.player_id,
            username: player.username.clone(),
            role: player.role,
            is_host: player.is_host,
            join_order: player.join_order,
            status: player.status,
            score: player.score,
            streak: player.streak,
            targeting_mode: player.targeting_mode,
            stack_size: player.stack_size(),
            active_debuff: player
                .active_debuff
                .filter(|d| d.ends_at > now)
                .map(|d| WireActiveDebuff { debuff_type: d.debuff_type, ends_at_ms: wall_clock_ms_for(d.ends_at) }),
            active_buff: player
                .active_buff
                .filter(|b| b.ends_at > now)
                .map(|b| WireActiveBuff { buff_type: b.buff_type, ends_at_ms: wall_clock_ms_for(b.ends_at) }),
        }
    }

    fn build_spectate_view(&self, spectator_id: PlayerId) -> Option<SpectateView> {
        let target_id = *self.room.spectate_targets.get(&spectator_id)?;
        let target = self.room.players.get(&target_id)?;
        Some(SpectateView {
            target_player_id: target_id,
            current_problem: target.current_problem.as_ref().map(Problem::to_client_view),
            code: target.code.clone(),
            code_version: target.code_version,
        })
    }

    fn build_match_view(&self) -> MatchView {
        let standings = if self.room.match_.phase == MatchPhase::Ended {
            let inputs = match_state::standing_inputs_from_players(self.room.players.values());
            let ordered = match_state::order_standings(inputs);
            Some(
                ordered
                    .iter()
                    .enumerate()
                    .map(|(i, s)| Standing {
                        player_id: s.player_id,
                        username: self.room.players.get(&s.player_id).map(|p| p.username.clone()).unwrap_or_default(),
                        rank: i as u32 + 1,
                        score: s.score,
                        stack_size: s.stack_size,
                        eliminated: s.eliminated,
                    })
                    .collect(),
            )
        } else {
            None
        };

        MatchView {
            match_id: self.room.match_.match_id,
            phase: self.room.match_.phase,
            start_at_ms: self.room.match_.start_at.map(wall_clock_ms_for),
            end_at_ms: self.room.match_.end_at.map(wall_clock_ms_for),
            end_reason: self.room.match_.end_reason,
            settings: self.room.match_.settings,
            standings,
        }
    }

    fn build_snapshot(&self, viewer_id: PlayerId) -> Option<RoomSnapshot> {
        let viewer = self.room.players.get(&viewer_id)?;
        let me = PlayerMe {
            player_id: viewer.player_id,
            username: viewer.username.clone(),
            role: viewer.role,
            is_host: viewer.is_host,
            status: viewer.status,
        };
        let players = self.room.players.values().map(|p| self.to_player_public(p)).collect();
        let match_view = self.build_match_view();
        let shop_catalog = shop::ALL_ITEMS.iter().map(|&item| shop::catalog_entry(item)).collect();

        let self_private = if viewer.role == PlayerRole::Spectator {
            None
        } else {
            Some(PlayerSelfPrivate {
                current_problem: viewer.current_problem.as_ref().map(Problem::to_client_view),
                queued: viewer.queued.iter().map(ProblemSummary::from).collect(),
                code: viewer.code.clone(),
                code_version: viewer.code_version,
                revealed_hints: viewer.revealed_hints.clone(),
                shop_cooldowns: viewer
                    .shop_cooldowns
                    .iter()
                    .map(|(item, ends_at)| (shop_item_wire_key(*item), wall_clock_ms_for(*ends_at)))
                    .collect(),
            })
        };

        Some(RoomSnapshot {
            room_id: self.room.id,
            server_time_ms: now_ms(),
            me,
            players,
            match_view,
            shop_catalog,
            self_private,
            spectating: self.build_spectate_view(viewer_id),
            chat: self.room.chat.iter().cloned().collect(),
            event_log: self.room.event_log.clone(),
        })
    }
}
