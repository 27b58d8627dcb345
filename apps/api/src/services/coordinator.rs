//! Turn state machine
//!
//! `lobby -> setup -> playing -> placing -> result -> (playing | postGame | finished)`
//!
//! Every operation locks the room, computes the new state together with the
//! events it produces, releases the lock and only then fans the events out.
//! Deck loading and playback reconciliation run with no room lock held.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::{DeckState, GameConfig, Room, RoomStatus, RoomView, TurnPhase, TurnState};
use crate::services::deck::DeckEngine;
use crate::services::playback::{PlaybackReconciler, QueueOutcome, QueueTarget};
use crate::services::registry::{
    validate_target_points, JoinOutcome, JoinRequest, RoomHandle, RoomRegistry,
};
use crate::services::timeline;
use crate::websocket::connection::RoomBroadcaster;
use crate::websocket::messages::{
    NewGameRequest, ServerEvent, StartRequest, TurnResult, VoteReplayRequest,
};

/// Input of the confirm-placement action
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPlacement {
    pub room_code: String,
    pub player_id: String,
    pub turn_id: String,
    pub target_index: usize,
}

/// Outcome of a placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementResult {
    pub correct: bool,
    /// Present only when the card was kept
    pub new_score: Option<u32>,
    pub final_index: usize,
}

/// Input of the queue-next action
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueNextRequest {
    pub room_code: String,
    pub host_id: String,
    pub device_id: String,
    pub turn_id: String,
    #[serde(default)]
    pub volume_percent: Option<u8>,
}

/// Drives rooms through their game lifecycle
pub struct TurnCoordinator {
    registry: Arc<RoomRegistry>,
    broadcaster: RoomBroadcaster,
    decks: DeckEngine,
    reconciler: Arc<PlaybackReconciler>,
}

impl std::fmt::Debug for TurnCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnCoordinator")
            .field("rooms", &self.registry.room_count())
            .field("connections", &self.broadcaster.total_connections())
            .field("decks", &self.decks)
            .finish()
    }
}

impl TurnCoordinator {
    pub fn new(
        registry: Arc<RoomRegistry>,
        broadcaster: RoomBroadcaster,
        decks: DeckEngine,
        reconciler: Arc<PlaybackReconciler>,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            decks,
            reconciler,
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn broadcaster(&self) -> &RoomBroadcaster {
        &self.broadcaster
    }

    /// Current snapshot of a room
    pub async fn snapshot(&self, code: &str) -> ApiResult<RoomView> {
        let handle = self.registry.get(code)?;
        let room = handle.lock().await;
        Ok(room.view())
    }

    /// Seat a player (or register a host observer) and push the snapshot
    pub async fn join(&self, code: &str, request: &JoinRequest) -> ApiResult<JoinOutcome> {
        let outcome = self.registry.join(code, request).await?;
        self.broadcaster
            .broadcast(&outcome.view.code, ServerEvent::RoomInit(outcome.view.clone()));
        Ok(outcome)
    }

    /// Start the game from the lobby
    ///
    /// # Errors
    /// - `ApiError::Forbidden` unless requested by the host
    /// - `ApiError::Conflict` outside the lobby or with fewer than two players
    /// - Deck errors; the room then returns to the lobby untouched
    #[instrument(skip(self, request), fields(host_id = %request.host_id))]
    pub async fn start(&self, code: &str, request: &StartRequest) -> ApiResult<()> {
        let config = request.game_config();
        if let (Some(min), Some(max)) = (config.min_year, config.max_year) {
            if min > max {
                return Err(ApiError::ValidationError(
                    "minYear must not be after maxYear".to_string(),
                ));
            }
        }

        let handle = self.registry.get(code)?;
        let (code, host_id, target_points, snapshot) = {
            let mut room = handle.lock().await;
            if !room.is_host(&request.host_id) {
                return Err(ApiError::Forbidden("only the host can start the game".into()));
            }
            if room.status != RoomStatus::Lobby {
                return Err(ApiError::conflict("game already started"));
            }
            room.purge_host_entries();
            if room.active_player_ids().len() < 2 {
                return Err(ApiError::conflict("at least two players are required"));
            }
            room.status = RoomStatus::Setup;
            room.touch();
            (
                room.code.clone(),
                room.host_id.clone(),
                room.target_points,
                room.view(),
            )
        };
        self.broadcaster
            .broadcast(&code, ServerEvent::RoomInit(snapshot));

        self.load_and_deal(
            &handle,
            &host_id,
            config,
            target_points,
            RoomStatus::Lobby,
            false,
        )
        .await
    }

    /// Load a deck with no lock held, then deal and begin the first turn
    ///
    /// The room must already be in `setup`. On failure it goes back to
    /// `fallback` with no timeline touched. Runs on its own task so a caller
    /// that goes away mid-load cannot strand the room in `setup`.
    async fn load_and_deal(
        &self,
        handle: &RoomHandle,
        host_id: &str,
        config: GameConfig,
        target_points: u32,
        fallback: RoomStatus,
        announce: bool,
    ) -> ApiResult<()> {
        let setup = GameSetup {
            decks: self.decks.clone(),
            broadcaster: self.broadcaster.clone(),
            handle: handle.clone(),
            host_id: host_id.to_string(),
            config,
            target_points,
            fallback,
            announce,
        };
        tokio::spawn(setup.run())
            .await
            .map_err(|e| ApiError::Internal(format!("game setup task failed: {}", e)))?
    }

    /// Host reports that the drawn song is audible; opens placement
    ///
    /// Idempotent once the turn is already placing.
    ///
    /// # Errors
    /// - `ApiError::Forbidden` unless reported by the host
    /// - `ApiError::Conflict` for a stale or resolved turn
    #[instrument(skip(self))]
    pub async fn mark_play_started(&self, code: &str, host_id: &str, turn_id: &str) -> ApiResult<()> {
        self.open_placement(code, Some(host_id), turn_id).await
    }

    /// Open placement for a turn; `host_id` is `None` when the caller
    /// already verified the host
    async fn open_placement(&self, code: &str, host_id: Option<&str>, turn_id: &str) -> ApiResult<()> {
        let handle = self.registry.get(code)?;
        let events = {
            let mut room = handle.lock().await;
            if host_id.is_some_and(|id| !room.is_host(id)) {
                return Err(ApiError::Forbidden("only the host reports playback".into()));
            }
            room.touch();
            let Some(turn) = room.turn.as_mut().filter(|t| t.turn_id == turn_id) else {
                return Err(ApiError::conflict("turn is not active"));
            };
            match turn.phase {
                TurnPhase::Placing => return Ok(()),
                TurnPhase::Result => return Err(ApiError::conflict("turn already resolved")),
                TurnPhase::Playing => {}
            }
            turn.play_started = true;
            turn.phase = TurnPhase::Placing;
            room.status = RoomStatus::Placing;
            vec![
                ServerEvent::TurnPlacing {
                    turn_id: turn_id.to_string(),
                },
                ServerEvent::RoomInit(room.view()),
            ]
        };
        self.broadcaster.broadcast_all(code, events);
        Ok(())
    }

    /// Resolve the current player's placement
    ///
    /// # Errors
    /// Checked in order: room (404), host (403), player (404), turn id,
    /// current player, phase, playback started, drawn card (all 409).
    #[instrument(skip(self, request), fields(code = %request.room_code, player_id = %request.player_id))]
    pub async fn confirm_placement(&self, request: &ConfirmPlacement) -> ApiResult<PlacementResult> {
        let handle = self.registry.get(&request.room_code)?;
        let (code, result, events, host_id, device) = {
            let mut room = handle.lock().await;
            room.touch();
            validate_placement(&room, request)?;

            let tie_policy = room.tie_policy;
            let Some(card) = room.turn.as_mut().and_then(|t| t.drawn.take()) else {
                return Err(ApiError::conflict("no card in play"));
            };
            let Some(player) = room.player_mut(&request.player_id) else {
                return Err(ApiError::not_found("player", &request.player_id));
            };

            let placement = timeline::judge(&player.timeline, &card, request.target_index, tie_policy);
            let new_score = if placement.correct {
                player.insert_card(placement.final_index, card.clone());
                Some(player.score)
            } else {
                None
            };
            if !placement.correct {
                room.deck.discard(&card.track_id);
            }

            if let Some(turn) = room.turn.as_mut() {
                turn.phase = TurnPhase::Result;
                turn.play_started = false;
            }
            room.status = RoomStatus::Result;

            let mut events = vec![ServerEvent::TurnResult(TurnResult {
                turn_id: request.turn_id.clone(),
                player_id: request.player_id.clone(),
                correct: placement.correct,
                final_index: placement.final_index,
                new_score,
                card,
            })];

            if new_score.is_some_and(|score| score >= room.target_points) {
                room.winner_id = Some(request.player_id.clone());
                room.status = RoomStatus::PostGame;
                room.votes.clear();
                info!(code = %room.code, winner_id = %request.player_id, "Winner decided");
                events.push(ServerEvent::GameOver {
                    ranking: room.ranking(),
                    winner_id: room.winner_id.clone(),
                    target_points: room.target_points,
                });
                events.push(ServerEvent::WinnerDeciding {
                    winner_id: request.player_id.clone(),
                });
            }
            events.push(ServerEvent::RoomInit(room.view()));

            let result = PlacementResult {
                correct: placement.correct,
                new_score,
                final_index: placement.final_index,
            };
            (
                room.code.clone(),
                result,
                events,
                room.host_id.clone(),
                room.playback_device.clone(),
            )
        };

        debug!(correct = result.correct, final_index = result.final_index, "Placement resolved");
        self.broadcaster.broadcast_all(&code, events);
        self.reconciler.spawn_pause(host_id, device);
        Ok(result)
    }

    /// Move on from a resolved turn
    ///
    /// A finished or post-game room makes this a no-op.
    #[instrument(skip(self))]
    pub async fn advance_turn(&self, code: &str) -> ApiResult<()> {
        let handle = self.registry.get(code)?;
        let events = {
            let mut room = handle.lock().await;
            room.touch();
            match room.status {
                RoomStatus::Finished | RoomStatus::PostGame => return Ok(()),
                RoomStatus::Lobby | RoomStatus::Setup => {
                    return Err(ApiError::conflict("game has not started"))
                }
                _ => {}
            }
            if room.turn.as_ref().map(|t| t.phase) != Some(TurnPhase::Result) {
                return Err(ApiError::conflict("turn is not in result phase"));
            }

            room.turn = None;
            let active = room.active_player_ids().len();
            if active == 0 {
                finish_without_winner(&mut room)
            } else {
                room.turn_index = (room.turn_index + 1) % active;
                begin_turn(&mut room)
            }
        };
        self.broadcaster.broadcast_all(code, events);
        Ok(())
    }

    /// Queue the drawn card on the host's device and reconcile playback
    ///
    /// Confirmed playback opens placement for the turn.
    #[instrument(skip(self, request), fields(code = %request.room_code, turn_id = %request.turn_id))]
    pub async fn queue_next(&self, request: &QueueNextRequest) -> ApiResult<QueueOutcome> {
        if request.device_id.trim().is_empty() {
            return Err(ApiError::ValidationError("deviceId is required".to_string()));
        }

        let handle = self.registry.get(&request.room_code)?;
        let target = {
            let mut room = handle.lock().await;
            if !room.is_host(&request.host_id) {
                return Err(ApiError::Forbidden("only the host controls playback".into()));
            }
            room.touch();
            room.playback_device = Some(request.device_id.clone());
            let Some(turn) = room.turn.as_mut().filter(|t| t.turn_id == request.turn_id) else {
                return Err(ApiError::conflict("turn is not active"));
            };
            let Some(uri) = turn.drawn.as_ref().map(|card| card.uri.clone()) else {
                return Err(ApiError::conflict("no card in play"));
            };
            turn.last_play_uri = Some(uri.clone());
            QueueTarget {
                host_id: request.host_id.clone(),
                turn_id: request.turn_id.clone(),
                device_id: request.device_id.clone(),
                uri,
                volume_percent: request.volume_percent,
            }
        };

        let outcome = self.reconciler.queue_next(&target).await?;
        if outcome.is_confirmed() {
            if let Err(e) = self.open_placement(&request.room_code, None, &request.turn_id).await {
                debug!(error = %e, "Turn moved on before playback was confirmed");
            }
        }
        Ok(outcome)
    }

    /// Winner asks for a fresh game with optional overrides
    #[instrument(skip(self, request), fields(player_id = %request.player_id))]
    pub async fn new_game_request(&self, code: &str, request: &NewGameRequest) -> ApiResult<()> {
        let target_override = request.target_points.map(validate_target_points).transpose()?;

        let handle = self.registry.get(code)?;
        let (host_id, config, target_points, snapshot, code) = {
            let mut room = handle.lock().await;
            room.touch();
            if room.status != RoomStatus::PostGame {
                return Err(ApiError::conflict("no finished game to replay"));
            }
            if room.winner_id.as_deref() != Some(request.player_id.as_str()) {
                return Err(ApiError::Forbidden("only the winner can start a new game".into()));
            }

            let mut config = room.game_config.clone();
            if let Some(playlist_id) = request.playlist_id.clone().filter(|p| !p.is_empty()) {
                config.playlist_id = Some(playlist_id);
                config.playlist_name = None;
            }
            room.status = RoomStatus::Setup;
            room.votes.clear();
            (
                room.host_id.clone(),
                config,
                target_override.unwrap_or(room.target_points),
                room.view(),
                room.code.clone(),
            )
        };
        self.broadcaster
            .broadcast(&code, ServerEvent::RoomInit(snapshot));

        self.load_and_deal(
            &handle,
            &host_id,
            config,
            target_points,
            RoomStatus::PostGame,
            true,
        )
        .await
    }

    /// Record a replay ballot; a majority restarts with the same settings
    #[instrument(skip(self, request), fields(player_id = %request.player_id))]
    pub async fn vote_replay(&self, code: &str, request: &VoteReplayRequest) -> ApiResult<()> {
        let handle = self.registry.get(code)?;
        let (code, status, replay) = {
            let mut room = handle.lock().await;
            room.touch();
            if room.status != RoomStatus::PostGame {
                return Err(ApiError::conflict("voting is only open after a game"));
            }
            if room.is_host(&request.player_id) {
                return Err(ApiError::Forbidden("the host does not vote".into()));
            }
            if room.winner_id.as_deref() == Some(request.player_id.as_str()) {
                return Err(ApiError::Forbidden("the winner decides directly".into()));
            }
            if room.player(&request.player_id).is_none() {
                return Err(ApiError::not_found("player", &request.player_id));
            }

            room.votes.cast(&request.player_id, request.vote);
            let winner = room.winner_id.clone();
            let eligible = room
                .active_player_ids()
                .iter()
                .filter(|id| Some(id.as_str()) != winner.as_deref())
                .count() as u32;
            let needed = eligible / 2 + 1;
            let tally = room.votes.tally();
            let status = ServerEvent::VoteStatus {
                yes: tally.yes,
                no: tally.no,
                needed,
            };

            let replay = if tally.yes >= needed {
                room.status = RoomStatus::Setup;
                room.votes.clear();
                Some((
                    room.host_id.clone(),
                    room.game_config.clone(),
                    room.target_points,
                ))
            } else {
                None
            };
            (room.code.clone(), status, replay)
        };
        self.broadcaster.broadcast(&code, status);

        match replay {
            Some((host_id, config, target_points)) => {
                info!(code = %code, "Replay vote passed");
                self.load_and_deal(
                    &handle,
                    &host_id,
                    config,
                    target_points,
                    RoomStatus::PostGame,
                    true,
                )
                .await
            }
            None => Ok(()),
        }
    }

    /// Evict idle rooms together with their connections and playback entries
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let evicted = self.registry.evict_idle(max_idle);
        for code in &evicted {
            self.broadcaster.remove_room(code);
        }
        self.reconciler.evict_stale(max_idle);
        evicted.len()
    }
}

/// Precondition checks for a placement, in response-code order
fn validate_placement(room: &Room, request: &ConfirmPlacement) -> ApiResult<()> {
    if room.is_host(&request.player_id) {
        return Err(ApiError::Forbidden("the host does not place cards".into()));
    }
    if room.player(&request.player_id).is_none() {
        return Err(ApiError::not_found("player", &request.player_id));
    }
    let Some(turn) = room.turn.as_ref().filter(|t| t.turn_id == request.turn_id) else {
        return Err(ApiError::conflict("turn is not active"));
    };
    if turn.current_player_id != request.player_id {
        return Err(ApiError::conflict("not this player's turn"));
    }
    if !matches!(turn.phase, TurnPhase::Playing | TurnPhase::Placing) {
        return Err(ApiError::conflict("turn already resolved"));
    }
    if !turn.play_started {
        return Err(ApiError::conflict("playback has not started"));
    }
    if turn.drawn.is_none() {
        return Err(ApiError::conflict("no card in play"));
    }
    Ok(())
}

/// Deck load and deal for a room parked in `setup`
struct GameSetup {
    decks: DeckEngine,
    broadcaster: RoomBroadcaster,
    handle: RoomHandle,
    host_id: String,
    config: GameConfig,
    target_points: u32,
    fallback: RoomStatus,
    announce: bool,
}

impl GameSetup {
    async fn run(self) -> ApiResult<()> {
        let Self {
            decks,
            broadcaster,
            handle,
            host_id,
            config,
            target_points,
            fallback,
            announce,
        } = self;
        let loaded = decks.load_deck(&host_id, &config).await;

        let mut room = handle.lock().await;
        let code = room.code.clone();
        if room.status != RoomStatus::Setup {
            return Err(ApiError::conflict("room left setup while the deck was loading"));
        }

        let result = loaded.and_then(|cards| {
            deal_and_begin(&mut room, DeckState::new(cards), config.clone(), target_points)
        });
        let events = match result {
            Ok(events) => events,
            Err(e) => {
                warn!(code = %code, error = %e, "Game setup failed, reverting");
                room.status = fallback;
                let snapshot = room.view();
                drop(room);
                broadcaster.broadcast(&code, ServerEvent::RoomInit(snapshot));
                return Err(e);
            }
        };
        drop(room);

        info!(code = %code, target_points, "Game started");
        if announce {
            broadcaster.broadcast(
                &code,
                ServerEvent::NewGameStarted {
                    config,
                    target_points,
                },
            );
        }
        broadcaster.broadcast_all(&code, events);
        Ok(())
    }
}

/// Deal one opening card per active player and begin the first turn
///
/// All-or-nothing: nothing in the room changes unless every player got a card.
fn deal_and_begin(
    room: &mut Room,
    mut deck: DeckState,
    config: GameConfig,
    target_points: u32,
) -> ApiResult<Vec<ServerEvent>> {
    room.purge_host_entries();
    let active = room.active_player_ids();
    let mut rng = rand::thread_rng();

    let mut dealt = Vec::with_capacity(active.len());
    for player_id in active {
        let Some(card) = deck.draw(&mut rng) else {
            return Err(ApiError::DeckExhausted);
        };
        dealt.push((player_id, card));
    }

    for player in room.players.iter_mut() {
        player.reset();
    }
    for (player_id, card) in dealt {
        if let Some(player) = room.player_mut(&player_id) {
            player.insert_card(0, card);
        }
    }

    room.deck = deck;
    room.tie_policy = config.tie_policy;
    room.game_config = config;
    room.target_points = target_points;
    room.winner_id = None;
    room.votes.clear();
    room.turn = None;
    room.turn_index = 0;
    room.status = RoomStatus::Playing;

    Ok(begin_turn(room))
}

/// Draw for the player at `turn_index` and open a new turn
fn begin_turn(room: &mut Room) -> Vec<ServerEvent> {
    let active = room.active_player_ids();
    if active.is_empty() {
        return finish_without_winner(room);
    }
    if room.turn_index >= active.len() {
        room.turn_index = 0;
    }
    let player_id = active[room.turn_index].clone();

    let Some(card) = room.deck.draw(&mut rand::thread_rng()) else {
        info!(code = %room.code, "Deck exhausted");
        return finish_without_winner(room);
    };

    let turn = TurnState::new(&player_id, card);
    let turn_id = turn.turn_id.clone();
    let song = turn.drawn.as_ref().map(|c| c.hidden());
    room.turn = Some(turn);
    room.status = RoomStatus::Playing;
    debug!(code = %room.code, turn_id = %turn_id, player_id = %player_id, "Turn begins");

    let mut events = vec![ServerEvent::TurnBegin {
        turn_id: turn_id.clone(),
        current_player_id: player_id.clone(),
    }];
    if let Some(song) = song {
        events.push(ServerEvent::TurnPlay {
            turn_id,
            player_id,
            song,
        });
    }
    events.push(ServerEvent::RoomInit(room.view()));
    events
}

/// End the game with no winner
fn finish_without_winner(room: &mut Room) -> Vec<ServerEvent> {
    room.turn = None;
    room.winner_id = None;
    room.status = RoomStatus::Finished;
    vec![
        ServerEvent::GameFinish { winner_id: None },
        ServerEvent::GameOver {
            ranking: room.ranking(),
            winner_id: None,
            target_points: room.target_points,
        },
        ServerEvent::RoomInit(room.view()),
    ]
}
