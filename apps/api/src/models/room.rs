//! Room model for Songline
//!
//! A room is one game session keyed by a short code. All mutations go
//! through the room's mutex in the registry, so the methods here are plain
//! synchronous state transitions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::card::{Card, HiddenSong};
use super::deck::{DeckState, DeckView};

/// Room lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoomStatus {
    #[default]
    Lobby,
    Setup,
    Playing,
    Placing,
    Result,
    Finished,
    PostGame,
}

impl RoomStatus {
    /// Statuses during which a turn rotation is in progress
    pub fn in_game(self) -> bool {
        matches!(self, Self::Playing | Self::Placing | Self::Result)
    }
}

/// Phase of the active turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnPhase {
    Playing,
    Placing,
    Result,
}

/// Rule for same-year placements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TiePolicy {
    Strict,
    #[default]
    Lenient,
}

/// Replay ballot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Vote {
    Yes,
    No,
}

/// A seated participant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    pub seat: u32,
    pub score: u32,
    pub is_host: bool,
    /// Ascending by release year
    pub timeline: Vec<Card>,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>, seat: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            seat,
            score: 0,
            is_host: false,
            timeline: Vec::new(),
        }
    }

    /// Insert a card and keep `score == timeline.len()`
    pub fn insert_card(&mut self, index: usize, card: Card) {
        let index = index.min(self.timeline.len());
        self.timeline.insert(index, card);
        self.score = self.timeline.len() as u32;
    }

    pub fn reset(&mut self) {
        self.timeline.clear();
        self.score = 0;
    }
}

/// The active guessing cycle
#[derive(Debug, Clone, PartialEq)]
pub struct TurnState {
    pub turn_id: String,
    pub current_player_id: String,
    /// Card in play; `None` once resolved
    pub drawn: Option<Card>,
    pub phase: TurnPhase,
    /// Audio confirmed underway
    pub play_started: bool,
    pub last_play_uri: Option<String>,
}

impl TurnState {
    pub fn new(current_player_id: impl Into<String>, drawn: Card) -> Self {
        Self {
            turn_id: uuid::Uuid::new_v4().to_string(),
            current_player_id: current_player_id.into(),
            drawn: Some(drawn),
            phase: TurnPhase::Playing,
            play_started: false,
            last_play_uri: None,
        }
    }
}

/// Settings of the last `start`, reused by replays
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    pub playlist_id: Option<String>,
    pub playlist_name: Option<String>,
    pub tie_policy: TiePolicy,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
}

/// Post-game replay ballots keyed by player id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayVotes {
    ballots: HashMap<String, Vote>,
    yes: u32,
    no: u32,
}

/// Vote counters for snapshots and `voteStatus`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub yes: u32,
    pub no: u32,
}

impl ReplayVotes {
    /// Record a ballot, moving a changed vote between buckets
    pub fn cast(&mut self, player_id: &str, vote: Vote) {
        if let Some(previous) = self.ballots.insert(player_id.to_string(), vote) {
            if previous == vote {
                return;
            }
            match previous {
                Vote::Yes => self.yes = self.yes.saturating_sub(1),
                Vote::No => self.no = self.no.saturating_sub(1),
            }
        }
        match vote {
            Vote::Yes => self.yes += 1,
            Vote::No => self.no += 1,
        }
    }

    pub fn tally(&self) -> VoteTally {
        VoteTally {
            yes: self.yes,
            no: self.no,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// One entry of the final ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    pub player_id: String,
    pub name: String,
    pub score: u32,
}

/// A game session
#[derive(Debug, Clone)]
pub struct Room {
    pub code: String,
    pub host_id: String,
    /// Seat assignment order; never contains the host
    pub players: Vec<Player>,
    pub status: RoomStatus,
    /// Index into [`Room::active_player_ids`]
    pub turn_index: usize,
    pub turn: Option<TurnState>,
    pub deck: DeckState,
    pub winner_id: Option<String>,
    pub tie_policy: TiePolicy,
    pub target_points: u32,
    pub votes: ReplayVotes,
    pub game_config: GameConfig,
    /// Device used by the last queue-next, reused for pausing
    pub playback_device: Option<String>,
    pub last_activity: DateTime<Utc>,
}

impl Room {
    pub fn new(code: impl Into<String>, host_id: impl Into<String>, target_points: u32) -> Self {
        Self {
            code: code.into(),
            host_id: host_id.into(),
            players: Vec::new(),
            status: RoomStatus::Lobby,
            turn_index: 0,
            turn: None,
            deck: DeckState::default(),
            winner_id: None,
            tie_policy: TiePolicy::default(),
            target_points,
            votes: ReplayVotes::default(),
            game_config: GameConfig::default(),
            playback_device: None,
            last_activity: Utc::now(),
        }
    }

    pub fn is_host(&self, id: &str) -> bool {
        self.host_id == id
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Drop any entry that identifies as the host
    pub fn purge_host_entries(&mut self) {
        let host_id = self.host_id.clone();
        self.players.retain(|p| !p.is_host && p.id != host_id);
    }

    /// Players that take turns, in seat order
    pub fn active_player_ids(&self) -> Vec<String> {
        self.players
            .iter()
            .filter(|p| !p.is_host && p.id != self.host_id)
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Smallest non-negative seat not in use
    pub fn next_free_seat(&self) -> u32 {
        (0..)
            .find(|seat| !self.players.iter().any(|p| p.seat == *seat))
            .unwrap_or(0)
    }

    /// Seat a player, or refresh the name of a returning one
    ///
    /// Returns `false` when the identity belongs to the host.
    pub fn seat_player(&mut self, id: &str, name: &str, is_host: bool) -> bool {
        if is_host || self.is_host(id) {
            return false;
        }
        if let Some(existing) = self.player_mut(id) {
            existing.name = name.to_string();
        } else {
            let seat = self.next_free_seat();
            self.players.push(Player::new(id, name, seat));
            self.players.sort_by_key(|p| p.seat);
        }
        self.purge_host_entries();
        true
    }

    /// Player whose turn it is according to `turn_index`
    pub fn current_player_id(&self) -> Option<String> {
        self.active_player_ids().get(self.turn_index).cloned()
    }

    /// Players by score descending, seat breaking ties
    pub fn ranking(&self) -> Vec<RankEntry> {
        let mut players: Vec<&Player> = self.players.iter().filter(|p| !p.is_host).collect();
        players.sort_by(|a, b| b.score.cmp(&a.score).then(a.seat.cmp(&b.seat)));
        players
            .into_iter()
            .map(|p| RankEntry {
                player_id: p.id.clone(),
                name: p.name.clone(),
                score: p.score,
            })
            .collect()
    }

    /// Snapshot safe to send to every client
    pub fn view(&self) -> RoomView {
        RoomView {
            code: self.code.clone(),
            host_id: self.host_id.clone(),
            players: self
                .players
                .iter()
                .map(|p| PlayerView {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    seat: p.seat,
                    score: p.score,
                    is_host: p.is_host,
                    timeline: p.timeline.clone(),
                })
                .collect(),
            status: self.status,
            turn_index: self.turn_index,
            turn: self.turn.as_ref().map(|t| TurnView {
                turn_id: t.turn_id.clone(),
                current_player_id: t.current_player_id.clone(),
                phase: t.phase,
                play_started: t.play_started,
                song: t.drawn.as_ref().map(Card::hidden),
            }),
            winner_id: self.winner_id.clone(),
            tie_policy: self.tie_policy,
            target_points: self.target_points,
            deck: self.deck.view(),
            votes: self.votes.tally(),
        }
    }
}

/// Serialized room snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub code: String,
    pub host_id: String,
    pub players: Vec<PlayerView>,
    pub status: RoomStatus,
    pub turn_index: usize,
    pub turn: Option<TurnView>,
    pub winner_id: Option<String>,
    pub tie_policy: TiePolicy,
    pub target_points: u32,
    pub deck: DeckView,
    pub votes: VoteTally,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub seat: u32,
    pub score: u32,
    pub is_host: bool,
    pub timeline: Vec<Card>,
}

/// Turn snapshot; the drawn card is reduced to a [`HiddenSong`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnView {
    pub turn_id: String,
    pub current_player_id: String,
    pub phase: TurnPhase,
    pub play_started: bool,
    pub song: Option<HiddenSong>,
}
