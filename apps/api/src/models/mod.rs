//! Game models for Songline
//!
//! This module contains the in-memory state of a game session:
//! - Cards and release dates
//! - Decks and their drawable/used/discarded partitions
//! - Rooms, players, turns and replay votes
//!
//! Nothing here is persisted; a room lives as long as the process or
//! until it is evicted for inactivity.

pub mod card;
pub mod deck;
pub mod room;

pub use card::{CatalogTrack, Card, DatePrecision, HiddenSong, ReleaseDate};
pub use deck::{DeckState, DeckView};
pub use room::{
    GameConfig, Player, PlayerView, RankEntry, ReplayVotes, Room, RoomStatus, RoomView,
    TiePolicy, TurnPhase, TurnState, TurnView, Vote, VoteTally,
};
