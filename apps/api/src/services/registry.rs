//! Room registry: code to room state
//!
//! Every room sits behind its own `tokio::sync::Mutex`, so operations on
//! one room serialize while unrelated rooms proceed independently.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::{Room, RoomView};

/// Room codes are drawn from this alphabet
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LENGTH: usize = 4;
const MAX_CODE_ATTEMPTS: usize = 64;

pub const MIN_TARGET_POINTS: u32 = 1;
pub const MAX_TARGET_POINTS: u32 = 100;

/// Shared handle to one room
pub type RoomHandle = Arc<Mutex<Room>>;

/// Response of room creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreated {
    pub code: String,
    pub host_id: String,
    pub target_points: u32,
}

/// Identity presented by a joining connection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_host: bool,
}

/// Result of a join
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// `false` for host connections, which only observe
    pub seated: bool,
    pub view: RoomView,
}

/// Validate a target score
pub fn validate_target_points(target_points: u32) -> ApiResult<u32> {
    if (MIN_TARGET_POINTS..=MAX_TARGET_POINTS).contains(&target_points) {
        Ok(target_points)
    } else {
        Err(ApiError::ValidationError(format!(
            "targetPoints must be between {} and {}",
            MIN_TARGET_POINTS, MAX_TARGET_POINTS
        )))
    }
}

/// Canonical form of a user-supplied room code
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

fn generate_host_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("host-{}", &id[..8])
}

/// In-memory owner of all rooms served by this process
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, RoomHandle>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room with a fresh unique code
    ///
    /// # Errors
    /// - `ApiError::ValidationError` if `target_points` is outside 1-100
    /// - `ApiError::Internal` if no free code was found
    #[instrument(skip(self))]
    pub fn create_room(
        &self,
        host_id: Option<String>,
        target_points: u32,
    ) -> ApiResult<RoomCreated> {
        let target_points = validate_target_points(target_points)?;
        let host_id = host_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(generate_host_id);

        let mut rng = rand::thread_rng();
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_code(&mut rng);
            if let Entry::Vacant(slot) = self.rooms.entry(code.clone()) {
                slot.insert(Arc::new(Mutex::new(Room::new(
                    &code,
                    &host_id,
                    target_points,
                ))));
                info!(code = %code, host_id = %host_id, target_points, "Room created");
                return Ok(RoomCreated {
                    code,
                    host_id,
                    target_points,
                });
            }
            debug!(code = %code, "Room code collision, retrying");
        }

        warn!(rooms = self.rooms.len(), "Room code space exhausted");
        Err(ApiError::Internal("could not allocate a room code".to_string()))
    }

    /// Look up a room by code
    pub fn get(&self, code: &str) -> ApiResult<RoomHandle> {
        let code = normalize_code(code);
        self.rooms
            .get(&code)
            .map(|room| Arc::clone(room.value()))
            .ok_or_else(|| ApiError::not_found("room", code))
    }

    /// Seat a player, or register a host observer
    ///
    /// Host identities are never added to `players`; they still receive the
    /// snapshot.
    #[instrument(skip(self, request), fields(player_id = %request.id))]
    pub async fn join(&self, code: &str, request: &JoinRequest) -> ApiResult<JoinOutcome> {
        if request.id.trim().is_empty() {
            return Err(ApiError::ValidationError("player id is required".to_string()));
        }

        let room = self.get(code)?;
        let mut room = room.lock().await;
        let name = if request.name.trim().is_empty() {
            request.id.as_str()
        } else {
            request.name.trim()
        };

        let seated = room.seat_player(&request.id, name, request.is_host);
        if seated {
            debug!(code = %room.code, "Player joined");
        } else {
            info!(code = %room.code, "Host identity joined as observer");
        }
        room.touch();

        Ok(JoinOutcome {
            seated,
            view: room.view(),
        })
    }

    pub fn remove(&self, code: &str) -> bool {
        self.rooms.remove(&normalize_code(code)).is_some()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Whether any room is hosted by `host_id`
    ///
    /// A room whose lock is held counts as a match.
    pub fn has_host(&self, host_id: &str) -> bool {
        self.rooms.iter().any(|entry| match entry.value().try_lock() {
            Ok(room) => room.host_id == host_id,
            Err(_) => true,
        })
    }

    /// Remove rooms idle for longer than `max_idle`
    ///
    /// Rooms whose lock is currently held are in use and skipped.
    pub fn evict_idle(&self, max_idle: Duration) -> Vec<String> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_idle).unwrap_or_else(|_| chrono::Duration::zero());
        let mut evicted = Vec::new();

        self.rooms.retain(|code, room| match room.try_lock() {
            Ok(room) if room.last_activity < cutoff => {
                evicted.push(code.clone());
                false
            }
            _ => true,
        });

        if !evicted.is_empty() {
            info!(count = evicted.len(), "Evicted idle rooms");
        }
        evicted
    }
}
