//! Test helper functions for API integration tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use tokio::sync::mpsc;
use uuid::Uuid;

use songline_api::models::Card;
use songline_api::services::{ConfirmPlacement, JoinRequest, TurnCoordinator};
use songline_api::websocket::ServerEvent;

/// Wait for a condition with timeout
pub async fn wait_for<F, Fut>(condition: F, timeout_ms: u64, poll_interval_ms: u64) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_millis(timeout_ms);
    let interval = std::time::Duration::from_millis(poll_interval_ms);

    loop {
        if condition().await {
            return true;
        }

        if start.elapsed() >= timeout {
            return false;
        }

        tokio::time::sleep(interval).await;
    }
}

/// Register a fake socket on a room and return its event stream
pub fn subscribe(coordinator: &TurnCoordinator, code: &str) -> mpsc::UnboundedReceiver<ServerEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    coordinator
        .broadcaster()
        .add_connection(code, Uuid::new_v4(), tx);
    rx
}

/// Everything queued on a subscription so far
pub fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn event_names(events: &[ServerEvent]) -> Vec<&'static str> {
    events.iter().map(ServerEvent::name).collect()
}

pub fn player(id: &str, name: &str) -> JoinRequest {
    JoinRequest {
        id: id.to_string(),
        name: name.to_string(),
        is_host: false,
    }
}

/// Create a room hosted by `host-1` with two seated players
pub async fn lobby_with_two_players(coordinator: &Arc<TurnCoordinator>, target_points: u32) -> String {
    let created = coordinator
        .registry()
        .create_room(Some("host-1".to_string()), target_points)
        .unwrap();
    coordinator.join(&created.code, &player("p1", "Ann")).await.unwrap();
    coordinator.join(&created.code, &player("p2", "Bo")).await.unwrap();
    created.code
}

/// Current turn id, its player and the hidden card
pub async fn current_turn(coordinator: &TurnCoordinator, code: &str) -> (String, String, Card) {
    let handle = coordinator.registry().get(code).unwrap();
    let room = handle.lock().await;
    let turn = room.turn.as_ref().expect("turn in progress");
    (
        turn.turn_id.clone(),
        turn.current_player_id.clone(),
        turn.drawn.clone().expect("card drawn"),
    )
}

pub async fn timeline_years(coordinator: &TurnCoordinator, code: &str, player_id: &str) -> Vec<i32> {
    let handle = coordinator.registry().get(code).unwrap();
    let room = handle.lock().await;
    room.player(player_id)
        .unwrap()
        .timeline
        .iter()
        .map(Card::year)
        .collect()
}

/// Index at which `year` fits into an ascending timeline
pub fn correct_index(years: &[i32], year: i32) -> usize {
    years.iter().filter(|y| **y <= year).count()
}

/// Some index at which `year` does not fit; requires distinct years
pub fn wrong_index(years: &[i32], year: i32) -> usize {
    let correct = correct_index(years, year);
    if correct == 0 {
        years.len()
    } else {
        0
    }
}

pub fn confirm(code: &str, player_id: &str, turn_id: &str, target_index: usize) -> ConfirmPlacement {
    ConfirmPlacement {
        room_code: code.to_string(),
        player_id: player_id.to_string(),
        turn_id: turn_id.to_string(),
        target_index,
    }
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
