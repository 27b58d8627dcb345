//! Integration tests for a full game driven through the turn coordinator

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::*;
use songline_api::models::{RoomStatus, TurnPhase, Vote};
use songline_api::services::{QueueNextRequest, QueueOutcome, ReconcileVia};
use songline_api::websocket::messages::{NewGameRequest, StartRequest, VoteReplayRequest};
use songline_api::websocket::ServerEvent;
use songline_api::ApiError;

fn start_request() -> StartRequest {
    StartRequest {
        host_id: "host-1".to_string(),
        ..StartRequest::default()
    }
}

/// Resolve the current turn for whoever holds it
async fn play_turn(
    coordinator: &songline_api::TurnCoordinator,
    code: &str,
    correct: bool,
) -> (String, songline_api::services::PlacementResult) {
    let (turn_id, player_id, card) = current_turn(coordinator, code).await;
    coordinator.mark_play_started(code, "host-1", &turn_id).await.unwrap();

    let years = timeline_years(coordinator, code, &player_id).await;
    let index = if correct {
        correct_index(&years, card.year())
    } else {
        wrong_index(&years, card.year())
    };
    let result = coordinator
        .confirm_placement(&confirm(code, &player_id, &turn_id, index))
        .await
        .unwrap();
    (player_id, result)
}

#[tokio::test]
async fn test_wrong_then_winning_placement() {
    let provider = Arc::new(RecordingProvider::default());
    let context = test_context(distinct_tracks(12), provider);
    let coordinator = context.coordinator.clone();
    let code = lobby_with_two_players(&coordinator, 2).await;
    let mut events = subscribe(&coordinator, &code);

    coordinator.start(&code, &start_request()).await.unwrap();
    let started = drain(&mut events);
    assert!(event_names(&started).contains(&"turn:begin"));
    assert!(event_names(&started).contains(&"turn:play"));

    let view = coordinator.snapshot(&code).await.unwrap();
    assert_eq!(view.status, RoomStatus::Playing);
    assert!(view.players.iter().all(|p| p.score == 1 && p.timeline.len() == 1));

    // First seat misses: the card is discarded and the turn passes on
    let (first, _, missed) = current_turn(&coordinator, &code).await;
    let (player_id, result) = play_turn(&coordinator, &code, false).await;
    assert_eq!(player_id, "p1");
    assert!(!result.correct);
    assert_eq!(result.new_score, None);
    {
        let handle = coordinator.registry().get(&code).unwrap();
        let room = handle.lock().await;
        assert!(room.deck.is_discarded(&missed.track_id));
        assert_eq!(room.player("p1").unwrap().score, 1);
        assert_eq!(room.turn.as_ref().unwrap().phase, TurnPhase::Result);
    }

    coordinator.advance_turn(&code).await.unwrap();
    let (second, next_player, _) = current_turn(&coordinator, &code).await;
    assert_ne!(first, second);
    assert_eq!(next_player, "p2");

    // Second seat reaches the target
    drain(&mut events);
    let (player_id, result) = play_turn(&coordinator, &code, true).await;
    assert_eq!(player_id, "p2");
    assert!(result.correct);
    assert_eq!(result.new_score, Some(2));

    let view = coordinator.snapshot(&code).await.unwrap();
    assert_eq!(view.status, RoomStatus::PostGame);
    assert_eq!(view.winner_id.as_deref(), Some("p2"));

    let resolved = drain(&mut events);
    let ranking = resolved
        .iter()
        .find_map(|e| match e {
            ServerEvent::GameOver { ranking, .. } => Some(ranking.clone()),
            _ => None,
        })
        .expect("gameOver event");
    assert_eq!(ranking[0].player_id, "p2");
    assert!(event_names(&resolved).contains(&"winnerDeciding"));

    // Advancing after the win is a no-op
    coordinator.advance_turn(&code).await.unwrap();
    assert_eq!(
        coordinator.snapshot(&code).await.unwrap().status,
        RoomStatus::PostGame
    );
}

#[tokio::test]
async fn test_first_to_three_points() {
    let context = test_context(distinct_tracks(12), Arc::new(RecordingProvider::default()));
    let coordinator = context.coordinator.clone();
    let code = lobby_with_two_players(&coordinator, 3).await;
    coordinator.start(&code, &start_request()).await.unwrap();

    for expected_score in 2..=3 {
        let (_, _, missed) = current_turn(&coordinator, &code).await;
        let (player_id, result) = play_turn(&coordinator, &code, false).await;
        assert_eq!(player_id, "p1");
        assert!(!result.correct);
        {
            let handle = coordinator.registry().get(&code).unwrap();
            let room = handle.lock().await;
            assert!(room.deck.is_discarded(&missed.track_id));
        }
        coordinator.advance_turn(&code).await.unwrap();

        let (player_id, result) = play_turn(&coordinator, &code, true).await;
        assert_eq!(player_id, "p2");
        assert_eq!(result.new_score, Some(expected_score));
        if expected_score < 3 {
            assert_eq!(
                coordinator.snapshot(&code).await.unwrap().status,
                RoomStatus::Result
            );
            coordinator.advance_turn(&code).await.unwrap();
        }
    }

    let view = coordinator.snapshot(&code).await.unwrap();
    assert_eq!(view.status, RoomStatus::PostGame);
    assert_eq!(view.winner_id.as_deref(), Some("p2"));
    let score = |id: &str| view.players.iter().find(|p| p.id == id).unwrap().score;
    assert_eq!(score("p1"), 1);
    assert_eq!(score("p2"), 3);

    let years = timeline_years(&coordinator, &code, "p2").await;
    assert_eq!(years.len(), 3);
    assert!(years.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_concurrent_start_deals_once() {
    let context = test_context(distinct_tracks(12), Arc::new(RecordingProvider::default()));
    let coordinator = context.coordinator.clone();
    let code = lobby_with_two_players(&coordinator, 5).await;
    let request = start_request();

    let (a, b) = tokio::join!(
        coordinator.start(&code, &request),
        coordinator.start(&code, &request)
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(ApiError::Conflict(_)))));

    let view = coordinator.snapshot(&code).await.unwrap();
    assert_eq!(view.status, RoomStatus::Playing);
    assert!(view.players.iter().all(|p| p.timeline.len() == 1));
}

#[tokio::test]
async fn test_start_completes_when_caller_is_cancelled() {
    let catalog = Arc::new(FakeCatalog::new(distinct_tracks(12)).with_delay(Duration::from_millis(200)));
    let context = test_context_with_catalog(catalog, Arc::new(RecordingProvider::default()));
    let coordinator = context.coordinator.clone();
    let code = lobby_with_two_players(&coordinator, 5).await;

    let caller = {
        let coordinator = coordinator.clone();
        let code = code.clone();
        tokio::spawn(async move { coordinator.start(&code, &start_request()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    caller.abort();

    let playing = wait_for(
        || {
            let coordinator = coordinator.clone();
            let code = code.clone();
            async move {
                coordinator
                    .snapshot(&code)
                    .await
                    .map(|view| view.status == RoomStatus::Playing)
                    .unwrap_or(false)
            }
        },
        2000,
        20,
    )
    .await;
    assert!(playing, "room stayed in setup after the caller went away");

    let view = coordinator.snapshot(&code).await.unwrap();
    assert!(view.players.iter().all(|p| p.timeline.len() == 1));
}

#[tokio::test]
async fn test_replay_vote_restarts_game() {
    let context = test_context(distinct_tracks(12), Arc::new(RecordingProvider::default()));
    let coordinator = context.coordinator.clone();
    let code = lobby_with_two_players(&coordinator, 2).await;
    coordinator.start(&code, &start_request()).await.unwrap();

    let (winner, _) = play_turn(&coordinator, &code, true).await;
    let loser = if winner == "p1" { "p2" } else { "p1" };
    let mut events = subscribe(&coordinator, &code);

    let winner_vote = VoteReplayRequest {
        player_id: winner.clone(),
        vote: Vote::Yes,
    };
    assert_matches!(
        coordinator.vote_replay(&code, &winner_vote).await,
        Err(ApiError::Forbidden(_))
    );

    let vote = VoteReplayRequest {
        player_id: loser.to_string(),
        vote: Vote::Yes,
    };
    coordinator.vote_replay(&code, &vote).await.unwrap();

    let received = drain(&mut events);
    assert_matches!(
        received.first(),
        Some(ServerEvent::VoteStatus {
            yes: 1,
            needed: 1,
            ..
        })
    );
    assert!(event_names(&received).contains(&"newGameStarted"));

    let view = coordinator.snapshot(&code).await.unwrap();
    assert_eq!(view.status, RoomStatus::Playing);
    assert_eq!(view.winner_id, None);
    assert!(view.players.iter().all(|p| p.score == 1));
}

#[tokio::test]
async fn test_new_game_request_only_by_winner() {
    let context = test_context(distinct_tracks(12), Arc::new(RecordingProvider::default()));
    let coordinator = context.coordinator.clone();
    let code = lobby_with_two_players(&coordinator, 2).await;
    coordinator.start(&code, &start_request()).await.unwrap();
    let (winner, _) = play_turn(&coordinator, &code, true).await;
    let loser = if winner == "p1" { "p2" } else { "p1" };

    let by_loser = NewGameRequest {
        player_id: loser.to_string(),
        playlist_id: None,
        target_points: None,
    };
    assert_matches!(
        coordinator.new_game_request(&code, &by_loser).await,
        Err(ApiError::Forbidden(_))
    );

    let by_winner = NewGameRequest {
        player_id: winner,
        playlist_id: None,
        target_points: Some(5),
    };
    coordinator.new_game_request(&code, &by_winner).await.unwrap();

    let view = coordinator.snapshot(&code).await.unwrap();
    assert_eq!(view.status, RoomStatus::Playing);
    assert_eq!(view.target_points, 5);
}

#[tokio::test]
async fn test_concurrent_confirm_resolves_once() {
    let context = test_context(distinct_tracks(12), Arc::new(RecordingProvider::default()));
    let coordinator = context.coordinator.clone();
    let code = lobby_with_two_players(&coordinator, 5).await;
    coordinator.start(&code, &start_request()).await.unwrap();

    let (turn_id, player_id, _) = current_turn(&coordinator, &code).await;
    coordinator.mark_play_started(&code, "host-1", &turn_id).await.unwrap();
    let request = confirm(&code, &player_id, &turn_id, 0);

    let (a, b) = tokio::join!(
        coordinator.confirm_placement(&request),
        coordinator.confirm_placement(&request)
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(e) if e.is_conflict())));
}

#[tokio::test]
async fn test_confirm_before_playback_is_conflict() {
    let context = test_context(distinct_tracks(12), Arc::new(RecordingProvider::default()));
    let coordinator = context.coordinator.clone();
    let code = lobby_with_two_players(&coordinator, 5).await;
    coordinator.start(&code, &start_request()).await.unwrap();

    let (turn_id, player_id, _) = current_turn(&coordinator, &code).await;
    let result = coordinator
        .confirm_placement(&confirm(&code, &player_id, &turn_id, 0))
        .await;
    assert_matches!(result, Err(ApiError::Conflict(_)));

    let other = if player_id == "p1" { "p2" } else { "p1" };
    coordinator.mark_play_started(&code, "host-1", &turn_id).await.unwrap();
    let result = coordinator
        .confirm_placement(&confirm(&code, other, &turn_id, 0))
        .await;
    assert_matches!(result, Err(ApiError::Conflict(_)));

    let result = coordinator
        .confirm_placement(&confirm(&code, "host-1", &turn_id, 0))
        .await;
    assert_matches!(result, Err(ApiError::Forbidden(_)));
}

#[tokio::test]
async fn test_small_deck_keeps_lobby() {
    let context = test_context(distinct_tracks(3), Arc::new(RecordingProvider::default()));
    let coordinator = context.coordinator.clone();
    let code = lobby_with_two_players(&coordinator, 5).await;

    let result = coordinator.start(&code, &start_request()).await;
    assert_matches!(result, Err(ApiError::DeckTooSmall { available: 3, .. }));

    let view = coordinator.snapshot(&code).await.unwrap();
    assert_eq!(view.status, RoomStatus::Lobby);
    assert!(view.players.iter().all(|p| p.timeline.is_empty()));
}

#[tokio::test]
async fn test_start_requires_host_and_two_players() {
    let context = test_context(distinct_tracks(12), Arc::new(RecordingProvider::default()));
    let coordinator = context.coordinator.clone();
    let created = coordinator
        .registry()
        .create_room(Some("host-1".to_string()), 5)
        .unwrap();
    coordinator
        .join(&created.code, &player("p1", "Ann"))
        .await
        .unwrap();

    let not_host = StartRequest {
        host_id: "p1".to_string(),
        ..StartRequest::default()
    };
    assert_matches!(
        coordinator.start(&created.code, &not_host).await,
        Err(ApiError::Forbidden(_))
    );
    assert_matches!(
        coordinator.start(&created.code, &start_request()).await,
        Err(ApiError::Conflict(_))
    );
}

#[tokio::test]
async fn test_deck_exhaustion_finishes_without_winner() {
    // Two dealt, then exactly four turns worth of cards
    let context = test_context(distinct_tracks(6), Arc::new(RecordingProvider::default()));
    let coordinator = context.coordinator.clone();
    let code = lobby_with_two_players(&coordinator, 100).await;
    coordinator.start(&code, &start_request()).await.unwrap();

    for _ in 0..4 {
        play_turn(&coordinator, &code, false).await;
        coordinator.advance_turn(&code).await.unwrap();
    }

    let view = coordinator.snapshot(&code).await.unwrap();
    assert_eq!(view.status, RoomStatus::Finished);
    assert_eq!(view.winner_id, None);
    assert!(view.turn.is_none());
}

#[tokio::test]
async fn test_queue_next_confirms_and_debounces() {
    let provider = Arc::new(RecordingProvider::default());
    let context = test_context(distinct_tracks(12), provider.clone());
    let coordinator = context.coordinator.clone();
    let code = lobby_with_two_players(&coordinator, 5).await;
    coordinator.start(&code, &start_request()).await.unwrap();
    let (turn_id, _, _) = current_turn(&coordinator, &code).await;

    let request = QueueNextRequest {
        room_code: code.clone(),
        host_id: "host-1".to_string(),
        device_id: "device-1".to_string(),
        turn_id: turn_id.clone(),
        volume_percent: None,
    };

    let outcome = coordinator.queue_next(&request).await.unwrap();
    assert_eq!(
        outcome,
        QueueOutcome::Reconciled {
            via: ReconcileVia::Queue
        }
    );
    assert_eq!(provider.count("enqueue_and_skip"), 1);

    // Confirmed playback opens placement
    let view = coordinator.snapshot(&code).await.unwrap();
    let turn = view.turn.unwrap();
    assert!(turn.play_started);
    assert_eq!(turn.phase, TurnPhase::Placing);

    let calls_before = provider.calls().len();
    let outcome = coordinator.queue_next(&request).await.unwrap();
    assert_eq!(outcome, QueueOutcome::Duplicate);
    assert_eq!(provider.calls().len(), calls_before);
}

#[tokio::test]
async fn test_queue_next_rejects_bad_requests() {
    let provider = Arc::new(RecordingProvider::failing_transfer());
    let context = test_context(distinct_tracks(12), provider.clone());
    let coordinator = context.coordinator.clone();
    let code = lobby_with_two_players(&coordinator, 5).await;
    coordinator.start(&code, &start_request()).await.unwrap();
    let (turn_id, _, _) = current_turn(&coordinator, &code).await;

    let mut request = QueueNextRequest {
        room_code: code.clone(),
        host_id: "host-1".to_string(),
        device_id: " ".to_string(),
        turn_id: turn_id.clone(),
        volume_percent: None,
    };
    assert_matches!(
        coordinator.queue_next(&request).await,
        Err(ApiError::ValidationError(_))
    );

    request.device_id = "device-1".to_string();
    request.host_id = "p1".to_string();
    assert_matches!(
        coordinator.queue_next(&request).await,
        Err(ApiError::Forbidden(_))
    );

    request.host_id = "host-1".to_string();
    request.turn_id = "stale".to_string();
    assert_matches!(
        coordinator.queue_next(&request).await,
        Err(ApiError::Conflict(_))
    );

    // Transfer is the one step whose failure aborts the ladder
    request.turn_id = turn_id;
    assert_matches!(
        coordinator.queue_next(&request).await,
        Err(ApiError::Playback(_))
    );
    assert_eq!(provider.count("enqueue_and_skip"), 0);
}

#[tokio::test]
async fn test_result_pauses_host_device() {
    let provider = Arc::new(RecordingProvider::default());
    let context = test_context(distinct_tracks(12), provider.clone());
    let coordinator = context.coordinator.clone();
    let code = lobby_with_two_players(&coordinator, 5).await;
    coordinator.start(&code, &start_request()).await.unwrap();

    play_turn(&coordinator, &code, true).await;

    let paused = wait_for(
        move || {
            let provider = provider.clone();
            async move { provider.count("pause") >= 1 }
        },
        1000,
        5,
    )
    .await;
    assert!(paused);
}
