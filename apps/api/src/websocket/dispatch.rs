//! Routing of client events to the turn coordinator
//!
//! One `RoomEventHandler` exists per socket. Operation failures are
//! broadcast to the whole room as `game:error`; parse failures and
//! heartbeats only concern the sender.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::connection::RoomBroadcaster;
use super::messages::{ClientEvent, ServerEvent};
use crate::error::{ApiError, ApiResult};
use crate::services::coordinator::TurnCoordinator;

/// Handles events arriving on a single room connection
pub struct RoomEventHandler {
    code: String,
    connection_id: Uuid,
    coordinator: Arc<TurnCoordinator>,
}

impl RoomEventHandler {
    pub fn new(code: String, connection_id: Uuid, coordinator: Arc<TurnCoordinator>) -> Self {
        Self {
            code,
            connection_id,
            coordinator,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    fn broadcaster(&self) -> &RoomBroadcaster {
        self.coordinator.broadcaster()
    }

    pub fn touch(&self) {
        self.broadcaster().touch(&self.code, self.connection_id);
    }

    /// Parse and handle one text frame
    pub async fn handle_text(&self, text: &str) {
        self.touch();

        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => {
                let name = event.name();
                if let Err(e) = self.handle_event(event).await {
                    e.log();
                    tracing::debug!(
                        room = %self.code,
                        event = name,
                        error = %e,
                        "Client event rejected"
                    );
                    self.broadcaster()
                        .broadcast(&self.code, ServerEvent::error(e.to_string()));
                }
            }
            Err(e) => {
                tracing::debug!(
                    room = %self.code,
                    connection_id = %self.connection_id,
                    error = %e,
                    "Failed to parse client event"
                );
                let error = ApiError::InvalidBody(e.to_string());
                self.reply(ServerEvent::error(error.to_string()));
            }
        }
    }

    /// Dispatch a parsed client event
    pub async fn handle_event(&self, event: ClientEvent) -> ApiResult<()> {
        match event {
            ClientEvent::Join(request) => {
                self.coordinator.join(&self.code, &request).await?;
            }
            ClientEvent::Start(request) => {
                self.coordinator.start(&self.code, &request).await?;
            }
            ClientEvent::NewGameRequest(request) => {
                self.coordinator.new_game_request(&self.code, &request).await?;
            }
            ClientEvent::VoteReplay(request) => {
                self.coordinator.vote_replay(&self.code, &request).await?;
            }
            ClientEvent::Ping => {
                self.reply(ServerEvent::Pong {
                    server_time: Utc::now().timestamp_millis(),
                });
            }
        }
        Ok(())
    }

    fn reply(&self, event: ServerEvent) {
        if let Err(e) = self
            .broadcaster()
            .send_to(&self.code, self.connection_id, event)
        {
            tracing::debug!(
                room = %self.code,
                connection_id = %self.connection_id,
                error = %e,
                "Failed to reply to connection"
            );
        }
    }
}
