//! Application assembly
//!
//! Wires the card source, playback provider and game services together and
//! exposes the HTTP/WebSocket router. `main` adds transport layers (CORS,
//! tracing) on top; integration tests drive the bare router.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Extension, routing::get, Router};

use crate::config::{Config, GameSettings};
use crate::error::ApiResult;
use crate::routes::{
    health_router, hosts_router, playback_router, rooms_router, turns_router, HealthState,
    HostsState, PlaybackState, RoomsState, TurnsState,
};
use crate::services::{
    CatalogSource, DeckEngine, JsonFileCatalog, PlaybackProvider, PlaybackReconciler, RetryPolicy,
    RoomRegistry, SpotifyService, TurnCoordinator, UnconfiguredCatalog, UnconfiguredPlayback,
};
use crate::websocket::{ws_handler, RoomBroadcaster};

/// Long-lived services shared by every request
#[derive(Clone)]
pub struct AppContext {
    pub coordinator: Arc<TurnCoordinator>,
    pub spotify: Option<Arc<SpotifyService>>,
    pub catalog_id: &'static str,
    pub settings: GameSettings,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("coordinator", &self.coordinator)
            .field("spotify", &self.spotify.is_some())
            .field("catalog_id", &self.catalog_id)
            .finish()
    }
}

impl AppContext {
    /// Build the services from explicit collaborators
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        provider: Arc<dyn PlaybackProvider>,
        spotify: Option<Arc<SpotifyService>>,
        settings: GameSettings,
        retry: RetryPolicy,
    ) -> Self {
        let catalog_id = catalog.source_id();
        let decks = DeckEngine::new(
            catalog,
            settings.min_deck_size,
            settings.default_playlist_id.clone(),
        );
        let reconciler = Arc::new(PlaybackReconciler::new(
            provider,
            settings.provider_timeout,
            settings.queue_debounce,
            retry,
        ));
        let coordinator = Arc::new(TurnCoordinator::new(
            Arc::new(RoomRegistry::new()),
            RoomBroadcaster::new(),
            decks,
            reconciler,
        ));

        Self {
            coordinator,
            spotify,
            catalog_id,
            settings,
        }
    }

    /// Build the services from loaded configuration
    ///
    /// A `DECK_FILE` takes precedence over Spotify as the card source;
    /// playback always goes through Spotify when it is configured.
    pub fn from_config(config: &Config) -> ApiResult<Self> {
        let spotify = match &config.common.spotify {
            Some(spotify_config) => {
                let service = Arc::new(SpotifyService::from_config(spotify_config)?);
                tracing::info!("Spotify integration enabled");
                Some(service)
            }
            None => {
                tracing::warn!("Spotify not configured, playback commands are unavailable");
                None
            }
        };

        let catalog: Arc<dyn CatalogSource> = match (&config.deck_file, &spotify) {
            (Some(path), _) => {
                tracing::info!(path = %path.display(), "Using deck file as card source");
                Arc::new(JsonFileCatalog::new(path))
            }
            (None, Some(service)) => service.clone(),
            (None, None) => {
                tracing::warn!("No card source configured, games cannot start");
                Arc::new(UnconfiguredCatalog)
            }
        };

        let provider: Arc<dyn PlaybackProvider> = match &spotify {
            Some(service) => service.clone(),
            None => Arc::new(UnconfiguredPlayback),
        };

        Ok(Self::new(
            catalog,
            provider,
            spotify,
            config.game.clone(),
            RetryPolicy::default(),
        ))
    }

    /// HTTP and WebSocket routes without transport layers
    pub fn router(&self) -> Router {
        let api = Router::new()
            .merge(rooms_router(RoomsState::new(
                self.coordinator.clone(),
                self.settings.default_target_points,
            )))
            .nest("/turn", turns_router(TurnsState::new(self.coordinator.clone())))
            .nest(
                "/playback",
                playback_router(PlaybackState::new(self.coordinator.clone())),
            )
            .nest("/hosts", hosts_router(HostsState::new(self.spotify.clone())));

        Router::new()
            .route("/", get(root))
            .route("/ws/:code", get(ws_handler))
            .nest("/api", api)
            .nest(
                "/health",
                health_router(HealthState::new(self.coordinator.clone(), self.catalog_id)),
            )
            .layer(Extension(self.coordinator.clone()))
    }

    /// Periodically evict idle rooms and dead connections
    pub fn spawn_housekeeping(&self) -> tokio::task::JoinHandle<()> {
        let coordinator = self.coordinator.clone();
        let interval = self.settings.cleanup_interval;
        let idle_ttl = self.settings.room_idle_ttl;
        let spotify = self.spotify.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                run_housekeeping(&coordinator, spotify.as_deref(), idle_ttl);
            }
        })
    }
}

fn run_housekeeping(
    coordinator: &TurnCoordinator,
    spotify: Option<&SpotifyService>,
    idle_ttl: Duration,
) {
    let idle_ms = i64::try_from(idle_ttl.as_millis()).unwrap_or(i64::MAX);
    let stale = coordinator.broadcaster().cleanup_stale_connections(idle_ms);
    let evicted = coordinator.evict_idle(idle_ttl);
    if let Some(spotify) = spotify {
        spotify.evict_unused(|host_id| coordinator.registry().has_host(host_id));
    }

    if stale > 0 || evicted > 0 {
        tracing::info!(
            evicted_rooms = evicted,
            stale_connections = stale,
            rooms = coordinator.registry().room_count(),
            "Housekeeping completed"
        );
    }
}

async fn root() -> &'static str {
    "Songline - timeline music party game server"
}
