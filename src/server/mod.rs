//! HTTP surface: JSON API over the current snapshot plus the bundled front-end.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::sources::firestore::FirestoreClient;
use crate::store::{Refresher, SnapshotStore};

mod routes;

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    refresher: Refresher,
    frontend_dir: PathBuf,
}

impl AppState {
    pub fn new(refresher: Refresher, frontend_dir: PathBuf) -> Self {
        Self {
            refresher,
            frontend_dir,
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    let assets = ServeDir::new(state.frontend_dir.join("static"));

    Router::new()
        .route("/", get(routes::home))
        .route("/health", get(routes::health))
        .route("/api/search", get(routes::search))
        .route("/api/filters", get(routes::filters))
        .route("/api/stats", get(routes::stats))
        .route("/api/data", get(routes::data))
        .route("/api/refresh", post(routes::refresh))
        .nest_service("/static", assets)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `host:port`, starts the background load, and serves until Ctrl-C.
///
/// The listener accepts requests before the first load finishes; early requests see an
/// empty snapshot.
///
/// # Errors
///
/// Returns an error when the source client cannot be built or the bind fails.
pub async fn run(config: Config, host: &str, port: u16) -> anyhow::Result<()> {
    let ip: IpAddr = host
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid host address: {e}"))?;
    let bind = SocketAddr::new(ip, port);

    let source = FirestoreClient::new(&config.firestore)?;
    let store = Arc::new(SnapshotStore::new());
    let refresher = Refresher::new(Arc::new(source), store, config.on_fetch_failure);

    let initial_load = refresher.spawn_initial_load();
    let app = router(
        AppState::new(refresher, config.frontend_dir.clone()),
        &config.cors_origins,
    );

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!("Pipeline search listening on http://{bind}");

    let shutdown = CancellationToken::new();
    let cancel = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Shutting down");
    if !initial_load.is_finished() {
        initial_load.abort();
    }
    Ok(())
}
