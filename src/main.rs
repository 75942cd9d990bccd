//! Loopy Back binary entrypoint wiring REST, SSE and the document store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loopy_back::{
    config::{AppConfig, CouchSettings},
    dao::{
        connectivity::{Connectivity, HttpProbe},
        document_store::{
            DocumentStore,
            couchdb::CouchStore,
            memory::MemoryStore,
        },
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let couch = config.couch().cloned();
    let connectivity: Arc<dyn Connectivity> = Arc::new(HttpProbe::new(config.probe_url()));
    let app_state = AppState::new(config, connectivity);

    spawn_store_supervisor(app_state.clone(), couch);
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Connect to CouchDB when it is configured, otherwise keep everything in
/// memory for the lifetime of the process.
fn spawn_store_supervisor(state: SharedState, couch: Option<CouchSettings>) {
    match couch {
        Some(couch) => {
            info!(base_url = %couch.base_url, database = %couch.database, "using CouchDB document store");
            tokio::spawn(storage_supervisor::run(state, move || {
                let couch = couch.clone();
                async move {
                    let store = CouchStore::connect(&couch).await.map_err(StorageError::from)?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn DocumentStore>)
                }
            }));
        }
        None => {
            warn!("CouchDB is not configured; falling back to the in-memory document store");
            let store = MemoryStore::new();
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn DocumentStore>) }
            }));
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
