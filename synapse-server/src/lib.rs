// Copyright 2025 Synapse Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Synapse HTTP server.
//!
//! Wires the store, the text-generation provider, and the conversation
//! orchestrator into an axum router.

pub mod api;
pub mod auth;
pub mod config;
pub mod files;
pub mod llm;
pub mod orchestrator;
pub mod store;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{
    artifacts, assist, chat, conjectures, conversations, criticisms, graph, health, problems,
    upload, AppState, Integrations,
};
use auth::actor_middleware;
use config::{HttpServerConfig, LogFormat, ServerConfig};
use files::FileStore;
use llm::{build_provider, CompletionOptions};
use store::{MemoryStore, PostgrestStore, Store};

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "synapse_server=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Build shared state from configuration.
///
/// Uses the PostgREST store when database credentials are present and the
/// in-memory store otherwise.
pub fn build_state(config: &ServerConfig) -> Result<AppState> {
    let store: Arc<dyn Store> = match (&config.storage.database_url, &config.storage.database_key)
    {
        (Some(url), Some(key)) => {
            tracing::info!("Using PostgREST store at {}", url);
            Arc::new(PostgrestStore::new(url, key)?)
        }
        _ => {
            tracing::warn!("No database configured, using in-memory store. Data is lost on restart.");
            Arc::new(MemoryStore::new())
        }
    };

    let llm = build_provider(&config.llm)?;
    tracing::info!("Text generation provider: {}", llm.name());

    let files = FileStore::new(config.storage.public_dir.clone());
    let state = AppState::new(
        store,
        llm,
        files,
        &config.linking,
        CompletionOptions::from(&config.llm),
    )
    .with_integrations(Integrations::from_config(config));
    Ok(state)
}

fn cors_layer(config: &HttpServerConfig) -> CorsLayer {
    if !config.enable_cors {
        return CorsLayer::new();
    }

    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.cors_origins.is_empty() {
        tracing::warn!("CORS: Allowing all origins (development mode). Set cors_origins in production!");
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("CORS: Ignoring invalid origin {:?}", origin);
                None
            }
        })
        .collect();
    tracing::info!("CORS: Allowing origins: {:?}", config.cors_origins);
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Build the full application router.
pub fn build_router(state: AppState, config: &HttpServerConfig) -> Router {
    let uploads = ServeDir::new(state.files.uploads_dir());

    // Routes that act on behalf of an actor
    let actor_routes = Router::new()
        .route("/api/chat-handler", post(chat::chat_handler))
        .route(
            "/api/problems",
            get(problems::list_problems).post(problems::create_problem),
        )
        .route("/api/problems/counts", get(problems::problem_counts))
        .route(
            "/api/problems/:id",
            get(problems::get_problem)
                .patch(problems::update_problem)
                .delete(problems::delete_problem),
        )
        .route("/api/conversations", get(conversations::list_conversations))
        .route(
            "/api/conversations/:id",
            delete(conversations::delete_conversation),
        )
        .route(
            "/api/conversations/:id/messages",
            get(conversations::list_messages),
        )
        .route(
            "/api/conjectures",
            get(conjectures::list_conjectures).post(conjectures::create_conjecture),
        )
        .route(
            "/api/criticisms",
            get(criticisms::list_criticisms).post(criticisms::create_criticism),
        )
        .route(
            "/api/artifacts",
            get(artifacts::list_artifacts).post(artifacts::create_artifact),
        )
        .route("/api/artifacts/:id", delete(artifacts::delete_artifact))
        .route(
            "/api/upload",
            post(upload::upload_file).layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        )
        .route("/api/graph", get(graph::knowledge_graph))
        .route("/api/classify", post(assist::classify))
        .route("/api/summarize", post(assist::summarize))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            actor_middleware,
        ));

    Router::new()
        .route("/health", get(health::liveness))
        .route("/api/health", get(health::health_check_detailed))
        .route("/api/env-check", get(health::env_check))
        .merge(actor_routes)
        .with_state(state)
        .nest_service("/uploads", uploads)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(config)),
        )
}

pub async fn run_server(config: ServerConfig) -> Result<()> {
    init_tracing(config.server.log_format);
    tracing::info!("Starting Synapse Server");

    config.validate()?;
    let state = build_state(&config)?;
    let app = build_router(state, &config.server);

    let addr = config.socket_addr()?;
    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
