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


use axum::{extract::State, Json};
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::{ApiError, AppState, Integrations};

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

/// Health check response structure
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub storage: StorageHealth,
    pub llm_provider: String,
}

#[derive(Debug, Serialize)]
pub struct StorageHealth {
    pub backend: &'static str,
    pub reachable: bool,
}

#[derive(Debug, Serialize)]
pub struct EnvCheckResponse {
    pub environment: Integrations,
    pub message: &'static str,
}

/// GET /health
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "ok" })
}

/// GET /api/health - Pings the store; 503 when it is unreachable
pub async fn health_check_detailed(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, ApiError> {
    debug!("Health check requested");

    let backend = state.store.backend();
    state.store.ping().await.map_err(|e| {
        warn!(error = %e, backend, "Store unreachable");
        ApiError::Unavailable(format!("{} store unreachable", backend))
    })?;

    Ok(Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        storage: StorageHealth {
            backend,
            reachable: true,
        },
        llm_provider: state.llm.name().to_string(),
    }))
}

/// GET /api/env-check - Which integrations are configured, never their values
pub async fn env_check(State(state): State<AppState>) -> Json<EnvCheckResponse> {
    Json(EnvCheckResponse {
        environment: state.integrations.clone(),
        message: "Environment check completed",
    })
}
