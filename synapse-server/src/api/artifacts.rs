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


use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use synapse_core::{Artifact, ArtifactId, NewArtifact, ProblemId};
use tracing::info;

use crate::api::{ApiError, AppState, SuccessResponse};
use crate::auth::ActorContext;

#[derive(Debug, Default, Deserialize)]
pub struct ArtifactQuery {
    pub problem_id: Option<ProblemId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateArtifactRequest {
    #[serde(default)]
    pub problem_id: Option<ProblemId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ArtifactsResponse {
    pub artifacts: Vec<Artifact>,
}

#[derive(Debug, Serialize)]
pub struct ArtifactResponse {
    pub artifact: Artifact,
}

/// GET /api/artifacts[?problem_id=N] - Newest first
pub async fn list_artifacts(
    State(state): State<AppState>,
    Query(query): Query<ArtifactQuery>,
) -> Result<Json<ArtifactsResponse>, ApiError> {
    let artifacts = state
        .store
        .list_artifacts(query.problem_id)
        .await
        .map_err(|e| ApiError::from_store("Failed to fetch artifacts", e))?;
    Ok(Json(ArtifactsResponse { artifacts }))
}

/// POST /api/artifacts - Attach a link or stored file to a problem
pub async fn create_artifact(
    State(state): State<AppState>,
    Extension(ctx): Extension<ActorContext>,
    Json(req): Json<CreateArtifactRequest>,
) -> Result<Json<ArtifactResponse>, ApiError> {
    let name = req.name.trim();
    let url = req.url.trim();
    let problem_id = match req.problem_id {
        Some(id) if !name.is_empty() && !url.is_empty() => id,
        _ => {
            return Err(ApiError::BadRequest(
                "Problem ID, name, and URL are required".to_string(),
            ))
        }
    };

    let artifact = state
        .store
        .create_artifact(NewArtifact {
            problem_id,
            name: name.to_string(),
            url: url.to_string(),
            mime_type: req.mime_type,
            created_by: ctx.actor,
        })
        .await
        .map_err(|e| ApiError::from_store("Failed to create artifact", e))?;

    info!(artifact_id = artifact.id, problem_id, "Created artifact");
    Ok(Json(ArtifactResponse { artifact }))
}

/// DELETE /api/artifacts/:id
pub async fn delete_artifact(
    State(state): State<AppState>,
    Path(id): Path<ArtifactId>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state
        .store
        .delete_artifact(id)
        .await
        .map_err(|e| ApiError::from_store("Failed to delete artifact", e))?;
    Ok(SuccessResponse::ok())
}
