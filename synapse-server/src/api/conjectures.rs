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
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use synapse_core::{Conjecture, NewConjecture, ProblemId};
use tracing::info;

use crate::api::{ApiError, AppState};
use crate::auth::ActorContext;

#[derive(Debug, Default, Deserialize)]
pub struct ConjectureQuery {
    pub problem_id: Option<ProblemId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateConjectureRequest {
    #[serde(default)]
    pub problem_id: Option<ProblemId>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ConjecturesResponse {
    pub conjectures: Vec<Conjecture>,
}

#[derive(Debug, Serialize)]
pub struct ConjectureResponse {
    pub conjecture: Conjecture,
}

/// GET /api/conjectures[?problem_id=N] - Newest first
pub async fn list_conjectures(
    State(state): State<AppState>,
    Query(query): Query<ConjectureQuery>,
) -> Result<Json<ConjecturesResponse>, ApiError> {
    let conjectures = state
        .store
        .list_conjectures(query.problem_id)
        .await
        .map_err(|e| ApiError::from_store("Failed to fetch conjectures", e))?;
    Ok(Json(ConjecturesResponse { conjectures }))
}

/// POST /api/conjectures
pub async fn create_conjecture(
    State(state): State<AppState>,
    Extension(ctx): Extension<ActorContext>,
    Json(req): Json<CreateConjectureRequest>,
) -> Result<Json<ConjectureResponse>, ApiError> {
    let content = req.content.trim();
    let problem_id = match req.problem_id {
        Some(id) if !content.is_empty() => id,
        _ => {
            return Err(ApiError::BadRequest(
                "Problem ID and content are required".to_string(),
            ))
        }
    };

    let conjecture = state
        .store
        .create_conjecture(NewConjecture {
            problem_id,
            content: content.to_string(),
            created_by: ctx.actor,
        })
        .await
        .map_err(|e| ApiError::from_store("Failed to create conjecture", e))?;

    info!(conjecture_id = conjecture.id, problem_id, "Created conjecture");
    Ok(Json(ConjectureResponse { conjecture }))
}
