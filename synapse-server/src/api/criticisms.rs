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
use synapse_core::{ConjectureId, Criticism, NewCriticism, ProblemId};
use tracing::info;

use crate::api::{ApiError, AppState};
use crate::auth::ActorContext;
use crate::store::CriticismFilter;

#[derive(Debug, Default, Deserialize)]
pub struct CriticismQuery {
    pub problem_id: Option<ProblemId>,
    pub conjecture_id: Option<ConjectureId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateCriticismRequest {
    #[serde(default)]
    pub problem_id: Option<ProblemId>,
    #[serde(default)]
    pub conjecture_id: Option<ConjectureId>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CriticismsResponse {
    pub criticisms: Vec<Criticism>,
}

#[derive(Debug, Serialize)]
pub struct CriticismResponse {
    pub criticism: Criticism,
}

/// GET /api/criticisms[?problem_id=N][&conjecture_id=M] - Newest first
pub async fn list_criticisms(
    State(state): State<AppState>,
    Query(query): Query<CriticismQuery>,
) -> Result<Json<CriticismsResponse>, ApiError> {
    let filter = CriticismFilter {
        problem_id: query.problem_id,
        conjecture_id: query.conjecture_id,
    };
    let criticisms = state
        .store
        .list_criticisms(filter)
        .await
        .map_err(|e| ApiError::from_store("Failed to fetch criticisms", e))?;
    Ok(Json(CriticismsResponse { criticisms }))
}

/// POST /api/criticisms
pub async fn create_criticism(
    State(state): State<AppState>,
    Extension(ctx): Extension<ActorContext>,
    Json(req): Json<CreateCriticismRequest>,
) -> Result<Json<CriticismResponse>, ApiError> {
    let content = req.content.trim();
    let problem_id = match req.problem_id {
        Some(id) if !content.is_empty() => id,
        _ => {
            return Err(ApiError::BadRequest(
                "Problem ID and content are required".to_string(),
            ))
        }
    };

    let criticism = state
        .store
        .create_criticism(NewCriticism {
            problem_id,
            conjecture_id: req.conjecture_id,
            content: content.to_string(),
            created_by: ctx.actor,
        })
        .await
        .map_err(|e| ApiError::from_store("Failed to create criticism", e))?;

    info!(criticism_id = criticism.id, problem_id, "Created criticism");
    Ok(Json(CriticismResponse { criticism }))
}
