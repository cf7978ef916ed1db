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
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use synapse_core::{
    Collaborator, CollaboratorRole, NewProblem, Priority, Problem, ProblemCounts, ProblemId,
    ProblemStatus, ProblemUpdate,
};
use tracing::{info, warn};

use crate::api::{ApiError, AppState, SuccessResponse};
use crate::auth::ActorContext;

#[derive(Debug, Serialize)]
pub struct ProblemsResponse {
    pub problems: Vec<Problem>,
}

#[derive(Debug, Serialize)]
pub struct ProblemResponse {
    pub problem: Problem,
}

#[derive(Debug, Serialize)]
pub struct CountsResponse {
    pub counts: BTreeMap<ProblemId, ProblemCounts>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateProblemRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProblemRequest {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

/// GET /api/problems - All problems, most recently updated first
pub async fn list_problems(
    State(state): State<AppState>,
) -> Result<Json<ProblemsResponse>, ApiError> {
    let problems = state
        .store
        .list_problems()
        .await
        .map_err(|e| ApiError::from_store("Failed to fetch problems", e))?;
    Ok(Json(ProblemsResponse { problems }))
}

/// POST /api/problems - Create a problem owned by the caller
pub async fn create_problem(
    State(state): State<AppState>,
    Extension(ctx): Extension<ActorContext>,
    Json(req): Json<CreateProblemRequest>,
) -> Result<Json<ProblemResponse>, ApiError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("Title is required".to_string()));
    }

    let status = match req.status.as_deref() {
        Some(raw) => raw.parse::<ProblemStatus>()?,
        None => ProblemStatus::default(),
    };
    let priority = match req.priority.as_deref() {
        Some(raw) => raw.parse::<Priority>()?,
        None => Priority::default(),
    };

    let problem = state
        .store
        .create_problem(NewProblem {
            title: title.to_string(),
            description: req.description.filter(|d| !d.trim().is_empty()),
            status,
            priority,
            created_by: ctx.actor,
        })
        .await
        .map_err(|e| ApiError::from_store("Failed to create problem", e))?;

    let owner = Collaborator {
        problem_id: problem.id,
        user_id: ctx.actor,
        role: CollaboratorRole::Owner,
    };
    if let Err(e) = state.store.add_collaborator(owner).await {
        warn!(problem_id = problem.id, error = %e, "Failed to add owner collaborator");
    }

    info!(problem_id = problem.id, title = %problem.title, "Created problem");
    Ok(Json(ProblemResponse { problem }))
}

/// GET /api/problems/:id
pub async fn get_problem(
    State(state): State<AppState>,
    Path(id): Path<ProblemId>,
) -> Result<Json<ProblemResponse>, ApiError> {
    let problem = state
        .store
        .get_problem(id)
        .await
        .map_err(|e| ApiError::from_store("Failed to fetch problem", e))?;
    Ok(Json(ProblemResponse { problem }))
}

/// PATCH /api/problems/:id - Update status and/or priority
pub async fn update_problem(
    State(state): State<AppState>,
    Path(id): Path<ProblemId>,
    Json(req): Json<UpdateProblemRequest>,
) -> Result<Json<ProblemResponse>, ApiError> {
    let update = ProblemUpdate {
        status: req.status.as_deref().map(str::parse).transpose()?,
        priority: req.priority.as_deref().map(str::parse).transpose()?,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest(
            "Status or priority is required".to_string(),
        ));
    }

    let problem = state
        .store
        .update_problem(id, update)
        .await
        .map_err(|e| ApiError::from_store("Failed to update problem", e))?;
    Ok(Json(ProblemResponse { problem }))
}

/// DELETE /api/problems/:id - Delete with its conjectures, criticisms and
/// artifacts; linked conversations are kept and unlinked
pub async fn delete_problem(
    State(state): State<AppState>,
    Path(id): Path<ProblemId>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state
        .store
        .delete_problem(id)
        .await
        .map_err(|e| ApiError::from_store("Failed to delete problem", e))?;
    info!(problem_id = id, "Deleted problem");
    Ok(SuccessResponse::ok())
}

/// GET /api/problems/counts - Attachment counts per problem
pub async fn problem_counts(
    State(state): State<AppState>,
) -> Result<Json<CountsResponse>, ApiError> {
    let counts = state
        .store
        .problem_counts()
        .await
        .map_err(|e| ApiError::from_store("Failed to fetch problem counts", e))?;
    Ok(Json(CountsResponse { counts }))
}
