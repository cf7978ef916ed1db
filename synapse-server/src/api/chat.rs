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


use axum::{extract::State, Extension, Json};
use serde::Serialize;
use tracing::info;

use crate::api::{ApiError, AppState};
use crate::auth::ActorContext;
use crate::orchestrator::{ChatOutcome, ChatRequest};

#[derive(Debug, Serialize)]
pub struct ChatHandlerResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: ChatOutcome,
}

/// POST /api/chat-handler - Run one chat turn
pub async fn chat_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<ActorContext>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatHandlerResponse>, ApiError> {
    info!(
        actor = %ctx.actor,
        problem_id = ?request.problem_id,
        conversation_id = ?request.conversation_id,
        attachments = request.attached_files.len(),
        "Chat handler called"
    );

    let outcome = state.orchestrator.handle(ctx.actor, request).await?;

    Ok(Json(ChatHandlerResponse {
        success: true,
        outcome,
    }))
}
