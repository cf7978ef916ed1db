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


//! Stateless LLM helpers: message classification and conversation titles.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, AppState};
use crate::llm::{classify_message, summarize_conversation, ChatMessage, Classification};

#[derive(Debug, Default, Deserialize)]
pub struct ProblemRef {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
    #[serde(default)]
    pub existing_problems: Vec<ProblemRef>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    pub title: String,
}

/// POST /api/classify
pub async fn classify(
    State(state): State<AppState>,
    Json(req): Json<ClassifyRequest>,
) -> Result<Json<Classification>, ApiError> {
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message is required".to_string()));
    }
    let titles: Vec<String> = req.existing_problems.into_iter().map(|p| p.title).collect();

    let classification = classify_message(
        state.llm.as_ref(),
        state.model.clone(),
        &req.message,
        &req.chat_history,
        &titles,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Classification failed");
        ApiError::internal("Failed to classify message", e)
    })?;

    Ok(Json(classification))
}

/// POST /api/summarize
pub async fn summarize(
    State(state): State<AppState>,
    Json(req): Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>, ApiError> {
    if req.messages.is_empty() {
        return Err(ApiError::BadRequest("Messages are required".to_string()));
    }

    let title = summarize_conversation(state.llm.as_ref(), state.model.clone(), &req.messages)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Summarization failed");
            ApiError::internal("Failed to generate title", e)
        })?;

    Ok(Json(SummarizeResponse { title }))
}
