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
    Json,
};
use serde::{Deserialize, Serialize};
use synapse_core::{Conversation, ConversationId, Message, ProblemId};
use tracing::info;

use crate::api::{ApiError, AppState, SuccessResponse};
use crate::store::ConversationFilter;

#[derive(Debug, Default, Deserialize)]
pub struct ConversationQuery {
    pub problem_id: Option<ProblemId>,
    pub unlinked: Option<bool>,
}

impl ConversationQuery {
    fn filter(&self) -> Option<ConversationFilter> {
        if self.unlinked == Some(true) {
            Some(ConversationFilter::Unlinked)
        } else {
            self.problem_id.map(ConversationFilter::Problem)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

/// GET /api/conversations?problem_id=N | ?unlinked=true
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<ConversationsResponse>, ApiError> {
    let filter = query.filter().ok_or_else(|| {
        ApiError::BadRequest("Either problem_id or unlinked=true is required".to_string())
    })?;
    let conversations = state
        .store
        .list_conversations(filter)
        .await
        .map_err(|e| ApiError::from_store("Failed to fetch conversations", e))?;
    Ok(Json(ConversationsResponse { conversations }))
}

/// DELETE /api/conversations/:id - Delete a conversation and its messages
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state
        .store
        .delete_conversation(id)
        .await
        .map_err(|e| ApiError::from_store("Failed to delete conversation", e))?;
    info!(conversation_id = id, "Deleted conversation");
    Ok(SuccessResponse::ok())
}

/// GET /api/conversations/:id/messages - Messages in chronological order
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let messages = state
        .store
        .list_messages(id)
        .await
        .map_err(|e| ApiError::from_store("Failed to fetch messages", e))?;
    Ok(Json(MessagesResponse { messages }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_filter() {
        let unlinked = ConversationQuery {
            problem_id: Some(3),
            unlinked: Some(true),
        };
        assert_eq!(unlinked.filter(), Some(ConversationFilter::Unlinked));

        let by_problem = ConversationQuery {
            problem_id: Some(3),
            unlinked: Some(false),
        };
        assert_eq!(by_problem.filter(), Some(ConversationFilter::Problem(3)));

        assert_eq!(ConversationQuery::default().filter(), None);
    }
}
