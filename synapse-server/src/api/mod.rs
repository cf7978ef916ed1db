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
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use synapse_core::{ActorId, CoreError};

use crate::config::{LinkingConfig, ServerConfig};
use crate::files::FileStore;
use crate::llm::{CompletionOptions, LLMProvider};
use crate::orchestrator::{Orchestrator, OrchestratorError};
use crate::store::{Store, StoreError};

pub mod artifacts;
pub mod assist;
pub mod chat;
pub mod conjectures;
pub mod conversations;
pub mod criticisms;
pub mod graph;
pub mod health;
pub mod problems;
pub mod upload;

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{message}")]
    Internal {
        message: String,
        details: Option<String>,
    },

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    pub fn internal(message: impl Into<String>, details: impl std::fmt::Display) -> Self {
        Self::Internal {
            message: message.into(),
            details: Some(details.to_string()),
        }
    }

    /// Store failure mapped with a route-specific message for the 500 case.
    pub fn from_store(message: &str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, .. } => Self::NotFound(not_found_message(entity)),
            StoreError::Constraint(detail) => Self::BadRequest(detail),
            other => {
                tracing::error!(error = %other, "{}", message);
                Self::internal(message, other)
            }
        }
    }
}

fn not_found_message(entity: &str) -> String {
    let mut chars = entity.chars();
    match chars.next() {
        Some(first) => format!("{}{} not found", first.to_uppercase(), chars.as_str()),
        None => "Not found".to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Internal { message, details } => {
                (StatusCode::INTERNAL_SERVER_ERROR, message, details)
            }
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg, None),
        };

        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Validation(msg) => ApiError::BadRequest(msg),
            OrchestratorError::ConversationNotFound(_) => {
                ApiError::NotFound("Conversation not found".to_string())
            }
            OrchestratorError::Store { step, source } => {
                tracing::error!(error = %source, "{}", step);
                ApiError::internal(step, source)
            }
            OrchestratorError::Generation(e) => {
                tracing::error!(error = %e, "Text generation failed");
                ApiError::internal("Failed to generate AI response", e)
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// `{ "success": true }`
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

/// Which external integrations are configured. Values are never exposed.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Integrations {
    pub database_url: bool,
    pub database_key: bool,
    pub llm_api_key: bool,
    pub ollama: bool,
}

impl Integrations {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            database_url: config.storage.database_url.is_some(),
            database_key: config.storage.database_key.is_some(),
            llm_api_key: config.llm.api_key.is_some(),
            ollama: config.llm.ollama_base_url.is_some(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub llm: Arc<dyn LLMProvider>,
    pub orchestrator: Arc<Orchestrator>,
    pub files: FileStore,
    /// Model used for classify/summarize calls
    pub model: Option<String>,
    pub default_actor: ActorId,
    pub integrations: Integrations,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        llm: Arc<dyn LLMProvider>,
        files: FileStore,
        linking: &LinkingConfig,
        options: CompletionOptions,
    ) -> Self {
        let orchestrator = Orchestrator::new(
            store.clone(),
            llm.clone(),
            files.clone(),
            linking.matcher(),
            linking.creation_policy(),
            options.clone(),
        );
        Self {
            store,
            llm,
            orchestrator: Arc::new(orchestrator),
            files,
            model: options.model,
            default_actor: linking.default_actor,
            integrations: Integrations::default(),
        }
    }

    pub fn with_integrations(mut self, integrations: Integrations) -> Self {
        self.integrations = integrations;
        self
    }
}
