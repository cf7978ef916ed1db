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


//! Conversation Orchestrator
//!
//! One chat turn, in order:
//!
//! ```text
//! 1. resolve or create the conversation
//! 2. inline attachments into the message
//! 3. save the user message                      (abort on failure)
//! 4. load the history
//! 5. match an existing problem                  (no problem context, auto-link on)
//! 6. generate and save the assistant reply      (abort on failure)
//! 7. maybe create a problem and link it         (still no problem, auto-link on)
//! 8. record attachments as artifacts            (a problem is now known)
//! ```
//!
//! Steps 4, 5, 7 and 8 degrade to a log line on store failures.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use synapse_core::{
    conversation_title, synthesize_title, ActorId, Collaborator, CollaboratorRole,
    ConversationId, CreationPolicy, NewArtifact, NewConversation, NewMessage, NewProblem,
    Priority, Problem, ProblemId, ProblemMatcher, ProblemStatus,
};
use tracing::{debug, error, info, warn};

use crate::files::{AttachedFile, FileStore};
use crate::llm::{system_prompt, ChatMessage, CompletionOptions, LLMProvider, FALLBACK_REPLY};
use crate::store::{Store, StoreError};

pub const STEP_LOAD_CONVERSATION: &str = "Failed to load conversation";
pub const STEP_CREATE_CONVERSATION: &str = "Failed to create conversation";
pub const STEP_SAVE_USER_MESSAGE: &str = "Failed to save user message";
pub const STEP_SAVE_AI_RESPONSE: &str = "Failed to save AI response";

fn default_auto_link() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub problem_id: Option<ProblemId>,
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    #[serde(default = "default_auto_link")]
    pub auto_link: bool,
    #[serde(default)]
    pub attached_files: Vec<AttachedFile>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            problem_id: None,
            conversation_id: None,
            auto_link: true,
            attached_files: Vec::new(),
        }
    }

    /// Ids of zero or below mean "none", as sent by clients without a selection.
    fn explicit_problem(&self) -> Option<ProblemId> {
        self.problem_id.filter(|id| *id > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOutcome {
    pub conversation_id: ConversationId,
    pub problem_id: Option<ProblemId>,
    /// True when the matcher linked the conversation to an existing problem.
    pub problem_linked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_problem_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_problem_id: Option<ProblemId>,
    pub ai_response: String,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("{0}")]
    Validation(String),

    #[error("Conversation {0} not found")]
    ConversationNotFound(ConversationId),

    #[error("{step}: {source}")]
    Store {
        step: &'static str,
        source: StoreError,
    },

    #[error("Failed to generate AI response: {0}")]
    Generation(anyhow::Error),
}

impl OrchestratorError {
    fn store(step: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Store { step, source }
    }
}

pub struct Orchestrator {
    store: Arc<dyn Store>,
    llm: Arc<dyn LLMProvider>,
    files: FileStore,
    matcher: ProblemMatcher,
    policy: CreationPolicy,
    options: CompletionOptions,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        llm: Arc<dyn LLMProvider>,
        files: FileStore,
        matcher: ProblemMatcher,
        policy: CreationPolicy,
        options: CompletionOptions,
    ) -> Self {
        Self {
            store,
            llm,
            files,
            matcher,
            policy,
            options,
        }
    }

    pub async fn handle(
        &self,
        actor: ActorId,
        request: ChatRequest,
    ) -> Result<ChatOutcome, OrchestratorError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(OrchestratorError::Validation(
                "Message is required".to_string(),
            ));
        }
        let explicit_problem = request.explicit_problem();

        // 1. Conversation
        let conversation = match request.conversation_id {
            Some(id) => match self.store.get_conversation(id).await {
                Ok(conversation) => conversation,
                Err(e) if e.is_not_found() => {
                    return Err(OrchestratorError::ConversationNotFound(id))
                }
                Err(e) => return Err(OrchestratorError::store(STEP_LOAD_CONVERSATION)(e)),
            },
            None => {
                let conversation = self
                    .store
                    .create_conversation(NewConversation {
                        problem_id: explicit_problem,
                        title: conversation_title(message),
                        created_by: actor,
                    })
                    .await
                    .map_err(OrchestratorError::store(STEP_CREATE_CONVERSATION))?;
                info!(conversation_id = conversation.id, "Created conversation");
                conversation
            }
        };
        let conversation_id = conversation.id;
        let mut problem_id = explicit_problem.or(conversation.problem_id);
        let auto_link = request.auto_link && problem_id.is_none();

        // 2-3. User message
        let enhanced = self
            .files
            .enhance_message(message, &request.attached_files)
            .await;
        self.store
            .append_message(NewMessage::user(conversation_id, enhanced.clone()))
            .await
            .map_err(OrchestratorError::store(STEP_SAVE_USER_MESSAGE))?;

        // 4. History, including the message just saved
        let history: Vec<ChatMessage> = match self.store.list_messages(conversation_id).await {
            Ok(messages) => messages.iter().map(ChatMessage::from).collect(),
            Err(e) => {
                error!(conversation_id, error = %e, "Failed to load conversation history");
                vec![ChatMessage::user(enhanced)]
            }
        };
        let is_first_message = history.len() <= 1;

        // 5. Match an existing problem
        let mut linked: Option<Problem> = None;
        if auto_link {
            linked = self.match_existing(actor, conversation_id, message).await;
            problem_id = linked.as_ref().map(|p| p.id);
        }

        // 6. Assistant reply
        let mut prompt = Vec::with_capacity(history.len() + 1);
        prompt.push(ChatMessage::system(system_prompt(problem_id.is_some())));
        prompt.extend(history);
        debug!(conversation_id, messages = prompt.len(), provider = self.llm.name(), "Requesting reply");

        let response = self
            .llm
            .chat(prompt, &self.options)
            .await
            .map_err(OrchestratorError::Generation)?;
        let ai_response = if response.content.trim().is_empty() {
            FALLBACK_REPLY.to_string()
        } else {
            response.content
        };
        self.store
            .append_message(NewMessage::assistant(conversation_id, ai_response.clone()))
            .await
            .map_err(OrchestratorError::store(STEP_SAVE_AI_RESPONSE))?;

        // 7. New problem
        let mut new_problem_id = None;
        if auto_link && linked.is_none() {
            if self.policy.should_create_problem(message, is_first_message) {
                new_problem_id = self.create_problem(actor, conversation_id, message).await;
                problem_id = problem_id.or(new_problem_id);
            } else {
                let signals = CreationPolicy::signals(message, is_first_message);
                debug!(conversation_id, ?signals, "Creation policy declined");
            }
        }

        // 8. Artifacts
        if let Some(problem_id) = problem_id {
            self.record_artifacts(actor, problem_id, &request.attached_files)
                .await;
        }

        Ok(ChatOutcome {
            conversation_id,
            problem_id,
            problem_linked: linked.is_some(),
            linked_problem_title: linked.map(|p| p.title),
            new_problem_id,
            ai_response,
        })
    }

    async fn match_existing(
        &self,
        actor: ActorId,
        conversation_id: ConversationId,
        message: &str,
    ) -> Option<Problem> {
        let candidates = match self.store.list_problems_by_owner(actor).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Problem lookup failed, skipping match");
                return None;
            }
        };

        let problem = self
            .matcher
            .match_problem(message, &candidates, actor)?
            .clone();
        if let Err(e) = self.store.link_conversation(conversation_id, problem.id).await {
            warn!(conversation_id, problem_id = problem.id, error = %e, "Failed to link conversation");
            return None;
        }
        info!(conversation_id, problem_id = problem.id, title = %problem.title, "Linked conversation to existing problem");
        Some(problem)
    }

    async fn create_problem(
        &self,
        actor: ActorId,
        conversation_id: ConversationId,
        message: &str,
    ) -> Option<ProblemId> {
        let problem = match self
            .store
            .create_problem(NewProblem {
                title: synthesize_title(message),
                description: Some(message.to_string()),
                status: ProblemStatus::Open,
                priority: Priority::Medium,
                created_by: actor,
            })
            .await
        {
            Ok(problem) => problem,
            Err(e) => {
                error!(conversation_id, error = %e, "Failed to create problem");
                return None;
            }
        };

        let owner = Collaborator {
            problem_id: problem.id,
            user_id: actor,
            role: CollaboratorRole::Owner,
        };
        if let Err(e) = self.store.add_collaborator(owner).await {
            warn!(problem_id = problem.id, error = %e, "Failed to add owner collaborator");
        }
        if let Err(e) = self.store.link_conversation(conversation_id, problem.id).await {
            warn!(conversation_id, problem_id = problem.id, error = %e, "Failed to link new problem");
        }

        info!(conversation_id, problem_id = problem.id, title = %problem.title, "Created problem");
        Some(problem.id)
    }

    async fn record_artifacts(&self, actor: ActorId, problem_id: ProblemId, files: &[AttachedFile]) {
        for file in files {
            let artifact = NewArtifact {
                problem_id,
                name: file.name.clone(),
                url: file.url.clone(),
                mime_type: file.mime_type.clone(),
                created_by: actor,
            };
            match self.store.create_artifact(artifact).await {
                Ok(artifact) => debug!(artifact_id = artifact.id, name = %artifact.name, "Saved artifact"),
                Err(e) => error!(problem_id, name = %file.name, error = %e, "Failed to save artifact"),
            }
        }
    }
}
