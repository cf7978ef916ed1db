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


//! Persistence for problems, conversations and their attachments.
//!
//! Two backends implement [`Store`]: [`MemoryStore`] for tests and local
//! runs without a database, and [`PostgrestStore`] for a hosted
//! Supabase/PostgREST project. Handlers and the orchestrator only see the
//! trait object.

use async_trait::async_trait;
use std::collections::BTreeMap;
use synapse_core::{
    ActorId, Artifact, ArtifactId, Collaborator, Conjecture, ConjectureId, Conversation,
    ConversationId, Criticism, Message, NewArtifact, NewConjecture, NewConversation,
    NewCriticism, NewMessage, NewProblem, Problem, ProblemCounts, ProblemId, ProblemUpdate,
};

mod memory;
mod postgrest;

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Which conversations to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationFilter {
    All,
    Problem(ProblemId),
    Unlinked,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CriticismFilter {
    pub problem_id: Option<ProblemId>,
    pub conjecture_id: Option<ConjectureId>,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name for health output.
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> StoreResult<()>;

    // Problems

    /// All problems, most recently updated first.
    async fn list_problems(&self) -> StoreResult<Vec<Problem>>;

    /// Problems created by `owner`, most recently updated first.
    async fn list_problems_by_owner(&self, owner: ActorId) -> StoreResult<Vec<Problem>>;

    async fn get_problem(&self, id: ProblemId) -> StoreResult<Problem>;

    async fn create_problem(&self, problem: NewProblem) -> StoreResult<Problem>;

    /// Apply `update` and bump `updated_at`.
    async fn update_problem(&self, id: ProblemId, update: ProblemUpdate) -> StoreResult<Problem>;

    /// Remove the problem with its conjectures, criticisms, artifacts and
    /// collaborators. Linked conversations are only unlinked.
    async fn delete_problem(&self, id: ProblemId) -> StoreResult<()>;

    async fn add_collaborator(&self, collaborator: Collaborator) -> StoreResult<()>;

    // Conversations and messages

    async fn create_conversation(&self, conversation: NewConversation)
        -> StoreResult<Conversation>;

    async fn get_conversation(&self, id: ConversationId) -> StoreResult<Conversation>;

    /// Conversations matching `filter`, most recently updated first.
    async fn list_conversations(&self, filter: ConversationFilter)
        -> StoreResult<Vec<Conversation>>;

    async fn link_conversation(
        &self,
        id: ConversationId,
        problem_id: ProblemId,
    ) -> StoreResult<()>;

    /// Remove the conversation and all of its messages.
    async fn delete_conversation(&self, id: ConversationId) -> StoreResult<()>;

    async fn append_message(&self, message: NewMessage) -> StoreResult<Message>;

    /// Messages in insertion order.
    async fn list_messages(&self, conversation_id: ConversationId) -> StoreResult<Vec<Message>>;

    // Conjectures, criticisms, artifacts

    /// Newest first.
    async fn list_conjectures(&self, problem_id: Option<ProblemId>)
        -> StoreResult<Vec<Conjecture>>;

    async fn create_conjecture(&self, conjecture: NewConjecture) -> StoreResult<Conjecture>;

    /// Newest first.
    async fn list_criticisms(&self, filter: CriticismFilter) -> StoreResult<Vec<Criticism>>;

    async fn create_criticism(&self, criticism: NewCriticism) -> StoreResult<Criticism>;

    /// Newest first.
    async fn list_artifacts(&self, problem_id: Option<ProblemId>) -> StoreResult<Vec<Artifact>>;

    async fn create_artifact(&self, artifact: NewArtifact) -> StoreResult<Artifact>;

    async fn delete_artifact(&self, id: ArtifactId) -> StoreResult<()>;

    /// Attachment counts for every problem, including problems with none.
    async fn problem_counts(&self) -> StoreResult<BTreeMap<ProblemId, ProblemCounts>> {
        let mut counts: BTreeMap<ProblemId, ProblemCounts> = self
            .list_problems()
            .await?
            .into_iter()
            .map(|problem| (problem.id, ProblemCounts::default()))
            .collect();

        for conversation in self.list_conversations(ConversationFilter::All).await? {
            if let Some(entry) = conversation.problem_id.and_then(|id| counts.get_mut(&id)) {
                entry.conversations += 1;
            }
        }
        for conjecture in self.list_conjectures(None).await? {
            if let Some(entry) = counts.get_mut(&conjecture.problem_id) {
                entry.conjectures += 1;
            }
        }
        for criticism in self.list_criticisms(CriticismFilter::default()).await? {
            if let Some(entry) = counts.get_mut(&criticism.problem_id) {
                entry.criticisms += 1;
            }
        }
        for artifact in self.list_artifacts(None).await? {
            if let Some(entry) = counts.get_mut(&artifact.problem_id) {
                entry.artifacts += 1;
            }
        }

        Ok(counts)
    }
}
