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


use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use synapse_core::{
    ActorId, Artifact, ArtifactId, Collaborator, Conjecture, Conversation, ConversationId,
    Criticism, Message, NewArtifact, NewConjecture, NewConversation, NewCriticism, NewMessage,
    NewProblem, Problem, ProblemId, ProblemUpdate,
};

use super::{ConversationFilter, CriticismFilter, Store, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    next_id: i64,
    problems: BTreeMap<ProblemId, Problem>,
    collaborators: Vec<Collaborator>,
    conversations: BTreeMap<ConversationId, Conversation>,
    messages: Vec<Message>,
    conjectures: Vec<Conjecture>,
    criticisms: Vec<Criticism>,
    artifacts: Vec<Artifact>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn require_problem(&self, id: ProblemId) -> StoreResult<()> {
        if self.problems.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!(
                "problem {} does not exist",
                id
            )))
        }
    }
}

/// In-process store with one id sequence shared by all tables.
///
/// All tables sit behind a single lock, so the delete cascades are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn list_problems(&self) -> StoreResult<Vec<Problem>> {
        let tables = self.tables.read();
        let mut problems: Vec<Problem> = tables.problems.values().cloned().collect();
        problems.sort_by_key(|p| Reverse((p.updated_at, p.id)));
        Ok(problems)
    }

    async fn list_problems_by_owner(&self, owner: ActorId) -> StoreResult<Vec<Problem>> {
        let mut problems = self.list_problems().await?;
        problems.retain(|p| p.created_by == owner);
        Ok(problems)
    }

    async fn get_problem(&self, id: ProblemId) -> StoreResult<Problem> {
        self.tables
            .read()
            .problems
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("problem", id))
    }

    async fn create_problem(&self, problem: NewProblem) -> StoreResult<Problem> {
        let mut tables = self.tables.write();
        let now = Utc::now();
        let row = Problem {
            id: tables.allocate_id(),
            title: problem.title,
            description: problem.description,
            status: problem.status,
            priority: problem.priority,
            created_by: problem.created_by,
            created_at: now,
            updated_at: now,
        };
        tables.problems.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_problem(&self, id: ProblemId, update: ProblemUpdate) -> StoreResult<Problem> {
        let mut tables = self.tables.write();
        let problem = tables
            .problems
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("problem", id))?;
        if let Some(status) = update.status {
            problem.status = status;
        }
        if let Some(priority) = update.priority {
            problem.priority = priority;
        }
        problem.updated_at = Utc::now();
        Ok(problem.clone())
    }

    async fn delete_problem(&self, id: ProblemId) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.problems.remove(&id).is_none() {
            return Err(StoreError::not_found("problem", id));
        }
        tables.criticisms.retain(|c| c.problem_id != id);
        tables.conjectures.retain(|c| c.problem_id != id);
        tables.artifacts.retain(|a| a.problem_id != id);
        tables.collaborators.retain(|c| c.problem_id != id);
        for conversation in tables.conversations.values_mut() {
            if conversation.problem_id == Some(id) {
                conversation.problem_id = None;
            }
        }
        Ok(())
    }

    async fn add_collaborator(&self, collaborator: Collaborator) -> StoreResult<()> {
        let mut tables = self.tables.write();
        tables.require_problem(collaborator.problem_id)?;
        let exists = tables
            .collaborators
            .iter()
            .any(|c| c.problem_id == collaborator.problem_id && c.user_id == collaborator.user_id);
        if exists {
            return Err(StoreError::Constraint(format!(
                "{} already collaborates on problem {}",
                collaborator.user_id, collaborator.problem_id
            )));
        }
        tables.collaborators.push(collaborator);
        Ok(())
    }

    async fn create_conversation(
        &self,
        conversation: NewConversation,
    ) -> StoreResult<Conversation> {
        let mut tables = self.tables.write();
        if let Some(problem_id) = conversation.problem_id {
            tables.require_problem(problem_id)?;
        }
        let now = Utc::now();
        let row = Conversation {
            id: tables.allocate_id(),
            problem_id: conversation.problem_id,
            title: conversation.title,
            created_by: conversation.created_by,
            created_at: now,
            updated_at: now,
        };
        tables.conversations.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_conversation(&self, id: ConversationId) -> StoreResult<Conversation> {
        self.tables
            .read()
            .conversations
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("conversation", id))
    }

    async fn list_conversations(
        &self,
        filter: ConversationFilter,
    ) -> StoreResult<Vec<Conversation>> {
        let tables = self.tables.read();
        let mut conversations: Vec<Conversation> = tables
            .conversations
            .values()
            .filter(|c| match filter {
                ConversationFilter::All => true,
                ConversationFilter::Problem(id) => c.problem_id == Some(id),
                ConversationFilter::Unlinked => c.problem_id.is_none(),
            })
            .cloned()
            .collect();
        conversations.sort_by_key(|c| Reverse((c.updated_at, c.id)));
        Ok(conversations)
    }

    async fn link_conversation(
        &self,
        id: ConversationId,
        problem_id: ProblemId,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write();
        tables.require_problem(problem_id)?;
        let conversation = tables
            .conversations
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("conversation", id))?;
        conversation.problem_id = Some(problem_id);
        conversation.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_conversation(&self, id: ConversationId) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.conversations.remove(&id).is_none() {
            return Err(StoreError::not_found("conversation", id));
        }
        tables.messages.retain(|m| m.conversation_id != id);
        Ok(())
    }

    async fn append_message(&self, message: NewMessage) -> StoreResult<Message> {
        let mut tables = self.tables.write();
        let now = Utc::now();
        match tables.conversations.get_mut(&message.conversation_id) {
            Some(conversation) => conversation.updated_at = now,
            None => {
                return Err(StoreError::Constraint(format!(
                    "conversation {} does not exist",
                    message.conversation_id
                )))
            }
        }
        let row = Message {
            id: tables.allocate_id(),
            conversation_id: message.conversation_id,
            role: message.role,
            content: message.content,
            message_type: message.message_type,
            created_at: now,
        };
        tables.messages.push(row.clone());
        Ok(row)
    }

    async fn list_messages(&self, conversation_id: ConversationId) -> StoreResult<Vec<Message>> {
        let tables = self.tables.read();
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn list_conjectures(
        &self,
        problem_id: Option<ProblemId>,
    ) -> StoreResult<Vec<Conjecture>> {
        let tables = self.tables.read();
        Ok(tables
            .conjectures
            .iter()
            .rev()
            .filter(|c| problem_id.map_or(true, |id| c.problem_id == id))
            .cloned()
            .collect())
    }

    async fn create_conjecture(&self, conjecture: NewConjecture) -> StoreResult<Conjecture> {
        let mut tables = self.tables.write();
        tables.require_problem(conjecture.problem_id)?;
        let row = Conjecture {
            id: tables.allocate_id(),
            problem_id: conjecture.problem_id,
            content: conjecture.content,
            created_by: conjecture.created_by,
            created_at: Utc::now(),
        };
        tables.conjectures.push(row.clone());
        Ok(row)
    }

    async fn list_criticisms(&self, filter: CriticismFilter) -> StoreResult<Vec<Criticism>> {
        let tables = self.tables.read();
        Ok(tables
            .criticisms
            .iter()
            .rev()
            .filter(|c| filter.problem_id.map_or(true, |id| c.problem_id == id))
            .filter(|c| {
                filter
                    .conjecture_id
                    .map_or(true, |id| c.conjecture_id == Some(id))
            })
            .cloned()
            .collect())
    }

    async fn create_criticism(&self, criticism: NewCriticism) -> StoreResult<Criticism> {
        let mut tables = self.tables.write();
        tables.require_problem(criticism.problem_id)?;
        if let Some(conjecture_id) = criticism.conjecture_id {
            if !tables.conjectures.iter().any(|c| c.id == conjecture_id) {
                return Err(StoreError::Constraint(format!(
                    "conjecture {} does not exist",
                    conjecture_id
                )));
            }
        }
        let row = Criticism {
            id: tables.allocate_id(),
            problem_id: criticism.problem_id,
            conjecture_id: criticism.conjecture_id,
            content: criticism.content,
            created_by: criticism.created_by,
            created_at: Utc::now(),
        };
        tables.criticisms.push(row.clone());
        Ok(row)
    }

    async fn list_artifacts(&self, problem_id: Option<ProblemId>) -> StoreResult<Vec<Artifact>> {
        let tables = self.tables.read();
        Ok(tables
            .artifacts
            .iter()
            .rev()
            .filter(|a| problem_id.map_or(true, |id| a.problem_id == id))
            .cloned()
            .collect())
    }

    async fn create_artifact(&self, artifact: NewArtifact) -> StoreResult<Artifact> {
        let mut tables = self.tables.write();
        tables.require_problem(artifact.problem_id)?;
        let row = Artifact {
            id: tables.allocate_id(),
            problem_id: artifact.problem_id,
            name: artifact.name,
            url: artifact.url,
            mime_type: artifact.mime_type,
            created_by: artifact.created_by,
            created_at: Utc::now(),
        };
        tables.artifacts.push(row.clone());
        Ok(row)
    }

    async fn delete_artifact(&self, id: ArtifactId) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let before = tables.artifacts.len();
        tables.artifacts.retain(|a| a.id != id);
        if tables.artifacts.len() == before {
            return Err(StoreError::not_found("artifact", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_core::{CollaboratorRole, Priority, ProblemStatus};

    fn new_problem(title: &str) -> NewProblem {
        NewProblem {
            title: title.to_string(),
            description: None,
            status: ProblemStatus::Open,
            priority: Priority::Medium,
            created_by: ActorId::PLACEHOLDER,
        }
    }

    fn new_conversation(problem_id: Option<ProblemId>) -> NewConversation {
        NewConversation {
            problem_id,
            title: "thread".to_string(),
            created_by: ActorId::PLACEHOLDER,
        }
    }

    #[tokio::test]
    async fn test_delete_problem_cascades_and_unlinks() {
        let store = MemoryStore::new();
        let problem = store.create_problem(new_problem("Login")).await.unwrap();
        let other = store.create_problem(new_problem("Billing")).await.unwrap();

        store
            .add_collaborator(Collaborator {
                problem_id: problem.id,
                user_id: ActorId::PLACEHOLDER,
                role: CollaboratorRole::Owner,
            })
            .await
            .unwrap();
        let conversation = store
            .create_conversation(new_conversation(Some(problem.id)))
            .await
            .unwrap();
        let conjecture = store
            .create_conjecture(NewConjecture {
                problem_id: problem.id,
                content: "cookie expiry".into(),
                created_by: ActorId::PLACEHOLDER,
            })
            .await
            .unwrap();
        store
            .create_criticism(NewCriticism {
                problem_id: problem.id,
                conjecture_id: Some(conjecture.id),
                content: "cookies are fine".into(),
                created_by: ActorId::PLACEHOLDER,
            })
            .await
            .unwrap();
        store
            .create_artifact(NewArtifact {
                problem_id: problem.id,
                name: "trace.log".into(),
                url: "/uploads/trace.log".into(),
                mime_type: None,
                created_by: ActorId::PLACEHOLDER,
            })
            .await
            .unwrap();
        store
            .create_conjecture(NewConjecture {
                problem_id: other.id,
                content: "rounding".into(),
                created_by: ActorId::PLACEHOLDER,
            })
            .await
            .unwrap();

        store.delete_problem(problem.id).await.unwrap();

        assert!(store.get_problem(problem.id).await.unwrap_err().is_not_found());
        assert!(store.list_criticisms(CriticismFilter::default()).await.unwrap().is_empty());
        assert!(store.list_artifacts(None).await.unwrap().is_empty());
        assert_eq!(store.list_conjectures(None).await.unwrap().len(), 1);

        let conversation = store.get_conversation(conversation.id).await.unwrap();
        assert_eq!(conversation.problem_id, None);

        // The owner row went with the problem, so re-adding is allowed.
        let again = store.create_problem(new_problem("Login")).await.unwrap();
        store
            .add_collaborator(Collaborator {
                problem_id: again.id,
                user_id: ActorId::PLACEHOLDER,
                role: CollaboratorRole::Owner,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_foreign_keys_checked() {
        let store = MemoryStore::new();
        let err = store
            .create_conversation(new_conversation(Some(42)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));

        let err = store
            .append_message(NewMessage::user(7, "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_messages_in_insertion_order() {
        let store = MemoryStore::new();
        let conversation = store.create_conversation(new_conversation(None)).await.unwrap();
        store
            .append_message(NewMessage::user(conversation.id, "first"))
            .await
            .unwrap();
        store
            .append_message(NewMessage::assistant(conversation.id, "second"))
            .await
            .unwrap();

        let contents: Vec<String> = store
            .list_messages(conversation.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["first", "second"]);

        store.delete_conversation(conversation.id).await.unwrap();
        assert!(store.list_messages(conversation.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_conversation_filters() {
        let store = MemoryStore::new();
        let problem = store.create_problem(new_problem("Login")).await.unwrap();
        let linked = store
            .create_conversation(new_conversation(Some(problem.id)))
            .await
            .unwrap();
        let unlinked = store.create_conversation(new_conversation(None)).await.unwrap();

        let by_problem = store
            .list_conversations(ConversationFilter::Problem(problem.id))
            .await
            .unwrap();
        assert_eq!(by_problem.iter().map(|c| c.id).collect::<Vec<_>>(), vec![linked.id]);

        let loose = store
            .list_conversations(ConversationFilter::Unlinked)
            .await
            .unwrap();
        assert_eq!(loose.iter().map(|c| c.id).collect::<Vec<_>>(), vec![unlinked.id]);

        store.link_conversation(unlinked.id, problem.id).await.unwrap();
        assert!(store
            .list_conversations(ConversationFilter::Unlinked)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_problem_counts() {
        let store = MemoryStore::new();
        let busy = store.create_problem(new_problem("Busy")).await.unwrap();
        let idle = store.create_problem(new_problem("Idle")).await.unwrap();
        store
            .create_conversation(new_conversation(Some(busy.id)))
            .await
            .unwrap();
        store.create_conversation(new_conversation(None)).await.unwrap();
        store
            .create_conjecture(NewConjecture {
                problem_id: busy.id,
                content: "maybe".into(),
                created_by: ActorId::PLACEHOLDER,
            })
            .await
            .unwrap();

        let counts = store.problem_counts().await.unwrap();
        assert_eq!(counts[&busy.id].conversations, 1);
        assert_eq!(counts[&busy.id].conjectures, 1);
        assert_eq!(counts[&idle.id], synapse_core::ProblemCounts::default());
    }

    #[tokio::test]
    async fn test_update_problem_bumps_updated_at() {
        let store = MemoryStore::new();
        let problem = store.create_problem(new_problem("Login")).await.unwrap();
        let updated = store
            .update_problem(
                problem.id,
                ProblemUpdate {
                    status: Some(ProblemStatus::Resolved),
                    priority: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, ProblemStatus::Resolved);
        assert_eq!(updated.priority, Priority::Medium);
        assert!(updated.updated_at >= problem.updated_at);
    }
}
