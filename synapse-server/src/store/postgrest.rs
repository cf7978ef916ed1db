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


//! Supabase / PostgREST backend.
//!
//! Every call is a single HTTP request against `{url}/rest/v1/<table>`.
//! Inserts and updates ask for `Prefer: return=representation` so the
//! stored row comes back. Multi-table operations (the problem delete
//! cascade) are issued as a sequence of requests and are not atomic.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use synapse_core::{
    ActorId, Artifact, ArtifactId, Collaborator, Conjecture, Conversation, ConversationId,
    Criticism, Message, MessageRole, MessageType, NewArtifact, NewConjecture, NewConversation,
    NewCriticism, NewMessage, NewProblem, Problem, ProblemId, ProblemUpdate,
};
use tracing::debug;

use super::{ConversationFilter, CriticismFilter, Store, StoreError, StoreResult};

const PROBLEMS: &str = "problems";
const COLLABORATORS: &str = "problem_collaborators";
const CONVERSATIONS: &str = "chat_conversations";
const MESSAGES: &str = "chat_messages";
const CONJECTURES: &str = "conjectures";
const CRITICISMS: &str = "criticisms";
const ARTIFACTS: &str = "artifacts";

type Filter = Vec<(&'static str, String)>;

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

pub struct PostgrestStore {
    client: reqwest::Client,
    rest_url: String,
}

/// Problem insert with the legacy `owner_id` column filled in.
#[derive(Serialize)]
struct ProblemRow<'a> {
    #[serde(flatten)]
    problem: &'a NewProblem,
    owner_id: ActorId,
}

/// Assistant messages are stored under the legacy `ai` role.
#[derive(Serialize)]
struct MessageRow<'a> {
    conversation_id: ConversationId,
    role: &'static str,
    content: &'a str,
    message_type: MessageType,
}

impl<'a> From<&'a NewMessage> for MessageRow<'a> {
    fn from(message: &'a NewMessage) -> Self {
        Self {
            conversation_id: message.conversation_id,
            role: match message.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "ai",
            },
            content: &message.content,
            message_type: message.message_type,
        }
    }
}

#[derive(Serialize)]
struct ProblemPatch {
    #[serde(flatten)]
    update: ProblemUpdate,
    updated_at: chrono::DateTime<Utc>,
}

impl PostgrestStore {
    /// `url` is the project URL (e.g. `https://abc.supabase.co`).
    pub fn new(url: &str, key: &str) -> StoreResult<Self> {
        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(key)
            .map_err(|e| StoreError::Backend(format!("invalid database key: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", key))
            .map_err(|e| StoreError::Backend(format!("invalid database key: {}", e)))?;
        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", url.trim_end_matches('/')),
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.rest_url, table))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> StoreResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let detail = String::from_utf8_lossy(&body).into_owned();
            return Err(match status {
                StatusCode::CONFLICT => StoreError::Constraint(detail),
                _ => StoreError::Backend(format!("{}: {}", status, detail)),
            });
        }
        Ok(serde_json::from_slice(&body)?)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        mut query: Filter,
    ) -> StoreResult<Vec<T>> {
        debug!(table, ?query, "select");
        query.push(("select", "*".to_string()));
        self.send(self.request(Method::GET, table).query(&query))
            .await
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        entity: &'static str,
        id: i64,
    ) -> StoreResult<T> {
        self.select(table, vec![("id", eq(id))])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(entity, id))
    }

    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> StoreResult<T> {
        debug!(table, "insert");
        let rows: Vec<T> = self
            .send(
                self.request(Method::POST, table)
                    .header("Prefer", "return=representation")
                    .json(body),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend(format!("insert into {} returned no row", table)))
    }

    async fn update<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        filter: Filter,
        body: &B,
    ) -> StoreResult<Vec<T>> {
        debug!(table, ?filter, "update");
        self.send(
            self.request(Method::PATCH, table)
                .header("Prefer", "return=representation")
                .query(&filter)
                .json(body),
        )
        .await
    }

    /// Returns the number of deleted rows.
    async fn delete(&self, table: &str, filter: Filter) -> StoreResult<usize> {
        debug!(table, ?filter, "delete");
        let rows: Vec<serde_json::Value> = self
            .send(
                self.request(Method::DELETE, table)
                    .header("Prefer", "return=representation")
                    .query(&filter),
            )
            .await?;
        Ok(rows.len())
    }
}

#[async_trait]
impl Store for PostgrestStore {
    fn backend(&self) -> &'static str {
        "postgrest"
    }

    async fn ping(&self) -> StoreResult<()> {
        let _: Vec<serde_json::Value> = self
            .send(
                self.request(Method::GET, PROBLEMS)
                    .query(&[("select", "id"), ("limit", "1")]),
            )
            .await?;
        Ok(())
    }

    async fn list_problems(&self) -> StoreResult<Vec<Problem>> {
        self.select(PROBLEMS, vec![("order", "updated_at.desc".into())])
            .await
    }

    async fn list_problems_by_owner(&self, owner: ActorId) -> StoreResult<Vec<Problem>> {
        self.select(
            PROBLEMS,
            vec![
                ("created_by", eq(owner)),
                ("order", "updated_at.desc".into()),
            ],
        )
        .await
    }

    async fn get_problem(&self, id: ProblemId) -> StoreResult<Problem> {
        self.select_one(PROBLEMS, "problem", id).await
    }

    async fn create_problem(&self, problem: NewProblem) -> StoreResult<Problem> {
        let row = ProblemRow {
            owner_id: problem.created_by,
            problem: &problem,
        };
        self.insert(PROBLEMS, &row).await
    }

    async fn update_problem(&self, id: ProblemId, update: ProblemUpdate) -> StoreResult<Problem> {
        let patch = ProblemPatch {
            update,
            updated_at: Utc::now(),
        };
        let rows: Vec<Problem> = self.update(PROBLEMS, vec![("id", eq(id))], &patch).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found("problem", id))
    }

    async fn delete_problem(&self, id: ProblemId) -> StoreResult<()> {
        // PostgREST deletes of a missing id succeed with zero rows.
        let _: Problem = self.select_one(PROBLEMS, "problem", id).await?;

        let by_problem = || vec![("problem_id", eq(id))];
        self.delete(CRITICISMS, by_problem()).await?;
        self.delete(CONJECTURES, by_problem()).await?;
        self.delete(ARTIFACTS, by_problem()).await?;
        self.delete(COLLABORATORS, by_problem()).await?;
        let _: Vec<serde_json::Value> = self
            .update(
                CONVERSATIONS,
                by_problem(),
                &serde_json::json!({ "problem_id": null }),
            )
            .await?;
        self.delete(PROBLEMS, vec![("id", eq(id))]).await?;
        Ok(())
    }

    async fn add_collaborator(&self, collaborator: Collaborator) -> StoreResult<()> {
        let _: serde_json::Value = self.insert(COLLABORATORS, &collaborator).await?;
        Ok(())
    }

    async fn create_conversation(
        &self,
        conversation: NewConversation,
    ) -> StoreResult<Conversation> {
        self.insert(CONVERSATIONS, &conversation).await
    }

    async fn get_conversation(&self, id: ConversationId) -> StoreResult<Conversation> {
        self.select_one(CONVERSATIONS, "conversation", id).await
    }

    async fn list_conversations(
        &self,
        filter: ConversationFilter,
    ) -> StoreResult<Vec<Conversation>> {
        let mut query: Filter = match filter {
            ConversationFilter::All => vec![],
            ConversationFilter::Problem(id) => vec![("problem_id", eq(id))],
            ConversationFilter::Unlinked => vec![("problem_id", "is.null".into())],
        };
        query.push(("order", "updated_at.desc".into()));
        self.select(CONVERSATIONS, query).await
    }

    async fn link_conversation(
        &self,
        id: ConversationId,
        problem_id: ProblemId,
    ) -> StoreResult<()> {
        let rows: Vec<serde_json::Value> = self
            .update(
                CONVERSATIONS,
                vec![("id", eq(id))],
                &serde_json::json!({ "problem_id": problem_id, "updated_at": Utc::now() }),
            )
            .await?;
        if rows.is_empty() {
            return Err(StoreError::not_found("conversation", id));
        }
        Ok(())
    }

    async fn delete_conversation(&self, id: ConversationId) -> StoreResult<()> {
        self.delete(MESSAGES, vec![("conversation_id", eq(id))])
            .await?;
        match self.delete(CONVERSATIONS, vec![("id", eq(id))]).await? {
            0 => Err(StoreError::not_found("conversation", id)),
            _ => Ok(()),
        }
    }

    async fn append_message(&self, message: NewMessage) -> StoreResult<Message> {
        self.insert(MESSAGES, &MessageRow::from(&message)).await
    }

    async fn list_messages(&self, conversation_id: ConversationId) -> StoreResult<Vec<Message>> {
        self.select(
            MESSAGES,
            vec![
                ("conversation_id", eq(conversation_id)),
                ("order", "created_at.asc,id.asc".into()),
            ],
        )
        .await
    }

    async fn list_conjectures(
        &self,
        problem_id: Option<ProblemId>,
    ) -> StoreResult<Vec<Conjecture>> {
        let mut query: Filter = problem_id
            .map(|id| vec![("problem_id", eq(id))])
            .unwrap_or_default();
        query.push(("order", "created_at.desc".into()));
        self.select(CONJECTURES, query).await
    }

    async fn create_conjecture(&self, conjecture: NewConjecture) -> StoreResult<Conjecture> {
        self.insert(CONJECTURES, &conjecture).await
    }

    async fn list_criticisms(&self, filter: CriticismFilter) -> StoreResult<Vec<Criticism>> {
        let mut query: Filter = vec![];
        if let Some(id) = filter.problem_id {
            query.push(("problem_id", eq(id)));
        }
        if let Some(id) = filter.conjecture_id {
            query.push(("conjecture_id", eq(id)));
        }
        query.push(("order", "created_at.desc".into()));
        self.select(CRITICISMS, query).await
    }

    async fn create_criticism(&self, criticism: NewCriticism) -> StoreResult<Criticism> {
        self.insert(CRITICISMS, &criticism).await
    }

    async fn list_artifacts(&self, problem_id: Option<ProblemId>) -> StoreResult<Vec<Artifact>> {
        let mut query: Filter = problem_id
            .map(|id| vec![("problem_id", eq(id))])
            .unwrap_or_default();
        query.push(("order", "created_at.desc".into()));
        self.select(ARTIFACTS, query).await
    }

    async fn create_artifact(&self, artifact: NewArtifact) -> StoreResult<Artifact> {
        self.insert(ARTIFACTS, &artifact).await
    }

    async fn delete_artifact(&self, id: ArtifactId) -> StoreResult<()> {
        match self.delete(ARTIFACTS, vec![("id", eq(id))]).await? {
            0 => Err(StoreError::not_found("artifact", id)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_url_trims_trailing_slash() {
        let store = PostgrestStore::new("https://abc.supabase.co/", "key").unwrap();
        assert_eq!(store.rest_url, "https://abc.supabase.co/rest/v1");
    }

    #[test]
    fn test_rejects_unprintable_key() {
        assert!(PostgrestStore::new("https://abc.supabase.co", "bad\nkey").is_err());
    }

    #[test]
    fn test_assistant_rows_use_legacy_role() {
        let message = NewMessage::assistant(3, "hi");
        let row = serde_json::to_value(MessageRow::from(&message)).unwrap();
        assert_eq!(row["role"], "ai");
        assert_eq!(row["message_type"], "chat");
    }

    #[test]
    fn test_problem_row_carries_owner() {
        let problem = NewProblem {
            title: "Login".into(),
            description: None,
            status: Default::default(),
            priority: Default::default(),
            created_by: ActorId::PLACEHOLDER,
        };
        let row = serde_json::to_value(ProblemRow {
            problem: &problem,
            owner_id: problem.created_by,
        })
        .unwrap();
        assert_eq!(row["owner_id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(row["status"], "open");
    }
}
