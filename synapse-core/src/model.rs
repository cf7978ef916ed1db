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

//! Entity types shared by the store, the linking logic and the HTTP layer.
//!
//! Field names follow the stored row layout (snake_case) so the same types
//! round-trip through the hosted database's REST interface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

pub type ProblemId = i64;
pub type ConversationId = i64;
pub type MessageId = i64;
pub type ConjectureId = i64;
pub type CriticismId = i64;
pub type ArtifactId = i64;

/// Identity of whoever is acting on the service.
///
/// Authentication is external; the HTTP layer resolves a request to an
/// `ActorId` and threads it through every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(Uuid);

impl ActorId {
    /// The all-zero actor used when no identity is supplied.
    pub const PLACEHOLDER: ActorId = ActorId(Uuid::nil());

    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::PLACEHOLDER
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ActorId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| CoreError::InvalidActor(s.to_string()))
    }
}

/// Declares a closed string enum with serde, `FromStr` and `Display`.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($field:literal) {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(CoreError::InvalidValue {
                        field: $field,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum! {
    /// Lifecycle state of a problem.
    ProblemStatus ("status") {
        Open => "open",
        InProgress => "in_progress",
        Resolved => "resolved",
    }
}

impl Default for ProblemStatus {
    fn default() -> Self {
        Self::Open
    }
}

string_enum! {
    Priority ("priority") {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

string_enum! {
    /// Author of a chat message. Rows written by older clients as `ai`
    /// are read back as `Assistant`.
    MessageRole ("role") {
        User => "user",
        #[serde(alias = "ai")]
        Assistant => "assistant",
    }
}

string_enum! {
    /// Classification tag carried by every message.
    MessageType ("message_type") {
        Chat => "chat",
        NewProblem => "new_problem",
        Conjecture => "conjecture",
        Criticism => "criticism",
        Artifact => "artifact",
    }
}

impl Default for MessageType {
    fn default() -> Self {
        Self::Chat
    }
}

string_enum! {
    CollaboratorRole ("role") {
        Owner => "owner",
        Member => "member",
    }
}

/// A tracked issue or topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: ProblemId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProblemStatus,
    #[serde(default)]
    pub priority: Priority,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Problem {
    /// Title and description joined the way keyword matching reads them.
    pub fn searchable_text(&self) -> String {
        match &self.description {
            Some(description) => format!("{} {}", self.title, description),
            None => self.title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProblem {
    pub title: String,
    pub description: Option<String>,
    pub status: ProblemStatus,
    pub priority: Priority,
    pub created_by: ActorId,
}

/// Mutable subset of a problem. Everything else is append-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProblemStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl ProblemUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.priority.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collaborator {
    pub problem_id: ProblemId,
    pub user_id: ActorId,
    pub role: CollaboratorRole,
}

/// A chat thread. `problem_id == None` is the unlinked state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(default)]
    pub problem_id: Option<ProblemId>,
    pub title: String,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConversation {
    pub problem_id: Option<ProblemId>,
    pub title: String,
    pub created_by: ActorId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub role: MessageRole,
    pub content: String,
    pub message_type: MessageType,
}

impl NewMessage {
    pub fn user(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self {
            conversation_id,
            role: MessageRole::User,
            content: content.into(),
            message_type: MessageType::Chat,
        }
    }

    pub fn assistant(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self {
            conversation_id,
            role: MessageRole::Assistant,
            content: content.into(),
            message_type: MessageType::Chat,
        }
    }
}

/// A proposed solution or hypothesis for a problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conjecture {
    pub id: ConjectureId,
    pub problem_id: ProblemId,
    pub content: String,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConjecture {
    pub problem_id: ProblemId,
    pub content: String,
    pub created_by: ActorId,
}

/// Evidence or refutation, optionally aimed at a specific conjecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criticism {
    pub id: CriticismId,
    pub problem_id: ProblemId,
    #[serde(default)]
    pub conjecture_id: Option<ConjectureId>,
    pub content: String,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCriticism {
    pub problem_id: ProblemId,
    pub conjecture_id: Option<ConjectureId>,
    pub content: String,
    pub created_by: ActorId,
}

/// A file or link attached to a problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub problem_id: ProblemId,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewArtifact {
    pub problem_id: ProblemId,
    pub name: String,
    pub url: String,
    pub mime_type: Option<String>,
    pub created_by: ActorId,
}

/// Number of entities attached to one problem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemCounts {
    pub conversations: usize,
    pub conjectures: usize,
    pub criticisms: usize,
    pub artifacts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_defaults() {
        assert_eq!(ProblemStatus::default(), ProblemStatus::Open);
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!(MessageType::default(), MessageType::Chat);
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("in_progress".parse::<ProblemStatus>(), Ok(ProblemStatus::InProgress));
        assert_eq!(" HIGH ".parse::<Priority>(), Ok(Priority::High));
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(MessageType::NewProblem.to_string(), "new_problem");
    }

    #[test]
    fn test_legacy_ai_role_reads_as_assistant() {
        let role: MessageRole = serde_json::from_str("\"ai\"").unwrap();
        assert_eq!(role, MessageRole::Assistant);
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"assistant\"");
    }

    #[test]
    fn test_actor_id_parsing() {
        let actor: ActorId = "00000000-0000-0000-0000-000000000000".parse().unwrap();
        assert_eq!(actor, ActorId::PLACEHOLDER);
        assert!("not-a-uuid".parse::<ActorId>().is_err());
    }

    #[test]
    fn test_problem_row_deserializes_with_defaults() {
        let row = serde_json::json!({
            "id": 7,
            "title": "Login page crash",
            "created_by": "00000000-0000-0000-0000-000000000000",
            "created_at": "2025-01-02T03:04:05.123456+00:00",
            "updated_at": "2025-01-02T03:04:05.123456+00:00"
        });
        let problem: Problem = serde_json::from_value(row).unwrap();
        assert_eq!(problem.status, ProblemStatus::Open);
        assert_eq!(problem.priority, Priority::Medium);
        assert_eq!(problem.searchable_text(), "Login page crash");
    }
}
