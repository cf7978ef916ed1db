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


//! One-shot prompts outside the chat loop: message classification and
//! conversation titling.

use super::{ChatMessage, CompletionOptions, LLMProvider};
use serde::Serialize;
use synapse_core::MessageType;
use tracing::debug;

/// Only this many trailing history entries go into the classification prompt.
pub const CLASSIFY_HISTORY_LEN: usize = 5;

pub const DEFAULT_PROBLEM_TITLE: &str = "New Problem";
pub const DEFAULT_SUMMARY_TITLE: &str = "Untitled Problem";

const CLASSIFIER_SYSTEM: &str = "You are a message classifier. Respond with only the category name.";

const TITLE_SYSTEM: &str =
    "Generate a short, clear title for this problem in under 6 words. Return only the title.";

const SUMMARY_SYSTEM: &str = "Generate a concise, descriptive title (max 6 words) for this \
conversation that captures the main problem or topic being discussed. Return only the title, \
no quotes or extra text.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_title: Option<String>,
}

pub fn classification_prompt(
    message: &str,
    history: &[ChatMessage],
    existing_titles: &[String],
) -> String {
    let skip = history.len().saturating_sub(CLASSIFY_HISTORY_LEN);
    let recent = history[skip..]
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Classify this user message into one of these categories:

1. "new_problem" - User is describing a new problem/issue
2. "chat" - Regular conversation about existing problem
3. "conjecture" - User is asking for or suggesting a solution
4. "criticism" - User is providing evidence, refutation, or criticism
5. "artifact" - User is sharing files, code, or documentation

Context:
- Existing problems: {}
- Recent chat: {}
- User message: "{}"

Respond with ONLY the category name (new_problem, chat, conjecture, criticism, or artifact)."#,
        existing_titles.join(", "),
        recent,
        message
    )
}

/// Read a category out of a model answer. Anything unrecognised is `chat`.
pub fn parse_message_type(answer: &str) -> MessageType {
    answer
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == '`')
        .parse()
        .unwrap_or_default()
}

pub async fn classify_message(
    provider: &dyn LLMProvider,
    model: Option<String>,
    message: &str,
    history: &[ChatMessage],
    existing_titles: &[String],
) -> anyhow::Result<Classification> {
    let prompt = classification_prompt(message, history, existing_titles);
    let options = CompletionOptions {
        model: model.clone(),
        ..CompletionOptions::new(10, 0.1)
    };
    let response = provider
        .chat(
            vec![ChatMessage::system(CLASSIFIER_SYSTEM), ChatMessage::user(prompt)],
            &options,
        )
        .await?;

    let message_type = parse_message_type(&response.content);
    debug!(answer = %response.content, ?message_type, "Classified message");

    let suggested_title = if message_type == MessageType::NewProblem {
        let options = CompletionOptions {
            model,
            ..CompletionOptions::new(20, 0.3)
        };
        let response = provider
            .chat(
                vec![ChatMessage::system(TITLE_SYSTEM), ChatMessage::user(message)],
                &options,
            )
            .await?;
        Some(non_empty_or(&response.content, DEFAULT_PROBLEM_TITLE))
    } else {
        None
    };

    Ok(Classification {
        message_type,
        suggested_title,
    })
}

pub async fn summarize_conversation(
    provider: &dyn LLMProvider,
    model: Option<String>,
    messages: &[ChatMessage],
) -> anyhow::Result<String> {
    let transcript = messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n");
    let options = CompletionOptions {
        model,
        ..CompletionOptions::new(50, 0.3)
    };
    let response = provider
        .chat(
            vec![
                ChatMessage::system(SUMMARY_SYSTEM),
                ChatMessage::user(format!("Conversation:\n{}", transcript)),
            ],
            &options,
        )
        .await?;
    Ok(non_empty_or(&response.content, DEFAULT_SUMMARY_TITLE))
}

fn non_empty_or(text: &str, fallback: &str) -> String {
    match text.trim() {
        "" => fallback.to_string(),
        trimmed => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StaticProvider;

    #[test]
    fn test_parse_message_type() {
        assert_eq!(parse_message_type("new_problem"), MessageType::NewProblem);
        assert_eq!(parse_message_type("  \"Conjecture\".\n"), MessageType::Conjecture);
        assert_eq!(parse_message_type("I think this is a criticism"), MessageType::Chat);
        assert_eq!(parse_message_type(""), MessageType::Chat);
    }

    #[test]
    fn test_prompt_keeps_last_five_history_entries() {
        let history: Vec<ChatMessage> = (1..=7)
            .map(|i| ChatMessage::user(format!("turn {}", i)))
            .collect();
        let prompt = classification_prompt("hello", &history, &["Login".to_string()]);
        assert!(!prompt.contains("turn 2"));
        assert!(prompt.contains("turn 3"));
        assert!(prompt.contains("turn 7"));
        assert!(prompt.contains("Existing problems: Login"));
    }

    #[tokio::test]
    async fn test_new_problem_gets_title() {
        let provider = StaticProvider::new("new_problem");
        let classification = classify_message(&provider, None, "export is broken", &[], &[])
            .await
            .unwrap();
        assert_eq!(classification.message_type, MessageType::NewProblem);
        // The static provider answers the title prompt with the same text.
        assert_eq!(classification.suggested_title.as_deref(), Some("new_problem"));
    }

    #[tokio::test]
    async fn test_summary_falls_back_when_empty() {
        let provider = StaticProvider::new("   ");
        let title = summarize_conversation(&provider, None, &[ChatMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(title, DEFAULT_SUMMARY_TITLE);
    }
}
