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


use crate::config::{LLMConfig, ProviderKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use synapse_core::{Message, MessageRole};
use tracing::{info, warn};

mod providers;
mod tasks;
pub use providers::*;
pub use tasks::*;

/// Used when the model returns an empty completion.
pub const FALLBACK_REPLY: &str = "I'm sorry, I couldn't generate a response.";

const SYSTEM_PROMPT_HEAD: &str = "You are Synapse, an AI assistant that helps users solve \
problems and think through complex issues.";

const SYSTEM_PROMPT_PROBLEM: &str = "The user is currently working on a problem.";

const SYSTEM_PROMPT_TAIL: &str = "Be helpful, concise, and encourage critical thinking. If \
the user seems to be describing a new problem, you can help them think through it \
systematically.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        match message.role {
            MessageRole::User => Self::user(message.content.clone()),
            MessageRole::Assistant => Self::assistant(message.content.clone()),
        }
    }
}

/// Per-call generation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    /// `None` uses the provider's configured model.
    pub model: Option<String>,
    pub max_tokens: u16,
    pub temperature: f32,
}

impl CompletionOptions {
    pub fn new(max_tokens: u16, temperature: f32) -> Self {
        Self {
            model: None,
            max_tokens,
            temperature,
        }
    }
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self::new(1000, 0.7)
    }
}

impl From<&LLMConfig> for CompletionOptions {
    fn from(config: &LLMConfig) -> Self {
        Self {
            model: Some(config.model.clone()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub finish_reason: Option<String>,
    pub duration_ms: u32,
}

#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        options: &CompletionOptions,
    ) -> anyhow::Result<ChatResponse>;

    fn name(&self) -> &str;
}

/// System prompt for a chat turn.
pub fn system_prompt(has_problem: bool) -> String {
    if has_problem {
        format!(
            "{}\n\n{}\n\n{}",
            SYSTEM_PROMPT_HEAD, SYSTEM_PROMPT_PROBLEM, SYSTEM_PROMPT_TAIL
        )
    } else {
        format!("{}\n\n{}", SYSTEM_PROMPT_HEAD, SYSTEM_PROMPT_TAIL)
    }
}

pub fn build_provider(config: &LLMConfig) -> anyhow::Result<Arc<dyn LLMProvider>> {
    let provider: Arc<dyn LLMProvider> = match config.resolved_provider() {
        ProviderKind::OpenAI => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("openai provider requires an API key"))?;
            info!(api_base = %config.api_base, model = %config.model, "Using OpenAI-compatible provider");
            Arc::new(OpenAIProvider::new(
                api_key,
                config.api_base.clone(),
                config.model.clone(),
            )?)
        }
        ProviderKind::Ollama => {
            let base_url = config
                .ollama_base_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("ollama provider requires ollama_base_url"))?;
            info!(%base_url, model = %config.model, "Using Ollama provider");
            Arc::new(OllamaProvider::new(base_url, config.model.clone())?)
        }
        ProviderKind::Static => {
            warn!("No language model configured, replies come from the static provider");
            Arc::new(StaticProvider::default())
        }
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use synapse_core::MessageType;

    #[test]
    fn test_system_prompt_mentions_problem_only_when_known() {
        assert!(system_prompt(true).contains(SYSTEM_PROMPT_PROBLEM));
        assert!(!system_prompt(false).contains(SYSTEM_PROMPT_PROBLEM));
        assert!(system_prompt(false).starts_with("You are Synapse"));
    }

    #[test]
    fn test_stored_message_roles() {
        let message = Message {
            id: 1,
            conversation_id: 1,
            role: MessageRole::Assistant,
            content: "hello".into(),
            message_type: MessageType::Chat,
            created_at: Utc::now(),
        };
        assert_eq!(ChatMessage::from(&message), ChatMessage::assistant("hello"));
    }

    #[test]
    fn test_build_provider_falls_back_to_static() {
        let provider = build_provider(&LLMConfig::default()).unwrap();
        assert_eq!(provider.name(), "static");
    }

    #[test]
    fn test_options_from_config() {
        let options = CompletionOptions::from(&LLMConfig::default());
        assert_eq!(options.model.as_deref(), Some("x-ai/grok-4-fast:free"));
        assert_eq!(options.max_tokens, 1000);
    }
}
