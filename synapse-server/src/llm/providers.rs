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


use super::{ChatMessage, ChatResponse, CompletionOptions, LLMProvider};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client as OpenAIClient,
};
use serde_json::json;
use std::time::Instant;

// OpenAI-compatible Provider (OpenAI, OpenRouter)
pub struct OpenAIProvider {
    client: OpenAIClient<OpenAIConfig>,
    model: String,
}

impl OpenAIProvider {
    pub fn new(api_key: String, api_base: String, model: String) -> anyhow::Result<Self> {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        let client = OpenAIClient::with_config(config);

        Ok(Self { client, model })
    }

    fn convert_messages(&self, messages: Vec<ChatMessage>) -> Vec<ChatCompletionRequestMessage> {
        messages
            .into_iter()
            .filter_map(|msg| match msg.role.as_str() {
                "system" => ChatCompletionRequestSystemMessageArgs::default()
                    .content(msg.content)
                    .build()
                    .ok()
                    .map(ChatCompletionRequestMessage::System),
                "user" => ChatCompletionRequestUserMessageArgs::default()
                    .content(msg.content)
                    .build()
                    .ok()
                    .map(ChatCompletionRequestMessage::User),
                "assistant" => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(msg.content)
                    .build()
                    .ok()
                    .map(ChatCompletionRequestMessage::Assistant),
                _ => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        options: &CompletionOptions,
    ) -> anyhow::Result<ChatResponse> {
        let start = Instant::now();
        let model_name = options.model.clone().unwrap_or_else(|| self.model.clone());

        let request = CreateChatCompletionRequestArgs::default()
            .model(&model_name)
            .messages(self.convert_messages(messages))
            .max_tokens(options.max_tokens)
            .temperature(options.temperature)
            .build()?;

        let response = self.client.chat().create(request).await?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        let (input_tokens, output_tokens) = match &response.usage {
            Some(usage) => (Some(usage.prompt_tokens), Some(usage.completion_tokens)),
            None => (None, None),
        };

        let finish_reason = response.choices.first().and_then(|choice| {
            choice
                .finish_reason
                .as_ref()
                .map(|r| format!("{:?}", r).to_lowercase())
        });

        Ok(ChatResponse {
            content,
            provider: "openai".to_string(),
            model: model_name,
            input_tokens,
            output_tokens,
            finish_reason,
            duration_ms: start.elapsed().as_millis() as u32,
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// Ollama Provider (Local)
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: String, model: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait::async_trait]
impl LLMProvider for OllamaProvider {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        options: &CompletionOptions,
    ) -> anyhow::Result<ChatResponse> {
        let start = Instant::now();
        let model_name = options.model.clone().unwrap_or_else(|| self.model.clone());

        let body = json!({
            "model": model_name,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": options.temperature,
                "num_predict": options.max_tokens,
            },
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let json: serde_json::Value = response.json().await?;

        let content = json["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let input_tokens = json["prompt_eval_count"].as_u64().map(|t| t as u32);
        let output_tokens = json["eval_count"].as_u64().map(|t| t as u32);
        let finish_reason = json["done_reason"].as_str().map(|s| s.to_string());

        Ok(ChatResponse {
            content,
            provider: "ollama".to_string(),
            model: model_name,
            input_tokens,
            output_tokens,
            finish_reason,
            duration_ms: start.elapsed().as_millis() as u32,
        })
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

// Static Provider (no model configured)
pub struct StaticProvider {
    reply: String,
}

impl StaticProvider {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

impl Default for StaticProvider {
    fn default() -> Self {
        Self::new(
            "No language model is configured for this Synapse server. Your message was saved.",
        )
    }
}

#[async_trait::async_trait]
impl LLMProvider for StaticProvider {
    async fn chat(
        &self,
        _messages: Vec<ChatMessage>,
        options: &CompletionOptions,
    ) -> anyhow::Result<ChatResponse> {
        Ok(ChatResponse {
            content: self.reply.clone(),
            provider: "static".to_string(),
            model: options.model.clone().unwrap_or_else(|| "static".to_string()),
            input_tokens: None,
            output_tokens: None,
            finish_reason: Some("stop".to_string()),
            duration_ms: 0,
        })
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_messages_drops_unknown_roles() {
        let provider = OpenAIProvider::new(
            "sk-test".into(),
            "https://openrouter.ai/api/v1".into(),
            "x-ai/grok-4-fast:free".into(),
        )
        .unwrap();
        let converted = provider.convert_messages(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
            ChatMessage {
                role: "tool".into(),
                content: "{}".into(),
            },
            ChatMessage::assistant("hello"),
        ]);
        assert_eq!(converted.len(), 3);
        assert!(matches!(converted[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(converted[2], ChatCompletionRequestMessage::Assistant(_)));
    }

    #[tokio::test]
    async fn test_static_provider_replies() {
        let provider = StaticProvider::new("canned");
        let response = provider
            .chat(vec![ChatMessage::user("hi")], &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(response.content, "canned");
        assert_eq!(response.provider, "static");
    }
}
