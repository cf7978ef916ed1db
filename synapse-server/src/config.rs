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


use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use synapse_core::{ActorId, CreationMode, CreationPolicy, MatchStrategy, ProblemMatcher};

/// Synapse Server Configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub llm: LLMConfig,
    #[serde(default)]
    pub linking: LinkingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// HTTP API listen address (e.g., "127.0.0.1:3000")
    #[serde(default = "default_http_addr")]
    pub listen_addr: String,

    /// Enable CORS
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,

    /// Allowed CORS origins (empty = allow all)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Request body limit for `/api/upload`
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Supabase project URL. When unset the in-memory store is used.
    pub database_url: Option<String>,

    /// Service role (or anon) key sent as `apikey` and bearer token
    pub database_key: Option<String>,

    /// Root for uploaded files; uploads land in `<public_dir>/uploads`
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Ollama,
    Static,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LLMConfig {
    /// Explicit provider. When unset: `openai` with an API key, else
    /// `ollama` with a base URL, else `static`.
    pub provider: Option<ProviderKind>,

    /// OpenRouter / OpenAI API key
    pub api_key: Option<String>,

    /// OpenAI-compatible endpoint
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u16,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Ollama base URL (e.g., "http://localhost:11434")
    pub ollama_base_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    KeywordOverlap,
    Similarity,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkingConfig {
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Shared keywords needed for a keyword-overlap match
    #[serde(default = "default_min_shared")]
    pub min_shared: usize,

    /// Keywords must be strictly longer than this
    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,

    /// Minimum score for the similarity strategy
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    #[serde(default)]
    pub creation_mode: CreationMode,

    /// Actor used when a request carries no `x-actor-id` header
    #[serde(default)]
    pub default_actor: ActorId,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_http_addr(),
            enable_cors: default_enable_cors(),
            cors_origins: vec![],
            max_upload_bytes: default_max_upload_bytes(),
            log_format: LogFormat::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            database_key: None,
            public_dir: default_public_dir(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: None,
            api_key: None,
            api_base: default_api_base(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            ollama_base_url: None,
        }
    }
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            min_shared: default_min_shared(),
            min_token_len: default_min_token_len(),
            similarity_threshold: default_similarity_threshold(),
            creation_mode: CreationMode::default(),
            default_actor: ActorId::default(),
        }
    }
}

// Default values
fn default_http_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_enable_cors() -> bool {
    true
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("./public")
}

fn default_api_base() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model() -> String {
    "x-ai/grok-4-fast:free".to_string()
}

fn default_max_tokens() -> u16 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_min_shared() -> usize {
    2
}

fn default_min_token_len() -> usize {
    3
}

fn default_similarity_threshold() -> f64 {
    0.3
}

impl LLMConfig {
    /// Provider actually used after applying the fallback rules.
    pub fn resolved_provider(&self) -> ProviderKind {
        match self.provider {
            Some(kind) => kind,
            None if self.api_key.is_some() => ProviderKind::OpenAI,
            None if self.ollama_base_url.is_some() => ProviderKind::Ollama,
            None => ProviderKind::Static,
        }
    }
}

impl LinkingConfig {
    pub fn match_strategy(&self) -> MatchStrategy {
        match self.strategy {
            StrategyKind::KeywordOverlap => MatchStrategy::KeywordOverlap {
                min_shared: self.min_shared,
                min_token_len: self.min_token_len,
            },
            StrategyKind::Similarity => MatchStrategy::Similarity {
                threshold: self.similarity_threshold,
            },
        }
    }

    pub fn matcher(&self) -> ProblemMatcher {
        ProblemMatcher::new(self.match_strategy())
    }

    pub fn creation_policy(&self) -> CreationPolicy {
        CreationPolicy::new(self.creation_mode)
    }
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    /// Override fields from the process environment.
    ///
    /// Supported environment variables:
    /// - SYNAPSE_HTTP_ADDR: HTTP listen address (default: 127.0.0.1:3000)
    /// - SYNAPSE_PUBLIC_DIR: upload root (default: ./public)
    /// - SYNAPSE_LOG_FORMAT: `text` or `json`
    /// - SUPABASE_URL / NEXT_PUBLIC_SUPABASE_URL: database URL
    /// - SUPABASE_SERVICE_ROLE_KEY / NEXT_PUBLIC_SUPABASE_ANON_KEY: database key
    /// - OPENROUTER_API_KEY / OPENAI_API_KEY: completion API key
    /// - SYNAPSE_LLM_PROVIDER: `openai`, `ollama` or `static`
    /// - SYNAPSE_LLM_MODEL: model name
    /// - OLLAMA_BASE_URL: Ollama endpoint
    /// - SYNAPSE_CREATION_MODE: `always` or `heuristic`
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Same as [`apply_env`](Self::apply_env) with a custom variable lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|key| lookup(*key));

        if let Some(addr) = lookup("SYNAPSE_HTTP_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Some(dir) = lookup("SYNAPSE_PUBLIC_DIR") {
            self.storage.public_dir = PathBuf::from(dir);
        }
        if let Some(format) = lookup("SYNAPSE_LOG_FORMAT") {
            match format.to_lowercase().as_str() {
                "json" => self.server.log_format = LogFormat::Json,
                "text" => self.server.log_format = LogFormat::Text,
                other => tracing::warn!("Ignoring unknown SYNAPSE_LOG_FORMAT: {}", other),
            }
        }

        if let Some(url) = first(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"]) {
            self.storage.database_url = Some(url);
        }
        if let Some(key) = first(&["SUPABASE_SERVICE_ROLE_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"]) {
            self.storage.database_key = Some(key);
        }

        if let Some(key) = first(&["OPENROUTER_API_KEY", "OPENAI_API_KEY"]) {
            self.llm.api_key = Some(key);
        }
        if let Some(provider) = lookup("SYNAPSE_LLM_PROVIDER") {
            match provider.to_lowercase().as_str() {
                "openai" => self.llm.provider = Some(ProviderKind::OpenAI),
                "ollama" => self.llm.provider = Some(ProviderKind::Ollama),
                "static" => self.llm.provider = Some(ProviderKind::Static),
                other => tracing::warn!("Ignoring unknown SYNAPSE_LLM_PROVIDER: {}", other),
            }
        }
        if let Some(model) = lookup("SYNAPSE_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(base_url) = lookup("OLLAMA_BASE_URL") {
            self.llm.ollama_base_url = Some(base_url);
        }

        if let Some(mode) = lookup("SYNAPSE_CREATION_MODE") {
            match mode.to_lowercase().as_str() {
                "always" => self.linking.creation_mode = CreationMode::Always,
                "heuristic" => self.linking.creation_mode = CreationMode::Heuristic,
                other => tracing::warn!("Ignoring unknown SYNAPSE_CREATION_MODE: {}", other),
            }
        }
    }

    /// Parse listen address as SocketAddr
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(self.server.listen_addr.parse()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        match (&self.storage.database_url, &self.storage.database_key) {
            (Some(_), None) => anyhow::bail!("database_url is set but database_key is missing"),
            (None, Some(_)) => anyhow::bail!("database_key is set but database_url is missing"),
            _ => {}
        }

        if self.llm.resolved_provider() == ProviderKind::OpenAI && self.llm.api_key.is_none() {
            anyhow::bail!("LLM provider 'openai' requires an API key");
        }
        if self.llm.resolved_provider() == ProviderKind::Ollama
            && self.llm.ollama_base_url.is_none()
        {
            anyhow::bail!("LLM provider 'ollama' requires ollama_base_url");
        }

        if !self.storage.public_dir.exists() {
            std::fs::create_dir_all(&self.storage.public_dir)?;
        }

        Ok(())
    }
}
