//! Text-generation request/response types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Model provider preference carried by each agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    #[default]
    #[serde(rename = "openai", alias = "gpt")]
    OpenAi,
    #[serde(alias = "glm", alias = "zhipu")]
    ChatGlm,
    DeepSeek,
    #[serde(alias = "claude")]
    Anthropic,
}

impl ModelProvider {
    pub const ALL: [ModelProvider; 4] = [Self::OpenAi, Self::ChatGlm, Self::DeepSeek, Self::Anthropic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::ChatGlm => "chatglm",
            Self::DeepSeek => "deepseek",
            Self::Anthropic => "anthropic",
        }
    }

    /// Base URL used when none is configured
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::ChatGlm => "https://open.bigmodel.cn/api/paas/v4",
            Self::DeepSeek => "https://api.deepseek.com",
            Self::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    /// Model used when a provider is configured by API key alone
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::ChatGlm => "glm-4",
            Self::DeepSeek => "deepseek-chat",
            Self::Anthropic => "claude-3-5-sonnet-latest",
        }
    }

    /// Environment variable holding this provider's own API key
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::ChatGlm => "CHATGLM_API_KEY",
            Self::DeepSeek => "DEEPSEEK_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Whether the provider speaks the OpenAI chat-completions shape
    pub fn is_openai_compatible(&self) -> bool {
        !matches!(self, Self::Anthropic)
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "gpt" => Ok(Self::OpenAi),
            "chatglm" | "glm" | "zhipu" => Ok(Self::ChatGlm),
            "deepseek" => Ok(Self::DeepSeek),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(format!("unknown model provider: {}", other)),
        }
    }
}

/// One `{role, content}` entry sent to the generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Provider-neutral generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub messages: Vec<ChatMessage>,
    pub provider: ModelProvider,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(messages: Vec<ChatMessage>, provider: ModelProvider) -> Self {
        Self {
            messages,
            provider,
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Content of the last user message, if any
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
    }
}

// ============================================================================
// OpenAI-compatible wire types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatCompletionRequest {
    pub fn from_generation(model: &str, request: &GenerationRequest) -> Self {
        Self {
            model: model.to_string(),
            messages: request.messages.clone(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    pub usage: Option<OpenAiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessageResponse,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessageResponse {
    pub role: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl ChatCompletionResponse {
    /// Text of the first choice
    pub fn text(&self) -> Option<String> {
        self.choices.first().and_then(|c| c.message.content.clone())
    }
}

// ============================================================================
// Anthropic messages wire types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

impl MessagesRequest {
    /// Anthropic takes the system prompt out of band
    pub fn from_generation(model: &str, request: &GenerationRequest) -> Self {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect();

        Self {
            model: model.to_string(),
            max_tokens: request.max_tokens.unwrap_or(4096),
            system: if system.is_empty() {
                None
            } else {
                Some(system.join("\n\n"))
            },
            messages: request
                .messages
                .iter()
                .filter(|m| m.role != "system")
                .cloned()
                .collect(),
            temperature: request.temperature,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl MessagesResponse {
    /// Concatenated text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Unsupported => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
