//! HTTP text generator
//!
//! Supports OpenAI-compatible APIs (OpenAI, ChatGLM, DeepSeek) and the
//! Anthropic messages API.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::traits::TextGenerator;
use super::types::*;

/// Remote text generator bound to one configured provider
#[derive(Clone)]
pub struct HttpTextGenerator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    provider: ModelProvider,
}

impl HttpTextGenerator {
    /// Create a new generator from the LLM configuration
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::Http)?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_string());

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            provider: config.provider,
        })
    }

    /// Create with custom base URL (for testing or custom endpoints)
    pub fn with_base_url(config: &LlmConfig, base_url: String) -> Result<Self> {
        let mut generator = Self::new(config)?;
        generator.base_url = base_url;
        Ok(generator)
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the configured provider
    pub fn provider(&self) -> ModelProvider {
        self.provider
    }

    /// Send request to an OpenAI-compatible chat-completions endpoint
    async fn send_openai_request(&self, request: &GenerationRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!("Sending request to {} API: {}", self.provider, url);

        let wire = ChatCompletionRequest::from_generation(&self.model, request);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&wire)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("{} request failed: {}", self.provider, e)))?;

        let status = response.status();
        let body = response.text().await.map_err(Error::Http)?;

        if !status.is_success() {
            warn!("{} API error: {} - {}", self.provider, status, body);
            return Err(Error::Generation(format!("{}: {}", status, body)));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            Error::Generation(format!("Failed to parse response: {} - {}", e, body))
        })?;

        info!(
            "{} API response: finish_reason={:?}, tokens={}",
            self.provider,
            parsed.choices.first().and_then(|c| c.finish_reason.clone()),
            parsed.usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0)
        );

        parsed
            .text()
            .ok_or_else(|| Error::Generation("Response contained no choices".to_string()))
    }

    /// Send request to the Anthropic messages endpoint
    async fn send_anthropic_request(&self, request: &GenerationRequest) -> Result<String> {
        let url = format!("{}/messages", self.base_url);

        debug!("Sending request to Anthropic API: {}", url);

        let wire = MessagesRequest::from_generation(&self.model, request);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&wire)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("anthropic request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(Error::Http)?;

        if !status.is_success() {
            warn!("Anthropic API error: {} - {}", status, body);
            return Err(Error::Generation(format!("{}: {}", status, body)));
        }

        let parsed: MessagesResponse = serde_json::from_str(&body).map_err(|e| {
            Error::Generation(format!("Failed to parse response: {} - {}", e, body))
        })?;

        info!(
            "Anthropic API response: stop_reason={:?}, tokens={}",
            parsed.stop_reason,
            parsed.usage.as_ref().map(|u| u.output_tokens).unwrap_or(0)
        );

        Ok(parsed.text())
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        if request.provider != self.provider {
            return Err(Error::Generation(format!(
                "provider {} unavailable",
                request.provider
            )));
        }

        if self.provider.is_openai_compatible() {
            self.send_openai_request(&request).await
        } else {
            self.send_anthropic_request(&request).await
        }
    }

    fn name(&self) -> &str {
        self.provider.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_url_per_provider() {
        let config = LlmConfig {
            provider: ModelProvider::DeepSeek,
            ..LlmConfig::default()
        };
        let generator = HttpTextGenerator::new(&config).unwrap();
        assert_eq!(generator.base_url, "https://api.deepseek.com");
        assert_eq!(generator.provider(), ModelProvider::DeepSeek);
    }

    #[test]
    fn test_configured_base_url_wins() {
        let config = LlmConfig {
            base_url: Some("http://localhost:8080/v1/".to_string()),
            ..LlmConfig::default()
        };
        let generator = HttpTextGenerator::new(&config).unwrap();
        assert_eq!(generator.base_url, "http://localhost:8080/v1");
        assert_eq!(generator.model(), "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_generation_error() {
        let config = LlmConfig {
            api_key: "test".to_string(),
            timeout_secs: 2,
            ..LlmConfig::default()
        };
        let generator =
            HttpTextGenerator::with_base_url(&config, "http://127.0.0.1:9".to_string()).unwrap();

        let request = GenerationRequest::new(vec![ChatMessage::user("hi")], ModelProvider::OpenAi);
        let result = generator.generate(request).await;
        assert!(matches!(result, Err(Error::Generation(_))));
    }

    #[tokio::test]
    async fn test_other_provider_hint_is_unavailable() {
        let config = LlmConfig {
            api_key: "test".to_string(),
            ..LlmConfig::default()
        };
        let generator = HttpTextGenerator::new(&config).unwrap();

        let request =
            GenerationRequest::new(vec![ChatMessage::user("hi")], ModelProvider::Anthropic);
        let err = generator.generate(request).await.unwrap_err();
        assert_eq!(err.to_string(), "Text generation failed: provider anthropic unavailable");
    }
}
