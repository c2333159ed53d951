//! Provider router
//!
//! Dispatches each request to the generator registered for its provider
//! hint. A hint with no registered generator fails as unavailable.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::client::HttpTextGenerator;
use super::traits::{GenerationStream, TextGenerator};
use super::types::{GenerationRequest, ModelProvider};
use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// Text generator keyed by [`ModelProvider`]
#[derive(Default, Clone)]
pub struct ProviderRouter {
    generators: HashMap<ModelProvider, Arc<dyn TextGenerator>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// One HTTP generator per config. A later config for the same provider
    /// does not replace an earlier one.
    pub fn from_configs(configs: &[LlmConfig]) -> Result<Self> {
        let mut router = Self::new();
        for config in configs {
            if router.generators.contains_key(&config.provider) {
                debug!("Skipping duplicate {} configuration", config.provider);
                continue;
            }
            let generator = HttpTextGenerator::new(config)?;
            info!("Provider {} ready (model {})", config.provider, generator.model());
            router.insert(config.provider, Arc::new(generator));
        }
        Ok(router)
    }

    pub fn with_generator(mut self, provider: ModelProvider, generator: Arc<dyn TextGenerator>) -> Self {
        self.insert(provider, generator);
        self
    }

    /// Register (or replace) the generator for `provider`
    pub fn insert(&mut self, provider: ModelProvider, generator: Arc<dyn TextGenerator>) {
        self.generators.insert(provider, generator);
    }

    /// Configured providers, in declaration order
    pub fn providers(&self) -> Vec<ModelProvider> {
        ModelProvider::ALL
            .into_iter()
            .filter(|p| self.generators.contains_key(p))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    fn route(&self, provider: ModelProvider) -> Result<&Arc<dyn TextGenerator>> {
        self.generators
            .get(&provider)
            .ok_or_else(|| Error::Generation(format!("provider {} unavailable", provider)))
    }
}

#[async_trait]
impl TextGenerator for ProviderRouter {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        self.route(request.provider)?.generate(request).await
    }

    async fn generate_stream(&self, request: GenerationRequest) -> Result<GenerationStream> {
        self.route(request.provider)?.generate_stream(request).await
    }

    fn name(&self) -> &str {
        "router"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, MockTextGenerator};

    fn request(provider: ModelProvider) -> GenerationRequest {
        GenerationRequest::new(vec![ChatMessage::user("weekly sales")], provider)
    }

    #[tokio::test]
    async fn test_dispatches_on_provider_hint() {
        let openai = Arc::new(MockTextGenerator::new());
        let deepseek = Arc::new(MockTextGenerator::new());
        let router = ProviderRouter::new()
            .with_generator(ModelProvider::OpenAi, openai.clone())
            .with_generator(ModelProvider::DeepSeek, deepseek.clone());

        let reply = router.generate(request(ModelProvider::DeepSeek)).await.unwrap();
        assert_eq!(reply, "[deepseek] weekly sales");
        assert_eq!(deepseek.calls(), 1);
        assert_eq!(openai.calls(), 0);

        router.generate(request(ModelProvider::OpenAi)).await.unwrap();
        assert_eq!(openai.calls(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_unavailable() {
        let router =
            ProviderRouter::new().with_generator(ModelProvider::OpenAi, Arc::new(MockTextGenerator::new()));

        let err = router.generate(request(ModelProvider::Anthropic)).await.unwrap_err();
        assert!(matches!(err, Error::Generation(ref m) if m == "provider anthropic unavailable"));
        assert!(!err.is_caller_error());

        assert!(router.generate_stream(request(ModelProvider::ChatGlm)).await.is_err());
    }

    #[test]
    fn test_from_configs_keeps_first_per_provider() {
        let configs = vec![
            LlmConfig {
                api_key: "k1".to_string(),
                provider: ModelProvider::Anthropic,
                model: "first".to_string(),
                ..LlmConfig::default()
            },
            LlmConfig {
                api_key: "k2".to_string(),
                ..LlmConfig::default()
            },
            LlmConfig {
                api_key: "k3".to_string(),
                provider: ModelProvider::Anthropic,
                model: "second".to_string(),
                ..LlmConfig::default()
            },
        ];

        let router = ProviderRouter::from_configs(&configs).unwrap();
        assert_eq!(router.providers(), vec![ModelProvider::OpenAi, ModelProvider::Anthropic]);
        assert!(ProviderRouter::new().is_empty());
    }
}
