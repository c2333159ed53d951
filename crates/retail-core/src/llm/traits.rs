//! Text generator trait

use async_trait::async_trait;
use futures::stream::{self, BoxStream};

use super::types::GenerationRequest;
use crate::Result;

/// Stream of generated text fragments
pub type GenerationStream = BoxStream<'static, Result<String>>;

/// Text-generation service consumed by agents.
///
/// Any failure (provider unavailable, bad response) is reported as an
/// error; agents treat it as opaque and never let it reach the router.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a complete response for the given message list
    async fn generate(&self, request: GenerationRequest) -> Result<String>;

    /// Generate a response as a stream of fragments.
    ///
    /// The default implementation yields the whole response as one fragment.
    async fn generate_stream(&self, request: GenerationRequest) -> Result<GenerationStream> {
        let text = self.generate(request).await?;
        Ok(Box::pin(stream::iter(vec![Ok(text)])))
    }

    /// Short name used in logs
    fn name(&self) -> &str {
        "generator"
    }
}
