//! Text-generation service contract and adapters
//!
//! The orchestration core only sees [`TextGenerator`]. [`HttpTextGenerator`]
//! talks to OpenAI-compatible (OpenAI, ChatGLM, DeepSeek) and Anthropic
//! endpoints; [`ProviderRouter`] picks one per request from the provider
//! hint; [`MockTextGenerator`] answers locally without any API key.

mod client;
mod mock;
mod router;
mod traits;
mod types;

pub use client::HttpTextGenerator;
pub use mock::MockTextGenerator;
pub use router::ProviderRouter;
pub use traits::{GenerationStream, TextGenerator};
pub use types::*;
