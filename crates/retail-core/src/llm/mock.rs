//! Mock text generator (for tests and offline runs, no API needed)
//!
//! Echoes the last user message, tagged with the requested provider.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::traits::TextGenerator;
use super::types::GenerationRequest;
use crate::error::{Error, Result};

/// Mock generator: echoes the last user message
#[derive(Debug, Default)]
pub struct MockTextGenerator {
    fail_with: Option<String>,
    calls: AtomicUsize,
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator whose every call fails with `reason`
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `generate` calls seen so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = &self.fail_with {
            return Err(Error::Generation(reason.clone()));
        }

        let last_user = request.last_user_content().unwrap_or("(no input)");
        Ok(format!("[{}] {}", request.provider, last_user))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
