//! retail-core: multi-agent retail analytics core
//!
//! Routes chat messages and analysis tasks to specialist agents (sales,
//! inventory, customer service, data analysis, general retail) and keeps
//! per-conversation state. Text generation and knowledge retrieval are
//! injected through the [`llm::TextGenerator`] and
//! [`knowledge::KnowledgeBase`] contracts.

pub mod agents;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod llm;

pub use agents::{
    Agent, AgentId, AgentOptions, AgentStatus, Capability, ConversationContext, Message,
    Orchestrator, OrchestratorStats, Task, TaskId, TaskStatus,
};
pub use config::{Config, KnowledgeConfig, LlmConfig, OrchestratorConfig};
pub use error::{Error, Result};
pub use knowledge::{EmptyKnowledgeBase, KnowledgeBase, SqliteKnowledgeStore};
pub use llm::{HttpTextGenerator, MockTextGenerator, ModelProvider, ProviderRouter, TextGenerator};
