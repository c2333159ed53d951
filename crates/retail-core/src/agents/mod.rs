//! Multi-agent routing
//!
//! A pool of capability-tagged specialist agents behind a single
//! [`Orchestrator`] entry point.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Orchestrator                           │
//! │  - Agent type registry and agent pool                        │
//! │  - Conversation contexts (bounded history, idle expiry)      │
//! │  - Routing rules                                             │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Selector                             │
//! │  - Preferred agent short-circuit                             │
//! │  - Keyword / capability gate                                 │
//! │  - Score and pick the maximum (first registered wins ties)   │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │
//!         ┌──────────┬───────┴──┬───────────┬──────────┐
//!         ▼          ▼          ▼           ▼          ▼
//!      Sales    Inventory   Customer    Data       Retail
//!                           Service     Analysis
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use retail_core::agents::{AgentOptions, Orchestrator};
//! use retail_core::knowledge::EmptyKnowledgeBase;
//! use retail_core::llm::MockTextGenerator;
//! use std::sync::Arc;
//!
//! let orchestrator = Orchestrator::new(
//!     config.orchestrator.clone(),
//!     Arc::new(MockTextGenerator::new()),
//!     Arc::new(EmptyKnowledgeBase),
//! );
//! orchestrator.register_default_agents().await;
//! orchestrator.create_default_agents().await?;
//!
//! let reply = orchestrator
//!     .route_message("How did Q4 revenue compare to Q3?", "user-1", None, None)
//!     .await;
//! println!("{}", reply.content);
//! ```

pub mod agent;
pub mod capability;
pub mod context;
pub mod orchestrator;
pub mod scoring;
pub mod selector;
pub mod specialists;
pub mod types;

// Re-exports
pub use agent::{
    Agent, AgentServices, Specialist, DEFAULT_COMPLETED_RETENTION, SHUTDOWN_REASON,
    UNSUPPORTED_REQUEST,
};
pub use capability::extract_capabilities;
pub use context::{ConversationContext, ConversationStore};
pub use orchestrator::{
    AgentFactory, AgentOptions, Orchestrator, OrchestratorStats, PoolStatus, NO_SUITABLE_AGENT,
};
pub use scoring::{score_message, score_task, AgentCounters};
pub use selector::{RoutingRule, Selection, SelectionReason};
pub use specialists::{
    builtin_specialists, CustomerServiceSpecialist, DataAnalysisSpecialist, InventorySpecialist,
    RetailSpecialist, SalesSpecialist,
};
pub use types::{
    AgentId, AgentStatus, Capability, Message, MessageRole, Task, TaskId, TaskStatus,
};
