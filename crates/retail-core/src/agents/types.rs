//! Agent, task and message types
//!
//! Defines the data model shared by the orchestration core:
//! - Capability: fixed enumeration of agent skills
//! - Message: one immutable conversation turn
//! - Task: trackable unit of work with a monotonic lifecycle
//! - AgentStatus: read-only projection of an agent's counters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;

use crate::llm::ModelProvider;

/// Unique identifier for an agent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What an agent can plausibly do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    DataAnalysis,
    NaturalLanguage,
    DocumentSearch,
    WorkflowExecution,
    RealTimeProcessing,
    MultiModal,
    Reasoning,
    Planning,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Self::DataAnalysis,
        Self::NaturalLanguage,
        Self::DocumentSearch,
        Self::WorkflowExecution,
        Self::RealTimeProcessing,
        Self::MultiModal,
        Self::Reasoning,
        Self::Planning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataAnalysis => "data_analysis",
            Self::NaturalLanguage => "natural_language",
            Self::DocumentSearch => "document_search",
            Self::WorkflowExecution => "workflow_execution",
            Self::RealTimeProcessing => "real_time_processing",
            Self::MultiModal => "multi_modal",
            Self::Reasoning => "reasoning",
            Self::Planning => "planning",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}

/// One turn in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, JsonValue>,
    pub timestamp: DateTime<Utc>,
    /// Agent that produced the message (`None` for user messages)
    pub agent_id: Option<AgentId>,
    pub conversation_id: Option<String>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            metadata: HashMap::new(),
            timestamp: Utc::now(),
            agent_id: None,
            conversation_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Error tag carried in metadata (`unsupported_request`, `no_suitable_agent`, ...)
    pub fn error_kind(&self) -> Option<&str> {
        self.metadata.get("error").and_then(|v| v.as_str())
    }

    pub fn is_error(&self) -> bool {
        self.metadata.contains_key("error")
    }
}

/// Task lifecycle: `pending -> running -> {completed, failed, cancelled}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// A unit of trackable work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub input: HashMap<String, JsonValue>,
    #[serde(default)]
    pub output: HashMap<String, JsonValue>,
    pub status: TaskStatus,
    /// Higher is more urgent, typically 1-10
    pub priority: i32,
    #[serde(default)]
    pub required_capabilities: Vec<Capability>,
    #[serde(default)]
    pub metadata: HashMap<String, JsonValue>,
    pub agent_id: Option<AgentId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl Task {
    pub const MIN_PRIORITY: i32 = 1;
    pub const MAX_PRIORITY: i32 = 10;

    /// Create a pending task with priority 1
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: TaskId::default(),
            name: name.into(),
            description: description.into(),
            input: HashMap::new(),
            output: HashMap::new(),
            status: TaskStatus::Pending,
            priority: Self::MIN_PRIORITY,
            required_capabilities: Vec::new(),
            metadata: HashMap::new(),
            agent_id: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    /// Set priority, clamped to `1..=10`
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority.clamp(Self::MIN_PRIORITY, Self::MAX_PRIORITY);
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.input.insert(key.into(), value.into());
        self
    }

    pub fn with_required_capabilities(mut self, capabilities: Vec<Capability>) -> Self {
        self.required_capabilities = capabilities;
        self
    }

    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.metadata
            .insert("task_type".to_string(), JsonValue::String(task_type.into()));
        self
    }

    /// `task_type` from metadata, used by specialists to pick a handler
    pub fn task_type(&self) -> Option<&str> {
        self.metadata.get("task_type").and_then(|v| v.as_str())
    }

    /// String input value
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.input.get(key).and_then(|v| v.as_str())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `pending -> running`. Returns false if the task was not pending.
    pub fn mark_running(&mut self, agent_id: AgentId) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Running;
        self.agent_id = Some(agent_id);
        self.started_at = Some(Utc::now());
        true
    }

    /// `running -> completed`
    pub fn complete(&mut self, output: HashMap<String, JsonValue>) -> bool {
        if self.status != TaskStatus::Running {
            return false;
        }
        self.output = output;
        self.finish(TaskStatus::Completed);
        true
    }

    /// `pending | running -> failed`
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.error_message = Some(error.into());
        self.finish(TaskStatus::Failed);
        true
    }

    /// `pending | running -> cancelled`
    pub fn cancel(&mut self, reason: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.error_message = Some(reason.into());
        self.finish(TaskStatus::Cancelled);
        true
    }

    fn finish(&mut self, status: TaskStatus) {
        self.status = status;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }
}

/// Read-only projection of an agent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStatus {
    pub id: AgentId,
    pub kind: String,
    pub name: String,
    pub description: String,
    pub capabilities: Vec<Capability>,
    pub active: bool,
    pub provider: ModelProvider,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub error_count: u64,
    /// `successful / total`, 0 when nothing was handled yet
    pub success_rate: f64,
    /// Seconds
    pub average_response_time: f64,
    pub last_activity: Option<DateTime<Utc>>,
    pub active_tasks: usize,
    pub completed_tasks: usize,
    pub completed_tasks_total: u64,
}
