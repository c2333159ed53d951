//! Error types for retail-core

use thiserror::Error;

use crate::agents::{Task, TaskStatus};

/// Main error type for retail-core
///
/// Caller-input errors (`UnknownAgentType`, `AgentNotFound`,
/// `InvalidTaskState`, `Config`) are kept apart from runtime failures so the
/// transport layer can tell "that does not exist" from "we tried and failed".
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown agent type: {0}")]
    UnknownAgentType(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Task {task_id} cannot start from status {status:?}")]
    InvalidTaskState { task_id: String, status: TaskStatus },

    #[error("Text generation failed: {0}")]
    Generation(String),

    #[error("Task failed: {}", .0.error_message.as_deref().unwrap_or("unknown error"))]
    TaskFailed(Box<Task>),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for errors caused by the caller asking for something that does not exist
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownAgentType(_)
                | Self::AgentNotFound(_)
                | Self::InvalidTaskState { .. }
                | Self::Config(_)
        )
    }
}

/// Result type alias for retail-core
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_errors_are_distinguished() {
        assert!(Error::UnknownAgentType("ghost".into()).is_caller_error());
        assert!(Error::AgentNotFound("a-1".into()).is_caller_error());
        assert!(!Error::Generation("provider down".into()).is_caller_error());
        assert!(!Error::ProcessingFailed("boom".into()).is_caller_error());
    }

    #[test]
    fn test_task_failed_display_uses_task_error() {
        let mut task = Task::new("report", "weekly report");
        task.fail("warehouse offline");
        let err = Error::TaskFailed(Box::new(task));
        assert_eq!(err.to_string(), "Task failed: warehouse offline");
    }
}
