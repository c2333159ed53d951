//! Conversation contexts
//!
//! Thread-safe per-conversation state using DashMap. Agents only ever see a
//! cloned snapshot; history appends go through [`ConversationStore`].
//!
//! Appends happen when a routed message completes, so two concurrent
//! messages on one conversation land in completion order, not issue order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::time::interval;
use tracing::{debug, info};

use super::types::{Capability, Message, MessageRole, TaskId};

/// Per-conversation session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub user_id: String,
    /// Insertion-ordered, oldest evicted first
    pub history: Vec<Message>,
    #[serde(default)]
    pub session_data: HashMap<String, JsonValue>,
    /// Task currently being serviced, if any
    pub current_task: Option<TaskId>,
    /// Capabilities exercised so far, first use first
    #[serde(default)]
    pub capabilities_used: Vec<Capability>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationContext {
    pub fn new(conversation_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            history: Vec::new(),
            session_data: HashMap::new(),
            current_task: None,
            capabilities_used: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message, keeping at most `limit` entries
    pub fn push_message(&mut self, message: Message, limit: usize) {
        self.history.push(message);
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(0..excess);
        }
        self.updated_at = Utc::now();
    }

    /// Remember capabilities, ignoring ones already recorded
    pub fn record_capabilities(&mut self, capabilities: &[Capability]) {
        for capability in capabilities {
            if !self.capabilities_used.contains(capability) {
                self.capabilities_used.push(*capability);
            }
        }
    }

    /// The last `n` user/assistant turns, oldest first
    pub fn recent_turns(&self, n: usize) -> Vec<&Message> {
        let mut turns: Vec<&Message> = self
            .history
            .iter()
            .rev()
            .filter(|m| matches!(m.role, MessageRole::User | MessageRole::Assistant))
            .take(n)
            .collect();
        turns.reverse();
        turns
    }

    pub fn message_count(&self) -> usize {
        self.history.len()
    }
}

/// In-memory table of conversation contexts
#[derive(Clone)]
pub struct ConversationStore {
    contexts: Arc<DashMap<String, ConversationContext>>,
    history_limit: usize,
    ttl_secs: u64,
    max_contexts: usize,
}

impl ConversationStore {
    /// `ttl_secs == 0` disables idle expiry, `max_contexts == 0` disables the cap
    pub fn new(history_limit: usize, ttl_secs: u64, max_contexts: usize) -> Self {
        Self {
            contexts: Arc::new(DashMap::new()),
            history_limit: history_limit.max(1),
            ttl_secs,
            max_contexts,
        }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Snapshot of the context for `conversation_id`, creating it if needed.
    ///
    /// Counts as activity, so a conversation being routed is not the next
    /// eviction victim.
    pub fn get_or_create(&self, conversation_id: &str, user_id: &str) -> ConversationContext {
        if let Some(mut context) = self.contexts.get_mut(conversation_id) {
            context.updated_at = Utc::now();
            return context.clone();
        }

        self.make_room();
        self.contexts
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                debug!("Created conversation context: {}", conversation_id);
                ConversationContext::new(conversation_id, user_id)
            })
            .clone()
    }

    /// Snapshot of an existing context
    pub fn get(&self, conversation_id: &str) -> Option<ConversationContext> {
        self.contexts.get(conversation_id).map(|c| c.clone())
    }

    /// Append messages in order, trimming to the history window.
    ///
    /// A context evicted while its request was in flight is recreated for
    /// `user_id`, so the exchange is never dropped.
    pub fn append<I>(&self, conversation_id: &str, user_id: &str, messages: I)
    where
        I: IntoIterator<Item = Message>,
    {
        if !self.contexts.contains_key(conversation_id) {
            self.make_room();
        }

        let mut context = self
            .contexts
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                info!("Recreated evicted conversation context: {}", conversation_id);
                ConversationContext::new(conversation_id, user_id)
            });
        for message in messages {
            context.push_message(message, self.history_limit);
        }
    }

    pub fn set_current_task(&self, conversation_id: &str, task: Option<TaskId>) {
        if let Some(mut context) = self.contexts.get_mut(conversation_id) {
            context.current_task = task;
            context.updated_at = Utc::now();
        }
    }

    /// Clear `current_task` if it still points at `task_id`
    pub fn finish_task(&self, conversation_id: &str, task_id: &TaskId) {
        if let Some(mut context) = self.contexts.get_mut(conversation_id) {
            if context.current_task.as_ref() == Some(task_id) {
                context.current_task = None;
                context.updated_at = Utc::now();
            }
        }
    }

    pub fn record_capabilities(&self, conversation_id: &str, capabilities: &[Capability]) {
        if capabilities.is_empty() {
            return;
        }
        if let Some(mut context) = self.contexts.get_mut(conversation_id) {
            context.record_capabilities(capabilities);
        }
    }

    /// Remove a context entirely
    pub fn remove(&self, conversation_id: &str) -> bool {
        self.contexts.remove(conversation_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn clear(&self) {
        self.contexts.clear();
    }

    /// Drop contexts idle for longer than the TTL, returning how many went
    pub fn evict_idle(&self) -> usize {
        if self.ttl_secs == 0 {
            return 0;
        }

        let now = Utc::now();
        let timeout = chrono::Duration::seconds(self.ttl_secs as i64);

        let expired: Vec<String> = self
            .contexts
            .iter()
            .filter(|entry| now - entry.value().updated_at > timeout)
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0;
        for conversation_id in expired {
            if self.contexts.remove(&conversation_id).is_some() {
                info!("Evicted idle conversation: {}", conversation_id);
                evicted += 1;
            }
        }
        evicted
    }

    fn make_room(&self) {
        if self.max_contexts > 0 && self.contexts.len() >= self.max_contexts {
            self.evict_oldest();
        }
    }

    /// Least recently updated context goes first when the table is full
    fn evict_oldest(&self) {
        let oldest = self
            .contexts
            .iter()
            .min_by_key(|entry| entry.value().updated_at)
            .map(|entry| entry.key().clone());

        if let Some(conversation_id) = oldest {
            self.contexts.remove(&conversation_id);
            info!("Evicted conversation {} (context limit reached)", conversation_id);
        }
    }

    /// Start a background task that evicts idle contexts every `every`
    pub fn spawn_sweeper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(every);
            loop {
                ticker.tick().await;
                let evicted = store.evict_idle();
                if evicted > 0 {
                    debug!("Context sweep removed {} conversations", evicted);
                }
            }
        })
    }
}
