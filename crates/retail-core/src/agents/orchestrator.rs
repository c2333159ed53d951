//! Orchestrator
//!
//! Owns the agent registry and the conversation table. It is the only
//! component callers talk to: messages and tasks come in, a [`Selection`]
//! picks one agent, and the outcome always comes back as a value.
//!
//! Registry locks are never held across an agent call. Each routing
//! decision works on a snapshot of the pool taken under a read lock.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::agent::{Agent, AgentServices, Specialist};
use super::capability::extract_capabilities;
use super::context::{ConversationContext, ConversationStore};
use super::selector::{select_for_message, select_for_task, RoutingRule, Selection};
use super::specialists::builtin_specialists;
use super::types::{AgentId, AgentStatus, Capability, Message, Task};
use crate::config::OrchestratorConfig;
use crate::knowledge::KnowledgeBase;
use crate::llm::{ModelProvider, TextGenerator};
use crate::{Error, Result};

/// Error tag for a message no agent would take
pub const NO_SUITABLE_AGENT: &str = "no_suitable_agent";

const NO_AGENT_REPLY: &str =
    "Sorry, no agent is currently available to handle your request.";

const NO_AGENT_FOR_TASK: &str = "No suitable agent available to execute this task";

/// Builds the specialist behind a registered agent type
pub type AgentFactory = Arc<dyn Fn() -> Arc<dyn Specialist> + Send + Sync>;

/// Per-agent overrides accepted by [`Orchestrator::create_agent`]
#[derive(Debug, Clone, Default)]
pub struct AgentOptions {
    /// Replaces the specialist's relevance keywords
    pub keywords: Option<Vec<String>>,
    /// Knowledge collection searched by default
    pub collection: Option<String>,
    pub system_prompt: Option<String>,
    /// Provider hint sent with every generation request
    pub provider: Option<ModelProvider>,
}

impl AgentOptions {
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = Some(keywords.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_provider(mut self, provider: ModelProvider) -> Self {
        self.provider = Some(provider);
        self
    }
}

/// Aggregate routing statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestratorStats {
    pub total_messages: u64,
    pub total_tasks: u64,
    pub successful_routes: u64,
    pub success_rate: f64,
    pub failed_tasks: u64,
    pub active_contexts: usize,
    pub routing_rules: usize,
    pub registered_agent_types: Vec<String>,
    pub total_agents: usize,
    pub active_agents: usize,
}

/// Status of every registered agent, in registration order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStatus {
    pub total_agents: usize,
    pub active_agents: usize,
    pub agents: Vec<AgentStatus>,
}

#[derive(Default)]
struct Registry {
    factories: HashMap<String, AgentFactory>,
    agents: HashMap<AgentId, Arc<Agent>>,
    /// Registration order, used for tie-breaking
    order: Vec<AgentId>,
    /// Sorted by priority, highest first
    rules: Vec<RoutingRule>,
}

impl Registry {
    fn snapshot(&self) -> Vec<Arc<Agent>> {
        self.order
            .iter()
            .filter_map(|id| self.agents.get(id).cloned())
            .collect()
    }
}

#[derive(Default)]
struct Counters {
    total_messages: AtomicU64,
    total_tasks: AtomicU64,
    successful_routes: AtomicU64,
    failed_tasks: AtomicU64,
}

/// Routes messages and tasks to a pool of specialist agents
pub struct Orchestrator {
    config: OrchestratorConfig,
    generator: Arc<dyn TextGenerator>,
    knowledge: Arc<dyn KnowledgeBase>,
    default_provider: ModelProvider,
    registry: RwLock<Registry>,
    conversations: ConversationStore,
    counters: Counters,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        generator: Arc<dyn TextGenerator>,
        knowledge: Arc<dyn KnowledgeBase>,
    ) -> Self {
        let conversations = ConversationStore::new(
            config.history_limit,
            config.context_ttl_secs,
            config.max_contexts,
        );
        info!("Orchestrator initialized (generator: {})", generator.name());

        Self {
            config,
            generator,
            knowledge,
            default_provider: ModelProvider::default(),
            registry: RwLock::new(Registry::default()),
            conversations,
            counters: Counters::default(),
        }
    }

    /// Provider used by agents created without an explicit one
    pub fn with_default_provider(mut self, provider: ModelProvider) -> Self {
        self.default_provider = provider;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Register (or replace) a constructible agent type
    pub async fn register_agent_type<F>(&self, type_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Specialist> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        let mut registry = self.registry.write().await;
        if registry
            .factories
            .insert(type_name.clone(), Arc::new(factory))
            .is_some()
        {
            debug!("Replaced agent type: {}", type_name);
        } else {
            info!("Registered agent type: {}", type_name);
        }
    }

    /// Register the five built-in specialists under their kind names
    pub async fn register_default_agents(&self) {
        for specialist in builtin_specialists() {
            let kind = specialist.kind();
            self.register_agent_type(kind, move || specialist.clone())
                .await;
        }
    }

    /// Registered type names, sorted
    pub async fn agent_types(&self) -> Vec<String> {
        let registry = self.registry.read().await;
        let mut types: Vec<String> = registry.factories.keys().cloned().collect();
        types.sort();
        types
    }

    /// Instantiate an agent of a registered type.
    ///
    /// Empty `name`, `description` or `capabilities` keep the specialist's
    /// own defaults.
    pub async fn create_agent(
        &self,
        type_name: &str,
        name: &str,
        description: &str,
        capabilities: Vec<Capability>,
        options: AgentOptions,
    ) -> Result<AgentId> {
        let factory = self
            .registry
            .read()
            .await
            .factories
            .get(type_name)
            .cloned()
            .ok_or_else(|| Error::UnknownAgentType(type_name.to_string()))?;

        let specialist = factory();
        let services = AgentServices {
            generator: self.generator.clone(),
            knowledge: self.knowledge.clone(),
            provider: options.provider.unwrap_or(self.default_provider),
            collection: options
                .collection
                .unwrap_or_else(|| specialist.default_collection().to_string()),
            system_prompt: options
                .system_prompt
                .unwrap_or_else(|| specialist.system_prompt().to_string()),
            prompt_history: self.config.prompt_history,
            knowledge_results: self.config.knowledge_results,
        };

        let mut agent = Agent::new(specialist, services)
            .with_capabilities(capabilities)
            .with_completed_retention(self.config.completed_task_retention);
        if !name.is_empty() {
            agent = agent.with_name(name);
        }
        if !description.is_empty() {
            agent = agent.with_description(description);
        }
        if let Some(keywords) = options.keywords {
            agent = agent.with_keywords(keywords);
        }

        let id = agent.id().clone();
        info!("Created agent: {} ({}, type {})", agent.name(), id, type_name);

        let mut registry = self.registry.write().await;
        registry.agents.insert(id.clone(), Arc::new(agent));
        registry.order.push(id.clone());
        Ok(id)
    }

    /// Create one agent per registered type, in type-name order
    pub async fn create_default_agents(&self) -> Result<Vec<AgentId>> {
        let mut ids = Vec::new();
        for type_name in self.agent_types().await {
            ids.push(
                self.create_agent(&type_name, "", "", Vec::new(), AgentOptions::default())
                    .await?,
            );
        }
        Ok(ids)
    }

    /// Unregister an agent. Its cleanup runs detached; the agent is
    /// unreachable for routing as soon as this returns.
    pub async fn remove_agent(&self, agent_id: &AgentId) -> bool {
        let removed = {
            let mut registry = self.registry.write().await;
            let removed = registry.agents.remove(agent_id);
            if removed.is_some() {
                registry.order.retain(|id| id != agent_id);
                registry.rules.retain(|rule| &rule.agent_id != agent_id);
            }
            removed
        };

        match removed {
            Some(agent) => {
                info!("Removed agent: {} ({})", agent.name(), agent_id);
                tokio::spawn(async move {
                    agent.cleanup();
                });
                true
            }
            None => {
                debug!("Remove requested for unknown agent: {}", agent_id);
                false
            }
        }
    }

    pub async fn agent(&self, agent_id: &AgentId) -> Option<Arc<Agent>> {
        self.registry.read().await.agents.get(agent_id).cloned()
    }

    /// All agents in registration order
    pub async fn agents(&self) -> Vec<Arc<Agent>> {
        self.registry.read().await.snapshot()
    }

    /// Route a chat message to the most suitable agent.
    ///
    /// Never fails. When no agent accepts the message the reply carries the
    /// [`NO_SUITABLE_AGENT`] error tag and history is left untouched.
    pub async fn route_message(
        &self,
        text: &str,
        user_id: &str,
        conversation_id: Option<&str>,
        preferred: Option<&AgentId>,
    ) -> Message {
        self.counters.total_messages.fetch_add(1, Ordering::Relaxed);

        let conversation_id = conversation_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let context = self.conversations.get_or_create(&conversation_id, user_id);

        let (agents, rules) = {
            let registry = self.registry.read().await;
            (registry.snapshot(), registry.rules.clone())
        };

        let Some(selection) = select_for_message(&agents, text, &context, preferred, &rules)
        else {
            warn!(
                "No suitable agent for message in conversation {} ({} agents registered)",
                conversation_id,
                agents.len()
            );
            return Message::assistant(NO_AGENT_REPLY)
                .with_metadata("error", NO_SUITABLE_AGENT)
                .with_conversation(conversation_id);
        };

        log_selection("message", &selection);
        let agent = selection.agent;
        let user_message = Message::user(text)
            .with_metadata("user_id", user_id)
            .with_conversation(conversation_id.clone());
        let response = agent.handle_message(text, &context).await;

        self.conversations
            .append(&conversation_id, user_id, [user_message, response.clone()]);

        let exercised: Vec<Capability> = extract_capabilities(text)
            .into_iter()
            .filter(|c| agent.capabilities().contains(c))
            .collect();
        self.conversations
            .record_capabilities(&conversation_id, &exercised);

        self.counters
            .successful_routes
            .fetch_add(1, Ordering::Relaxed);
        response
    }

    /// Run a task on the most suitable agent and return it in its final state.
    ///
    /// Never fails: a missing agent or an execution error is recorded on the
    /// returned task.
    pub async fn execute_task(
        &self,
        mut task: Task,
        user_id: &str,
        conversation_id: Option<&str>,
        preferred: Option<&AgentId>,
    ) -> Task {
        self.counters.total_tasks.fetch_add(1, Ordering::Relaxed);

        let conversation_id = conversation_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let created = self.conversations.get_or_create(&conversation_id, user_id);
        self.conversations
            .set_current_task(&conversation_id, Some(task.id.clone()));
        let context = self.conversations.get(&conversation_id).unwrap_or(created);

        let agents = self.registry.read().await.snapshot();
        let task_id = task.id.clone();

        let result = match select_for_task(&agents, &task, &context, preferred) {
            None => {
                warn!("No suitable agent for task: {}", task.name);
                if task.fail(NO_AGENT_FOR_TASK) {
                    self.counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
                }
                task
            }
            Some(selection) => {
                log_selection("task", &selection);
                let agent = selection.agent;
                let required = task.required_capabilities.clone();

                match agent.start_task(task.clone(), &context).await {
                    Ok(done) => {
                        let exercised: Vec<Capability> = required
                            .into_iter()
                            .filter(|c| agent.capabilities().contains(c))
                            .collect();
                        self.conversations
                            .record_capabilities(&conversation_id, &exercised);
                        done
                    }
                    Err(Error::TaskFailed(failed)) => {
                        self.counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
                        *failed
                    }
                    Err(e) => {
                        error!("Task {} could not be started: {}", task.name, e);
                        if task.fail(e.to_string()) {
                            self.counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
                        }
                        task
                    }
                }
            }
        };

        self.conversations.finish_task(&conversation_id, &task_id);
        result
    }

    /// Add a static routing rule; rules are kept sorted by priority
    pub async fn add_routing_rule(
        &self,
        pattern: impl Into<String>,
        agent_id: AgentId,
        priority: i32,
    ) {
        let rule = RoutingRule::new(pattern, agent_id, priority);
        info!("Added routing rule: {} -> {}", rule.pattern, rule.agent_id);

        let mut registry = self.registry.write().await;
        registry.rules.push(rule);
        registry.rules.sort_by_key(|r| Reverse(r.priority));
    }

    /// Remove every rule with this pattern
    pub async fn remove_routing_rule(&self, pattern: &str) -> bool {
        let mut registry = self.registry.write().await;
        let before = registry.rules.len();
        registry.rules.retain(|r| r.pattern != pattern);

        let removed = registry.rules.len() < before;
        if removed {
            info!("Removed routing rule: {}", pattern);
        }
        removed
    }

    pub async fn routing_rules(&self) -> Vec<RoutingRule> {
        self.registry.read().await.rules.clone()
    }

    pub async fn agent_status(&self, agent_id: &AgentId) -> Result<AgentStatus> {
        self.agent(agent_id)
            .await
            .map(|agent| agent.status())
            .ok_or_else(|| Error::AgentNotFound(agent_id.to_string()))
    }

    pub async fn pool_status(&self) -> PoolStatus {
        let agents: Vec<AgentStatus> = self
            .agents()
            .await
            .iter()
            .map(|agent| agent.status())
            .collect();

        PoolStatus {
            total_agents: agents.len(),
            active_agents: agents.iter().filter(|s| s.active).count(),
            agents,
        }
    }

    pub async fn stats(&self) -> OrchestratorStats {
        let total_messages = self.counters.total_messages.load(Ordering::Relaxed);
        let successful_routes = self.counters.successful_routes.load(Ordering::Relaxed);

        let registry = self.registry.read().await;
        let mut registered_agent_types: Vec<String> =
            registry.factories.keys().cloned().collect();
        registered_agent_types.sort();

        OrchestratorStats {
            total_messages,
            total_tasks: self.counters.total_tasks.load(Ordering::Relaxed),
            successful_routes,
            success_rate: if total_messages == 0 {
                0.0
            } else {
                successful_routes as f64 / total_messages as f64
            },
            failed_tasks: self.counters.failed_tasks.load(Ordering::Relaxed),
            active_contexts: self.conversations.len(),
            routing_rules: registry.rules.len(),
            registered_agent_types,
            total_agents: registry.agents.len(),
            active_agents: registry.agents.values().filter(|a| a.is_active()).count(),
        }
    }

    /// Snapshot of a conversation
    pub fn conversation(&self, conversation_id: &str) -> Option<ConversationContext> {
        self.conversations.get(conversation_id)
    }

    pub fn delete_conversation(&self, conversation_id: &str) -> bool {
        let removed = self.conversations.remove(conversation_id);
        if removed {
            debug!("Deleted conversation: {}", conversation_id);
        }
        removed
    }

    pub fn evict_idle_conversations(&self) -> usize {
        self.conversations.evict_idle()
    }

    /// Start the periodic idle-conversation sweep. `None` when expiry is off.
    pub fn spawn_context_sweeper(&self) -> Option<JoinHandle<()>> {
        if self.config.context_ttl_secs == 0 {
            return None;
        }
        let every = Duration::from_secs(self.config.context_sweep_interval_secs.max(1));
        info!("Context sweeper running every {}s", every.as_secs());
        Some(self.conversations.spawn_sweeper(every))
    }

    /// Clean up every agent concurrently, then clear all registries and
    /// conversations
    pub async fn cleanup(&self) {
        let agents: Vec<Arc<Agent>> = {
            let mut registry = self.registry.write().await;
            let agents = registry.snapshot();
            registry.agents.clear();
            registry.order.clear();
            registry.rules.clear();
            registry.factories.clear();
            agents
        };

        let mut cleanups = JoinSet::new();
        for agent in agents {
            cleanups.spawn(async move { agent.cleanup() });
        }
        while let Some(result) = cleanups.join_next().await {
            if let Err(e) = result {
                error!("Agent cleanup task failed: {}", e);
            }
        }

        self.conversations.clear();
        info!("Orchestrator cleanup complete");
    }
}

fn log_selection(what: &str, selection: &Selection) {
    match selection.score {
        Some(score) => info!(
            "Selected {} for {} (score {:.1}, {:?})",
            selection.agent.name(),
            what,
            score,
            selection.reason
        ),
        None => info!(
            "Selected {} for {} ({:?})",
            selection.agent.name(),
            what,
            selection.reason
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::agent::test_support::ScriptedSpecialist;
    use crate::agents::types::TaskStatus;
    use crate::knowledge::EmptyKnowledgeBase;
    use crate::llm::{MockTextGenerator, ProviderRouter};

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(
            OrchestratorConfig::default(),
            Arc::new(MockTextGenerator::new()),
            Arc::new(EmptyKnowledgeBase),
        )
    }

    async fn register_scripted(orch: &Orchestrator) {
        orch.register_agent_type("sales_desk", || {
            Arc::new(ScriptedSpecialist::new(
                &["revenue", "sales"],
                vec![Capability::DataAnalysis],
            )) as Arc<dyn Specialist>
        })
        .await;
        orch.register_agent_type("stock_desk", || {
            Arc::new(ScriptedSpecialist::new(
                &["stock", "inventory"],
                vec![Capability::RealTimeProcessing],
            )) as Arc<dyn Specialist>
        })
        .await;
        orch.register_agent_type("failing_desk", || {
            let mut specialist = ScriptedSpecialist::new(&["sales"], vec![]);
            specialist.fail_tasks = true;
            Arc::new(specialist) as Arc<dyn Specialist>
        })
        .await;
    }

    /// AgentA (sales, 10 requests / 9 ok / 1.2s) and a fresh AgentB (stock)
    async fn two_agent_pool() -> (Orchestrator, AgentId, AgentId) {
        let orch = orchestrator();
        register_scripted(&orch).await;

        let a = orch
            .create_agent("sales_desk", "AgentA", "", vec![], AgentOptions::default())
            .await
            .unwrap();
        let b = orch
            .create_agent("stock_desk", "AgentB", "", vec![], AgentOptions::default())
            .await
            .unwrap();
        orch.agent(&a).await.unwrap().seed_counters(10, 9, 1, 1.2);

        (orch, a, b)
    }

    #[tokio::test]
    async fn test_unknown_agent_type() {
        let orch = orchestrator();
        let err = orch
            .create_agent("ghost", "", "", vec![], AgentOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnknownAgentType(ref t) if t == "ghost"));
        assert!(err.is_caller_error());
    }

    #[tokio::test]
    async fn test_routes_sales_message_to_agent_a() {
        let (orch, a, _) = two_agent_pool().await;

        let reply = orch
            .route_message("please analyze Q4 sales revenue", "u-1", Some("conv-1"), None)
            .await;

        assert_eq!(reply.agent_id.as_ref(), Some(&a));
        assert!(!reply.is_error());
        assert_eq!(orch.agent_status(&a).await.unwrap().total_requests, 11);

        let context = orch.conversation("conv-1").unwrap();
        assert_eq!(context.message_count(), 2);
        assert_eq!(context.history[0].content, "please analyze Q4 sales revenue");
        assert_eq!(context.history[0].metadata["user_id"], "u-1");
        // the user turn is stamped before the reply it precedes
        assert!(context.history[0].timestamp <= context.history[1].timestamp);
        assert_eq!(context.capabilities_used, vec![Capability::DataAnalysis]);
    }

    #[tokio::test]
    async fn test_routes_stock_message_to_new_agent_b() {
        let (orch, a, b) = two_agent_pool().await;

        let reply = orch
            .route_message("check stock levels", "u-1", None, None)
            .await;

        assert_eq!(reply.agent_id.as_ref(), Some(&b));
        assert_eq!(orch.agent_status(&b).await.unwrap().total_requests, 1);
        assert_eq!(orch.agent_status(&a).await.unwrap().total_requests, 10);
        // a conversation id is generated when none is given
        let conversation_id = reply.conversation_id.unwrap();
        assert!(orch.conversation(&conversation_id).is_some());
    }

    #[tokio::test]
    async fn test_task_goes_to_higher_scoring_agent() {
        let (orch, a, b) = two_agent_pool().await;
        orch.agent(&b).await.unwrap().seed_counters(10, 5, 5, 2.0);

        let task = Task::new("weekly report", "summarise the week").with_priority(8);
        let done = orch.execute_task(task, "u-1", Some("conv-1"), None).await;

        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.agent_id.as_ref(), Some(&a));
        assert!(orch.conversation("conv-1").unwrap().current_task.is_none());
        assert_eq!(orch.stats().await.total_tasks, 1);
    }

    #[tokio::test]
    async fn test_refusal_only_pool_yields_no_suitable_agent() {
        let orch = orchestrator();
        register_scripted(&orch).await;
        orch.create_agent("stock_desk", "", "", vec![], AgentOptions::default())
            .await
            .unwrap();

        let reply = orch
            .route_message("what is the weather like?", "u-1", Some("c"), None)
            .await;

        assert_eq!(reply.error_kind(), Some(NO_SUITABLE_AGENT));
        assert_eq!(reply.conversation_id.as_deref(), Some("c"));
        assert_eq!(orch.conversation("c").unwrap().message_count(), 0);

        let stats = orch.stats().await;
        assert_eq!(stats.total_messages, 1);
        assert_eq!(stats.successful_routes, 0);
        assert_eq!(stats.success_rate, 0.0);
    }

    #[tokio::test]
    async fn test_task_without_candidate_is_failed_not_raised() {
        let (orch, _, _) = two_agent_pool().await;

        let task = Task::new("scan", "read receipts")
            .with_required_capabilities(vec![Capability::MultiModal]);
        let done = orch.execute_task(task, "u-1", Some("c"), None).await;

        assert_eq!(done.status, TaskStatus::Failed);
        assert_eq!(done.error_message.as_deref(), Some(NO_AGENT_FOR_TASK));
        assert!(done.completed_at.is_some());
        assert_eq!(orch.stats().await.failed_tasks, 1);
    }

    #[tokio::test]
    async fn test_task_failure_is_returned_as_failed_task() {
        let orch = orchestrator();
        register_scripted(&orch).await;
        let id = orch
            .create_agent("failing_desk", "", "", vec![], AgentOptions::default())
            .await
            .unwrap();

        let done = orch
            .execute_task(Task::new("report", "weekly"), "u-1", None, None)
            .await;

        assert_eq!(done.status, TaskStatus::Failed);
        assert!(done.error_message.unwrap().contains("warehouse offline"));
        assert_eq!(orch.agent_status(&id).await.unwrap().error_count, 1);
        assert_eq!(orch.stats().await.failed_tasks, 1);
    }

    #[tokio::test]
    async fn test_finished_task_is_not_rerun() {
        let (orch, _, _) = two_agent_pool().await;
        let mut task = Task::new("report", "weekly");
        task.cancel("not needed");

        let returned = orch.execute_task(task, "u-1", None, None).await;
        assert_eq!(returned.status, TaskStatus::Cancelled);
        assert_eq!(orch.stats().await.failed_tasks, 0);
    }

    #[tokio::test]
    async fn test_preferred_agent() {
        let (orch, a, _) = two_agent_pool().await;
        let other = orch
            .create_agent("sales_desk", "AgentC", "", vec![], AgentOptions::default())
            .await
            .unwrap();
        // 12 + 14 + 20 - 14 = 32, well below AgentA's 72.8
        orch.agent(&other).await.unwrap().seed_counters(10, 3, 7, 6.0);

        let reply = orch
            .route_message("sales today", "u", None, Some(&other))
            .await;
        assert_eq!(reply.agent_id.as_ref(), Some(&other));

        // one more success still leaves AgentC far behind
        let reply = orch.route_message("sales today", "u", None, None).await;
        assert_eq!(reply.agent_id.as_ref(), Some(&a));
    }

    /// One scripted sales agent whose message replies wait `delays` seconds in turn
    async fn slow_pool(config: OrchestratorConfig, delays: &'static [u64]) -> (Orchestrator, AgentId) {
        let orch = Orchestrator::new(
            config,
            Arc::new(MockTextGenerator::new()),
            Arc::new(EmptyKnowledgeBase),
        );
        orch.register_agent_type("slow_desk", move || {
            let specialist = ScriptedSpecialist::new(&["sales"], vec![]);
            *specialist.delays.lock().unwrap() = delays.iter().copied().collect();
            Arc::new(specialist) as Arc<dyn Specialist>
        })
        .await;
        let id = orch
            .create_agent("slow_desk", "", "", vec![], AgentOptions::default())
            .await
            .unwrap();
        (orch, id)
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_messages_land_in_completion_order() {
        let (orch, id) = slow_pool(OrchestratorConfig::default(), &[3, 1, 2]).await;

        let texts = ["sales 0", "sales 1", "sales 2"];
        let replies = futures::future::join_all(
            texts
                .iter()
                .map(|text| orch.route_message(text, "u", Some("shared"), None)),
        )
        .await;
        assert!(replies.iter().all(|r| !r.is_error()));

        assert_eq!(orch.agent_status(&id).await.unwrap().total_requests, 3);
        assert_eq!(orch.stats().await.successful_routes, 3);

        let context = orch.conversation("shared").unwrap();
        assert_eq!(context.message_count(), 6);
        let contents: Vec<&str> = context.history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "sales 1", "echo: sales 1", "sales 2", "echo: sales 2", "sales 0",
                "echo: sales 0",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exchange_survives_eviction_while_in_flight() {
        let config = OrchestratorConfig {
            max_contexts: 1,
            ..OrchestratorConfig::default()
        };
        let (orch, _) = slow_pool(config, &[5, 0]).await;

        // "b" takes the only slot while "a" is still waiting on its agent
        let (reply_a, reply_b) = futures::future::join(
            orch.route_message("sales for store a", "u-a", Some("a"), None),
            orch.route_message("sales for store b", "u-b", Some("b"), None),
        )
        .await;
        assert!(!reply_a.is_error());
        assert!(!reply_b.is_error());

        let context = orch.conversation("a").unwrap();
        assert_eq!(context.user_id, "u-a");
        assert_eq!(context.message_count(), 2);
        assert_eq!(context.history[0].content, "sales for store a");
        assert_eq!(context.history[1].content, "echo: sales for store a");
        assert_eq!(orch.stats().await.active_contexts, 1);
    }

    #[tokio::test]
    async fn test_routing_rules() {
        let (orch, a, _) = two_agent_pool().await;
        let pinned = orch
            .create_agent("sales_desk", "Pinned", "", vec![], AgentOptions::default())
            .await
            .unwrap();

        orch.add_routing_rule("margin", a.clone(), 1).await;
        orch.add_routing_rule("forecast", pinned.clone(), 9).await;
        let rules = orch.routing_rules().await;
        assert_eq!(rules[0].pattern, "forecast");

        let reply = orch
            .route_message("sales forecast please", "u", None, None)
            .await;
        assert_eq!(reply.agent_id.as_ref(), Some(&pinned));

        assert!(orch.remove_routing_rule("forecast").await);
        assert!(!orch.remove_routing_rule("forecast").await);
        assert_eq!(orch.stats().await.routing_rules, 1);
    }

    #[tokio::test]
    async fn test_remove_agent() {
        let (orch, a, _) = two_agent_pool().await;
        let handle = orch.agent(&a).await.unwrap();
        orch.add_routing_rule("q4", a.clone(), 1).await;

        assert!(orch.remove_agent(&a).await);
        assert!(!orch.remove_agent(&a).await);
        assert!(orch.routing_rules().await.is_empty());
        assert!(matches!(
            orch.agent_status(&a).await,
            Err(Error::AgentNotFound(_))
        ));

        let reply = orch.route_message("sales", "u", None, None).await;
        assert_eq!(reply.error_kind(), Some(NO_SUITABLE_AGENT));

        // detached cleanup eventually deactivates the agent
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_active());
    }

    #[tokio::test]
    async fn test_create_agent_with_options() {
        let orch = orchestrator().with_default_provider(ModelProvider::DeepSeek);
        register_scripted(&orch).await;

        let custom = orch
            .create_agent(
                "sales_desk",
                "Margins",
                "gross margin questions",
                vec![Capability::Reasoning],
                AgentOptions::default()
                    .with_keywords(["margin"])
                    .with_collection("finance_kb")
                    .with_provider(ModelProvider::Anthropic),
            )
            .await
            .unwrap();
        let plain = orch
            .create_agent("sales_desk", "", "", vec![], AgentOptions::default())
            .await
            .unwrap();

        let status = orch.agent_status(&custom).await.unwrap();
        assert_eq!(status.name, "Margins");
        assert_eq!(status.description, "gross margin questions");
        assert_eq!(status.capabilities, vec![Capability::Reasoning]);
        assert_eq!(status.provider, ModelProvider::Anthropic);
        assert_eq!(orch.agent(&custom).await.unwrap().collection(), "finance_kb");

        let status = orch.agent_status(&plain).await.unwrap();
        assert_eq!(status.name, "Scripted Agent");
        assert_eq!(status.provider, ModelProvider::DeepSeek);
        assert_eq!(status.capabilities, vec![Capability::DataAnalysis]);

        let reply = orch.route_message("net MARGIN", "u", None, None).await;
        assert_eq!(reply.agent_id.as_ref(), Some(&custom));
    }

    #[tokio::test]
    async fn test_agent_provider_hint_reaches_router() {
        let openai = Arc::new(MockTextGenerator::new());
        let router = ProviderRouter::new().with_generator(ModelProvider::OpenAi, openai.clone());
        let orch = Orchestrator::new(
            OrchestratorConfig::default(),
            Arc::new(router),
            Arc::new(EmptyKnowledgeBase),
        );
        orch.register_default_agents().await;

        let claude = orch
            .create_agent(
                "sales",
                "Claude Sales",
                "",
                vec![],
                AgentOptions::default().with_provider(ModelProvider::Anthropic),
            )
            .await
            .unwrap();
        let reply = orch
            .route_message("Q4 sales revenue", "u", None, Some(&claude))
            .await;

        // generator failures come back as an error reply, never as a panic
        assert_eq!(reply.agent_id.as_ref(), Some(&claude));
        assert!(reply.error_kind().unwrap().contains("provider anthropic unavailable"));
        assert_eq!(orch.agent_status(&claude).await.unwrap().error_count, 1);
        assert_eq!(openai.calls(), 0);

        let gpt = orch
            .create_agent("sales", "", "", vec![], AgentOptions::default())
            .await
            .unwrap();
        let reply = orch
            .route_message("Q4 sales revenue", "u", None, Some(&gpt))
            .await;
        assert!(!reply.is_error());
        assert_eq!(openai.calls(), 1);
    }

    #[tokio::test]
    async fn test_default_agents() {
        let orch = orchestrator();
        orch.register_default_agents().await;
        let ids = orch.create_default_agents().await.unwrap();
        assert_eq!(ids.len(), 5);

        let stats = orch.stats().await;
        assert_eq!(
            stats.registered_agent_types,
            vec!["customer_service", "data_analysis", "inventory", "retail", "sales"]
        );
        assert_eq!(stats.active_agents, 5);

        let reply = orch
            .route_message("Where is my order?", "u", None, None)
            .await;
        let agent = orch.agent(reply.agent_id.as_ref().unwrap()).await.unwrap();
        assert_eq!(agent.kind(), "customer_service");
    }

    #[tokio::test]
    async fn test_pool_status_and_conversation_management() {
        let (orch, a, b) = two_agent_pool().await;
        orch.route_message("sales", "u", Some("c-1"), None).await;

        let pool = orch.pool_status().await;
        assert_eq!(pool.total_agents, 2);
        assert_eq!(pool.agents[0].id, a);
        assert_eq!(pool.agents[1].id, b);

        assert!(orch.delete_conversation("c-1"));
        assert!(!orch.delete_conversation("c-1"));
        assert_eq!(orch.evict_idle_conversations(), 0);
    }

    #[tokio::test]
    async fn test_sweeper_disabled_without_ttl() {
        let config = OrchestratorConfig {
            context_ttl_secs: 0,
            ..OrchestratorConfig::default()
        };
        let orch = Orchestrator::new(
            config,
            Arc::new(MockTextGenerator::new()),
            Arc::new(EmptyKnowledgeBase),
        );
        assert!(orch.spawn_context_sweeper().is_none());

        let handle = orchestrator().spawn_context_sweeper().unwrap();
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_clears_everything() {
        let (orch, a, _) = two_agent_pool().await;
        let handle = orch.agent(&a).await.unwrap();
        orch.route_message("sales", "u", Some("c"), None).await;

        orch.cleanup().await;

        assert!(!handle.is_active());
        let stats = orch.stats().await;
        assert_eq!(stats.total_agents, 0);
        assert_eq!(stats.active_contexts, 0);
        assert!(stats.registered_agent_types.is_empty());

        // a second cleanup is harmless
        orch.cleanup().await;
        assert!(orch.agents().await.is_empty());
    }
}
