//! Agent record and specialist contract
//!
//! An [`Agent`] owns identity, counters and task bookkeeping. Everything
//! domain-specific (keywords, prompts, task handlers) lives behind the
//! [`Specialist`] trait, so the message/task protocol is the same for every
//! kind of agent.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::capability::{contains_any_keyword, count_overlap};
use super::context::ConversationContext;
use super::scoring::AgentCounters;
use super::types::{AgentId, AgentStatus, Capability, Message, Task, TaskId, TaskStatus};
use crate::knowledge::{KnowledgeBase, KnowledgeSnippet};
use crate::llm::{ChatMessage, GenerationRequest, ModelProvider, TextGenerator};
use crate::{Error, Result};

/// Error tag for a message the agent declined
pub const UNSUPPORTED_REQUEST: &str = "unsupported_request";

/// Reason recorded on tasks cancelled by [`Agent::cleanup`]
pub const SHUTDOWN_REASON: &str = "Agent shutdown";

/// Default completed-task retention per agent
pub const DEFAULT_COMPLETED_RETENTION: usize = 100;

/// Domain behavior plugged into an [`Agent`]
#[async_trait]
pub trait Specialist: Send + Sync {
    /// Registry key, e.g. `"sales"`
    fn kind(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Capabilities used when the creator does not override them
    fn default_capabilities(&self) -> Vec<Capability>;

    /// Substring triggers for the default `can_handle_message`
    fn relevance_keywords(&self) -> &'static [&'static str];

    /// Knowledge collection searched when none is given
    fn default_collection(&self) -> &'static str;

    fn system_prompt(&self) -> &'static str;

    /// Whether this agent should answer `text`
    fn can_handle_message(
        &self,
        text: &str,
        _context: &ConversationContext,
        keywords: &[String],
    ) -> bool {
        contains_any_keyword(text, keywords)
    }

    /// Whether this agent may run `task`
    fn can_execute_task(&self, task: &Task, capabilities: &[Capability]) -> bool {
        task.required_capabilities.is_empty()
            || count_overlap(capabilities, &task.required_capabilities) > 0
    }

    /// Produce a reply. Ids are stamped by the caller.
    async fn process_message(
        &self,
        text: &str,
        context: &ConversationContext,
        services: &AgentServices,
    ) -> Result<Message>;

    /// Run a task and return its output payload
    async fn execute_task(
        &self,
        task: &Task,
        context: &ConversationContext,
        services: &AgentServices,
    ) -> Result<HashMap<String, JsonValue>>;
}

/// External services and per-agent settings handed to a specialist
#[derive(Clone)]
pub struct AgentServices {
    pub generator: Arc<dyn TextGenerator>,
    pub knowledge: Arc<dyn KnowledgeBase>,
    pub provider: ModelProvider,
    pub collection: String,
    pub system_prompt: String,
    /// Recent user/assistant turns replayed to the generator
    pub prompt_history: usize,
    /// Snippets requested per knowledge lookup
    pub knowledge_results: usize,
}

impl AgentServices {
    /// Ask the generator, prefixed with the system prompt and recent history
    pub async fn generate_response(
        &self,
        prompt: &str,
        context: &ConversationContext,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(self.prompt_history + 2);
        if !self.system_prompt.is_empty() {
            messages.push(ChatMessage::system(self.system_prompt.clone()));
        }
        for turn in context.recent_turns(self.prompt_history) {
            messages.push(ChatMessage::new(turn.role.as_str(), turn.content.clone()));
        }
        messages.push(ChatMessage::user(prompt));

        let request = GenerationRequest::new(messages, self.provider)
            .with_temperature(temperature)
            .with_max_tokens(max_tokens);

        debug!(
            "Generating with {} ({} messages)",
            self.generator.name(),
            request.messages.len()
        );
        self.generator.generate(request).await
    }

    /// Search the knowledge base; failures are logged and yield no snippets
    pub async fn search_knowledge(
        &self,
        query: &str,
        collection: Option<&str>,
        limit: usize,
    ) -> Vec<KnowledgeSnippet> {
        let collection = collection.unwrap_or(&self.collection);
        match self.knowledge.search(query, collection, limit).await {
            Ok(snippets) => snippets,
            Err(e) => {
                warn!("Knowledge search in {} failed: {}", collection, e);
                Vec::new()
            }
        }
    }
}

#[derive(Debug)]
struct AgentState {
    active: bool,
    total_requests: u64,
    successful_requests: u64,
    error_count: u64,
    average_response_time: f64,
    last_activity: Option<DateTime<Utc>>,
    active_tasks: HashMap<TaskId, Task>,
    completed_tasks: VecDeque<Task>,
    completed_tasks_total: u64,
}

impl AgentState {
    fn new() -> Self {
        Self {
            active: true,
            total_requests: 0,
            successful_requests: 0,
            error_count: 0,
            average_response_time: 0.0,
            last_activity: None,
            active_tasks: HashMap::new(),
            completed_tasks: VecDeque::new(),
            completed_tasks_total: 0,
        }
    }

    fn touch(&mut self) {
        self.total_requests += 1;
        self.last_activity = Some(Utc::now());
    }

    fn record_finished(&mut self, task: Task, retention: usize) {
        self.completed_tasks.push_back(task);
        while self.completed_tasks.len() > retention {
            self.completed_tasks.pop_front();
        }
        self.completed_tasks_total += 1;
    }
}

/// A capability-tagged worker with its own statistics
pub struct Agent {
    id: AgentId,
    name: String,
    description: String,
    capabilities: Vec<Capability>,
    keywords: Vec<String>,
    completed_retention: usize,
    specialist: Arc<dyn Specialist>,
    services: AgentServices,
    state: Mutex<AgentState>,
}

impl Agent {
    /// Create an agent with the specialist's defaults
    pub fn new(specialist: Arc<dyn Specialist>, services: AgentServices) -> Self {
        let agent = Self {
            id: AgentId::default(),
            name: specialist.display_name().to_string(),
            description: specialist.description().to_string(),
            capabilities: specialist.default_capabilities(),
            keywords: specialist
                .relevance_keywords()
                .iter()
                .map(|k| k.to_string())
                .collect(),
            completed_retention: DEFAULT_COMPLETED_RETENTION,
            specialist,
            services,
            state: Mutex::new(AgentState::new()),
        };
        info!("Agent initialized: {} ({})", agent.name, agent.id);
        agent
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Empty means keep the specialist's declared capabilities
    pub fn with_capabilities(mut self, capabilities: Vec<Capability>) -> Self {
        if !capabilities.is_empty() {
            self.capabilities = capabilities;
        }
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_completed_retention(mut self, retention: usize) -> Self {
        self.completed_retention = retention.max(1);
        self
    }

    fn state(&self) -> MutexGuard<'_, AgentState> {
        // counters stay usable even if a holder panicked
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn kind(&self) -> &'static str {
        self.specialist.kind()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn provider(&self) -> ModelProvider {
        self.services.provider
    }

    pub fn collection(&self) -> &str {
        &self.services.collection
    }

    pub fn is_active(&self) -> bool {
        self.state().active
    }

    pub fn can_handle_message(&self, text: &str, context: &ConversationContext) -> bool {
        self.specialist
            .can_handle_message(text, context, &self.keywords)
    }

    pub fn can_execute_task(&self, task: &Task, _context: &ConversationContext) -> bool {
        self.specialist.can_execute_task(task, &self.capabilities)
    }

    /// Answer a message. Never fails: refusals and errors come back as messages.
    pub async fn handle_message(&self, text: &str, context: &ConversationContext) -> Message {
        self.state().touch();

        if !self.can_handle_message(text, context) {
            debug!("Agent {} declined message", self.name);
            return Message::assistant(format!(
                "Sorry, I can't help with that. I'm {}, and I handle {}.",
                self.name, self.description
            ))
            .with_metadata("error", UNSUPPORTED_REQUEST)
            .with_agent(self.id.clone())
            .with_conversation(context.conversation_id.clone());
        }

        let started = Instant::now();
        match self
            .specialist
            .process_message(text, context, &self.services)
            .await
        {
            Ok(mut response) => {
                let elapsed = started.elapsed().as_secs_f64();
                response.agent_id = Some(self.id.clone());
                response.conversation_id = Some(context.conversation_id.clone());

                let mut state = self.state();
                state.successful_requests += 1;
                let k = state.successful_requests as f64;
                state.average_response_time =
                    (state.average_response_time * (k - 1.0) + elapsed) / k;

                debug!("Agent {} answered in {:.3}s", self.name, elapsed);
                response
            }
            Err(e) => {
                self.state().error_count += 1;
                error!("Agent {} failed to process message: {}", self.name, e);

                Message::assistant(format!(
                    "Sorry, something went wrong while handling your request: {}",
                    e
                ))
                .with_metadata("error", e.to_string())
                .with_agent(self.id.clone())
                .with_conversation(context.conversation_id.clone())
            }
        }
    }

    /// Run a pending task to completion.
    ///
    /// A failure is recorded on the task and returned as
    /// [`Error::TaskFailed`] carrying the failed task.
    pub async fn start_task(&self, mut task: Task, context: &ConversationContext) -> Result<Task> {
        if task.status != TaskStatus::Pending {
            return Err(Error::InvalidTaskState {
                task_id: task.id.to_string(),
                status: task.status,
            });
        }

        task.mark_running(self.id.clone());
        {
            let mut state = self.state();
            state.touch();
            state.active_tasks.insert(task.id.clone(), task.clone());
        }
        info!("Agent {} started task: {}", self.name, task.name);

        let result = self
            .specialist
            .execute_task(&task, context, &self.services)
            .await;

        let mut state = self.state();
        if state.active_tasks.remove(&task.id).is_none() {
            // cancelled by cleanup while running
            let cancelled = state
                .completed_tasks
                .iter()
                .rev()
                .find(|t| t.id == task.id)
                .cloned();
            drop(state);
            return Ok(cancelled.unwrap_or_else(|| {
                task.cancel(SHUTDOWN_REASON);
                task
            }));
        }

        match result {
            Ok(output) => {
                task.complete(output);
                state.successful_requests += 1;
                state.record_finished(task.clone(), self.completed_retention);
                info!("Agent {} completed task: {}", self.name, task.name);
                Ok(task)
            }
            Err(e) => {
                task.fail(e.to_string());
                state.error_count += 1;
                error!("Agent {} task failed: {} - {}", self.name, task.name, e);
                Err(Error::TaskFailed(Box::new(task)))
            }
        }
    }

    /// Cancel in-flight tasks and deactivate. Idempotent.
    pub fn cleanup(&self) {
        let mut state = self.state();
        let in_flight: Vec<Task> = state.active_tasks.drain().map(|(_, t)| t).collect();
        let cancelled = in_flight.len();

        for mut task in in_flight {
            task.cancel(SHUTDOWN_REASON);
            state.record_finished(task, self.completed_retention);
        }

        if state.active {
            info!(
                "Agent {} cleaned up ({} in-flight tasks cancelled)",
                self.name, cancelled
            );
        }
        state.active = false;
    }

    /// Counter snapshot for scoring
    pub fn counters(&self) -> AgentCounters {
        let state = self.state();
        AgentCounters {
            total_requests: state.total_requests,
            successful_requests: state.successful_requests,
            error_count: state.error_count,
            average_response_time: state.average_response_time,
            in_flight: state.active_tasks.len(),
        }
    }

    pub fn status(&self) -> AgentStatus {
        let state = self.state();
        let success_rate = if state.total_requests == 0 {
            0.0
        } else {
            state.successful_requests as f64 / state.total_requests as f64
        };

        AgentStatus {
            id: self.id.clone(),
            kind: self.kind().to_string(),
            name: self.name.clone(),
            description: self.description.clone(),
            capabilities: self.capabilities.clone(),
            active: state.active,
            provider: self.services.provider,
            total_requests: state.total_requests,
            successful_requests: state.successful_requests,
            error_count: state.error_count,
            success_rate,
            average_response_time: state.average_response_time,
            last_activity: state.last_activity,
            active_tasks: state.active_tasks.len(),
            completed_tasks: state.completed_tasks.len(),
            completed_tasks_total: state.completed_tasks_total,
        }
    }

    /// Retained finished tasks, oldest first
    pub fn completed_tasks(&self) -> Vec<Task> {
        self.state().completed_tasks.iter().cloned().collect()
    }

    pub fn active_task_ids(&self) -> Vec<TaskId> {
        self.state().active_tasks.keys().cloned().collect()
    }

    #[cfg(test)]
    pub(crate) fn seed_counters(&self, total: u64, successful: u64, errors: u64, average: f64) {
        let mut state = self.state();
        state.total_requests = total;
        state.successful_requests = successful;
        state.error_count = errors;
        state.average_response_time = average;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::knowledge::EmptyKnowledgeBase;
    use crate::llm::MockTextGenerator;
    use std::time::Duration;

    /// Specialist with scripted delays and failures
    pub struct ScriptedSpecialist {
        pub keywords: &'static [&'static str],
        pub capabilities: Vec<Capability>,
        pub delays: Mutex<VecDeque<u64>>,
        pub fail_messages: bool,
        pub fail_tasks: bool,
        pub task_delay: Duration,
    }

    impl ScriptedSpecialist {
        pub fn new(keywords: &'static [&'static str], capabilities: Vec<Capability>) -> Self {
            Self {
                keywords,
                capabilities,
                delays: Mutex::new(VecDeque::new()),
                fail_messages: false,
                fail_tasks: false,
                task_delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl Specialist for ScriptedSpecialist {
        fn kind(&self) -> &'static str {
            "scripted"
        }

        fn display_name(&self) -> &'static str {
            "Scripted Agent"
        }

        fn description(&self) -> &'static str {
            "scripted test responses"
        }

        fn default_capabilities(&self) -> Vec<Capability> {
            self.capabilities.clone()
        }

        fn relevance_keywords(&self) -> &'static [&'static str] {
            self.keywords
        }

        fn default_collection(&self) -> &'static str {
            "test_kb"
        }

        fn system_prompt(&self) -> &'static str {
            "You are a test agent."
        }

        async fn process_message(
            &self,
            text: &str,
            _context: &ConversationContext,
            _services: &AgentServices,
        ) -> Result<Message> {
            let delay = self
                .delays
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .pop_front()
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_secs(delay)).await;

            if self.fail_messages {
                return Err(Error::Generation("provider unavailable".to_string()));
            }
            Ok(Message::assistant(format!("echo: {}", text)))
        }

        async fn execute_task(
            &self,
            task: &Task,
            _context: &ConversationContext,
            _services: &AgentServices,
        ) -> Result<HashMap<String, JsonValue>> {
            tokio::time::sleep(self.task_delay).await;
            if self.fail_tasks {
                return Err(Error::ProcessingFailed("warehouse offline".to_string()));
            }
            Ok(HashMap::from([(
                "handled".to_string(),
                JsonValue::String(task.name.clone()),
            )]))
        }
    }

    pub fn services() -> AgentServices {
        AgentServices {
            generator: Arc::new(MockTextGenerator::new()),
            knowledge: Arc::new(EmptyKnowledgeBase),
            provider: ModelProvider::OpenAi,
            collection: "test_kb".to_string(),
            system_prompt: "You are a test agent.".to_string(),
            prompt_history: 10,
            knowledge_results: 5,
        }
    }

    pub fn agent(specialist: ScriptedSpecialist) -> Agent {
        Agent::new(Arc::new(specialist), services())
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::knowledge::SqliteKnowledgeStore;
    use crate::llm::MockTextGenerator;

    fn context() -> ConversationContext {
        ConversationContext::new("conv-1", "user-1")
    }

    #[tokio::test]
    async fn test_counters_are_monotonic() {
        let agent = agent(ScriptedSpecialist::new(&["sales"], vec![Capability::DataAnalysis]));
        let ctx = context();

        let texts = ["sales today", "weather", "sales forecast", "hello"];
        for (i, text) in texts.iter().enumerate() {
            agent.handle_message(text, &ctx).await;
            let status = agent.status();
            assert_eq!(status.total_requests, i as u64 + 1);
            assert!(status.successful_requests <= status.total_requests);
        }

        let status = agent.status();
        assert_eq!(status.successful_requests, 2);
        // refusals are not errors
        assert_eq!(status.error_count, 0);
        assert!((status.success_rate - 0.5).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_average_response_time_is_exact_running_mean() {
        let specialist = ScriptedSpecialist::new(&["sales"], vec![]);
        *specialist.delays.lock().unwrap() = VecDeque::from([1, 2, 4]);
        let agent = agent(specialist);
        let ctx = context();

        let expected = [1.0, 1.5, 7.0 / 3.0];
        for want in expected {
            agent.handle_message("sales", &ctx).await;
            let got = agent.status().average_response_time;
            assert!((got - want).abs() < 1e-6, "expected {want}, got {got}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_move_average() {
        let specialist = ScriptedSpecialist::new(&["sales"], vec![]);
        *specialist.delays.lock().unwrap() = VecDeque::from([2]);
        let agent = agent(specialist);
        agent.handle_message("sales", &context()).await;

        let mut failing = ScriptedSpecialist::new(&["sales"], vec![]);
        failing.fail_messages = true;
        let failing = super::test_support::agent(failing);
        failing.seed_counters(1, 1, 0, 2.0);
        failing.handle_message("sales", &context()).await;

        assert!((agent.status().average_response_time - 2.0).abs() < 1e-6);
        assert!((failing.status().average_response_time - 2.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_refusal_message() {
        let agent = agent(ScriptedSpecialist::new(&["stock"], vec![]));
        let reply = agent.handle_message("what about revenue?", &context()).await;

        assert_eq!(reply.error_kind(), Some(UNSUPPORTED_REQUEST));
        assert_eq!(reply.agent_id.as_ref(), Some(agent.id()));
        assert_eq!(reply.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(agent.status().total_requests, 1);
        assert_eq!(agent.status().error_count, 0);
    }

    #[tokio::test]
    async fn test_processing_error_is_swallowed() {
        let mut specialist = ScriptedSpecialist::new(&["sales"], vec![]);
        specialist.fail_messages = true;
        let agent = agent(specialist);

        let reply = agent.handle_message("sales", &context()).await;
        assert!(reply.is_error());
        assert!(reply.error_kind().unwrap().contains("provider unavailable"));

        let status = agent.status();
        assert_eq!(status.total_requests, 1);
        assert_eq!(status.successful_requests, 0);
        assert_eq!(status.error_count, 1);
    }

    #[tokio::test]
    async fn test_successful_reply_is_stamped() {
        let agent = agent(ScriptedSpecialist::new(&["sales"], vec![]));
        let reply = agent.handle_message("sales numbers", &context()).await;

        assert_eq!(reply.content, "echo: sales numbers");
        assert_eq!(reply.agent_id.as_ref(), Some(agent.id()));
        assert_eq!(reply.conversation_id.as_deref(), Some("conv-1"));
        assert!(agent.status().last_activity.is_some());
    }

    #[tokio::test]
    async fn test_task_success() {
        let agent = agent(ScriptedSpecialist::new(&[], vec![]));
        let task = Task::new("report", "weekly report");

        let done = agent.start_task(task, &context()).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.agent_id.as_ref(), Some(agent.id()));
        assert_eq!(done.output["handled"], "report");
        assert!(done.started_at.is_some() && done.completed_at.is_some());

        let status = agent.status();
        assert_eq!(status.active_tasks, 0);
        assert_eq!(status.completed_tasks, 1);
        assert_eq!(status.successful_requests, 1);
        assert!(status.successful_requests <= status.total_requests);
    }

    #[tokio::test]
    async fn test_task_failure_is_recorded_and_raised() {
        let mut specialist = ScriptedSpecialist::new(&[], vec![]);
        specialist.fail_tasks = true;
        let agent = agent(specialist);

        let err = agent
            .start_task(Task::new("report", "weekly"), &context())
            .await
            .unwrap_err();

        match err {
            Error::TaskFailed(task) => {
                assert_eq!(task.status, TaskStatus::Failed);
                assert!(task.error_message.unwrap().contains("warehouse offline"));
                assert!(task.completed_at.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }

        let status = agent.status();
        assert_eq!(status.error_count, 1);
        assert_eq!(status.active_tasks, 0);
        assert_eq!(status.completed_tasks, 0);
    }

    #[tokio::test]
    async fn test_non_pending_task_rejected() {
        let agent = agent(ScriptedSpecialist::new(&[], vec![]));
        let mut task = Task::new("report", "weekly");
        task.cancel("changed my mind");

        let err = agent.start_task(task, &context()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTaskState { status: TaskStatus::Cancelled, .. }));
        assert_eq!(agent.status().total_requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_cancels_in_flight_task() {
        let mut specialist = ScriptedSpecialist::new(&[], vec![]);
        specialist.task_delay = std::time::Duration::from_secs(10);
        let agent = Arc::new(agent(specialist));

        let runner = {
            let agent = agent.clone();
            tokio::spawn(async move {
                agent
                    .start_task(Task::new("slow", "slow task"), &ConversationContext::new("c", "u"))
                    .await
            })
        };

        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        assert_eq!(agent.status().active_tasks, 1);

        agent.cleanup();
        let status = agent.status();
        assert!(!status.active);
        assert_eq!(status.active_tasks, 0);

        let task = runner.await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert_eq!(task.error_message.as_deref(), Some(SHUTDOWN_REASON));
        // not counted as a success
        assert_eq!(agent.status().successful_requests, 0);
        assert_eq!(agent.status().completed_tasks_total, 1);
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let agent = agent(ScriptedSpecialist::new(&[], vec![]));
        agent.cleanup();
        let first = agent.status();
        agent.cleanup();
        let second = agent.status();

        assert_eq!(first, second);
        assert!(!second.active);
        assert_eq!(second.active_tasks, 0);
    }

    #[tokio::test]
    async fn test_completed_tasks_are_capped() {
        let agent = agent(ScriptedSpecialist::new(&[], vec![])).with_completed_retention(2);
        for i in 0..3 {
            agent
                .start_task(Task::new(format!("t{}", i), "task"), &context())
                .await
                .unwrap();
        }

        let kept: Vec<_> = agent.completed_tasks().into_iter().map(|t| t.name).collect();
        assert_eq!(kept, vec!["t1", "t2"]);
        assert_eq!(agent.status().completed_tasks_total, 3);
    }

    #[test]
    fn test_capability_gate() {
        let agent = agent(ScriptedSpecialist::new(&[], vec![Capability::DataAnalysis]));
        let ctx = context();

        assert!(agent.can_execute_task(&Task::new("any", "no requirements"), &ctx));
        assert!(agent.can_execute_task(
            &Task::new("a", "b").with_required_capabilities(vec![
                Capability::Planning,
                Capability::DataAnalysis
            ]),
            &ctx
        ));
        assert!(!agent.can_execute_task(
            &Task::new("a", "b").with_required_capabilities(vec![Capability::MultiModal]),
            &ctx
        ));
    }

    #[test]
    fn test_overrides() {
        let agent = agent(ScriptedSpecialist::new(&["sales"], vec![Capability::Planning]))
            .with_name("Custom")
            .with_capabilities(vec![])
            .with_keywords(vec!["margin".to_string()]);

        assert_eq!(agent.name(), "Custom");
        assert_eq!(agent.capabilities(), [Capability::Planning].as_slice());
        assert!(agent.can_handle_message("gross MARGIN", &context()));
        assert!(!agent.can_handle_message("sales", &context()));
    }

    #[tokio::test]
    async fn test_generate_response_replays_history() {
        let services = AgentServices {
            generator: Arc::new(MockTextGenerator::new()),
            prompt_history: 1,
            ..services()
        };
        let mut ctx = context();
        ctx.push_message(Message::user("old question"), 10);
        ctx.push_message(Message::assistant("old answer"), 10);

        let reply = services
            .generate_response("new question", &ctx, 0.2, Some(100))
            .await
            .unwrap();
        assert_eq!(reply, "[openai] new question");
    }

    #[tokio::test]
    async fn test_search_knowledge_uses_default_collection() {
        let store = SqliteKnowledgeStore::in_memory().unwrap();
        store
            .add_document("test_kb", "stock levels by store", serde_json::json!({}))
            .unwrap();
        let services = AgentServices {
            knowledge: Arc::new(store),
            ..services()
        };

        assert_eq!(services.search_knowledge("stock", None, 5).await.len(), 1);
        assert!(services.search_knowledge("stock", Some("other"), 5).await.is_empty());
    }
}
