//! Agent selection
//!
//! Picks exactly one agent for a message or task. Agents are visited in
//! registration order and the first agent with the highest score wins, so
//! ties always resolve to the earliest-registered agent.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::agent::Agent;
use super::capability::extract_capabilities;
use super::context::ConversationContext;
use super::scoring::{score_message, score_task};
use super::types::{AgentId, Task};

/// Static text pattern pinned to an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub pattern: String,
    pub agent_id: AgentId,
    /// Higher rules are consulted first
    pub priority: i32,
}

impl RoutingRule {
    pub fn new(pattern: impl Into<String>, agent_id: AgentId, priority: i32) -> Self {
        Self {
            pattern: pattern.into(),
            agent_id,
            priority,
        }
    }

    /// Case-insensitive substring match
    pub fn matches(&self, text: &str) -> bool {
        !self.pattern.is_empty() && text.to_lowercase().contains(&self.pattern.to_lowercase())
    }
}

/// How the winner was chosen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionReason {
    Preferred,
    RoutingRule,
    Scored { candidates: usize },
}

/// Selected agent
#[derive(Clone)]
pub struct Selection {
    pub agent: Arc<Agent>,
    /// `None` when selection skipped scoring
    pub score: Option<f64>,
    pub reason: SelectionReason,
}

fn find_active<'a>(agents: &'a [Arc<Agent>], id: &AgentId) -> Option<&'a Arc<Agent>> {
    agents.iter().find(|a| a.id() == id && a.is_active())
}

fn best_of<'a, I>(scored: I) -> Option<(&'a Arc<Agent>, f64, usize)>
where
    I: Iterator<Item = (&'a Arc<Agent>, f64)>,
{
    let mut best: Option<(&Arc<Agent>, f64)> = None;
    let mut candidates = 0;
    for (agent, score) in scored {
        candidates += 1;
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((agent, score)),
        }
    }
    best.map(|(agent, score)| (agent, score, candidates))
}

/// Choose an agent for a chat message.
///
/// Order: preferred agent, then routing rules (sorted by priority), then
/// the highest-scoring agent among those that accept the message.
pub fn select_for_message(
    agents: &[Arc<Agent>],
    text: &str,
    context: &ConversationContext,
    preferred: Option<&AgentId>,
    rules: &[RoutingRule],
) -> Option<Selection> {
    if let Some(agent) = preferred
        .and_then(|id| find_active(agents, id))
        .filter(|a| a.can_handle_message(text, context))
    {
        return Some(Selection {
            agent: agent.clone(),
            score: None,
            reason: SelectionReason::Preferred,
        });
    }

    for rule in rules.iter().filter(|r| r.matches(text)) {
        if let Some(agent) =
            find_active(agents, &rule.agent_id).filter(|a| a.can_handle_message(text, context))
        {
            debug!("Routing rule '{}' matched agent {}", rule.pattern, agent.name());
            return Some(Selection {
                agent: agent.clone(),
                score: None,
                reason: SelectionReason::RoutingRule,
            });
        }
    }

    let required = extract_capabilities(text);
    let scored = agents
        .iter()
        .filter(|a| a.is_active() && a.can_handle_message(text, context))
        .map(|a| {
            let score = score_message(&a.counters(), a.capabilities(), &required);
            (a, score)
        });

    best_of(scored).map(|(agent, score, candidates)| Selection {
        agent: agent.clone(),
        score: Some(score),
        reason: SelectionReason::Scored { candidates },
    })
}

/// Choose an agent for a task: preferred agent, else best eligible score
pub fn select_for_task(
    agents: &[Arc<Agent>],
    task: &Task,
    context: &ConversationContext,
    preferred: Option<&AgentId>,
) -> Option<Selection> {
    if let Some(agent) = preferred
        .and_then(|id| find_active(agents, id))
        .filter(|a| a.can_execute_task(task, context))
    {
        return Some(Selection {
            agent: agent.clone(),
            score: None,
            reason: SelectionReason::Preferred,
        });
    }

    let scored = agents
        .iter()
        .filter(|a| a.is_active() && a.can_execute_task(task, context))
        .map(|a| {
            let score = score_task(&a.counters(), a.capabilities(), task);
            (a, score)
        });

    best_of(scored).map(|(agent, score, candidates)| Selection {
        agent: agent.clone(),
        score: Some(score),
        reason: SelectionReason::Scored { candidates },
    })
}
