//! Candidate scoring
//!
//! Pure functions over a snapshot of agent counters. Every term is
//! independently bounded and the final score is floored at zero.

use super::capability::{count_distinct, count_overlap};
use super::types::{Capability, Task};

/// Counter snapshot used for scoring
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AgentCounters {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub error_count: u64,
    /// Seconds, 0 until the first success
    pub average_response_time: f64,
    pub in_flight: usize,
}

impl AgentCounters {
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.error_count as f64 / self.total_requests as f64
        }
    }
}

/// Score an agent for a chat message.
///
/// `required` is the capability set extracted from the message text.
pub fn score_message(counters: &AgentCounters, declared: &[Capability], required: &[Capability]) -> f64 {
    let success = if counters.total_requests > 0 {
        counters.success_rate() * 40.0
    } else {
        // untested agents get a flat bonus
        30.0
    };

    let speed = if counters.average_response_time > 0.0 {
        (20.0 - counters.average_response_time).max(0.0)
    } else {
        15.0
    };

    let load = (20.0 - 2.0 * counters.in_flight as f64).max(0.0);
    let penalty = counters.error_rate() * 20.0;
    let capability = 5.0 * count_overlap(declared, required) as f64;

    (success + speed + load - penalty + capability).max(0.0)
}

/// Score an agent for a task
pub fn score_task(counters: &AgentCounters, declared: &[Capability], task: &Task) -> f64 {
    let success = if counters.total_requests > 0 {
        counters.success_rate() * 50.0
    } else {
        35.0
    };

    // deserialized tasks skip the builder clamp
    let priority = task.priority.clamp(Task::MIN_PRIORITY, Task::MAX_PRIORITY) as f64 * 5.0;

    let required = count_distinct(&task.required_capabilities);
    let capability = if required == 0 {
        0.0
    } else {
        30.0 * count_overlap(declared, &task.required_capabilities) as f64 / required as f64
    };

    let load = 3.0 * counters.in_flight as f64;

    (success + priority + capability - load).max(0.0)
}
