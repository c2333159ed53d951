//! Capability extraction from free text
//!
//! Best-effort signal only: a missed capability lowers one additive scoring
//! term, it never prevents selection.

use std::collections::BTreeSet;

use super::types::Capability;

/// Trigger keywords per capability (lowercase, substring match)
const CAPABILITY_KEYWORDS: &[(Capability, &[&str])] = &[
    (
        Capability::DataAnalysis,
        &["analyze", "analysis", "statistic", "data", "report", "chart"],
    ),
    (
        Capability::DocumentSearch,
        &["search", "find", "look up", "document", "policy"],
    ),
    (
        Capability::NaturalLanguage,
        &["chat", "talk", "explain", "answer", "summarize"],
    ),
    (
        Capability::WorkflowExecution,
        &["execute", "workflow", "automate", "pipeline", "process"],
    ),
    (
        Capability::RealTimeProcessing,
        &["real-time", "realtime", "live", "monitor", "instant"],
    ),
    (Capability::MultiModal, &["image", "photo", "picture", "scan"]),
    (
        Capability::Reasoning,
        &["reason", "analyze", "judge", "decide", "decision", "why"],
    ),
    (
        Capability::Planning,
        &["plan", "schedule", "strategy", "arrange", "roadmap"],
    ),
];

/// Capabilities whose trigger keywords appear in `text`, in table order
pub fn extract_capabilities(text: &str) -> Vec<Capability> {
    let lower = text.to_lowercase();
    CAPABILITY_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(capability, _)| *capability)
        .collect()
}

/// Case-insensitive substring match against any keyword
pub fn contains_any_keyword<S: AsRef<str>>(text: &str, keywords: &[S]) -> bool {
    let lower = text.to_lowercase();
    keywords
        .iter()
        .map(|k| k.as_ref().to_lowercase())
        .any(|k| !k.is_empty() && lower.contains(&k))
}

/// Number of distinct `required` capabilities present in `declared`
pub fn count_overlap(declared: &[Capability], required: &[Capability]) -> usize {
    required
        .iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|c| declared.contains(c))
        .count()
}

/// Number of distinct capabilities in `capabilities`
pub fn count_distinct(capabilities: &[Capability]) -> usize {
    capabilities.iter().collect::<BTreeSet<_>>().len()
}
