//! Retail specialists
//!
//! Each specialist supplies keywords, a system prompt, a knowledge
//! collection and `task_type` handlers. The handlers return illustrative
//! figures; wiring them to live data belongs to the persistence layer.

mod customer_service;
mod data_analysis;
mod inventory;
mod retail;
mod sales;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value as JsonValue};

pub use customer_service::CustomerServiceSpecialist;
pub use data_analysis::DataAnalysisSpecialist;
pub use inventory::InventorySpecialist;
pub use retail::RetailSpecialist;
pub use sales::SalesSpecialist;

use super::agent::Specialist;
use crate::knowledge::KnowledgeSnippet;

/// The five built-in specialists, in registration order
pub fn builtin_specialists() -> Vec<Arc<dyn Specialist>> {
    vec![
        Arc::new(SalesSpecialist),
        Arc::new(InventorySpecialist),
        Arc::new(CustomerServiceSpecialist),
        Arc::new(DataAnalysisSpecialist),
        Arc::new(RetailSpecialist),
    ]
}

/// Confidence in an answer given the supporting snippets.
///
/// `0.4` with no snippets, otherwise
/// `round2(avg_score * 0.6 + min(n / 5, 1) * 0.4)`.
pub fn knowledge_confidence(snippets: &[KnowledgeSnippet]) -> f64 {
    if snippets.is_empty() {
        return 0.4;
    }

    let n = snippets.len() as f64;
    let avg_score = snippets.iter().map(|s| s.score).sum::<f64>() / n;
    let coverage = (n / 5.0).min(1.0);
    ((avg_score * 0.6 + coverage * 0.4) * 100.0).round() / 100.0
}

/// First keyword group that matches `text` decides the label
pub(crate) fn classify(text: &str, rules: &[(&'static str, &[&str])], fallback: &'static str) -> &'static str {
    let lower = text.to_lowercase();
    rules
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(label, _)| *label)
        .unwrap_or(fallback)
}

pub(crate) fn chart(kind: &str, title: &str, description: &str) -> JsonValue {
    json!({ "type": kind, "title": title, "description": description })
}

/// Prompt body: the question, the analysis focus and up to three snippets
pub(crate) fn build_prompt(
    role: &str,
    text: &str,
    focus: &str,
    snippets: &[KnowledgeSnippet],
    guidance: &str,
) -> String {
    let mut prompt = format!(
        "As {}, answer the following request.\n\nRequest: {}\nFocus: {}\n",
        role, text, focus
    );

    if !snippets.is_empty() {
        prompt.push_str("\nRelevant material:\n");
        for (i, snippet) in snippets.iter().take(3).enumerate() {
            let excerpt: String = snippet.content.chars().take(400).collect();
            prompt.push_str(&format!("{}. {}\n", i + 1, excerpt));
        }
    }

    prompt.push_str(&format!("\n{}\n", guidance.trim()));
    prompt.push_str(
        "\nKeep the answer data-driven and well structured, quote concrete numbers, \
         and end with actionable recommendations.",
    );
    prompt
}

/// Turn a JSON object into a task output map
pub(crate) fn into_output(value: JsonValue) -> HashMap<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map.into_iter().collect(),
        other => HashMap::from([("result".to_string(), other)]),
    }
}
