//! General retail analysis specialist

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use super::{build_prompt, chart, classify, into_output, knowledge_confidence};
use crate::agents::agent::{AgentServices, Specialist};
use crate::agents::context::ConversationContext;
use crate::agents::types::{Capability, Message, Task};
use crate::Result;

const KEYWORDS: &[&str] = &[
    "retail", "store", "shopper", "customer behavior", "customer behaviour", "product",
    "merchandise", "assortment", "trend", "market", "competitor", "competition", "pricing",
    "promotion", "foot traffic", "basket", "category", "performance", "report",
];

const ANALYSIS_RULES: &[(&str, &[&str])] = &[
    ("sales", &["sales", "revenue"]),
    ("inventory", &["inventory", "stock"]),
    ("customer", &["customer", "shopper", "loyalty"]),
    ("trend", &["trend", "seasonal"]),
    ("product", &["product", "assortment", "merchandise"]),
    ("competition", &["competitor", "competition", "market share"]),
    ("performance", &["performance", "kpi", "store ranking"]),
];

/// Cross-cutting retail business analysis
#[derive(Debug, Default, Clone, Copy)]
pub struct RetailSpecialist;

impl RetailSpecialist {
    fn analysis_type(text: &str) -> &'static str {
        classify(text, ANALYSIS_RULES, "general")
    }

    fn guidance(analysis_type: &str) -> &'static str {
        match analysis_type {
            "customer" => "Describe customer segments, purchase behaviour and loyalty drivers.",
            "trend" => "Identify the main market and seasonal trends and how the business should respond.",
            "product" => "Evaluate product and category performance and assortment gaps.",
            "competition" => "Compare position against competitors on price, range and service.",
            _ => "Give a structured overview of the situation, key numbers and recommended actions.",
        }
    }

    fn charts(analysis_type: &str) -> Vec<JsonValue> {
        match analysis_type {
            "customer" => vec![chart("pie", "Customer segments", "Share of customers per segment")],
            "trend" => vec![chart("line", "Trend", "Key metric over time")],
            "product" => vec![chart("treemap", "Category mix", "Revenue by category")],
            "competition" => vec![chart("radar", "Competitive position", "Price, range, service")],
            _ => vec![chart("bar", "Overview", "Key retail metrics")],
        }
    }

    fn sales() -> JsonValue {
        json!({
            "analysis_type": "sales_analysis",
            "total_sales": 2_800_000_000u64,
            "growth_rate": 0.12,
            "top_categories": ["Groceries", "Electronics", "Clothing"]
        })
    }

    fn inventory() -> JsonValue {
        json!({
            "analysis_type": "inventory_analysis",
            "in_stock_rate": 0.978,
            "turnover": 8.4,
            "at_risk_skus": 340
        })
    }

    fn customer() -> JsonValue {
        json!({
            "analysis_type": "customer_analysis",
            "segments": {"value_seekers": 0.41, "convenience": 0.33, "premium": 0.26},
            "repeat_rate": 0.64
        })
    }

    fn trend(task: &Task) -> JsonValue {
        json!({
            "analysis_type": "trend_analysis",
            "period": task.input_str("period").unwrap_or("last_12_months"),
            "trends": ["Online pickup growing", "Private label share rising", "Fresh food demand up"]
        })
    }
}

#[async_trait]
impl Specialist for RetailSpecialist {
    fn kind(&self) -> &'static str {
        "retail"
    }

    fn display_name(&self) -> &'static str {
        "Retail Analyst"
    }

    fn description(&self) -> &'static str {
        "retail business analysis including sales trends, product performance and customer behaviour"
    }

    fn default_capabilities(&self) -> Vec<Capability> {
        vec![
            Capability::DataAnalysis,
            Capability::NaturalLanguage,
            Capability::DocumentSearch,
            Capability::Reasoning,
            Capability::Planning,
        ]
    }

    fn relevance_keywords(&self) -> &'static [&'static str] {
        KEYWORDS
    }

    fn default_collection(&self) -> &'static str {
        "retail_documents"
    }

    fn system_prompt(&self) -> &'static str {
        "You are a retail business analyst. You connect sales, inventory, customer and \
         market data into a clear picture of how the business is doing and what to do next."
    }

    async fn process_message(
        &self,
        text: &str,
        context: &ConversationContext,
        services: &AgentServices,
    ) -> Result<Message> {
        let analysis_type = Self::analysis_type(text);
        let snippets = services
            .search_knowledge(text, None, services.knowledge_results)
            .await;

        let prompt = build_prompt(
            "a retail business analyst",
            text,
            analysis_type,
            &snippets,
            Self::guidance(analysis_type),
        );
        let answer = services
            .generate_response(&prompt, context, 0.3, Some(2000))
            .await?;

        Ok(Message::assistant(answer)
            .with_metadata("analysis_type", analysis_type)
            .with_metadata("data_sources", snippets.len())
            .with_metadata("chart_suggestions", Self::charts(analysis_type))
            .with_metadata("analysis_confidence", knowledge_confidence(&snippets)))
    }

    async fn execute_task(
        &self,
        task: &Task,
        _context: &ConversationContext,
        _services: &AgentServices,
    ) -> Result<HashMap<String, JsonValue>> {
        let task_type = task.task_type().unwrap_or("retail_analysis");
        let output = match task_type {
            "sales_analysis" => Self::sales(),
            "inventory_analysis" => Self::inventory(),
            "customer_analysis" => Self::customer(),
            "trend_analysis" => Self::trend(task),
            other => json!({
                "analysis_type": "general",
                "task_type": other,
                "summary": format!("General retail analysis for: {}", task.description),
                "status": "completed"
            }),
        };
        Ok(into_output(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::agent::test_support::services;
    use crate::knowledge::SqliteKnowledgeStore;
    use std::sync::Arc;

    #[test]
    fn test_analysis_type() {
        assert_eq!(RetailSpecialist::analysis_type("shopper loyalty"), "customer");
        assert_eq!(RetailSpecialist::analysis_type("what do competitors charge"), "competition");
        assert_eq!(RetailSpecialist::analysis_type("store overview"), "general");
    }

    #[tokio::test]
    async fn test_confidence_uses_knowledge() {
        let store = SqliteKnowledgeStore::in_memory().unwrap();
        store
            .add_document("retail_documents", "seasonal trend report for groceries", json!({}))
            .unwrap();
        let services = AgentServices {
            knowledge: Arc::new(store),
            collection: "retail_documents".to_string(),
            ..services()
        };

        let ctx = ConversationContext::new("c", "u");
        let reply = RetailSpecialist
            .process_message("seasonal trend", &ctx, &services)
            .await
            .unwrap();

        assert_eq!(reply.metadata["analysis_type"], "trend");
        assert_eq!(reply.metadata["data_sources"], 1);
        // score 1.0, one snippet: 0.6 + 0.08
        assert_eq!(reply.metadata["analysis_confidence"], 0.68);
    }
}
