//! Inventory management specialist

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value as JsonValue};

use super::{build_prompt, chart, classify, into_output, knowledge_confidence};
use crate::agents::agent::{AgentServices, Specialist};
use crate::agents::context::ConversationContext;
use crate::agents::types::{Capability, Message, Task};
use crate::Result;

const KEYWORDS: &[&str] = &[
    "inventory", "stock", "warehouse", "reorder", "replenish", "restock", "out of stock",
    "stockout", "turnover", "safety stock", "supply chain", "supplier", "sku", "deadstock",
    "shrink", "overstock", "lead time", "demand",
];

const STOCK_WORDS: &[&str] = &["inventory", "stock", "warehouse"];

const STOCK_RULES: &[(&str, &[&str])] = &[
    ("stockout", &["out of stock", "stockout", "sold out"]),
    ("reorder", &["reorder", "replenish", "restock", "purchase order"]),
    ("turnover", &["turnover", "sell-through"]),
    ("alert", &["alert", "warning"]),
    ("optimization", &["optimize", "optimise", "improve"]),
];

const OTHER_RULES: &[(&str, &[&str])] = &[
    ("demand_forecast", &["demand", "forecast"]),
    ("deadstock", &["deadstock", "slow moving", "slow-moving"]),
    ("abc_analysis", &["abc analysis", "abc classification"]),
];

/// Stock levels, replenishment and supply-chain analysis
#[derive(Debug, Default, Clone, Copy)]
pub struct InventorySpecialist;

impl InventorySpecialist {
    fn query_type(text: &str) -> &'static str {
        let lower = text.to_lowercase();
        if STOCK_WORDS.iter().any(|w| lower.contains(w)) {
            classify(text, STOCK_RULES, "status")
        } else {
            classify(text, OTHER_RULES, "general")
        }
    }

    fn guidance(query_type: &str) -> &'static str {
        match query_type {
            "stockout" => "List affected items, estimate lost sales, and give an emergency replenishment plan.",
            "reorder" => "Compute reorder points and quantities, taking lead time and safety stock into account.",
            "turnover" => "Report turnover by category, flag slow movers and suggest ways to speed up turnover.",
            "alert" => "Summarise active alerts by severity and the immediate actions they need.",
            "demand_forecast" => "Forecast demand per category with seasonality and promotions factored in.",
            _ => "Summarise current stock health, risks and recommended actions.",
        }
    }

    fn charts(query_type: &str) -> Vec<JsonValue> {
        match query_type {
            "stockout" | "alert" => vec![
                chart("table", "Items at risk", "SKUs below safety stock"),
                chart("bar", "Stock vs safety level", "Gap per SKU"),
            ],
            "turnover" => vec![chart("bar", "Turnover by category", "Inventory turns per year")],
            "demand_forecast" => vec![chart("line", "Demand forecast", "Projected units per week")],
            _ => vec![chart("gauge", "Stock health", "Share of SKUs in healthy range")],
        }
    }

    /// Alerts sorted into an overall urgency label
    pub fn urgency(alerts: &[JsonValue]) -> &'static str {
        if alerts.is_empty() {
            return "normal";
        }
        let high = alerts
            .iter()
            .filter(|a| a.get("severity").and_then(|s| s.as_str()) == Some("high"))
            .count();
        if high > 0 {
            "urgent"
        } else if alerts.len() > 3 {
            "high"
        } else {
            "medium"
        }
    }

    fn sample_alerts() -> Vec<JsonValue> {
        vec![
            json!({"sku": "TV-55-4K", "type": "low_stock", "severity": "high", "current": 12, "safety_stock": 40}),
            json!({"sku": "DVD-PLAYER", "type": "deadstock", "severity": "medium", "days_no_sale": 45}),
        ]
    }

    fn stock_levels(task: &Task) -> JsonValue {
        let alerts = Self::sample_alerts();
        json!({
            "analysis_type": "stock_level_check",
            "store_id": task.input_str("store_id").unwrap_or("all"),
            "timestamp": Utc::now().to_rfc3339(),
            "summary": {"total_skus": 15_420, "healthy": 13_870, "low": 1_210, "out_of_stock": 340},
            "urgency": Self::urgency(&alerts),
            "alerts": alerts
        })
    }

    fn reorder(task: &Task) -> JsonValue {
        json!({
            "analysis_type": "reorder_optimization",
            "category": task.input_str("category").unwrap_or("all"),
            "suggestions": [
                {"sku": "TV-55-4K", "reorder_point": 40, "order_quantity": 120, "lead_time_days": 7},
                {"sku": "MILK-1L", "reorder_point": 600, "order_quantity": 2_400, "lead_time_days": 1}
            ],
            "expected_savings": 0.08
        })
    }

    fn turnover() -> JsonValue {
        json!({
            "analysis_type": "turnover_analysis",
            "turnover_by_category": {"Groceries": 24.1, "Electronics": 6.3, "Clothing": 4.8},
            "slow_movers": ["DVD-PLAYER", "WINTER-COAT-XXL"]
        })
    }

    fn demand_forecast(task: &Task) -> JsonValue {
        json!({
            "analysis_type": "demand_forecast",
            "horizon_days": task.input.get("horizon_days").cloned().unwrap_or(json!(30)),
            "forecast": {"Groceries": 1.04, "Electronics": 1.12, "Clothing": 0.97},
            "drivers": ["Seasonality", "Planned promotions"]
        })
    }

    fn abc() -> JsonValue {
        json!({
            "analysis_type": "abc_analysis",
            "classes": {
                "A": {"share_of_skus": 0.2, "share_of_revenue": 0.8},
                "B": {"share_of_skus": 0.3, "share_of_revenue": 0.15},
                "C": {"share_of_skus": 0.5, "share_of_revenue": 0.05}
            }
        })
    }

    fn deadstock() -> JsonValue {
        json!({
            "analysis_type": "deadstock_identification",
            "items": [{"sku": "DVD-PLAYER", "days_no_sale": 45, "value": 12_500}],
            "recommendations": ["Clearance pricing", "Return to vendor where possible"]
        })
    }
}

#[async_trait]
impl Specialist for InventorySpecialist {
    fn kind(&self) -> &'static str {
        "inventory"
    }

    fn display_name(&self) -> &'static str {
        "Inventory Manager"
    }

    fn description(&self) -> &'static str {
        "inventory analysis, stock optimisation, replenishment alerts and supply chain management"
    }

    fn default_capabilities(&self) -> Vec<Capability> {
        vec![
            Capability::DataAnalysis,
            Capability::RealTimeProcessing,
            Capability::Reasoning,
            Capability::Planning,
            Capability::NaturalLanguage,
        ]
    }

    fn relevance_keywords(&self) -> &'static [&'static str] {
        KEYWORDS
    }

    fn default_collection(&self) -> &'static str {
        "inventory_data"
    }

    fn system_prompt(&self) -> &'static str {
        "You are an experienced retail inventory manager. You monitor stock levels, plan \
         replenishment, analyse turnover and manage supplier risk. Be precise with \
         quantities and always flag items that need immediate attention."
    }

    async fn process_message(
        &self,
        text: &str,
        context: &ConversationContext,
        services: &AgentServices,
    ) -> Result<Message> {
        let query_type = Self::query_type(text);
        let snippets = services
            .search_knowledge(text, None, services.knowledge_results)
            .await;

        let prompt = build_prompt(
            "a retail inventory manager",
            text,
            query_type,
            &snippets,
            Self::guidance(query_type),
        );
        let answer = services
            .generate_response(&prompt, context, 0.1, Some(2000))
            .await?;

        Ok(Message::assistant(answer)
            .with_metadata("query_type", query_type)
            .with_metadata("data_sources", snippets.len())
            .with_metadata("chart_suggestions", Self::charts(query_type))
            .with_metadata("analysis_confidence", knowledge_confidence(&snippets)))
    }

    async fn execute_task(
        &self,
        task: &Task,
        _context: &ConversationContext,
        _services: &AgentServices,
    ) -> Result<HashMap<String, JsonValue>> {
        let task_type = task.task_type().unwrap_or("inventory_analysis");
        let output = match task_type {
            "stock_level_check" => Self::stock_levels(task),
            "reorder_optimization" => Self::reorder(task),
            "turnover_analysis" => Self::turnover(),
            "demand_forecast" => Self::demand_forecast(task),
            "abc_analysis" => Self::abc(),
            "deadstock_identification" => Self::deadstock(),
            other => json!({
                "analysis_type": "general",
                "task_type": other,
                "summary": format!("General inventory review for: {}", task.description),
                "status": "completed"
            }),
        };
        Ok(into_output(output))
    }
}
