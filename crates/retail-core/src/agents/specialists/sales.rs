//! Sales analysis specialist

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use super::{build_prompt, chart, classify, into_output, knowledge_confidence};
use crate::agents::agent::{AgentServices, Specialist};
use crate::agents::context::ConversationContext;
use crate::agents::types::{Capability, Message, Task};
use crate::Result;

const KEYWORDS: &[&str] = &[
    "sales", "revenue", "income", "earnings", "growth", "forecast", "trend", "year over year",
    "month over month", "conversion", "funnel", "performance", "region", "channel",
    "product line", "category", "kpi", "target", "basket size", "repeat purchase", "retention",
    "acquisition", "gross margin", "net margin", "profit", "cost",
];

const QUERY_RULES: &[(&str, &[&str])] = &[
    ("revenue", &["revenue", "income", "earnings"]),
    ("forecast", &["forecast", "predict", "projection"]),
    ("conversion", &["conversion", "convert"]),
    ("regional", &["region", "regional", "territory"]),
    ("performance", &["performance", "kpi", "target"]),
    ("growth", &["growth", "year over year", "yoy"]),
    ("funnel", &["funnel", "pipeline"]),
];

/// Sales data analysis, forecasting and reporting
#[derive(Debug, Default, Clone, Copy)]
pub struct SalesSpecialist;

impl SalesSpecialist {
    fn guidance(query_type: &str) -> &'static str {
        match query_type {
            "revenue" => "Cover total revenue and its trend, contribution by product line, seasonal effects and revenue quality.",
            "forecast" => "Use historical trends and seasonality, state the forecast with a confidence range and list the main risks.",
            "conversion" => "Compare conversion by channel, walk the funnel stages and name the levers that move conversion.",
            "regional" => "Compare regions, explain regional differences, estimate market penetration and suggest resource shifts.",
            "performance" => "Report KPI attainment, rank products and teams, and identify improvement opportunities.",
            _ => "Give an overview of the current state, key metrics, trends, problems and improvements.",
        }
    }

    fn charts(query_type: &str) -> Vec<JsonValue> {
        match query_type {
            "revenue" => vec![
                chart("line", "Revenue trend", "Revenue over time"),
                chart("waterfall", "Revenue composition", "Where revenue comes from"),
                chart("bar", "Revenue by product line", "Product line comparison"),
            ],
            "forecast" => vec![
                chart("line", "Sales forecast", "History and projected trend"),
                chart("area", "Confidence interval", "Forecast uncertainty"),
            ],
            "conversion" => vec![
                chart("funnel", "Conversion funnel", "Drop-off per stage"),
                chart("bar", "Conversion by channel", "Channel comparison"),
            ],
            "regional" => vec![
                chart("map", "Regional sales map", "Geographic heat map"),
                chart("radar", "Regional scorecard", "Multi-metric comparison"),
            ],
            "performance" => vec![
                chart("gauge", "KPI attainment", "Progress against targets"),
                chart("scatter", "Performance distribution", "Spread across products"),
            ],
            _ => vec![chart("bar", "Sales comparison", "Basic sales overview")],
        }
    }

    fn analyze_revenue(task: &Task) -> JsonValue {
        json!({
            "analysis_type": "revenue",
            "period": task.input_str("period").unwrap_or("Q4"),
            "revenue_metrics": {
                "total_revenue": 2_800_000_000u64,
                "growth_rate": 0.12,
                "gross_margin": 0.25,
                "net_margin": 0.08
            },
            "revenue_breakdown": {
                "Electronics": {"revenue": 980_000_000u64, "growth": 0.18},
                "Groceries": {"revenue": 1_200_000_000u64, "growth": 0.08},
                "Clothing": {"revenue": 620_000_000u64, "growth": 0.15}
            },
            "insights": [
                "Electronics revenue grew strongly at 18%",
                "Groceries kept steady growth",
                "Clothing outperformed expectations"
            ],
            "recommendations": [
                "Increase electronics marketing spend",
                "Tighten the grocery supply chain",
                "Broaden the clothing assortment"
            ]
        })
    }

    fn forecast(task: &Task) -> JsonValue {
        json!({
            "analysis_type": "forecast",
            "forecast_days": task.input.get("forecast_days").cloned().unwrap_or(json!(90)),
            "predictions": {
                "next_month": {"revenue": 950_000_000u64, "confidence": 0.85,
                               "range": {"min": 900_000_000u64, "max": 1_000_000_000u64}},
                "next_quarter": {"revenue": 2_850_000_000u64, "confidence": 0.78,
                                 "range": {"min": 2_700_000_000u64, "max": 3_000_000_000u64}}
            },
            "risks": ["Supply chain disruption", "Falling consumer confidence", "Rising input costs"],
            "recommendations": ["Strengthen inventory control", "Diversify suppliers", "Use flexible pricing"]
        })
    }

    fn performance_report(task: &Task) -> JsonValue {
        json!({
            "analysis_type": "performance",
            "report_period": task.input_str("period").unwrap_or("monthly"),
            "kpi_achievement": {
                "revenue_target": {"achieved": 0.95, "target": 1_000_000_000u64},
                "growth_target": {"achieved": 1.12, "target": 0.10},
                "margin_target": {"achieved": 0.88, "target": 0.25}
            },
            "top_performers": [
                {"category": "Electronics", "score": 95, "growth": 0.18},
                {"category": "Home & Garden", "score": 88, "growth": 0.14}
            ],
            "improvement_areas": [
                {"category": "Automotive", "score": 65, "issues": ["Low stock", "Price pressure"]}
            ]
        })
    }

    fn conversion(task: &Task) -> JsonValue {
        json!({
            "analysis_type": "conversion",
            "channel": task.input_str("channel").unwrap_or("all"),
            "funnel": {"visits": 1_000_000u64, "product_views": 420_000u64, "add_to_cart": 96_000u64, "purchases": 31_000u64},
            "conversion_rate": 0.031,
            "recommendations": ["Simplify checkout", "Retarget abandoned carts"]
        })
    }

    fn regional(task: &Task) -> JsonValue {
        json!({
            "analysis_type": "regional",
            "period": task.input_str("period").unwrap_or("Q4"),
            "regions": {
                "North": {"revenue": 820_000_000u64, "growth": 0.09},
                "South": {"revenue": 760_000_000u64, "growth": 0.14},
                "West": {"revenue": 690_000_000u64, "growth": 0.11}
            },
            "recommendations": ["Shift promotion budget toward the South region"]
        })
    }
}

#[async_trait]
impl Specialist for SalesSpecialist {
    fn kind(&self) -> &'static str {
        "sales"
    }

    fn display_name(&self) -> &'static str {
        "Sales Analyst"
    }

    fn description(&self) -> &'static str {
        "sales analysis, forecasting, reporting and sales strategy"
    }

    fn default_capabilities(&self) -> Vec<Capability> {
        vec![
            Capability::DataAnalysis,
            Capability::NaturalLanguage,
            Capability::Reasoning,
            Capability::Planning,
            Capability::RealTimeProcessing,
        ]
    }

    fn relevance_keywords(&self) -> &'static [&'static str] {
        KEYWORDS
    }

    fn default_collection(&self) -> &'static str {
        "sales_reports"
    }

    fn system_prompt(&self) -> &'static str {
        "You are a senior retail sales analyst. You specialise in sales data analysis, \
         revenue forecasting, performance evaluation, conversion optimisation and regional \
         market analysis. Base every conclusion on data and give recommendations that \
         support business decisions."
    }

    async fn process_message(
        &self,
        text: &str,
        context: &ConversationContext,
        services: &AgentServices,
    ) -> Result<Message> {
        let query_type = classify(text, QUERY_RULES, "general");
        let snippets = services
            .search_knowledge(text, None, services.knowledge_results)
            .await;

        let prompt = build_prompt(
            "a retail sales analyst",
            text,
            query_type,
            &snippets,
            Self::guidance(query_type),
        );
        let answer = services
            .generate_response(&prompt, context, 0.2, Some(2000))
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
        let task_type = task.task_type().unwrap_or("sales_analysis");
        let output = match task_type {
            "revenue_analysis" => Self::analyze_revenue(task),
            "sales_forecast" => Self::forecast(task),
            "performance_report" => Self::performance_report(task),
            "conversion_analysis" => Self::conversion(task),
            "regional_analysis" => Self::regional(task),
            other => json!({
                "analysis_type": "general",
                "task_type": other,
                "summary": format!("General sales analysis for: {}", task.description),
                "status": "completed"
            }),
        };
        Ok(into_output(output))
    }
}
