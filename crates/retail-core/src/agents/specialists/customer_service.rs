//! Customer service specialist

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use super::{build_prompt, classify, into_output};
use crate::agents::agent::{AgentServices, Specialist};
use crate::agents::context::ConversationContext;
use crate::agents::types::{Capability, Message, Task};
use crate::Result;

const KEYWORDS: &[&str] = &[
    "order", "return", "refund", "exchange", "complaint", "delivery", "shipping", "tracking",
    "account", "login", "password", "payment", "charged", "membership", "store hours",
    "opening hours", "customer service", "help", "support", "warranty",
];

const SERVICE_RULES: &[(&str, &[&str])] = &[
    ("order_inquiry", &["order", "purchase", "bought"]),
    ("return_refund", &["return", "refund", "exchange"]),
    ("product_info", &["product", "price", "specification", "spec"]),
    ("complaint", &["complaint", "complain", "unhappy", "dissatisfied"]),
    ("account_issue", &["account", "login", "log in", "password", "profile"]),
    ("payment_issue", &["payment", "pay ", "card", "charged"]),
    ("delivery_issue", &["delivery", "shipping", "courier", "tracking"]),
    ("technical_support", &["bug", "error", "crash", "not working", "technical"]),
];

const HIGH_URGENCY: &[&str] = &[
    "urgent", "immediately", "asap", "right now", "complaint", "refund", "fraud", "broken",
    "not working",
];

const MEDIUM_URGENCY: &[&str] = &["problem", "help", "unhappy", "delayed", "late", "wrong"];

/// Canned answers keyed by trigger phrases
const FAQ: &[(&[&str], &str)] = &[
    (
        &["store hours", "opening hours", "open until", "what time do you open"],
        "Most stores are open 8:00 to 22:00, and 24-hour stores never close. Holiday hours \
         may differ, so check the store locator for your store. The online shop is always open.",
    ),
    (
        &["return policy", "how do i return", "returns policy"],
        "Items can be returned within 30 days of purchase in their original packaging with a \
         receipt or order number. Fresh food and personal-care items may follow different \
         rules. Returns are processed within 3-5 business days.",
    ),
    (
        &["membership benefits", "member benefits", "become a member"],
        "Members get member-only prices, points on every purchase, birthday offers, priority \
         support and free delivery above the minimum basket. Sign up in store or in the app.",
    ),
    (
        &["delivery options", "how long does delivery", "shipping options"],
        "Standard delivery takes 2-3 business days, next-day delivery is available in many \
         cities, and in-store pickup is free and ready within 2 hours.",
    ),
];

/// Customer enquiries, complaints, orders and returns
#[derive(Debug, Default, Clone, Copy)]
pub struct CustomerServiceSpecialist;

impl CustomerServiceSpecialist {
    fn service_type(text: &str) -> &'static str {
        classify(text, SERVICE_RULES, "general_inquiry")
    }

    fn faq_answer(text: &str) -> Option<&'static str> {
        let lower = text.to_lowercase();
        FAQ.iter()
            .find(|(triggers, _)| triggers.iter().any(|t| lower.contains(t)))
            .map(|(_, answer)| *answer)
    }

    fn urgency(text: &str, service_type: &str) -> &'static str {
        let lower = text.to_lowercase();
        if HIGH_URGENCY.iter().any(|w| lower.contains(w)) {
            "high"
        } else if MEDIUM_URGENCY.iter().any(|w| lower.contains(w))
            || matches!(service_type, "complaint" | "return_refund" | "payment_issue")
        {
            "medium"
        } else {
            "low"
        }
    }

    fn next_actions(service_type: &str) -> Vec<&'static str> {
        match service_type {
            "order_inquiry" => vec!["Share the order number", "Check the order page for live status"],
            "return_refund" => vec!["Start a return online", "Bring the receipt to the service desk"],
            "complaint" => vec!["Log the complaint", "Escalate to a supervisor if unresolved in 24h"],
            "payment_issue" => vec!["Verify the transaction", "Contact the card issuer if needed"],
            "delivery_issue" => vec!["Check the tracking link", "Arrange redelivery"],
            "account_issue" => vec!["Reset the password", "Verify identity"],
            _ => vec!["Ask a follow-up question", "Contact customer service"],
        }
    }

    fn guidance(service_type: &str) -> String {
        format!(
            "Service type: {}. Be friendly and empathetic, answer the question directly, \
             explain the next steps clearly and offer further help.",
            service_type
        )
    }

    fn track_order(task: &Task) -> JsonValue {
        json!({
            "service_type": "order_tracking",
            "order_id": task.input_str("order_id").unwrap_or("WM202401150001"),
            "status": "in_transit",
            "carrier": "Standard Courier",
            "estimated_delivery": "2 business days",
            "history": ["Order placed", "Packed", "Shipped", "In transit"]
        })
    }

    fn process_return(task: &Task) -> JsonValue {
        json!({
            "service_type": "return_processing",
            "order_id": task.input_str("order_id").unwrap_or("unknown"),
            "eligible": true,
            "refund_method": "original_payment",
            "processing_days": "3-5"
        })
    }

    fn handle_complaint(task: &Task) -> JsonValue {
        json!({
            "service_type": "complaint_handling",
            "ticket_id": format!("CS-{}", task.id.as_str().chars().take(8).collect::<String>()),
            "priority": "high",
            "assigned_team": "customer_relations",
            "response_sla_hours": 24
        })
    }

    fn verify_account(task: &Task) -> JsonValue {
        json!({
            "service_type": "account_verification",
            "customer_id": task.input_str("customer_id").unwrap_or("unknown"),
            "verified": true,
            "methods": ["email", "sms"]
        })
    }

    fn escalate(task: &Task) -> JsonValue {
        json!({
            "service_type": "escalation_management",
            "escalated_to": "supervisor",
            "reason": task.input_str("reason").unwrap_or(task.description.as_str()),
            "follow_up_hours": 4
        })
    }

    fn feedback() -> JsonValue {
        json!({
            "service_type": "customer_feedback",
            "satisfaction_score": 4.3,
            "top_themes": ["checkout speed", "staff friendliness", "stock availability"]
        })
    }
}

#[async_trait]
impl Specialist for CustomerServiceSpecialist {
    fn kind(&self) -> &'static str {
        "customer_service"
    }

    fn display_name(&self) -> &'static str {
        "Customer Service Assistant"
    }

    fn description(&self) -> &'static str {
        "customer enquiries, complaints, order issues, returns and customer relationships"
    }

    fn default_capabilities(&self) -> Vec<Capability> {
        vec![
            Capability::NaturalLanguage,
            Capability::DocumentSearch,
            Capability::Reasoning,
            Capability::RealTimeProcessing,
            Capability::WorkflowExecution,
        ]
    }

    fn relevance_keywords(&self) -> &'static [&'static str] {
        KEYWORDS
    }

    fn default_collection(&self) -> &'static str {
        "customer_service_kb"
    }

    fn system_prompt(&self) -> &'static str {
        "You are a friendly and professional retail customer service representative. You \
         help with orders, returns, payments, deliveries and account questions. Acknowledge \
         the customer's concern, give clear next steps and never promise what policy does \
         not allow."
    }

    async fn process_message(
        &self,
        text: &str,
        context: &ConversationContext,
        services: &AgentServices,
    ) -> Result<Message> {
        let service_type = Self::service_type(text);

        if let Some(answer) = Self::faq_answer(text) {
            return Ok(Message::assistant(answer)
                .with_metadata("service_type", service_type)
                .with_metadata("response_type", "faq")
                .with_metadata("confidence", 0.9));
        }

        let snippets = services.search_knowledge(text, None, 3).await;
        let prompt = build_prompt(
            "a retail customer service representative",
            text,
            service_type,
            &snippets,
            &Self::guidance(service_type),
        );
        let answer = services
            .generate_response(&prompt, context, 0.3, Some(1500))
            .await?;

        Ok(Message::assistant(answer)
            .with_metadata("service_type", service_type)
            .with_metadata("response_type", "custom")
            .with_metadata("knowledge_sources", snippets.len())
            .with_metadata("next_actions", Self::next_actions(service_type))
            .with_metadata("urgency_level", Self::urgency(text, service_type)))
    }

    async fn execute_task(
        &self,
        task: &Task,
        _context: &ConversationContext,
        _services: &AgentServices,
    ) -> Result<HashMap<String, JsonValue>> {
        let task_type = task.task_type().unwrap_or("general_service");
        let output = match task_type {
            "order_tracking" => Self::track_order(task),
            "return_processing" => Self::process_return(task),
            "complaint_handling" => Self::handle_complaint(task),
            "account_verification" => Self::verify_account(task),
            "escalation_management" => Self::escalate(task),
            "customer_feedback" => Self::feedback(),
            other => json!({
                "service_type": "general",
                "task_type": other,
                "summary": format!("Handled customer request: {}", task.description),
                "status": "completed"
            }),
        };
        Ok(into_output(output))
    }
}
