// Shared fixtures for the integration tests: a router wired to a mock
// chat completion API, and canned completion bodies.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use serde_json::{json, Value};
use wiremock::MockServer;

use cardwise::catalog::Catalog;
use cardwise::llm_gateway::LlmGateway;
use cardwise::orchestrator::Orchestrator;
use cardwise::web_server::{build_router, AppState};

pub const API_KEY: &str = "test-key";
pub const GROUNDING_MARKER: &str = "Following is the Credit Card data you can use";

pub fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::load(None).expect("embedded catalog should load"))
}

pub fn orchestrator(upstream: &str) -> Orchestrator {
    let gateway = LlmGateway::new(upstream, API_KEY, "test-model", Duration::from_secs(5))
        .expect("gateway should build");
    Orchestrator::new(gateway, catalog())
}

pub fn app(upstream: &str) -> Router {
    let catalog = catalog();
    let gateway = LlmGateway::new(upstream, API_KEY, "test-model", Duration::from_secs(5))
        .expect("gateway should build");
    let orchestrator = Arc::new(Orchestrator::new(gateway, catalog.clone()));
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let state = AppState::new(orchestrator, catalog, &root.join("templates"));
    build_router(state, &root.join("static"))
}

pub fn text_completion(text: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }]
    })
}

pub fn tool_call_completion(call_id: &str) -> Value {
    tool_calls_completion(&[call_id])
}

/// A completion requesting the card tool once per id, in order.
pub fn tool_calls_completion(call_ids: &[&str]) -> Value {
    let tool_calls: Vec<Value> = call_ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "type": "function",
                "function": {"name": "get_credit_cards_info", "arguments": "{}"}
            })
        })
        .collect();
    json!({
        "id": "chatcmpl-2",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": tool_calls
            },
            "finish_reason": "tool_calls"
        }]
    })
}

/// JSON bodies of every request the mock upstream received, in order.
pub async fn received_bodies(upstream: &MockServer) -> Vec<Value> {
    upstream
        .received_requests()
        .await
        .expect("request recording is enabled")
        .iter()
        .map(|request| request.body_json::<Value>().expect("request body is JSON"))
        .collect()
}

pub fn empty_completion() -> Value {
    json!({
        "id": "chatcmpl-3",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": null},
            "finish_reason": "stop"
        }]
    })
}

pub fn card_json(card_name: &str) -> Value {
    json!({
        "bank": "Harbor Financial",
        "card_name": card_name,
        "url": "https://www.harborfinancial.example/cards/voyager-signature",
        "annual_percentage_rate": "39% p.a.",
        "joining_fee": "₹2,500 + GST",
        "annual_fee": "₹2,500 + GST",
        "benefits": ["8 complimentary domestic airport lounge visits per year"]
    })
}

/// A completion whose content is `payload` serialized as a JSON string.
pub fn json_completion(payload: &Value) -> Value {
    text_completion(&payload.to_string())
}
