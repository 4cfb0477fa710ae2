mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cardwise::transcript::StructuredExtractionResult;
use common::*;

/// Mock for the first call of a chat turn, the one that declares the tool.
fn tool_decision() -> wiremock::MockBuilder {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"tool_choice": "auto"})))
}

fn grounded_text() -> wiremock::MockBuilder {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains(GROUNDING_MARKER))
}

fn structured_extraction() -> wiremock::MockBuilder {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "response_format": {"type": "json_schema", "json_schema": {"name": "credit_card_data"}}
        })))
}

#[test_log::test(tokio::test)]
async fn test_direct_answer_appends_one_assistant_message() {
    let upstream = MockServer::start().await;
    tool_decision()
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "tools": [{"type": "function", "function": {"name": "get_credit_cards_info"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_completion("Card X offers 5% cashback...")))
        .expect(1)
        .mount(&upstream)
        .await;

    let server = TestServer::new(app(&upstream.uri())).unwrap();
    let response = server
        .post("/chat")
        .json(&json!({"messages": [], "userMessage": "What's the best cashback card?"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1], json!({"role": "user", "content": "What's the best cashback card?"}));
    assert_eq!(messages[2]["role"], "assistant");
    assert_eq!(messages[2]["content"], "Card X offers 5% cashback...");
}

#[test_log::test(tokio::test)]
async fn test_tool_call_appends_assistant_and_tool_messages() {
    let upstream = MockServer::start().await;
    tool_decision()
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_completion("call_42")))
        .expect(1)
        .mount(&upstream)
        .await;
    grounded_text()
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(text_completion("The Harbor Voyager Signature suits frequent flyers.")),
        )
        .expect(1)
        .mount(&upstream)
        .await;
    structured_extraction()
        .and(body_string_contains("The Harbor Voyager Signature suits frequent flyers."))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json_completion(&json!({"cards": [card_json("Harbor Voyager Signature")]}))),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let server = TestServer::new(app(&upstream.uri())).unwrap();
    let response = server
        .post("/chat")
        .json(&json!({"userMessage": "Which card is best for travel?"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);

    let assistant = &messages[2];
    assert_eq!(assistant["role"], "assistant");
    assert_eq!(assistant["tool_calls"][0]["id"], "call_42");
    assert_eq!(assistant["tool_calls"][0]["function"]["name"], "get_credit_cards_info");

    let tool = &messages[3];
    assert_eq!(tool["role"], "tool");
    assert_eq!(tool["tool_call_id"], "call_42");
    let result: StructuredExtractionResult =
        serde_json::from_str(tool["content"].as_str().unwrap()).unwrap();
    assert_eq!(result.text_message, "The Harbor Voyager Signature suits frequent flyers.");
    let cards = result.credit_cards.unwrap().cards;
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].card_name, "Harbor Voyager Signature");

    // The grounding data never leaks into the returned transcript.
    assert_eq!(messages[1]["content"], "Which card is best for travel?");
}

#[tokio::test]
async fn test_empty_structured_output_degrades_to_text_only() {
    let upstream = MockServer::start().await;
    tool_decision()
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_completion("call_1")))
        .mount(&upstream)
        .await;
    grounded_text()
        .respond_with(ResponseTemplate::new(200).set_body_json(text_completion("Try the Pinnacle Zero.")))
        .mount(&upstream)
        .await;
    structured_extraction()
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_completion()))
        .expect(1)
        .mount(&upstream)
        .await;

    let server = TestServer::new(app(&upstream.uri())).unwrap();
    let response = server
        .post("/chat")
        .json(&json!({"userMessage": "Any card without fees?"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let tool_content = body["messages"][3]["content"].as_str().unwrap();
    let content: Value = serde_json::from_str(tool_content).unwrap();
    assert_eq!(content, json!({"textMessage": "Try the Pinnacle Zero."}));
}

#[tokio::test]
async fn test_empty_grounded_text_returns_400_without_extraction() {
    let upstream = MockServer::start().await;
    tool_decision()
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_completion("call_1")))
        .mount(&upstream)
        .await;
    grounded_text()
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_completion()))
        .expect(1)
        .mount(&upstream)
        .await;
    structured_extraction()
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_completion()))
        .expect(0)
        .mount(&upstream)
        .await;

    let server = TestServer::new(app(&upstream.uri())).unwrap();
    let response = server
        .post("/chat")
        .json(&json!({"userMessage": "Compare the travel cards"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body, json!({"error": "Couldn't complete the chat completion"}));
}

#[tokio::test]
async fn test_malformed_structured_output_is_rejected() {
    let upstream = MockServer::start().await;
    tool_decision()
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_completion("call_1")))
        .mount(&upstream)
        .await;
    grounded_text()
        .respond_with(ResponseTemplate::new(200).set_body_json(text_completion("Meridian Cashback Plus.")))
        .mount(&upstream)
        .await;
    // card without the benefits field
    structured_extraction()
        .respond_with(ResponseTemplate::new(200).set_body_json(json_completion(&json!({
            "cards": [{
                "bank": "Meridian Bank",
                "card_name": "Meridian Cashback Plus",
                "url": "https://www.meridianbank.example/cards/cashback-plus",
                "annual_percentage_rate": "42% p.a.",
                "joining_fee": "₹500 + GST",
                "annual_fee": "₹500 + GST"
            }]
        }))))
        .mount(&upstream)
        .await;

    let server = TestServer::new(app(&upstream.uri())).unwrap();
    let response = server
        .post("/chat")
        .json(&json!({"userMessage": "Best cashback card?"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "Failed to fetch completion");
}

#[tokio::test]
async fn test_reply_without_text_or_tool_calls_returns_500() {
    let upstream = MockServer::start().await;
    tool_decision()
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_completion()))
        .mount(&upstream)
        .await;

    let server = TestServer::new(app(&upstream.uri())).unwrap();
    let response = server.post("/chat").json(&json!({"userMessage": "Hello"})).await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body, json!({"error": "Failed to generate response"}));
}

#[tokio::test]
async fn test_upstream_failure_returns_500() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .expect(1)
        .mount(&upstream)
        .await;

    let server = TestServer::new(app(&upstream.uri())).unwrap();
    let response = server.post("/chat").json(&json!({"userMessage": "Hello"})).await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body, json!({"error": "Failed to fetch completion"}));
}

#[tokio::test]
async fn test_invalid_user_message_is_rejected_before_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_completion("unused")))
        .expect(0)
        .mount(&upstream)
        .await;

    let server = TestServer::new(app(&upstream.uri())).unwrap();
    let bodies = [
        json!({"userMessage": ""}),
        json!({"userMessage": "   \n\t"}),
        json!({"messages": []}),
        json!({"userMessage": 42}),
    ];
    for body in bodies {
        let response = server.post("/chat").json(&body).await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST, "body: {}", body);
        let error: Value = response.json();
        assert_eq!(error, json!({"error": "Missing or invalid user message"}));
    }

    let response = server.post("/chat").text("not json").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_follow_up_turn_reuses_prior_transcript() {
    let upstream = MockServer::start().await;
    tool_decision()
        .and(body_string_contains("earlier persona"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_completion("Sure, here is more.")))
        .expect(1)
        .mount(&upstream)
        .await;

    let prior = json!([
        {"role": "system", "content": "earlier persona"},
        {"role": "user", "content": "Hi"},
        {"role": "assistant", "content": "Hello! What do you spend most on?"}
    ]);
    let server = TestServer::new(app(&upstream.uri())).unwrap();
    let response = server
        .post("/chat")
        .json(&json!({"messages": prior, "userMessage": "Mostly travel"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 5);
    assert_eq!(&messages[..3], prior.as_array().unwrap().as_slice());
    assert_eq!(messages[3], json!({"role": "user", "content": "Mostly travel"}));
    assert_eq!(messages[4]["content"], "Sure, here is more.");
    let system_count = messages.iter().filter(|m| m["role"] == "system").count();
    assert_eq!(system_count, 1);
}

#[tokio::test]
async fn test_bad_transcript_is_reported_separately() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_completion("unused")))
        .expect(0)
        .mount(&upstream)
        .await;

    let server = TestServer::new(app(&upstream.uri())).unwrap();
    let bodies = [
        json!({"messages": [{"role": "moderator", "content": "hi"}], "userMessage": "Hello"}),
        json!({"messages": "not a list", "userMessage": "Hello"}),
    ];
    for body in bodies {
        let response = server.post("/chat").json(&body).await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST, "body: {}", body);
        let error: Value = response.json();
        assert_eq!(error, json!({"error": "Invalid conversation history"}));
    }
}
