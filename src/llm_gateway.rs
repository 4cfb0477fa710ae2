use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, instrument};

use crate::constants;
use crate::error::GatewayError;
use crate::transcript::{Message, ToolCallRequest};

// Structures matching the OpenAI-compatible /chat/completions endpoint

#[derive(Serialize, Debug, Clone)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: FunctionDefinition,
}

#[derive(Serialize, Debug, Clone)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            tool_type: "function",
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
}

/// A named JSON schema the reply content must conform to.
#[derive(Serialize, Debug, Clone)]
pub struct ResponseSchema {
    pub name: &'static str,
    pub schema: Value,
    pub strict: bool,
}

#[derive(Serialize, Debug)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: &'a ResponseSchema,
}

#[derive(Serialize, Debug)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Deserialize, Debug)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize, Debug)]
struct CompletionChoice {
    message: ReplyMessage,
}

#[derive(Deserialize, Debug)]
struct ReplyMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallRequest>>,
}

/// The first choice of a completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl AssistantReply {
    /// Reply text, or `None` when the model produced nothing usable.
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }

    pub fn requests_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Options for a single completion call.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompletionOptions<'a> {
    pub tools: Option<&'a [ToolDefinition]>,
    pub tool_choice: Option<ToolChoice>,
    pub response_schema: Option<&'a ResponseSchema>,
}

/// Client for a hosted OpenAI-compatible chat completion API.
#[derive(Debug, Clone)]
pub struct LlmGateway {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl LlmGateway {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| GatewayError::Transport {
                url: endpoint.clone(),
                source,
            })?;
        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Builds a gateway from the `GEMINI_*` / `CARDWISE_*` environment settings.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::new(
            &constants::GEMINI_BASE_URL,
            constants::GEMINI_API_KEY.clone(),
            constants::CARDWISE_MODEL.clone(),
            Duration::from_secs(*constants::CARDWISE_TIMEOUT_SECS),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, messages, options), fields(model = %self.model, messages = messages.len()))]
    pub async fn complete(
        &self,
        messages: &[Message],
        options: CompletionOptions<'_>,
    ) -> Result<AssistantReply, GatewayError> {
        let request_payload = CompletionRequest {
            model: &self.model,
            messages,
            tools: options.tools,
            tool_choice: options.tool_choice,
            response_format: options.response_schema.map(|schema| ResponseFormat {
                format_type: "json_schema",
                json_schema: schema,
            }),
        };

        debug!(
            tools = options.tools.map_or(0, |t| t.len()),
            schema = options.response_schema.map(|s| s.name),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request_payload)
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                url: self.endpoint.clone(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %error_body, "Chat completion request failed");
            return Err(GatewayError::Status {
                status,
                body: error_body,
            });
        }

        let completion = response
            .json::<CompletionResponse>()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::MalformedResponse("response has no choices".to_string()))?;

        let reply = AssistantReply {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls.unwrap_or_default(),
        };
        debug!(
            has_text = reply.text().is_some(),
            tool_calls = reply.tool_calls.len(),
            "Received chat completion"
        );
        Ok(reply)
    }

    /// Requests output constrained to `schema` and parses it into `T`.
    ///
    /// Returns `Ok(None)` when the model produced no content. Content that does
    /// not deserialize into `T` is rejected rather than passed on.
    pub async fn complete_structured<T: DeserializeOwned>(
        &self,
        messages: &[Message],
        schema: &ResponseSchema,
    ) -> Result<Option<T>, GatewayError> {
        let reply = self
            .complete(
                messages,
                CompletionOptions {
                    response_schema: Some(schema),
                    ..Default::default()
                },
            )
            .await?;

        let Some(content) = reply.text() else {
            return Ok(None);
        };
        serde_json::from_str(content)
            .map(Some)
            .map_err(|source| {
                error!(schema = schema.name, %source, "Structured output failed validation");
                GatewayError::SchemaViolation {
                    schema: schema.name,
                    source,
                }
            })
    }
}
