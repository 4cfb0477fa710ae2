//! Conversation transcript types, in the OpenAI chat message wire format.

use serde::{Deserialize, Serialize};

use crate::catalog::CreditCardRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON arguments as produced by the model. Never interpreted.
    #[serde(default)]
    pub arguments: String,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    // Serialized as `null` when absent; assistant tool-call turns carry no text.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// An assistant turn that requested tools, keeping whatever text came with it.
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardList {
    pub cards: Vec<CreditCardRecord>,
}

/// Content of the `tool` message appended after a grounded extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredExtractionResult {
    pub text_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_cards: Option<CardList>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QnaResult {
    pub summary: String,
    pub cards: Vec<CreditCardRecord>,
}

/// Returns a working copy of `transcript` with `grounding` appended to the most
/// recent user message that has content. The input is left untouched; if no
/// such message exists the copy is returned unchanged.
pub fn inject_grounding(transcript: &[Message], grounding: &str) -> Vec<Message> {
    let mut working = transcript.to_vec();
    let latest_user = working
        .iter_mut()
        .rev()
        .find(|m| m.role == Role::User && m.content.as_deref().is_some_and(|c| !c.is_empty()));
    if let Some(content) = latest_user.and_then(|m| m.content.as_mut()) {
        content.push_str(grounding);
    }
    working
}
