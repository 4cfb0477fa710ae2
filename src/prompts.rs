//! Builds the message sequences sent to the chat completion API.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::catalog::Catalog;
use crate::constants::CARD_TOOL_NAME;
use crate::llm_gateway::{ResponseSchema, ToolDefinition};
use crate::transcript::{inject_grounding, Message};

pub const CHAT_SYSTEM_PROMPT: &str = "You are an expert financial assistant specializing in credit card recommendations and comparisons.
Your job is to understand a user's preferences and needs, such as reward points, cashback, travel benefits, annual fees, or interest rates,
and suggest the most suitable credit cards available. Always ask relevant follow-up questions when necessary to better personalize your suggestions.
Keep your tone helpful, clear, and friendly.

For tables, please use the basic GFM table syntax and do NOT include any extra whitespace or tabs for alignment.
";

const GROUNDING_PREAMBLE: &str =
    "\n\nFollowing is the Credit Card data you can use to find the best options:\n\n";

const EXTRACTION_INSTRUCTIONS: &str = "Your job is to return the relevant credit cards mentioned in the user's message in JSON format.
Here are the available credit cards:\n\n";

const QNA_INSTRUCTIONS: &str = "
You are a credit card suggestor.
Your job is to suggest the Best Credit card/s based on the user's requirements.
Also, at the end, if you find more than 1 card which fits the user's needs, make sure
you add some explanation which will tell which card to choose based on certain preferences, conditions, requirements.
Following are the credit card details you will need to consider

";

/// JSON schema of a single card in structured output.
pub fn credit_card_schema() -> Value {
    let string = json!({"type": "string"});
    json!({
        "type": "object",
        "properties": {
            "bank": string,
            "card_name": string,
            "url": string,
            "annual_percentage_rate": string,
            "joining_fee": string,
            "annual_fee": string,
            "benefits": {"type": "array", "items": {"type": "string"}}
        },
        "required": [
            "bank", "card_name", "url", "annual_percentage_rate",
            "joining_fee", "annual_fee", "benefits"
        ],
        "additionalProperties": false
    })
}

/// `{cards: [card]}`, used by the grounded extraction step.
pub fn card_list_schema() -> ResponseSchema {
    ResponseSchema {
        name: "credit_card_data",
        schema: json!({
            "type": "object",
            "properties": {
                "cards": {"type": "array", "items": credit_card_schema()}
            },
            "required": ["cards"],
            "additionalProperties": false
        }),
        strict: true,
    }
}

/// `{cards: [card], summary}`, used by one-shot Q&A.
pub fn qna_schema() -> ResponseSchema {
    ResponseSchema {
        name: "credit_summary",
        schema: json!({
            "type": "object",
            "properties": {
                "cards": {"type": "array", "items": credit_card_schema()},
                "summary": {"type": "string", "description": "Answer for the user's question"}
            },
            "required": ["cards", "summary"],
            "additionalProperties": false
        }),
        strict: true,
    }
}

pub fn card_tool() -> ToolDefinition {
    ToolDefinition::function(
        CARD_TOOL_NAME,
        "Compare available credit cards or get info about individual credit cards. \
         Use this if some one needs info about a credit card such as fees, benefits etc.",
        json!({"type": "object", "properties": {}}),
    )
}

/// Prompt builder holding the catalog it grounds against.
#[derive(Debug)]
pub struct PromptComposer {
    grounding_suffix: String,
    extraction_system: String,
    qna_system: String,
}

impl PromptComposer {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let dump = catalog.grounding_dump();
        Self {
            grounding_suffix: format!("{GROUNDING_PREAMBLE}{dump}"),
            extraction_system: format!("{EXTRACTION_INSTRUCTIONS}{dump}"),
            qna_system: format!("{QNA_INSTRUCTIONS}{dump}\n"),
        }
    }

    /// Starts a new conversation with the persona prompt, or continues `prior`
    /// verbatim, then appends the user's message.
    pub fn chat_transcript(&self, prior: Vec<Message>, user_message: &str) -> Vec<Message> {
        let mut transcript = if prior.is_empty() {
            vec![Message::system(CHAT_SYSTEM_PROMPT)]
        } else {
            prior
        };
        transcript.push(Message::user(user_message));
        transcript
    }

    /// Working copy of `transcript` with the catalog appended to the latest user turn.
    pub fn grounded_transcript(&self, transcript: &[Message]) -> Vec<Message> {
        inject_grounding(transcript, &self.grounding_suffix)
    }

    /// Fresh message pair asking for the cards mentioned in `reply_text`.
    pub fn extraction_messages(&self, reply_text: &str) -> Vec<Message> {
        vec![
            Message::system(self.extraction_system.as_str()),
            Message::user(reply_text),
        ]
    }

    pub fn qna_messages(&self, question: &str) -> Vec<Message> {
        vec![Message::system(self.qna_system.as_str()), Message::user(question)]
    }
}
