//! Chat and Q&A request handling on top of the chat completion API.
//!
//! A chat turn is a single completion with the card tool declared. When the
//! model asks for the tool, the answer is produced by a grounded extraction:
//!
//! 1. a free-text completion over the transcript with the catalog appended to
//!    the latest user message, then
//! 2. a schema-constrained completion that pulls the cards mentioned in that
//!    text out as structured records.
//!
//! The two steps run sequentially since step 2 filters on step 1's output.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::catalog::Catalog;
use crate::error::AppError;
use crate::llm_gateway::{CompletionOptions, LlmGateway, ResponseSchema, ToolChoice, ToolDefinition};
use crate::prompts::{self, PromptComposer};
use crate::transcript::{CardList, Message, QnaResult, StructuredExtractionResult};

pub struct Orchestrator {
    gateway: LlmGateway,
    composer: PromptComposer,
    tools: Vec<ToolDefinition>,
    card_list_schema: ResponseSchema,
    qna_schema: ResponseSchema,
}

impl Orchestrator {
    pub fn new(gateway: LlmGateway, catalog: Arc<Catalog>) -> Self {
        Self {
            gateway,
            composer: PromptComposer::new(catalog),
            tools: vec![prompts::card_tool()],
            card_list_schema: prompts::card_list_schema(),
            qna_schema: prompts::qna_schema(),
        }
    }

    /// Runs one chat turn and returns the updated transcript.
    ///
    /// The result ends with either one `assistant` message, or an `assistant`
    /// tool-call message followed by a `tool` message holding the serialized
    /// [`StructuredExtractionResult`].
    #[instrument(skip_all, fields(prior = prior.len()))]
    pub async fn handle_chat(
        &self,
        prior: Vec<Message>,
        user_message: &str,
    ) -> Result<Vec<Message>, AppError> {
        if user_message.trim().is_empty() {
            return Err(AppError::InvalidInput);
        }

        let mut transcript = self.composer.chat_transcript(prior, user_message);

        let reply = self
            .gateway
            .complete(
                &transcript,
                CompletionOptions {
                    tools: Some(&self.tools),
                    tool_choice: Some(ToolChoice::Auto),
                    response_schema: None,
                },
            )
            .await?;

        if reply.requests_tools() {
            // Arguments are ignored; grounding is derived from the transcript.
            let tool_call_id = reply.tool_calls[0].id.clone();
            info!(
                tool = %reply.tool_calls[0].function.name,
                "Model requested card data, running grounded extraction"
            );
            transcript.push(Message::assistant_tool_calls(reply.content, reply.tool_calls));

            let result = self.grounded_extraction(&transcript).await?;
            let content = serde_json::to_string(&result).map_err(AppError::ToolResultEncoding)?;
            transcript.push(Message::tool_result(tool_call_id, content));
            return Ok(transcript);
        }

        match reply.text() {
            Some(text) => {
                transcript.push(Message::assistant(text));
                Ok(transcript)
            }
            None => {
                warn!("Completion returned neither text nor tool calls");
                Err(AppError::UpstreamEmptyResponse)
            }
        }
    }

    /// Grounded free-text answer followed by structured card extraction.
    ///
    /// An empty step-1 answer aborts with [`AppError::ExtractionFailed`]. An
    /// empty step-2 answer only drops the card list.
    #[instrument(skip_all)]
    pub async fn grounded_extraction(
        &self,
        transcript: &[Message],
    ) -> Result<StructuredExtractionResult, AppError> {
        let working = self.composer.grounded_transcript(transcript);
        let reply = self.gateway.complete(&working, CompletionOptions::default()).await?;

        let Some(text_message) = reply.text().map(str::to_string) else {
            warn!("Grounded completion returned no text");
            return Err(AppError::ExtractionFailed);
        };

        let extraction = self.composer.extraction_messages(&text_message);
        let credit_cards: Option<CardList> = self
            .gateway
            .complete_structured(&extraction, &self.card_list_schema)
            .await?;

        match &credit_cards {
            Some(list) => info!(cards = list.cards.len(), "Extracted structured card list"),
            None => warn!("Structured extraction returned no content, replying with text only"),
        }

        Ok(StructuredExtractionResult {
            text_message,
            credit_cards,
        })
    }

    /// One-shot recommendation: a summary plus the matching cards.
    #[instrument(skip_all)]
    pub async fn handle_qna(&self, question: &str) -> Result<QnaResult, AppError> {
        if question.trim().is_empty() {
            return Err(AppError::InvalidInput);
        }

        let messages = self.composer.qna_messages(question);
        let result: QnaResult = self
            .gateway
            .complete_structured(&messages, &self.qna_schema)
            .await?
            .ok_or(AppError::UpstreamEmptyResponse)?;

        info!(cards = result.cards.len(), "Answered one-shot question");
        Ok(result)
    }
}
