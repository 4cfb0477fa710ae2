use thiserror::Error;

/// Failures surfaced by the chat and Q&A operations.
///
/// The `Display` text of each variant is the message returned to the chat UI.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing or invalid user message")]
    InvalidInput,
    #[error("Failed to fetch completion")]
    UpstreamError(#[source] GatewayError),
    #[error("Failed to generate response")]
    UpstreamEmptyResponse,
    #[error("Couldn't complete the chat completion")]
    ExtractionFailed,
    #[error("Invalid conversation history")]
    InvalidTranscript,
    #[error("Failed to encode tool result")]
    ToolResultEncoding(#[source] serde_json::Error),
}

/// Shown for server-side failures instead of the error text.
pub const SERVICE_UNAVAILABLE_NOTICE: &str =
    "Our servers are down at the moment, please try again later.";

impl AppError {
    /// Whether the caller caused the failure (a 400 on `/chat`).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidInput | AppError::InvalidTranscript | AppError::ExtractionFailed
        )
    }

    /// What a chat user gets to see: the message itself for client errors,
    /// a generic notice otherwise.
    pub fn user_notice(&self) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            SERVICE_UNAVAILABLE_NOTICE.to_string()
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::UpstreamError(err)
    }
}

/// Errors raised while talking to the chat completion API.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("chat completion API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("malformed chat completion response: {0}")]
    MalformedResponse(String),
    #[error("structured output '{schema}' rejected: {source}")]
    SchemaViolation {
        schema: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while loading the credit card catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog contains no cards")]
    Empty,
    #[error("card '{card}' has partial insights, missing: {missing}")]
    IncompleteInsights { card: String, missing: String },
    #[error("rating '{category}' of card '{card}' is {value}, expected a value between 0 and 10")]
    RatingOutOfRange {
        card: String,
        category: String,
        value: f64,
    },
}
