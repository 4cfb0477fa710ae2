// Settings loaded from the environment (or a .env file via dotenvy).

use std::env;

lazy_static::lazy_static! {
    pub static ref GEMINI_API_KEY: String = env::var("GEMINI_API_KEY").unwrap_or_default();
    // OpenAI-compatible endpoint; "/chat/completions" is appended by the gateway.
    pub static ref GEMINI_BASE_URL: String = env::var("GEMINI_BASE_URL")
        .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta/openai".to_string());
    pub static ref CARDWISE_MODEL: String = env::var("CARDWISE_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string());
    pub static ref CARDWISE_TIMEOUT_SECS: u64 = env::var("CARDWISE_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(120);
}

/// Name of the single tool the chat model may invoke.
pub const CARD_TOOL_NAME: &str = "get_credit_cards_info";
