pub mod catalog;
pub mod constants;
pub mod error;
pub mod llm_gateway;
pub mod orchestrator;
pub mod prompts;
pub mod transcript;
pub mod web_server;
