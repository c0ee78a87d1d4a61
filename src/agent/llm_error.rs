use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    ApiRequestFailed(#[from] reqwest::Error),

    #[error("Provider error {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Missing env var: {0}")]
    MissingApiKey(String),

    #[error("Provider returned no reply: {0}")]
    NoReply(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
