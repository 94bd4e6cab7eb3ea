//! Relay endpoint data models
//!
//! Bodies exchanged with the calling client.

use serde::{Deserialize, Serialize};

/// Inbound relay request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

impl PromptRequest {
    /// The prompt, unless it is missing or empty
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|prompt| !prompt.is_empty())
    }
}

/// Successful relay response
#[derive(Debug, Clone, Serialize)]
pub struct TextResponse {
    pub text: String,
}

/// Failed relay response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
