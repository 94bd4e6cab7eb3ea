//! Constants for the relay endpoint and the Gemini upstream
//!
//! This module defines string constants used throughout the application for
//! upstream defaults, message roles, HTTP header names, and the user-facing
//! messages returned by the relay.

/// Environment variable holding the upstream credential
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Upstream defaults
pub mod upstream {
    /// Gemini REST base URL for model resources
    pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

    /// Default model used for generation
    pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-09-2025";

    /// Method suffix appended to the model resource
    pub const GENERATE_CONTENT: &str = "generateContent";

    /// Header carrying the API key
    pub const API_KEY_HEADER: &str = "x-goog-api-key";
}

/// Message role constants
pub mod role {
    /// User role identifier
    pub const USER: &str = "user";
}

/// Route paths
pub mod route {
    /// Prompt relay endpoint
    pub const RELAY: &str = "/api/ai";

    /// Health check endpoint
    pub const HEALTH: &str = "/health";
}

/// CORS header values sent with every relay response
pub mod cors {
    pub const ALLOW_ORIGIN: &str = "*";
    pub const ALLOW_METHODS: &str = "POST, OPTIONS";
    pub const ALLOW_HEADERS: &str = "Content-Type";
}

/// Messages returned to the client
pub mod message {
    /// Credential missing on the server
    pub const MISSING_API_KEY: &str = "GEMINI_API_KEY is not configured on the server";

    /// Request body without a usable prompt
    pub const MISSING_PROMPT: &str = "request body is missing the 'prompt' field";

    /// Upstream answered 2xx with a body that is not JSON
    pub const INVALID_RESPONSE: &str = "invalid AI response format";

    /// Substituted when the upstream reply carries no text
    pub const FALLBACK_REPLY: &str =
        "Sorry, the AI did not produce a valid reply. Please check that the API key is valid.";
}
