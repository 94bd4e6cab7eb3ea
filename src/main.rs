//! Prompt Relay
//!
//! This application accepts a text prompt from a client, forwards it to the
//! Gemini API with a server-held API key, and returns the generated text.

mod api;
mod core;
mod models;

use crate::api::endpoints::{AppState, create_router};
use crate::core::client::GeminiClient;
use crate::core::config::Config;
use crate::core::constants::{API_KEY_ENV, route};
use crate::core::logging::init_logging;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Check for --help flag
    if std::env::args().any(|arg| arg == "--help") {
        print_help();
        return;
    }

    let config = match Config::from_env() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            eprintln!("Configuration Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.log_level);

    print_startup_banner(&config);

    // Requests still get a 500 configuration error without a key
    if !config.has_api_key() {
        error!(
            "{} is not set; relay requests will fail until it is configured",
            API_KEY_ENV
        );
    }

    let client = match GeminiClient::new(&config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to create Gemini client: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("Forwarding prompts to {}", client.endpoint());

    let app = create_router(AppState {
        config: config.clone(),
        client,
    });

    let addr = format!("{}:{}", config.host, config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Server listening on http://{}{}", addr, route::RELAY);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Print startup banner with configuration
fn print_startup_banner(config: &Config) {
    println!("🚀 Prompt Relay v0.1.0");
    println!("✅ Configuration loaded successfully");
    println!("   Model: {}", config.model);
    println!("   Base URL: {}", config.base_url);
    if let Some(temperature) = config.temperature {
        println!("   Temperature: {}", temperature);
    }
    println!(
        "   Retry: {} attempts, {}ms base delay, {}ms jitter",
        config.max_attempts, config.base_delay_ms, config.max_jitter_ms
    );
    println!("   Request Timeout: {}s", config.request_timeout);
    println!("   Server: {}:{}", config.host, config.port);
    println!(
        "   API Key: {}",
        if config.has_api_key() {
            "Configured"
        } else {
            "MISSING"
        }
    );
    println!();
}

/// Print help message
fn print_help() {
    println!("Prompt Relay v0.1.0");
    println!();
    println!("Usage: prompt-relay [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --help    Display this help message");
    println!();
    println!("Environment variables:");
    println!("  GEMINI_API_KEY - Gemini API key (required to relay prompts)");
    println!("  CONFIG_PATH - Path to the TOML config file (default: config.toml)");
    println!("  RUST_LOG - Log filter, overrides [server].log_level");
    println!();
    println!("Config file sections:");
    println!("  [gemini]  api_key, base_url, model, temperature, max_output_tokens");
    println!("  [server]  host (default: 0.0.0.0), port (default: 3000), log_level (default: info)");
    println!("  [request] request_timeout (default: 90), max_attempts (default: 3),");
    println!("            base_delay_ms (default: 1000), max_jitter_ms (default: 500)");
    println!();
    println!("Endpoints:");
    println!("  POST /api/ai  {{\"prompt\": \"...\"}} -> {{\"text\": \"...\"}}");
    println!("  GET  /health");
}
