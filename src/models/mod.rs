//! API data models
//!
//! This module contains data structures for the relay endpoint and the
//! Gemini API.

pub mod gemini;
pub mod relay;
