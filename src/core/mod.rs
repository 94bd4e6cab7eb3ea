//! Core application modules
//!
//! This module contains configuration, constants, logging, retry policy and
//! the upstream client.

pub mod client;
pub mod config;
pub mod constants;
pub mod logging;
pub mod retry;
