//! Integration tests for sigex-bot.
//!
//! These tests verify the interaction between components:
//! - WebSocket connection lifecycle
//! - Request/reply correlation over a real socket
//! - End-to-end execution runs

pub mod common;
