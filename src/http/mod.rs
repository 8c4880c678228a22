//! HTTP API server for external control
//!
//! This module provides a REST API for controlling the voice session:
//! - POST /voice/start - Start a session
//! - POST /voice/stop - Stop the current session
//! - GET /voice/status - Query session status
//! - GET /voice/transcript - Get accumulated transcript
//! - GET /health - Health check
//!
//! The service drives a single session at a time; starting while a session
//! is live stops the previous one first.

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
