//! Voice session management
//!
//! This module provides the `RecordingSession` abstraction that manages:
//! - Audio capture from the microphone
//! - PCM encoding for the streaming transcription service
//! - Session lifecycle state and teardown
//! - Transcript collection and status reporting

mod config;
mod session;
mod status;

pub use config::SessionConfig;
pub use session::{CaptureFactory, LiveFactory, RecordingSession};
pub use status::SessionStatus;
