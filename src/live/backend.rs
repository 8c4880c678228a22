use thiserror::Error;
use tokio::sync::mpsc;

use crate::audio::EncodedChunk;

use super::messages::TranscriptionEvent;

/// Gemini Live BidiGenerateContent endpoint
pub const GEMINI_LIVE_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Default model for live input transcription
pub const DEFAULT_LIVE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// Configuration for a live transcription backend
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// WebSocket endpoint of the transcription service
    pub endpoint: String,
    /// API key appended to the connect URL
    pub api_key: String,
    /// Model requested in the session setup
    pub model: String,
    /// How long to wait for the setup acknowledgment
    pub setup_timeout_secs: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            endpoint: GEMINI_LIVE_ENDPOINT.to_string(),
            api_key: String::new(),
            model: DEFAULT_LIVE_MODEL.to_string(),
            setup_timeout_secs: 30,
        }
    }
}

/// Errors from opening a live session
#[derive(Debug, Error)]
pub enum LiveError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("session setup failed: {0}")]
    Setup(String),

    #[error("session already open")]
    AlreadyOpen,
}

/// Events delivered by an open live session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// Inbound partial transcript or turn marker
    Transcription(TranscriptionEvent),
    /// Remote end closed the session
    Closed,
    /// Transport error; the session is dead
    Error(String),
}

/// Channel pair handed out by an open session
///
/// Chunks written to `chunk_tx` go out in FIFO order; events arrive on
/// `event_rx` in server order. Both channels close when the session's
/// transport ends.
pub struct LiveChannels {
    pub chunk_tx: mpsc::Sender<EncodedChunk>,
    pub event_rx: mpsc::Receiver<LiveEvent>,
}

/// Live transcription session backend trait
///
/// Implementations:
/// - Gemini Live over WebSocket
/// - Tests substitute channel-fed fakes
#[async_trait::async_trait]
pub trait LiveBackend: Send + Sync {
    /// Connect and complete the session handshake
    ///
    /// Resolves once the remote has acknowledged the setup, i.e. the
    /// session is open and chunks may be sent.
    async fn open(&mut self) -> Result<LiveChannels, LiveError>;

    /// Close the session
    ///
    /// Fire-and-forget toward the remote: local resources are released
    /// before this returns, but no close confirmation is awaited.
    /// Safe to call multiple times and on a never-opened session.
    async fn close(&mut self);

    /// Check if the session transport is up
    fn is_open(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
