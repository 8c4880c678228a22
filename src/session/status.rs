use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::live::SessionState;

/// Point-in-time view of the voice session controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Identifier of the current (or most recent) session
    pub session_id: Option<Uuid>,

    /// Lifecycle state of that session
    pub state: SessionState,

    /// Whether audio is flowing to the transcription service
    pub is_recording: bool,

    /// Whether a start is in flight (device acquisition or handshake)
    pub is_loading: bool,

    /// Error that ended the last session, if any
    pub last_error: Option<String>,

    /// When the session started
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds since the session started
    pub duration_secs: Option<f64>,

    /// Audio frames captured from the microphone
    pub frames_captured: u64,

    /// Encoded chunks handed to the transport
    pub chunks_sent: u64,

    /// Transcription events received
    pub events_received: u64,

    /// Length of the accumulated transcript in bytes
    pub transcript_len: usize,
}
