pub mod audio;
pub mod config;
pub mod http;
pub mod live;
pub mod session;
pub mod transcript;

pub use audio::{AudioFrame, CaptureBackend, CaptureConfig, CaptureError, EncodedChunk};
pub use config::Config;
pub use http::{create_router, AppState};
pub use live::{
    LiveBackend, LiveChannels, LiveConfig, LiveError, LiveEvent, SessionState, TranscriptionEvent,
};
pub use session::{RecordingSession, SessionConfig, SessionStatus};
pub use transcript::TranscriptAccumulator;
