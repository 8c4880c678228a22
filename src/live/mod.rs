pub mod backend;
pub mod gemini;
pub mod messages;
pub mod state;

pub use backend::{
    LiveBackend, LiveChannels, LiveConfig, LiveError, LiveEvent, DEFAULT_LIVE_MODEL,
    GEMINI_LIVE_ENDPOINT,
};
pub use gemini::GeminiLive;
pub use messages::TranscriptionEvent;
pub use state::{transition, SessionEvent, SessionState};
