use crate::audio::CaptureConfig;
use crate::live::LiveConfig;

/// Configuration for a voice session controller
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Microphone capture settings
    pub capture: CaptureConfig,

    /// Live transcription service settings
    pub live: LiveConfig,
}
