use thiserror::Error;
use tokio::sync::mpsc;

/// Audio sample data (normalized f32 PCM, mono)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Normalized samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (always 1 after downmix)
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for a capture backend
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate (input is resampled if the device differs)
    pub target_sample_rate: u32,
    /// Samples per emitted frame at the target rate
    pub frame_size: usize,
    /// Preferred input device name (None = system default)
    pub device: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // 16kHz, what the transcription service expects
            frame_size: 4096,          // ~256ms per frame at 16kHz
            device: None,
        }
    }
}

/// Errors from acquiring or releasing an audio input device
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("no usable input device: {0}")]
    DeviceUnavailable(String),

    #[error("capture already running")]
    AlreadyCapturing,
}

/// Audio capture backend trait
///
/// Implementations:
/// - Microphone: cpal input stream on a dedicated thread
/// - Tests substitute channel-fed fakes
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Acquire the input device and start producing frames
    ///
    /// Returns a channel receiver that will receive audio frames until
    /// `release` is called or the device goes away.
    async fn acquire(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError>;

    /// Stop frame production and free the device
    ///
    /// Safe to call multiple times, and safe to call even if `acquire`
    /// never completed.
    async fn release(&mut self);

    /// Check if the backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

