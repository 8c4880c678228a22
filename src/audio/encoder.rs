// Frame encoder: normalized audio samples -> transport-ready PCM chunk
//
// Pure transform, no I/O and no shared state. Each normalized sample is
// quantized to 16-bit signed little-endian PCM, and the byte payload is
// base64-encoded with a fixed format tag so it can travel inside a JSON
// message.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::backend::AudioFrame;

/// Transport-ready audio payload derived from exactly one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    /// Base64-encoded 16-bit signed little-endian PCM
    pub data: String,
    /// Format tag, e.g. "audio/pcm;rate=16000"
    pub mime_type: String,
}

/// Quantize one normalized sample to a signed 16-bit value
///
/// `s` in [-1.0, 1.0] maps to `round(s * 32768)` clamped to the i16 range.
#[inline]
pub fn quantize_sample(sample: f32) -> i16 {
    let scaled = (sample * 32768.0).round();
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Encode one audio frame into a transport-ready chunk
///
/// Output PCM byte length is 2x the sample count. The format tag carries
/// the frame's sample rate so the remote end needs no out-of-band setup.
pub fn encode_frame(frame: &AudioFrame) -> EncodedChunk {
    let mut pcm_bytes = Vec::with_capacity(frame.samples.len() * 2);
    for &sample in &frame.samples {
        pcm_bytes.extend_from_slice(&quantize_sample(sample).to_le_bytes());
    }

    EncodedChunk {
        data: STANDARD.encode(&pcm_bytes),
        mime_type: format!("audio/pcm;rate={}", frame.sample_rate),
    }
}
