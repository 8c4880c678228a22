pub mod backend;
pub mod encoder;
pub mod mic;

pub use backend::{AudioFrame, CaptureBackend, CaptureConfig, CaptureError};
pub use encoder::{encode_frame, EncodedChunk};
pub use mic::MicBackend;
