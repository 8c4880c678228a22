// Microphone capture backend built on cpal
//
// cpal streams are not Send, so the stream lives on a dedicated capture
// thread. The data callback only converts samples to f32 and hands the
// raw block to that thread, which downmixes to mono, resamples to the
// target rate, slices fixed-size frames, and ships them over a bounded
// channel. The async side never touches the device directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::backend::{AudioFrame, CaptureBackend, CaptureConfig, CaptureError};

/// Frames buffered between the capture thread and the consumer
const FRAME_CHANNEL_CAPACITY: usize = 64;

/// How often the capture thread checks the stop flag
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Microphone capture via cpal
pub struct MicBackend {
    config: CaptureConfig,
    stop_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    capturing: bool,
}

impl MicBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread: None,
            capturing: false,
        }
    }

    async fn join_thread(&mut self) {
        if let Some(handle) = self.thread.take() {
            // The capture loop polls the stop flag every 50ms, so the
            // join is bounded; do it off the async executor anyway.
            let _ = tokio::task::spawn_blocking(move || handle.join()).await;
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MicBackend {
    async fn acquire(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        if self.capturing {
            return Err(CaptureError::AlreadyCapturing);
        }

        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();

        let stop_flag = Arc::new(AtomicBool::new(false));
        self.stop_flag = stop_flag.clone();

        let config = self.config.clone();
        let thread = std::thread::spawn(move || {
            run_capture(config, frame_tx, ready_tx, stop_flag);
        });
        self.thread = Some(thread);

        // The thread reports back once the device is open and playing
        match ready_rx.await {
            Ok(Ok(())) => {
                self.capturing = true;
                info!("Microphone capture started");
                Ok(frame_rx)
            }
            Ok(Err(e)) => {
                self.join_thread().await;
                Err(e)
            }
            Err(_) => {
                self.join_thread().await;
                Err(CaptureError::DeviceUnavailable(
                    "capture thread exited before the device opened".to_string(),
                ))
            }
        }
    }

    async fn release(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.join_thread().await;
        if self.capturing {
            self.capturing = false;
            info!("Microphone capture released");
        }
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

/// Capture thread body: owns the cpal stream for its whole lifetime
fn run_capture(
    config: CaptureConfig,
    frame_tx: mpsc::Sender<AudioFrame>,
    ready_tx: oneshot::Sender<Result<(), CaptureError>>,
    stop_flag: Arc<AtomicBool>,
) {
    let host = cpal::default_host();

    let device = match find_input_device(&host, config.device.as_deref()) {
        Ok(device) => device,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let stream_config = match device.default_input_config() {
        Ok(c) => c,
        Err(e) => {
            let _ = ready_tx.send(Err(classify_device_error(&e.to_string())));
            return;
        }
    };

    let source_rate = stream_config.sample_rate();
    let source_channels = stream_config.channels();
    let sample_format = stream_config.sample_format();

    // Raw f32 blocks flow from the cpal callback to this thread's loop
    let (raw_tx, raw_rx) = std_mpsc::channel::<Vec<f32>>();

    let stream = {
        let build = match sample_format {
            cpal::SampleFormat::F32 => {
                let tx = raw_tx.clone();
                let flag = stop_flag.clone();
                device.build_input_stream(
                    &stream_config.clone().into(),
                    move |data: &[f32], _| {
                        let _ = tx.send(data.to_vec());
                    },
                    move |err| {
                        error!("Audio stream error: {}", err);
                        flag.store(true, Ordering::SeqCst);
                    },
                    None,
                )
            }
            cpal::SampleFormat::I16 => {
                let tx = raw_tx.clone();
                let flag = stop_flag.clone();
                device.build_input_stream(
                    &stream_config.clone().into(),
                    move |data: &[i16], _| {
                        let samples: Vec<f32> =
                            data.iter().map(|&s| s as f32 / 32768.0).collect();
                        let _ = tx.send(samples);
                    },
                    move |err| {
                        error!("Audio stream error: {}", err);
                        flag.store(true, Ordering::SeqCst);
                    },
                    None,
                )
            }
            cpal::SampleFormat::U16 => {
                let tx = raw_tx.clone();
                let flag = stop_flag.clone();
                device.build_input_stream(
                    &stream_config.clone().into(),
                    move |data: &[u16], _| {
                        let samples: Vec<f32> = data
                            .iter()
                            .map(|&s| (s as f32 - 32768.0) / 32768.0)
                            .collect();
                        let _ = tx.send(samples);
                    },
                    move |err| {
                        error!("Audio stream error: {}", err);
                        flag.store(true, Ordering::SeqCst);
                    },
                    None,
                )
            }
            format => {
                let _ = ready_tx.send(Err(CaptureError::DeviceUnavailable(format!(
                    "unsupported sample format: {format:?}"
                ))));
                return;
            }
        };

        match build {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready_tx.send(Err(classify_device_error(&e.to_string())));
                return;
            }
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(classify_device_error(&e.to_string())));
        return;
    }

    info!(
        "Input device '{}' open: {}Hz, {} channels, {:?}",
        device_name, source_rate, source_channels, sample_format
    );
    let _ = ready_tx.send(Ok(()));

    let mut slicer = FrameSlicer::new(
        frame_tx,
        source_rate,
        source_channels,
        config.target_sample_rate,
        config.frame_size,
    );

    while !stop_flag.load(Ordering::SeqCst) {
        match raw_rx.recv_timeout(STOP_POLL_INTERVAL) {
            Ok(samples) => slicer.push(&samples),
            Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    // Dropping the stream stops the callbacks; dropping the frame sender
    // closes the consumer's channel so it observes end of capture.
    drop(stream);
}

/// Locate the requested input device, or the system default
fn find_input_device(
    host: &cpal::Host,
    requested: Option<&str>,
) -> Result<cpal::Device, CaptureError> {
    match requested {
        Some(name) => {
            let devices = host.input_devices().map_err(|e| {
                classify_device_error(&e.to_string())
            })?;
            for device in devices {
                if device.name().map(|n| n == name).unwrap_or(false) {
                    return Ok(device);
                }
            }
            Err(CaptureError::DeviceUnavailable(format!(
                "input device '{name}' not found"
            )))
        }
        None => host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceUnavailable("no default input device".to_string())),
    }
}

/// Map a cpal error message onto our capture error kinds
///
/// cpal reports OS permission failures as backend-specific strings, so
/// classification is by message content.
fn classify_device_error(message: &str) -> CaptureError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not permitted") {
        CaptureError::PermissionDenied(message.to_string())
    } else {
        CaptureError::DeviceUnavailable(message.to_string())
    }
}

/// Accumulates normalized samples and emits fixed-size mono frames
struct FrameSlicer {
    frame_tx: mpsc::Sender<AudioFrame>,
    pending: Vec<f32>,
    source_rate: u32,
    source_channels: u16,
    target_rate: u32,
    frame_size: usize,
    emitted_samples: u64,
}

impl FrameSlicer {
    fn new(
        frame_tx: mpsc::Sender<AudioFrame>,
        source_rate: u32,
        source_channels: u16,
        target_rate: u32,
        frame_size: usize,
    ) -> Self {
        Self {
            frame_tx,
            pending: Vec::new(),
            source_rate,
            source_channels,
            target_rate,
            frame_size,
            emitted_samples: 0,
        }
    }

    fn push(&mut self, samples: &[f32]) {
        let mono = to_mono(samples, self.source_channels);
        let resampled = resample(&mono, self.source_rate, self.target_rate);
        self.pending.extend_from_slice(&resampled);

        while self.pending.len() >= self.frame_size {
            let samples: Vec<f32> = self.pending.drain(..self.frame_size).collect();
            let timestamp_ms = self.emitted_samples * 1000 / self.target_rate as u64;
            self.emitted_samples += self.frame_size as u64;

            let frame = AudioFrame {
                samples,
                sample_rate: self.target_rate,
                channels: 1,
                timestamp_ms,
            };

            // Consumer lagging: dropping is fine, duplicating is not
            if let Err(e) = self.frame_tx.try_send(frame) {
                warn!("Dropping audio frame: {}", e);
            }
        }
    }
}

/// Average interleaved channels down to mono
fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Nearest-neighbor resample between rates
fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate {
        return samples.to_vec();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let new_len = (samples.len() as f64 * ratio) as usize;
    let mut resampled = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = (i as f64 / ratio) as usize;
        if src_idx < samples.len() {
            resampled.push(samples[src_idx]);
        }
    }

    resampled
}
