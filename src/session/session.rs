use super::config::SessionConfig;
use super::status::SessionStatus;
use crate::audio::{encode_frame, AudioFrame, CaptureBackend, MicBackend};
use crate::live::{
    transition, GeminiLive, LiveBackend, LiveChannels, LiveEvent, SessionEvent, SessionState,
};
use crate::transcript::TranscriptAccumulator;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Builds the capture backend for a new session
pub type CaptureFactory = Box<dyn Fn() -> Box<dyn CaptureBackend> + Send + Sync>;

/// Builds the live transcription backend for a new session
pub type LiveFactory = Box<dyn Fn() -> Box<dyn LiveBackend> + Send + Sync>;

/// Mutable session state behind a single lock
struct SessionShared {
    /// Identifier of the current (or most recent) session
    session_id: Option<Uuid>,

    /// Lifecycle state, advanced only through [`transition`]
    state: SessionState,

    /// Error that ended the last session, if any
    last_error: Option<String>,

    /// Transcript text assembled from transcription events
    accumulator: TranscriptAccumulator,

    /// When the session reached the open state
    started_at: Option<DateTime<Utc>>,

    /// Audio frames pulled from the capture backend
    frames_captured: u64,

    /// Encoded chunks handed to the transport
    chunks_sent: u64,

    /// Transcription events applied to the accumulator
    events_received: u64,
}

impl SessionShared {
    fn reset(&mut self, session_id: Uuid) {
        self.session_id = Some(session_id);
        self.state = SessionState::Idle;
        self.last_error = None;
        self.accumulator.reset();
        self.started_at = None;
        self.frames_captured = 0;
        self.chunks_sent = 0;
        self.events_received = 0;
    }
}

impl Default for SessionShared {
    fn default() -> Self {
        Self {
            session_id: None,
            state: SessionState::Idle,
            last_error: None,
            accumulator: TranscriptAccumulator::default(),
            started_at: None,
            frames_captured: 0,
            chunks_sent: 0,
            events_received: 0,
        }
    }
}

/// Handles for the running pump task
#[derive(Default)]
struct PumpHandle {
    /// Signals the pump to shut down
    stop_tx: Option<oneshot::Sender<()>>,

    /// Handle for the pump task
    task: Option<JoinHandle<()>>,
}

/// A voice session that manages microphone capture, streaming transcription,
/// and transcript collection
pub struct RecordingSession {
    /// Session configuration
    config: SessionConfig,

    /// Creates a capture backend per session
    capture_factory: CaptureFactory,

    /// Creates a live backend per session
    live_factory: LiveFactory,

    /// State shared with the pump task
    shared: Arc<Mutex<SessionShared>>,

    /// Pump handles; the lock also serializes start and stop
    pump: Mutex<PumpHandle>,
}

impl RecordingSession {
    /// Create a session backed by the microphone and the Gemini Live API
    pub fn new(config: SessionConfig) -> Self {
        let capture_config = config.capture.clone();
        let live_config = config.live.clone();
        Self::with_backends(
            config,
            Box::new(move || Box::new(MicBackend::new(capture_config.clone()))),
            Box::new(move || Box::new(GeminiLive::new(live_config.clone()))),
        )
    }

    /// Create a session with custom backends
    pub fn with_backends(
        config: SessionConfig,
        capture_factory: CaptureFactory,
        live_factory: LiveFactory,
    ) -> Self {
        Self {
            config,
            capture_factory,
            live_factory,
            shared: Arc::new(Mutex::new(SessionShared::default())),
            pump: Mutex::new(PumpHandle::default()),
        }
    }

    /// Start a new session: acquire the microphone, open the live
    /// connection, and spawn the pump task.
    ///
    /// If a previous session is still live it is stopped first, so at most
    /// one session is ever active.
    pub async fn start(&self) -> Result<Uuid> {
        let mut pump = self.pump.lock().await;

        if pump.task.is_some() {
            info!("Stopping previous session before starting a new one");
            Self::halt(&mut pump).await;
        }

        let session_id = Uuid::new_v4();
        {
            let mut shared = self.shared.lock().await;
            shared.reset(session_id);
            shared.state = transition(shared.state, SessionEvent::OpenRequested);
        }
        info!("Starting voice session {}", session_id);

        let mut capture = (self.capture_factory)();
        let mut frame_rx = match capture.acquire().await {
            Ok(rx) => rx,
            Err(e) => {
                capture.release().await;
                self.fail_start(&e.to_string()).await;
                return Err(e.into());
            }
        };

        let mut live = (self.live_factory)();
        let channels = match live.open().await {
            Ok(channels) => channels,
            Err(e) => {
                live.close().await;
                capture.release().await;
                self.fail_start(&e.to_string()).await;
                return Err(e.into());
            }
        };

        // Audio captured while the handshake was in flight is stale; drop it.
        while frame_rx.try_recv().is_ok() {}

        {
            let mut shared = self.shared.lock().await;
            shared.state = transition(shared.state, SessionEvent::OpenAcknowledged);
            shared.started_at = Some(Utc::now());
        }
        info!("Voice session {} open", session_id);

        let (stop_tx, stop_rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(run_pump(capture, live, channels, frame_rx, stop_rx, shared));

        pump.stop_tx = Some(stop_tx);
        pump.task = Some(task);

        Ok(session_id)
    }

    /// Stop the current session and wait for teardown to finish.
    ///
    /// Safe to call at any time; stopping an already-stopped session leaves
    /// its state unchanged.
    pub async fn stop(&self) -> SessionStatus {
        let mut pump = self.pump.lock().await;
        Self::halt(&mut pump).await;
        drop(pump);
        self.status().await
    }

    /// Get a point-in-time status snapshot
    pub async fn status(&self) -> SessionStatus {
        let shared = self.shared.lock().await;
        let duration_secs = shared.started_at.map(|started| {
            Utc::now().signed_duration_since(started).num_milliseconds() as f64 / 1000.0
        });

        SessionStatus {
            session_id: shared.session_id,
            state: shared.state,
            is_recording: shared.state == SessionState::Open,
            is_loading: shared.state == SessionState::Requesting,
            last_error: shared.last_error.clone(),
            started_at: shared.started_at,
            duration_secs,
            frames_captured: shared.frames_captured,
            chunks_sent: shared.chunks_sent,
            events_received: shared.events_received,
            transcript_len: shared.accumulator.len(),
        }
    }

    /// Get the accumulated transcript
    pub async fn transcript(&self) -> String {
        let shared = self.shared.lock().await;
        shared.accumulator.snapshot()
    }

    /// The configuration this session was created with
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Record a failed open and log it
    async fn fail_start(&self, reason: &str) {
        let mut shared = self.shared.lock().await;
        shared.state = transition(shared.state, SessionEvent::ConnectFailed);
        shared.last_error = Some(reason.to_string());
        error!("Voice session failed to open: {}", reason);
    }

    /// Signal the pump to shut down and wait for it to finish
    async fn halt(pump: &mut PumpHandle) {
        let Some(task) = pump.task.take() else {
            return;
        };
        if let Some(stop_tx) = pump.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Err(e) = task.await {
            error!("Session pump panicked: {}", e);
        }
    }
}

/// Forward audio frames to the transport and apply transcription events,
/// then release both backends.
///
/// Whatever ends the loop, the teardown below it runs exactly once: the
/// chunk sender is dropped, the live connection is closed, the capture
/// device is released, and the state is settled to a terminal value.
async fn run_pump(
    mut capture: Box<dyn CaptureBackend>,
    mut live: Box<dyn LiveBackend>,
    channels: LiveChannels,
    mut frame_rx: mpsc::Receiver<AudioFrame>,
    mut stop_rx: oneshot::Receiver<()>,
    shared: Arc<Mutex<SessionShared>>,
) {
    info!("Session pump started");

    let LiveChannels {
        chunk_tx,
        mut event_rx,
    } = channels;

    loop {
        tokio::select! {
            // A dropped sender also lands here, so dropping the controller
            // tears the session down like an explicit stop.
            biased;

            _ = &mut stop_rx => {
                let mut shared = shared.lock().await;
                shared.state = transition(shared.state, SessionEvent::CloseRequested);
                info!("Voice session close requested");
                break;
            }

            event = event_rx.recv() => match event {
                Some(LiveEvent::Transcription(event)) => {
                    let mut shared = shared.lock().await;
                    shared.events_received += 1;
                    shared.accumulator.apply(&event);
                }
                Some(LiveEvent::Closed) => {
                    fail(&shared, "session closed by remote").await;
                    break;
                }
                Some(LiveEvent::Error(e)) => {
                    fail(&shared, &e).await;
                    break;
                }
                None => {
                    fail(&shared, "session transport ended").await;
                    break;
                }
            },

            frame = frame_rx.recv() => match frame {
                Some(frame) => {
                    {
                        let mut shared = shared.lock().await;
                        shared.frames_captured += 1;
                    }
                    let chunk = encode_frame(&frame);
                    if chunk_tx.send(chunk).await.is_err() {
                        // The transport is gone; the event channel will say why.
                        warn!("Transport dropped an audio chunk");
                        continue;
                    }
                    let mut shared = shared.lock().await;
                    shared.chunks_sent += 1;
                }
                None => {
                    fail(&shared, "audio capture ended unexpectedly").await;
                    break;
                }
            },
        }
    }

    drop(chunk_tx);
    live.close().await;
    capture.release().await;

    let mut shared = shared.lock().await;
    shared.state = transition(shared.state, SessionEvent::TeardownComplete);
    info!(
        "Session pump stopped: {} frames, {} chunks, {} events",
        shared.frames_captured, shared.chunks_sent, shared.events_received
    );
}

/// Record a mid-session failure
async fn fail(shared: &Arc<Mutex<SessionShared>>, reason: &str) {
    let mut shared = shared.lock().await;
    shared.state = transition(shared.state, SessionEvent::TransportFailed);
    shared.last_error = Some(reason.to_string());
    error!("Voice session failed: {}", reason);
}
