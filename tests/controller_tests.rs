// Integration tests for the session controller, driven by scripted
// capture and live backends.
//
// The fakes expose their channel ends through shared slots so a test can
// feed audio frames and transcription events, and drain outgoing chunks,
// while the controller runs against the real pump.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use vani::audio::{encode_frame, AudioFrame, CaptureBackend, CaptureError, EncodedChunk};
use vani::live::{
    LiveBackend, LiveChannels, LiveError, LiveEvent, SessionState, TranscriptionEvent,
};
use vani::session::{RecordingSession, SessionConfig, SessionStatus};

// ============================================================================
// Fakes
// ============================================================================

#[derive(Clone, Default)]
struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    fn push(&self, call: &'static str) {
        self.0.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Clone)]
struct FakeCapture {
    log: CallLog,
    deny_permission: bool,
    frame_tx: Arc<Mutex<Option<mpsc::Sender<AudioFrame>>>>,
    capturing: bool,
}

#[async_trait]
impl CaptureBackend for FakeCapture {
    async fn acquire(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        self.log.push("capture.acquire");
        if self.deny_permission {
            return Err(CaptureError::PermissionDenied("not authorized".to_string()));
        }
        let (tx, rx) = mpsc::channel(64);
        *self.frame_tx.lock().unwrap() = Some(tx);
        self.capturing = true;
        Ok(rx)
    }

    async fn release(&mut self) {
        self.log.push("capture.release");
        self.frame_tx.lock().unwrap().take();
        self.capturing = false;
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "fake-capture"
    }
}

#[derive(Clone)]
struct FakeLive {
    log: CallLog,
    fail_connect: bool,
    chunk_rx: Arc<Mutex<Option<mpsc::Receiver<EncodedChunk>>>>,
    event_tx: Arc<Mutex<Option<mpsc::Sender<LiveEvent>>>>,
    open: bool,
}

#[async_trait]
impl LiveBackend for FakeLive {
    async fn open(&mut self) -> Result<LiveChannels, LiveError> {
        self.log.push("live.open");
        if self.fail_connect {
            return Err(LiveError::Connect("connection refused".to_string()));
        }
        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(64);
        *self.chunk_rx.lock().unwrap() = Some(chunk_rx);
        *self.event_tx.lock().unwrap() = Some(event_tx);
        self.open = true;
        Ok(LiveChannels { chunk_tx, event_rx })
    }

    async fn close(&mut self) {
        self.log.push("live.close");
        self.event_tx.lock().unwrap().take();
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn name(&self) -> &str {
        "fake-live"
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    session: RecordingSession,
    log: CallLog,
    frame_tx: Arc<Mutex<Option<mpsc::Sender<AudioFrame>>>>,
    chunk_rx: Arc<Mutex<Option<mpsc::Receiver<EncodedChunk>>>>,
    event_tx: Arc<Mutex<Option<mpsc::Sender<LiveEvent>>>>,
}

fn harness(deny_permission: bool, fail_connect: bool) -> Harness {
    let log = CallLog::default();
    let frame_tx = Arc::new(Mutex::new(None));
    let chunk_rx = Arc::new(Mutex::new(None));
    let event_tx = Arc::new(Mutex::new(None));

    let capture = FakeCapture {
        log: log.clone(),
        deny_permission,
        frame_tx: Arc::clone(&frame_tx),
        capturing: false,
    };
    let live = FakeLive {
        log: log.clone(),
        fail_connect,
        chunk_rx: Arc::clone(&chunk_rx),
        event_tx: Arc::clone(&event_tx),
        open: false,
    };

    let session = RecordingSession::with_backends(
        SessionConfig::default(),
        Box::new(move || Box::new(capture.clone())),
        Box::new(move || Box::new(live.clone())),
    );

    Harness {
        session,
        log,
        frame_tx,
        chunk_rx,
        event_tx,
    }
}

impl Harness {
    fn frame_sender(&self) -> mpsc::Sender<AudioFrame> {
        self.frame_tx.lock().unwrap().clone().expect("capture not acquired")
    }

    fn event_sender(&self) -> mpsc::Sender<LiveEvent> {
        self.event_tx.lock().unwrap().clone().expect("live session not open")
    }

    fn take_chunk_rx(&self) -> mpsc::Receiver<EncodedChunk> {
        self.chunk_rx.lock().unwrap().take().expect("live session not open")
    }
}

fn test_frame(seq: u64) -> AudioFrame {
    let value = (seq as f32 + 1.0) / 10.0;
    AudioFrame {
        samples: vec![value; 160],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: seq * 10,
    }
}

fn transcription(text: &str, turn_complete: bool) -> LiveEvent {
    LiveEvent::Transcription(TranscriptionEvent {
        text: Some(text.to_string()),
        turn_complete,
    })
}

async fn wait_for<F>(session: &RecordingSession, predicate: F)
where
    F: Fn(&SessionStatus) -> bool,
{
    for _ in 0..200 {
        if predicate(&session.status().await) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_normal_session_streams_and_accumulates() {
    let h = harness(false, false);

    let session_id = h.session.start().await.expect("start should succeed");

    let status = h.session.status().await;
    assert_eq!(status.state, SessionState::Open);
    assert!(status.is_recording);
    assert_eq!(status.session_id, Some(session_id));

    let frames = h.frame_sender();
    let mut chunks = h.take_chunk_rx();
    let events = h.event_sender();

    // Interleave audio and transcription to exercise both directions.
    frames.send(test_frame(0)).await.unwrap();
    events.send(transcription("hello ", false)).await.unwrap();
    frames.send(test_frame(1)).await.unwrap();
    events.send(transcription("world", true)).await.unwrap();
    frames.send(test_frame(2)).await.unwrap();

    // Chunks come out in capture order.
    for i in 0..3u64 {
        let chunk = tokio::time::timeout(Duration::from_secs(1), chunks.recv())
            .await
            .expect("timed out waiting for chunk")
            .expect("chunk channel closed early");
        assert_eq!(chunk, encode_frame(&test_frame(i)), "chunk {} out of order", i);
    }

    wait_for(&h.session, |s| s.chunks_sent == 3 && s.events_received == 2).await;

    let status = h.session.stop().await;
    assert_eq!(status.state, SessionState::Closed);
    assert_eq!(status.frames_captured, 3);
    assert_eq!(status.chunks_sent, 3);
    assert_eq!(status.events_received, 2);
    assert!(status.last_error.is_none());

    assert_eq!(h.session.transcript().await, "hello world ");

    assert_eq!(
        h.log.calls(),
        vec!["capture.acquire", "live.open", "live.close", "capture.release"]
    );
}

#[tokio::test]
async fn test_permission_denied_fails_without_connecting() {
    let h = harness(true, false);

    let err = h.session.start().await.expect_err("start should fail");
    assert!(err.downcast_ref::<CaptureError>().is_some());
    assert!(err.to_string().contains("permission"));

    let status = h.session.status().await;
    assert_eq!(status.state, SessionState::Failed);
    assert!(!status.is_recording);
    assert!(status.last_error.is_some());
    assert_eq!(status.chunks_sent, 0);
    assert_eq!(h.session.transcript().await, "");

    // The live service is never contacted when the microphone fails.
    assert_eq!(h.log.calls(), vec!["capture.acquire", "capture.release"]);
}

#[tokio::test]
async fn test_connect_failure_releases_microphone() {
    let h = harness(false, true);

    let err = h.session.start().await.expect_err("start should fail");
    assert!(err.downcast_ref::<LiveError>().is_some());

    let status = h.session.status().await;
    assert_eq!(status.state, SessionState::Failed);
    assert_eq!(
        h.log.calls(),
        vec!["capture.acquire", "live.open", "live.close", "capture.release"]
    );
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let h = harness(false, false);
    h.session.start().await.expect("start should succeed");

    let first = h.session.stop().await;
    assert_eq!(first.state, SessionState::Closed);

    let second = h.session.stop().await;
    let third = h.session.stop().await;
    assert_eq!(second.state, SessionState::Closed);
    assert_eq!(third.state, SessionState::Closed);

    // Teardown ran exactly once.
    let calls = h.log.calls();
    assert_eq!(calls.iter().filter(|c| **c == "live.close").count(), 1);
    assert_eq!(calls.iter().filter(|c| **c == "capture.release").count(), 1);
}

#[tokio::test]
async fn test_stop_without_start_is_a_no_op() {
    let h = harness(false, false);

    let status = h.session.stop().await;
    assert_eq!(status.state, SessionState::Idle);
    assert_eq!(status.session_id, None);
    assert!(h.log.calls().is_empty());
}

#[tokio::test]
async fn test_restart_settles_previous_session_first() {
    let h = harness(false, false);

    let first = h.session.start().await.expect("first start");
    let second = h.session.start().await.expect("second start");
    assert_ne!(first, second);

    let status = h.session.status().await;
    assert_eq!(status.state, SessionState::Open);
    assert_eq!(status.session_id, Some(second));

    // The first session is fully torn down before the second opens.
    assert_eq!(
        h.log.calls(),
        vec![
            "capture.acquire",
            "live.open",
            "live.close",
            "capture.release",
            "capture.acquire",
            "live.open",
        ]
    );

    h.session.stop().await;
}

#[tokio::test]
async fn test_transport_error_releases_device() {
    let h = harness(false, false);
    h.session.start().await.expect("start should succeed");

    let events = h.event_sender();
    events
        .send(LiveEvent::Error("stream reset".to_string()))
        .await
        .expect("send event");

    wait_for(&h.session, |s| s.state == SessionState::Closed).await;

    let status = h.session.status().await;
    assert_eq!(status.last_error.as_deref(), Some("stream reset"));
    assert!(!status.is_recording);

    let calls = h.log.calls();
    assert!(calls.contains(&"live.close"));
    assert!(calls.contains(&"capture.release"));
}

#[tokio::test]
async fn test_remote_close_ends_the_session() {
    let h = harness(false, false);
    h.session.start().await.expect("start should succeed");

    let events = h.event_sender();
    events.send(LiveEvent::Closed).await.expect("send event");

    wait_for(&h.session, |s| s.state == SessionState::Closed).await;

    let status = h.session.status().await;
    assert_eq!(status.last_error.as_deref(), Some("session closed by remote"));
}

#[tokio::test]
async fn test_capture_ending_fails_the_session() {
    let h = harness(false, false);
    h.session.start().await.expect("start should succeed");

    // Drop the only frame sender; the capture stream ends mid-session.
    h.frame_tx.lock().unwrap().take();

    wait_for(&h.session, |s| s.state == SessionState::Closed).await;

    let status = h.session.status().await;
    assert_eq!(
        status.last_error.as_deref(),
        Some("audio capture ended unexpectedly")
    );

    let calls = h.log.calls();
    assert!(calls.contains(&"live.close"));
    assert!(calls.contains(&"capture.release"));
}

#[tokio::test]
async fn test_transcript_survives_stop() {
    let h = harness(false, false);
    h.session.start().await.expect("start should succeed");

    let events = h.event_sender();
    events.send(transcription("keep me", false)).await.unwrap();
    wait_for(&h.session, |s| s.events_received == 1).await;

    h.session.stop().await;

    // The transcript of a closed session stays readable.
    assert_eq!(h.session.transcript().await, "keep me");
    let status = h.session.status().await;
    assert_eq!(status.transcript_len, "keep me".len());
}
