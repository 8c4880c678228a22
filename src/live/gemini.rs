// Gemini Live WebSocket backend
//
// The session runs over a blocking TLS WebSocket owned by a dedicated
// I/O thread. Connect and handshake happen on a blocking task so open()
// can await them; after the setup acknowledgment the I/O thread
// interleaves draining the outbound chunk channel with short-timeout
// socket reads. The async side only ever sees the channel pair.

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use native_tls::TlsStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tungstenite::{Message, WebSocket};

use crate::audio::EncodedChunk;

use super::backend::{LiveBackend, LiveChannels, LiveConfig, LiveError, LiveEvent};
use super::messages;

type WsStream = WebSocket<TlsStream<TcpStream>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HANDSHAKE_IO_TIMEOUT: Duration = Duration::from_secs(30);
const STREAM_READ_TIMEOUT: Duration = Duration::from_millis(50);
const CHUNK_CHANNEL_CAPACITY: usize = 64;
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Live session against the Gemini BidiGenerateContent endpoint
pub struct GeminiLive {
    config: LiveConfig,
    close_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    open: bool,
}

impl GeminiLive {
    pub fn new(config: LiveConfig) -> Self {
        Self {
            config,
            close_flag: Arc::new(AtomicBool::new(false)),
            thread: None,
            open: false,
        }
    }

    async fn join_thread(&mut self) {
        if let Some(handle) = self.thread.take() {
            // The I/O loop wakes every 50ms via the socket read timeout,
            // so the join is bounded; do it off the async executor.
            let _ = tokio::task::spawn_blocking(move || handle.join()).await;
        }
    }
}

#[async_trait::async_trait]
impl LiveBackend for GeminiLive {
    async fn open(&mut self) -> Result<LiveChannels, LiveError> {
        if self.open {
            return Err(LiveError::AlreadyOpen);
        }

        let config = self.config.clone();
        let socket = tokio::task::spawn_blocking(move || connect_and_setup(&config))
            .await
            .map_err(|e| LiveError::Connect(format!("handshake task failed: {e}")))??;

        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let close_flag = Arc::new(AtomicBool::new(false));
        self.close_flag = close_flag.clone();

        let thread = std::thread::spawn(move || {
            run_session(socket, chunk_rx, event_tx, close_flag);
        });
        self.thread = Some(thread);
        self.open = true;
        info!("Live session open");

        Ok(LiveChannels { chunk_tx, event_rx })
    }

    async fn close(&mut self) {
        self.close_flag.store(true, Ordering::SeqCst);
        self.join_thread().await;
        if self.open {
            self.open = false;
            info!("Live session closed");
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn name(&self) -> &str {
        "gemini live"
    }
}

/// Connect, complete the WebSocket handshake, and wait for the remote
/// setup acknowledgment
fn connect_and_setup(config: &LiveConfig) -> Result<WsStream, LiveError> {
    let ws_url = format!("{}?key={}", config.endpoint, config.api_key);

    let url = url::Url::parse(&ws_url)
        .map_err(|e| LiveError::Connect(format!("bad endpoint url: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| LiveError::Connect("endpoint url has no host".to_string()))?
        .to_string();
    let port = url.port().unwrap_or(443);

    let addr = format!("{host}:{port}")
        .to_socket_addrs()
        .map_err(|e| LiveError::Connect(format!("resolve {host}: {e}")))?
        .next()
        .ok_or_else(|| LiveError::Connect(format!("no address for {host}")))?;

    info!("Connecting to {}", host);
    let tcp = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
        .map_err(|e| LiveError::Connect(format!("tcp connect: {e}")))?;
    tcp.set_read_timeout(Some(HANDSHAKE_IO_TIMEOUT))
        .map_err(|e| LiveError::Connect(format!("socket timeout: {e}")))?;
    tcp.set_write_timeout(Some(HANDSHAKE_IO_TIMEOUT))
        .map_err(|e| LiveError::Connect(format!("socket timeout: {e}")))?;
    tcp.set_nodelay(true)
        .map_err(|e| LiveError::Connect(format!("socket nodelay: {e}")))?;

    let connector = native_tls::TlsConnector::new()
        .map_err(|e| LiveError::Connect(format!("tls init: {e}")))?;
    let tls = connector
        .connect(&host, tcp)
        .map_err(|e| LiveError::Connect(format!("tls handshake: {e}")))?;

    let (mut socket, _response) = tungstenite::client::client(ws_url.as_str(), tls)
        .map_err(|e| LiveError::Connect(format!("websocket handshake: {e}")))?;

    // Short read timeout from here on: the ack wait polls against its own
    // deadline, and the session loop interleaves sends with reads
    set_read_timeout(&mut socket, STREAM_READ_TIMEOUT)
        .map_err(|e| LiveError::Setup(format!("socket timeout: {e}")))?;

    // Fixed capability request, no negotiation
    let setup = messages::setup_message(&config.model);
    socket
        .write(Message::Text(setup.into()))
        .map_err(|e| LiveError::Setup(format!("send setup: {e}")))?;
    socket
        .flush()
        .map_err(|e| LiveError::Setup(format!("send setup: {e}")))?;

    wait_for_setup_ack(
        &mut socket,
        Duration::from_secs(config.setup_timeout_secs),
    )?;

    Ok(socket)
}

fn wait_for_setup_ack(socket: &mut WsStream, deadline: Duration) -> Result<(), LiveError> {
    let started = Instant::now();
    loop {
        match socket.read() {
            Ok(Message::Text(msg)) => {
                if messages::is_setup_complete(msg.as_str()) {
                    debug!("Session setup acknowledged");
                    return Ok(());
                }
            }
            Ok(Message::Binary(data)) => {
                if let Ok(text) = String::from_utf8(data.to_vec()) {
                    if messages::is_setup_complete(&text) {
                        debug!("Session setup acknowledged");
                        return Ok(());
                    }
                }
            }
            Ok(Message::Close(frame)) => {
                return Err(LiveError::Setup(format!(
                    "closed during setup: {frame:?}"
                )));
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                if started.elapsed() > deadline {
                    let _ = socket.close(None);
                    return Err(LiveError::Setup(
                        "timed out waiting for setup acknowledgment".to_string(),
                    ));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => return Err(LiveError::Setup(format!("read during setup: {e}"))),
        }
    }
}

fn set_read_timeout(socket: &mut WsStream, timeout: Duration) -> std::io::Result<()> {
    socket.get_mut().get_mut().set_read_timeout(Some(timeout))
}

/// Session I/O loop: outbound chunks in FIFO order, inbound events in
/// server order, until close is requested or the transport dies
fn run_session(
    mut socket: WsStream,
    mut chunk_rx: mpsc::Receiver<EncodedChunk>,
    event_tx: mpsc::Sender<LiveEvent>,
    close_flag: Arc<AtomicBool>,
) {
    let mut chunks_sent: u64 = 0;

    loop {
        if close_flag.load(Ordering::SeqCst) {
            // Fire-and-forget close: queue the close frame and leave
            // without waiting for the remote confirmation.
            let _ = socket.close(None);
            let _ = socket.flush();
            break;
        }

        // Outbound: drain whatever chunks are ready
        loop {
            match chunk_rx.try_recv() {
                Ok(chunk) => {
                    let payload = messages::realtime_input_message(&chunk);
                    match socket.write(Message::Text(payload.into())) {
                        Ok(()) => chunks_sent += 1,
                        Err(ref e) if is_transient(e) => {
                            warn!("Send backpressure: {}", e);
                            break;
                        }
                        Err(e) => {
                            error!("Send failed: {}", e);
                            let _ = event_tx.blocking_send(LiveEvent::Error(e.to_string()));
                            return;
                        }
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    // Producer is gone, nothing left to stream
                    let _ = socket.close(None);
                    let _ = socket.flush();
                    return;
                }
            }
        }
        match socket.flush() {
            Ok(()) => {}
            Err(ref e) if is_transient(e) => {}
            Err(e) => {
                error!("Flush failed: {}", e);
                let _ = event_tx.blocking_send(LiveEvent::Error(e.to_string()));
                break;
            }
        }

        // Inbound: one read per pass; the socket timeout paces the loop
        match socket.read() {
            Ok(Message::Text(msg)) => handle_server_message(msg.as_str(), &event_tx),
            Ok(Message::Binary(data)) => {
                if let Ok(text) = String::from_utf8(data.to_vec()) {
                    handle_server_message(&text, &event_tx);
                }
            }
            Ok(Message::Close(frame)) => {
                info!("Session closed by remote: {:?}", frame);
                let _ = event_tx.blocking_send(LiveEvent::Closed);
                break;
            }
            Ok(_) => {}
            Err(ref e) if is_transient(e) => {}
            Err(e) => {
                error!("Session read error: {}", e);
                let _ = event_tx.blocking_send(LiveEvent::Error(e.to_string()));
                break;
            }
        }
    }

    debug!("Session I/O loop done, {} chunks sent", chunks_sent);
}

fn handle_server_message(message: &str, event_tx: &mpsc::Sender<LiveEvent>) {
    if let Some(event) = messages::parse_server_content(message) {
        if event_tx
            .blocking_send(LiveEvent::Transcription(event))
            .is_err()
        {
            debug!("Dropping transcription event, consumer closed");
        }
    }
}

/// Errors that mean "no progress right now", not a dead transport
fn is_transient(error: &tungstenite::Error) -> bool {
    match error {
        tungstenite::Error::Io(e) => {
            e.kind() == std::io::ErrorKind::WouldBlock
                || e.kind() == std::io::ErrorKind::TimedOut
        }
        tungstenite::Error::WriteBufferFull(_) => true,
        _ => false,
    }
}
