// Live session demo: capture the microphone and stream it to Gemini Live,
// printing the transcript as it grows.
//
// Prerequisites:
// - config/vani.toml present (defaults are fine)
// - GEMINI_API_KEY set in the environment
// - a working input device, with microphone permission granted
//
// Run with: cargo run --example live_session

use anyhow::Result;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;
use vani::{Config, RecordingSession};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("🎙️  Live transcription demo");

    let config = Config::load("config/vani")?;
    let controller = RecordingSession::new(config.session_config()?);

    let session_id = controller.start().await?;
    info!("✅ Session {} open, speak now (20 seconds)", session_id);

    let mut printed = 0;
    for _ in 0..10 {
        sleep(Duration::from_secs(2)).await;

        let transcript = controller.transcript().await;
        if transcript.len() > printed {
            info!("📝 {}", &transcript[printed..]);
            printed = transcript.len();
        }

        let status = controller.status().await;
        if !status.is_recording {
            info!("Session ended early: {:?}", status.last_error);
            break;
        }
    }

    let status = controller.stop().await;
    info!(
        "🛑 Stopped in state {}: {} frames captured, {} chunks sent, {} events",
        status.state, status.frames_captured, status.chunks_sent, status.events_received
    );

    let transcript = controller.transcript().await;
    if transcript.is_empty() {
        info!("No speech transcribed");
    } else {
        println!("\n--- transcript ---\n{}", transcript);
    }

    Ok(())
}
