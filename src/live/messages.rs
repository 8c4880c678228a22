// Wire messages for the Gemini Live session
//
// Outbound messages are built as JSON text; inbound server messages are
// parsed down to the one event shape the rest of the crate cares about.

use serde::{Deserialize, Serialize};

use crate::audio::EncodedChunk;

/// One inbound transcription event
///
/// `text` carries a partial transcript fragment when present;
/// `turn_complete` marks the end of an utterance segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionEvent {
    pub text: Option<String>,
    pub turn_complete: bool,
}

/// Session setup request
///
/// Fixed capability set: audio response modality plus input-audio
/// transcription. There is no negotiation.
pub fn setup_message(model: &str) -> String {
    serde_json::json!({
        "setup": {
            "model": format!("models/{}", model),
            "generationConfig": {
                "responseModalities": ["AUDIO"]
            },
            "inputAudioTranscription": {}
        }
    })
    .to_string()
}

/// Wrap one encoded audio chunk for the realtime input stream
pub fn realtime_input_message(chunk: &EncodedChunk) -> String {
    serde_json::json!({
        "realtimeInput": {
            "mediaChunks": [{
                "mimeType": chunk.mime_type,
                "data": chunk.data
            }]
        }
    })
    .to_string()
}

/// Check for the server's setup acknowledgment
pub fn is_setup_complete(message: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(message)
        .map(|v| v.get("setupComplete").is_some())
        .unwrap_or(false)
}

/// Extract a transcription event from a server message
///
/// Returns None for messages without server content (keepalives, usage
/// metadata and the like).
pub fn parse_server_content(message: &str) -> Option<TranscriptionEvent> {
    let json: serde_json::Value = serde_json::from_str(message).ok()?;
    let server_content = json.get("serverContent")?;

    let text = server_content
        .get("inputTranscription")
        .and_then(|t| t.get("text"))
        .and_then(|t| t.as_str())
        .map(|t| t.to_string());

    let turn_complete = server_content
        .get("turnComplete")
        .and_then(|t| t.as_bool())
        .unwrap_or(false);

    if text.is_none() && !turn_complete {
        return None;
    }

    Some(TranscriptionEvent {
        text,
        turn_complete,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_message_shape() {
        let msg = setup_message("gemini-2.5-flash-native-audio-preview-09-2025");
        let json: serde_json::Value = serde_json::from_str(&msg).unwrap();

        assert_eq!(
            json["setup"]["model"],
            "models/gemini-2.5-flash-native-audio-preview-09-2025"
        );
        assert_eq!(
            json["setup"]["generationConfig"]["responseModalities"][0],
            "AUDIO"
        );
        assert!(json["setup"]["inputAudioTranscription"].is_object());
    }

    #[test]
    fn test_realtime_input_wraps_chunk() {
        let chunk = EncodedChunk {
            data: "AAAA".to_string(),
            mime_type: "audio/pcm;rate=16000".to_string(),
        };
        let msg = realtime_input_message(&chunk);
        let json: serde_json::Value = serde_json::from_str(&msg).unwrap();

        let media = &json["realtimeInput"]["mediaChunks"][0];
        assert_eq!(media["mimeType"], "audio/pcm;rate=16000");
        assert_eq!(media["data"], "AAAA");
    }

    #[test]
    fn test_setup_complete_detection() {
        assert!(is_setup_complete(r#"{"setupComplete": {}}"#));
        assert!(!is_setup_complete(r#"{"serverContent": {}}"#));
        assert!(!is_setup_complete("not json"));
    }

    #[test]
    fn test_parse_input_transcription() {
        let msg = r#"{"serverContent": {"inputTranscription": {"text": "hello"}}}"#;
        let event = parse_server_content(msg).unwrap();
        assert_eq!(event.text.as_deref(), Some("hello"));
        assert!(!event.turn_complete);
    }

    #[test]
    fn test_parse_turn_complete_without_text() {
        let msg = r#"{"serverContent": {"turnComplete": true}}"#;
        let event = parse_server_content(msg).unwrap();
        assert_eq!(event.text, None);
        assert!(event.turn_complete);
    }

    #[test]
    fn test_parse_text_and_turn_complete_together() {
        let msg =
            r#"{"serverContent": {"inputTranscription": {"text": "bye"}, "turnComplete": true}}"#;
        let event = parse_server_content(msg).unwrap();
        assert_eq!(event.text.as_deref(), Some("bye"));
        assert!(event.turn_complete);
    }

    #[test]
    fn test_parse_ignores_unrelated_messages() {
        assert_eq!(parse_server_content(r#"{"usageMetadata": {}}"#), None);
        assert_eq!(
            parse_server_content(r#"{"serverContent": {"modelTurn": {}}}"#),
            None
        );
        assert_eq!(parse_server_content("garbage"), None);
    }
}
