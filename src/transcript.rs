// Transcript accumulation
//
// Inbound transcription events are applied strictly in arrival order.
// Text fragments append to the running buffer; a turn-complete marker
// appends one separator space after any text carried by the same event.

use crate::live::TranscriptionEvent;

/// Append-only transcript for one session
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    buffer: String,
    events_applied: u64,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event: text first, then the turn separator
    pub fn apply(&mut self, event: &TranscriptionEvent) {
        if let Some(text) = &event.text {
            self.buffer.push_str(text);
        }
        if event.turn_complete {
            self.buffer.push(' ');
        }
        self.events_applied += 1;
    }

    /// Current transcript text
    pub fn snapshot(&self) -> String {
        self.buffer.clone()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn events_applied(&self) -> u64 {
        self.events_applied
    }

    /// Clear the transcript for a new session
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.events_applied = 0;
    }
}
