use crate::session::RecordingSession;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The voice session controller; the service runs exactly one
    pub controller: Arc<RecordingSession>,
}

impl AppState {
    pub fn new(controller: Arc<RecordingSession>) -> Self {
        Self { controller }
    }
}
