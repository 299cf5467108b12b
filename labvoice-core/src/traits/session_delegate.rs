use crate::models::error::LabError;
use crate::models::message::Message;
use crate::models::state::SessionState;

/// Event delegate for live session notifications.
///
/// `on_level_updated` runs on the capture thread; the rest run on the
/// session's tasks. Implementations should marshal to a UI thread if needed.
pub trait SessionDelegate: Send + Sync {
    fn on_state_changed(&self, state: SessionState);

    /// Coarse input volume in `0.0..=100.0`.
    fn on_level_updated(&self, level: f32);

    fn on_transcript_updated(&self, messages: &[Message]);

    fn on_error(&self, error: &LabError);
}
