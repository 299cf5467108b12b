use std::sync::Arc;

use crate::models::error::LabError;

/// Identifier the playback scheduler assigns to each scheduled buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

/// Fired once when a scheduled buffer finishes playing on its own.
pub type EndedCallback = Box<dyn FnOnce() + Send + 'static>;

/// Mono float samples ready for the output device.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackBuffer {
    pub samples: Arc<[f32]>,
    pub sample_rate: u32,
}

impl PlaybackBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// Playback length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Output device with a shared clock and sample-accurate start times.
///
/// Contract for implementors:
/// - `current_time` is monotonic, in seconds.
/// - `on_ended` is never invoked from inside `schedule` or `stop`.
/// - A stopped voice drops its `on_ended` without calling it.
pub trait PlaybackSink: Send + Sync {
    fn current_time(&self) -> f64;

    fn schedule(
        &self,
        id: VoiceId,
        buffer: PlaybackBuffer,
        start_time: f64,
        on_ended: EndedCallback,
    ) -> Result<(), LabError>;

    fn stop(&self, id: VoiceId);
}
