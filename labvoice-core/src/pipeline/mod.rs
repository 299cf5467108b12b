pub mod capture;
pub mod playback;
pub mod transcript;

pub use capture::CapturePipeline;
pub use playback::{PlaybackScheduler, ScheduledFragment};
pub use transcript::TranscriptAggregator;
