use serde::{Deserialize, Serialize};

/// Sample rate the live service accepts for microphone audio.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of the audio the live service streams back.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Whether a device records or renders audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioDirection {
    Input,
    Output,
}

/// An audio device available for capture or playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    pub id: String,
    pub name: String,
    pub direction: AudioDirection,
    pub is_default: bool,
}

/// Counters for debugging a live session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDiagnostics {
    pub capture_callbacks: u64,
    pub frames_captured: u64,
    pub frames_forwarded: u64,
    /// Frames discarded because the outbound queue was full.
    pub frames_dropped: u64,
    pub bytes_forwarded: u64,
    pub fragments_scheduled: u64,
    pub interruptions: u64,
    pub transcript_fragments: u64,
}
