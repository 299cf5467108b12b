use std::sync::Arc;

use crate::models::audio_models::AudioDevice;
use crate::models::config::CaptureConstraints;
use crate::models::error::LabError;

/// Callback invoked when a microphone buffer is available.
///
/// Parameters:
/// - `samples`: Interleaved f32 samples.
/// - `sample_rate`: The actual sample rate of the delivered audio.
/// - `channels`: Number of interleaved channels.
///
/// Runs on the hardware thread and must return without blocking.
pub type AudioBufferCallback = Arc<dyn Fn(&[f32], u32, u16) + Send + Sync + 'static>;

/// Interface for platform-specific microphone sources.
pub trait CaptureSource: Send + Sync {
    /// Whether this capture source is currently available.
    fn is_available(&self) -> bool;

    /// Open the hardware stream and start delivering buffers via `callback`.
    fn start(
        &mut self,
        constraints: &CaptureConstraints,
        callback: AudioBufferCallback,
    ) -> Result<(), LabError>;

    /// Stop capturing and release the hardware stream. Safe to call when stopped.
    fn stop(&mut self) -> Result<(), LabError>;

    /// Information about the device backing this source.
    fn device_info(&self) -> AudioDevice;
}
