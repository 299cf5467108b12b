use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::models::audio_models::SessionDiagnostics;
use crate::models::config::LiveSessionConfig;
use crate::processing::frame_buffer::FrameBuffer;
use crate::processing::level_meter;
use crate::processing::pcm;
use crate::processing::resampler::StreamResampler;
use crate::traits::capture_source::AudioBufferCallback;
use crate::traits::session_delegate::SessionDelegate;

/// Frames one hardware buffer may carry before its oldest samples are dropped.
const BUFFERED_FRAMES: usize = 4;

/// Encoded frames the outbound queue holds before new frames are dropped.
pub const OUTBOUND_FRAMES: usize = BUFFERED_FRAMES;

/// Resampler phase and partial frame, advanced together per callback.
struct CaptureState {
    resampler: StreamResampler,
    frames: FrameBuffer,
}

/// Microphone → wire transcoder.
///
/// Runs entirely inside the hardware callback: downmix, resample to the
/// input rate, cut fixed frames, meter, encode to 16-bit PCM and hand the
/// bytes to a bounded channel. Nothing here waits on the network: when the
/// queue is full the frame is dropped and counted.
///
/// ```text
/// [CaptureSource] → downmix → resample → [FrameBuffer] → level + PCM16 → outbound tx
/// ```
pub struct CapturePipeline {
    state: Mutex<CaptureState>,
    level_stride: usize,
    forwarding: AtomicBool,
    level_bits: AtomicU32,
    outbound: mpsc::Sender<Vec<u8>>,
    diagnostics: Arc<Mutex<SessionDiagnostics>>,
    delegate: Option<Arc<dyn SessionDelegate>>,
}

impl CapturePipeline {
    pub fn new(
        config: &LiveSessionConfig,
        outbound: mpsc::Sender<Vec<u8>>,
        diagnostics: Arc<Mutex<SessionDiagnostics>>,
        delegate: Option<Arc<dyn SessionDelegate>>,
    ) -> Self {
        Self {
            state: Mutex::new(CaptureState {
                resampler: StreamResampler::new(config.capture.sample_rate),
                frames: FrameBuffer::new(config.frame_size, config.frame_size * BUFFERED_FRAMES),
            }),
            level_stride: config.level_stride,
            forwarding: AtomicBool::new(false),
            level_bits: AtomicU32::new(0f32.to_bits()),
            outbound,
            diagnostics,
            delegate,
        }
    }

    /// Frames are metered either way but only leave the pipeline while forwarding.
    pub fn set_forwarding(&self, enabled: bool) {
        self.forwarding.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.state.lock().frames.clear();
        }
    }

    pub fn is_forwarding(&self) -> bool {
        self.forwarding.load(Ordering::SeqCst)
    }

    /// Latest level estimate, `0.0..=100.0`.
    pub fn current_level(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }

    /// A callback suitable for [`CaptureSource::start`](crate::CaptureSource::start).
    pub fn callback(self: &Arc<Self>) -> AudioBufferCallback {
        let pipeline = Arc::clone(self);
        Arc::new(move |samples: &[f32], sample_rate: u32, channels: u16| {
            pipeline.process(samples, sample_rate, channels);
        })
    }

    /// Handle one hardware buffer.
    pub fn process(&self, samples: &[f32], sample_rate: u32, channels: u16) {
        let mono = pcm::downmix_to_mono(samples, channels as usize);

        let frames: Vec<Vec<f32>> = {
            let mut state = self.state.lock();
            let resampled = state.resampler.process(&mono, sample_rate);
            state.frames.push(&resampled);
            std::iter::from_fn(|| state.frames.pop_frame()).collect()
        };

        let mut forwarded = 0u64;
        let mut dropped = 0u64;
        let mut bytes_forwarded = 0u64;
        let mut level = None;
        for frame in &frames {
            let current = level_meter::sparse_level(frame, self.level_stride);
            self.level_bits.store(current.to_bits(), Ordering::Relaxed);
            level = Some(current);

            if !self.is_forwarding() {
                continue;
            }
            let bytes = pcm::float_to_pcm16(frame);
            let len = bytes.len() as u64;
            match self.outbound.try_send(bytes) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    log::debug!("outbound audio queue full, dropping frame");
                    dropped += 1;
                    continue;
                }
                Err(TrySendError::Closed(_)) => {
                    log::debug!("outbound audio channel closed, dropping frame");
                    continue;
                }
            }
            forwarded += 1;
            bytes_forwarded += len;
        }

        {
            let mut d = self.diagnostics.lock();
            d.capture_callbacks += 1;
            d.frames_captured += frames.len() as u64;
            d.frames_forwarded += forwarded;
            d.frames_dropped += dropped;
            d.bytes_forwarded += bytes_forwarded;
        }

        if let (Some(level), Some(delegate)) = (level, &self.delegate) {
            delegate.on_level_updated(level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pipeline(frame_size: usize) -> (Arc<CapturePipeline>, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_FRAMES);
        let config = LiveSessionConfig {
            frame_size,
            level_stride: 1,
            ..Default::default()
        };
        let pipeline = CapturePipeline::new(&config, tx, Arc::default(), None);
        (Arc::new(pipeline), rx)
    }

    #[test]
    fn nothing_is_sent_until_forwarding() {
        let (pipeline, mut rx) = pipeline(4);
        pipeline.process(&[0.5; 8], 16_000, 1);

        assert!(rx.try_recv().is_err());
        assert!(pipeline.current_level() > 0.0);
        assert_eq!(pipeline.diagnostics.lock().frames_captured, 2);
    }

    #[test]
    fn forwards_full_frames_as_pcm16() {
        let (pipeline, mut rx) = pipeline(4);
        pipeline.set_forwarding(true);

        pipeline.process(&[1.0, -1.0, 0.0], 16_000, 1);
        assert!(rx.try_recv().is_err());

        pipeline.process(&[0.0, 1.0], 16_000, 1);
        let bytes = rx.try_recv().unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), i16::MIN);
        assert!(rx.try_recv().is_err());

        let d = pipeline.diagnostics.lock().clone();
        assert_eq!(d.capture_callbacks, 2);
        assert_eq!(d.frames_forwarded, 1);
        assert_eq!(d.bytes_forwarded, 8);
    }

    #[test]
    fn stereo_48k_is_reduced_to_mono_16k() {
        let (pipeline, mut rx) = pipeline(160);
        pipeline.set_forwarding(true);

        // 10ms of 48kHz stereo = 480 frames = 160 mono samples at 16kHz.
        pipeline.process(&vec![0.25f32; 960], 48_000, 2);

        let bytes = rx.try_recv().unwrap();
        assert_eq!(bytes.len(), 320);
    }

    #[test]
    fn stalled_consumer_drops_instead_of_queueing() {
        let (pipeline, mut rx) = pipeline(4);
        pipeline.set_forwarding(true);

        for _ in 0..10 {
            pipeline.process(&[0.1; 4], 16_000, 1);
        }

        let d = pipeline.diagnostics.lock().clone();
        assert_eq!(d.frames_captured, 10);
        assert_eq!(d.frames_forwarded, OUTBOUND_FRAMES as u64);
        assert_eq!(d.frames_dropped, 10 - OUTBOUND_FRAMES as u64);

        let mut queued = 0;
        while rx.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, OUTBOUND_FRAMES);

        // Draining makes room again.
        pipeline.process(&[0.1; 4], 16_000, 1);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn odd_rate_buffers_keep_their_share_of_samples() {
        let (pipeline, mut rx) = pipeline(160);
        pipeline.set_forwarding(true);

        // 51_200 samples at 44.1 kHz resample to 18_576: 116 full frames.
        for _ in 0..100 {
            pipeline.process(&[0.25; 512], 44_100, 1);
            while rx.try_recv().is_ok() {}
        }

        let d = pipeline.diagnostics.lock().clone();
        assert_eq!(d.frames_captured, 116);
        assert_eq!(d.frames_dropped, 0);
    }

    #[test]
    fn level_tracks_latest_frame() {
        let (pipeline, _rx) = pipeline(4);
        pipeline.process(&[0.1; 4], 16_000, 1);
        assert_relative_eq!(pipeline.current_level(), 50.0, epsilon = 1e-3);
        pipeline.process(&[0.0; 4], 16_000, 1);
        assert_eq!(pipeline.current_level(), 0.0);
    }

    #[test]
    fn callback_survives_closed_receiver() {
        let (pipeline, rx) = pipeline(2);
        pipeline.set_forwarding(true);
        drop(rx);

        let callback = pipeline.callback();
        callback(&[0.1, 0.2], 16_000, 1);
        assert_eq!(pipeline.diagnostics.lock().frames_forwarded, 0);
    }

    #[test]
    fn disabling_forwarding_discards_partial_frame() {
        let (pipeline, mut rx) = pipeline(4);
        pipeline.set_forwarding(true);
        pipeline.process(&[0.1; 3], 16_000, 1);
        pipeline.set_forwarding(false);
        pipeline.set_forwarding(true);
        pipeline.process(&[0.2; 3], 16_000, 1);
        assert!(rx.try_recv().is_err());
    }
}
