//! cpal playback sink with a sample-accurate clock.
//!
//! The output callback mixes every voice whose start frame has been reached
//! and counts rendered frames; that count is the sink's clock. Voices are
//! resampled to the device rate when scheduled, so the callback only copies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use cpal::traits::DeviceTrait;
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use parking_lot::Mutex;

use labvoice_core::processing::resampler::Resampler;
use labvoice_core::{AudioDevice, AudioDirection, EndedCallback, LabError, PlaybackBuffer, PlaybackSink, VoiceId};

use crate::device_enumerator::DeviceEnumerator;
use crate::error::BackendError;
use crate::stream_thread;

struct Voice {
    id: VoiceId,
    samples: Arc<[f32]>,
    start_frame: u64,
    position: usize,
    on_ended: EndedCallback,
}

impl Voice {
    fn is_finished(&self) -> bool {
        self.position >= self.samples.len()
    }
}

/// Mixer state shared with the output callback.
#[derive(Default)]
pub(crate) struct RenderState {
    frames_rendered: u64,
    voices: Vec<Voice>,
}

impl RenderState {
    pub(crate) fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    fn schedule(&mut self, id: VoiceId, samples: Arc<[f32]>, start_frame: u64, on_ended: EndedCallback) {
        self.voices.push(Voice {
            id,
            samples,
            start_frame,
            position: 0,
            on_ended,
        });
    }

    /// Drop the voice and its completion callback.
    fn stop(&mut self, id: VoiceId) -> bool {
        let before = self.voices.len();
        self.voices.retain(|v| v.id != id);
        self.voices.len() != before
    }

    /// Mix one interleaved block and return the callbacks of voices that
    /// finished in it. Callers run them after releasing the lock.
    fn render(&mut self, out: &mut [f32], channels: usize) -> Vec<EndedCallback> {
        let channels = channels.max(1);
        let frames = out.len() / channels;
        out.fill(0.0);

        let window_start = self.frames_rendered;
        for voice in &mut self.voices {
            // A voice scheduled in the past starts at the top of the block.
            let offset = voice.start_frame.saturating_sub(window_start);
            if offset >= frames as u64 {
                continue;
            }
            let offset = offset as usize;
            let count = (voice.samples.len() - voice.position).min(frames - offset);
            let source = &voice.samples[voice.position..voice.position + count];
            for (i, &sample) in source.iter().enumerate() {
                let frame = (offset + i) * channels;
                for slot in &mut out[frame..frame + channels] {
                    *slot += sample;
                }
            }
            voice.position += count;
        }
        for slot in out.iter_mut() {
            *slot = slot.clamp(-1.0, 1.0);
        }
        self.frames_rendered += frames as u64;

        let (finished, live): (Vec<Voice>, Vec<Voice>) =
            std::mem::take(&mut self.voices).into_iter().partition(Voice::is_finished);
        self.voices = live;
        finished.into_iter().map(|v| v.on_ended).collect()
    }
}

/// Speaker output driven by a dedicated stream thread.
pub struct CpalPlaybackSink {
    device_name: Option<String>,
    render: Arc<Mutex<RenderState>>,
    device_rate: u32,
    resampler: Resampler,
    running: Arc<AtomicBool>,
    playback_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl CpalPlaybackSink {
    /// Open the system default output device.
    pub fn open_default() -> Result<Self, LabError> {
        Self::open(None)
    }

    /// Open a specific output device by name, or the default when `None`.
    pub fn open(device_name: Option<&str>) -> Result<Self, LabError> {
        let render = Arc::new(Mutex::new(RenderState::default()));
        let running = Arc::new(AtomicBool::new(false));

        let name = device_name.map(str::to_string);
        let stream_render = Arc::clone(&render);
        let (handle, device_rate) = stream_thread::spawn(
            "cpal-playback",
            Arc::clone(&running),
            move || open_output(name.as_deref(), stream_render),
        )?;
        log::info!("playback started at {} Hz", device_rate);

        Ok(Self {
            device_name: device_name.map(str::to_string),
            render,
            device_rate,
            resampler: Resampler::new(device_rate),
            running,
            playback_handle: Mutex::new(Some(handle)),
        })
    }

    pub fn device_rate(&self) -> u32 {
        self.device_rate
    }

    pub fn is_open(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the output stream. Pending voices are dropped without completing.
    pub fn close(&self) {
        stream_thread::shutdown(&self.running, self.playback_handle.lock().take());
        self.render.lock().voices.clear();
    }

    pub fn device_info(&self) -> AudioDevice {
        AudioDevice {
            id: self.device_name.clone().unwrap_or_else(|| "default-output".into()),
            name: self
                .device_name
                .clone()
                .unwrap_or_else(|| "Default Output".into()),
            direction: AudioDirection::Output,
            is_default: self.device_name.is_none(),
        }
    }
}

impl PlaybackSink for CpalPlaybackSink {
    fn current_time(&self) -> f64 {
        self.render.lock().frames_rendered() as f64 / self.device_rate as f64
    }

    fn schedule(
        &self,
        id: VoiceId,
        buffer: PlaybackBuffer,
        start_time: f64,
        on_ended: EndedCallback,
    ) -> Result<(), LabError> {
        if !self.is_open() {
            return Err(LabError::DeviceNotAvailable);
        }
        let samples: Arc<[f32]> = self.resampler.process(&buffer.samples, buffer.sample_rate).into();
        let start_frame = (start_time.max(0.0) * self.device_rate as f64).round() as u64;
        self.render.lock().schedule(id, samples, start_frame, on_ended);
        Ok(())
    }

    fn stop(&self, id: VoiceId) {
        self.render.lock().stop(id);
    }
}

impl Drop for CpalPlaybackSink {
    fn drop(&mut self) {
        stream_thread::shutdown(&self.running, self.playback_handle.lock().take());
    }
}

fn open_output(
    name: Option<&str>,
    render: Arc<Mutex<RenderState>>,
) -> Result<(cpal::Stream, u32), BackendError> {
    let device = DeviceEnumerator::new().output_device(name)?;
    let supported = device.default_output_config()?;
    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let rate = config.sample_rate.0;

    let stream = match format {
        SampleFormat::F32 => build_output::<f32>(&device, &config, render)?,
        SampleFormat::I16 => build_output::<i16>(&device, &config, render)?,
        SampleFormat::U16 => build_output::<u16>(&device, &config, render)?,
        other => return Err(BackendError::UnsupportedFormat(other)),
    };
    Ok((stream, rate))
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    render: Arc<Mutex<RenderState>>,
) -> Result<cpal::Stream, BackendError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            let ended = render.lock().render(&mut scratch, channels);
            for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
                *out = T::from_sample(sample);
            }
            for on_ended in ended {
                on_ended();
            }
        },
        |err| log::error!("playback stream error: {}", err),
        None,
    )?;
    Ok(stream)
}
