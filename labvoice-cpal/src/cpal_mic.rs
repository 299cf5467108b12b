//! cpal microphone capture source.
//!
//! Opens an input stream in whatever format the device offers, converts to
//! f32 and delivers interleaved buffers at the device's native rate. Channel
//! reduction and resampling happen downstream in the capture pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use cpal::traits::DeviceTrait;
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use parking_lot::Mutex;

use labvoice_core::{AudioBufferCallback, AudioDevice, AudioDirection, CaptureConstraints, CaptureSource, LabError};

use crate::device_enumerator::DeviceEnumerator;
use crate::error::BackendError;
use crate::stream_thread;

/// Microphone capture on a dedicated stream thread.
pub struct CpalMicCapture {
    device_name: Option<String>,
    running: Arc<AtomicBool>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl CpalMicCapture {
    /// Capture from the system default microphone.
    pub fn default_device() -> Self {
        Self {
            device_name: None,
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: Mutex::new(None),
        }
    }

    /// Capture from a specific microphone by name.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl CaptureSource for CpalMicCapture {
    fn is_available(&self) -> bool {
        DeviceEnumerator::new()
            .input_device(self.device_name.as_deref())
            .is_ok()
    }

    fn start(
        &mut self,
        constraints: &CaptureConstraints,
        callback: AudioBufferCallback,
    ) -> Result<(), LabError> {
        if self.is_running() {
            return Err(LabError::ConfigurationFailed(
                "microphone capture already running".into(),
            ));
        }
        if constraints.echo_cancellation || constraints.noise_suppression || constraints.auto_gain_control {
            log::debug!("voice processing flags are left to the OS audio stack");
        }

        let device_name = self.device_name.clone();
        let preferred_rate = constraints.sample_rate;
        let (handle, (rate, channels)) = stream_thread::spawn(
            "cpal-mic-capture",
            Arc::clone(&self.running),
            move || open_input(device_name.as_deref(), preferred_rate, callback),
        )?;

        log::info!("microphone capture started at {} Hz, {} channels", rate, channels);
        *self.capture_handle.lock() = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), LabError> {
        let handle = self.capture_handle.lock().take();
        if handle.is_some() {
            log::info!("microphone capture stopped");
        }
        stream_thread::shutdown(&self.running, handle);
        Ok(())
    }

    fn device_info(&self) -> AudioDevice {
        AudioDevice {
            id: self.device_name.clone().unwrap_or_else(|| "default-mic".into()),
            name: self
                .device_name
                .clone()
                .unwrap_or_else(|| "Default Microphone".into()),
            direction: AudioDirection::Input,
            is_default: self.device_name.is_none(),
        }
    }
}

impl Drop for CpalMicCapture {
    fn drop(&mut self) {
        stream_thread::shutdown(&self.running, self.capture_handle.lock().take());
    }
}

fn open_input(
    name: Option<&str>,
    preferred_rate: u32,
    callback: AudioBufferCallback,
) -> Result<(cpal::Stream, (u32, u16)), BackendError> {
    let device = DeviceEnumerator::new().input_device(name)?;
    let supported = input_config(&device, preferred_rate)?;
    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let info = (config.sample_rate.0, config.channels);

    let stream = match format {
        SampleFormat::F32 => build_input::<f32>(&device, &config, callback)?,
        SampleFormat::I16 => build_input::<i16>(&device, &config, callback)?,
        SampleFormat::U16 => build_input::<u16>(&device, &config, callback)?,
        other => return Err(BackendError::UnsupportedFormat(other)),
    };
    Ok((stream, info))
}

/// A float config at `preferred_rate` when the device offers one, else its default.
fn input_config(
    device: &cpal::Device,
    preferred_rate: u32,
) -> Result<cpal::SupportedStreamConfig, BackendError> {
    let wanted = cpal::SampleRate(preferred_rate);
    let exact = device.supported_input_configs().ok().and_then(|mut ranges| {
        ranges
            .find(|r| {
                r.sample_format() == SampleFormat::F32
                    && r.min_sample_rate() <= wanted
                    && wanted <= r.max_sample_rate()
            })
            .map(|r| r.with_sample_rate(wanted))
    });
    match exact {
        Some(config) => Ok(config),
        None => Ok(device.default_input_config()?),
    }
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    callback: AudioBufferCallback,
) -> Result<cpal::Stream, BackendError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let rate = config.sample_rate.0;
    let channels = config.channels;
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            scratch.clear();
            scratch.extend(data.iter().map(|&s| s.to_sample::<f32>()));
            callback(&scratch, rate, channels);
        },
        |err| log::error!("microphone stream error: {}", err),
        None,
    )?;
    Ok(stream)
}
