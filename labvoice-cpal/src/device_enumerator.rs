//! Audio device enumeration through the default cpal host.
//!
//! cpal exposes no stable endpoint identifiers, so device names double as ids.

use cpal::traits::{DeviceTrait, HostTrait};

use labvoice_core::{AudioDevice, AudioDirection, LabError};

use crate::error::BackendError;

/// Audio device enumerator over the platform's default host.
pub struct DeviceEnumerator {
    host: cpal::Host,
}

impl Default for DeviceEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceEnumerator {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// List microphones.
    pub fn list_capture_devices(&self) -> Result<Vec<AudioDevice>, LabError> {
        let default = self.default_capture_device_name();
        let devices = self.host.input_devices().map_err(BackendError::from)?;
        Ok(describe(devices, AudioDirection::Input, default.as_deref()))
    }

    /// List speakers and headphones.
    pub fn list_render_devices(&self) -> Result<Vec<AudioDevice>, LabError> {
        let default = self.default_render_device_name();
        let devices = self.host.output_devices().map_err(BackendError::from)?;
        Ok(describe(devices, AudioDirection::Output, default.as_deref()))
    }

    pub fn default_capture_device_name(&self) -> Option<String> {
        self.host.default_input_device().and_then(|d| d.name().ok())
    }

    pub fn default_render_device_name(&self) -> Option<String> {
        self.host.default_output_device().and_then(|d| d.name().ok())
    }

    /// The named microphone, or the default one when `name` is `None`.
    pub(crate) fn input_device(&self, name: Option<&str>) -> Result<cpal::Device, BackendError> {
        match name {
            None => self
                .host
                .default_input_device()
                .ok_or(BackendError::NoDevice("input")),
            Some(name) => self
                .host
                .input_devices()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or(BackendError::NoDevice("input")),
        }
    }

    /// The named output, or the default one when `name` is `None`.
    pub(crate) fn output_device(&self, name: Option<&str>) -> Result<cpal::Device, BackendError> {
        match name {
            None => self
                .host
                .default_output_device()
                .ok_or(BackendError::NoDevice("output")),
            Some(name) => self
                .host
                .output_devices()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or(BackendError::NoDevice("output")),
        }
    }
}

fn describe<I>(devices: I, direction: AudioDirection, default: Option<&str>) -> Vec<AudioDevice>
where
    I: Iterator<Item = cpal::Device>,
{
    devices
        .filter_map(|device| match device.name() {
            Ok(name) => Some(AudioDevice {
                id: name.clone(),
                is_default: default == Some(name.as_str()),
                name,
                direction,
            }),
            Err(e) => {
                log::debug!("skipping unnamed device: {}", e);
                None
            }
        })
        .collect()
}
