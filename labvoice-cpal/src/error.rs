use labvoice_core::LabError;
use thiserror::Error;

/// Failures raised by the cpal layer before they are folded into [`LabError`].
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no {0} device available")]
    NoDevice(&'static str),

    #[error("device enumeration failed: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("default stream config unavailable: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("failed to start stream: {0}")]
    Play(#[from] cpal::PlayStreamError),

    #[error("unsupported sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("stream thread: {0}")]
    Thread(String),
}

impl From<BackendError> for LabError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NoDevice(_) => LabError::DeviceNotAvailable,
            BackendError::Build(cpal::BuildStreamError::DeviceNotAvailable)
            | BackendError::Play(cpal::PlayStreamError::DeviceNotAvailable)
            | BackendError::DefaultConfig(cpal::DefaultStreamConfigError::DeviceNotAvailable) => {
                LabError::DeviceNotAvailable
            }
            other => LabError::ConfigurationFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_devices_map_to_device_not_available() {
        assert_eq!(LabError::from(BackendError::NoDevice("input")), LabError::DeviceNotAvailable);
        assert_eq!(
            LabError::from(BackendError::Build(cpal::BuildStreamError::DeviceNotAvailable)),
            LabError::DeviceNotAvailable
        );
    }

    #[test]
    fn other_failures_keep_their_message() {
        let err = LabError::from(BackendError::Thread("exited during startup".into()));
        assert_eq!(
            err,
            LabError::ConfigurationFailed("stream thread: exited during startup".into())
        );
    }
}
