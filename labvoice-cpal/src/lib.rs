//! # labvoice-cpal
//!
//! Cross-platform audio backend for labvoice built on cpal.
//!
//! Provides:
//! - `CpalMicCapture`: microphone capture implementing `CaptureSource`
//! - `CpalPlaybackSink`: scheduled output implementing `PlaybackSink`
//! - `DeviceEnumerator`: input and output device listing
//!
//! Each stream lives on its own thread because `cpal::Stream` is not `Send`
//! on every host.
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use labvoice_core::{CredentialPool, LiveSession, LiveSessionConfig};
//! use labvoice_cpal::{CpalMicCapture, CpalPlaybackSink};
//!
//! let pool = Arc::new(CredentialPool::from_env());
//! let sink = Arc::new(CpalPlaybackSink::open_default()?);
//! let session = LiveSession::new(pool, connector, CpalMicCapture::default_device(), sink, LiveSessionConfig::default())?;
//! session.connect().await?;
//! ```

pub mod cpal_mic;
pub mod cpal_output;
pub mod device_enumerator;
pub mod error;
mod stream_thread;

pub use cpal_mic::CpalMicCapture;
pub use cpal_output::CpalPlaybackSink;
pub use device_enumerator::DeviceEnumerator;
pub use error::BackendError;
