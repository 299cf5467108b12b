//! # labvoice-core
//!
//! Platform-agnostic core of the lab voice assistant.
//!
//! Provides a shared credential pool, a retrying executor for one-shot model
//! calls, and the realtime voice session: microphone transcoding, gapless
//! playback scheduling and transcript aggregation. Hardware backends (see
//! `labvoice-cpal`) implement [`CaptureSource`] and [`PlaybackSink`]; network
//! transports implement [`DuplexConnector`] and [`GenerateConnector`].
//!
//! ## Architecture
//!
//! ```text
//! labvoice-core (this crate)
//! ├── credentials/  ← Credential, CredentialPool (rotation + suspension)
//! ├── request/      ← ResilientExecutor, GenerateRequest, LabAssistant
//! ├── session/      ← LiveSession, wire types, system instruction
//! ├── pipeline/     ← CapturePipeline, PlaybackScheduler, TranscriptAggregator
//! ├── processing/   ← PCM codec, Resampler, FrameBuffer, level meter
//! ├── traits/       ← CaptureSource, PlaybackSink, DuplexConnector, GenerateClient, SessionDelegate, Clock
//! └── models/       ← LabError, SessionState, Message, configs, diagnostics
//! ```

pub mod credentials;
pub mod models;
pub mod pipeline;
pub mod processing;
pub mod request;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use credentials::{Credential, CredentialPool, SelectionStrategy};
pub use models::audio_models::{AudioDevice, AudioDirection, SessionDiagnostics, INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE};
pub use models::config::{CaptureConstraints, LiveSessionConfig, Persona, PoolConfig};
pub use models::error::LabError;
pub use models::message::{Message, Role};
pub use models::state::SessionState;
pub use pipeline::{CapturePipeline, PlaybackScheduler, ScheduledFragment, TranscriptAggregator};
pub use request::{GenerateRequest, LabAssistant, Record, ResilientExecutor};
pub use session::{LiveConnectConfig, LiveSession, MediaChunk, ServerMessage};
pub use traits::capture_source::{AudioBufferCallback, CaptureSource};
pub use traits::clock::{Clock, SystemClock};
pub use traits::duplex::{ChannelEvent, DuplexChannel, DuplexConnector, EventSender};
pub use traits::generate_client::{GenerateClient, GenerateConnector};
pub use traits::playback_sink::{EndedCallback, PlaybackBuffer, PlaybackSink, VoiceId};
pub use traits::session_delegate::SessionDelegate;
