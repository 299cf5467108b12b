use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::instruction::compose_system_instruction;
use super::wire::{LiveConnectConfig, MediaChunk, Modality, ServerMessage};
use crate::credentials::{CredentialPool, SelectionStrategy};
use crate::models::audio_models::SessionDiagnostics;
use crate::models::config::LiveSessionConfig;
use crate::models::error::LabError;
use crate::models::message::{Message, Role};
use crate::models::state::SessionState;
use crate::pipeline::capture::{CapturePipeline, OUTBOUND_FRAMES};
use crate::pipeline::playback::PlaybackScheduler;
use crate::pipeline::transcript::TranscriptAggregator;
use crate::traits::capture_source::CaptureSource;
use crate::traits::duplex::{ChannelEvent, DuplexChannel, DuplexConnector};
use crate::traits::playback_sink::PlaybackSink;
use crate::traits::session_delegate::SessionDelegate;

/// Resources that exist only while a connection attempt or connection is live.
struct Core {
    state: SessionState,
    channel: Option<Arc<dyn DuplexChannel>>,
    pipeline: Option<Arc<CapturePipeline>>,
    capture_running: bool,
    tasks: Vec<JoinHandle<()>>,
}

struct Inner<D, M: CaptureSource, P: PlaybackSink> {
    connector: D,
    capture: Mutex<M>,
    scheduler: PlaybackScheduler<P>,
    pool: Arc<CredentialPool>,
    config: LiveSessionConfig,
    delegate: RwLock<Option<Arc<dyn SessionDelegate>>>,
    core: Mutex<Core>,
    transcript: Mutex<TranscriptAggregator>,
    diagnostics: Arc<Mutex<SessionDiagnostics>>,
    /// Cancelled exactly once, by the transition to `Disconnected`.
    shutdown: CancellationToken,
}

/// One realtime voice conversation.
///
/// Owns its credential, its microphone, its playback timeline and its
/// duplex channel for its whole lifetime, and tears all of them down
/// together. Cheap to clone; clones share the session.
///
/// ```text
/// [CaptureSource] → [CapturePipeline] → outbound task → [DuplexChannel]
///                                                            ↓ events
///     [PlaybackScheduler] ← audio ── event task ── transcripts → [TranscriptAggregator]
///             ↑ flush on interruption ┘
/// ```
///
/// The background tasks only hold a weak reference, so dropping the last
/// handle tears the session down like [`disconnect`](Self::disconnect).
pub struct LiveSession<D, M: CaptureSource, P: PlaybackSink> {
    inner: Arc<Inner<D, M, P>>,
}

impl<D, M: CaptureSource, P: PlaybackSink> Clone for LiveSession<D, M, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D, M, P> LiveSession<D, M, P>
where
    D: DuplexConnector + 'static,
    M: CaptureSource + 'static,
    P: PlaybackSink + 'static,
{
    pub fn new(
        pool: Arc<CredentialPool>,
        connector: D,
        capture: M,
        sink: Arc<P>,
        config: LiveSessionConfig,
    ) -> Result<Self, LabError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                connector,
                capture: Mutex::new(capture),
                scheduler: PlaybackScheduler::new(sink, config.output_sample_rate),
                pool,
                transcript: Mutex::new(TranscriptAggregator::new(config.merge_window)),
                config,
                delegate: RwLock::new(None),
                core: Mutex::new(Core {
                    state: SessionState::Idle,
                    channel: None,
                    pipeline: None,
                    capture_running: false,
                    tasks: Vec::new(),
                }),
                diagnostics: Arc::default(),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    pub fn set_delegate(&self, delegate: Arc<dyn SessionDelegate>) {
        *self.inner.delegate.write() = Some(delegate);
    }

    /// Carry a previous conversation into this session's system instruction.
    pub fn set_history(&self, history: Vec<Message>) {
        *self.inner.transcript.lock() =
            TranscriptAggregator::with_history(self.inner.config.merge_window, history);
    }

    pub fn state(&self) -> SessionState {
        self.inner.core.lock().state
    }

    /// Snapshot of the transcript so far.
    pub fn transcript(&self) -> Vec<Message> {
        self.inner.transcript.lock().messages().to_vec()
    }

    /// Latest microphone level, `0.0..=100.0`; zero when not capturing.
    pub fn current_level(&self) -> f32 {
        self.inner
            .core
            .lock()
            .pipeline
            .as_ref()
            .map(|p| p.current_level())
            .unwrap_or(0.0)
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        self.inner.diagnostics.lock().clone()
    }

    pub fn playback(&self) -> &PlaybackScheduler<P> {
        &self.inner.scheduler
    }

    /// Open the microphone and the duplex channel.
    ///
    /// Resolves once the channel reports open. On failure every resource
    /// acquired so far is released and the session returns to `Idle`,
    /// unless a concurrent [`disconnect`](Self::disconnect) won, in which
    /// case it stays `Disconnected`.
    pub async fn connect(&self) -> Result<(), LabError> {
        {
            let mut core = self.inner.core.lock();
            if !core.state.is_idle() {
                return Err(LabError::InvalidState(format!(
                    "cannot connect from {}",
                    core.state
                )));
            }
            core.state = SessionState::Connecting;
        }
        self.notify_state(SessionState::Connecting);

        let attempt = self.inner.shutdown.child_token();
        let result = self.open(&attempt).await;
        if let Err(err) = &result {
            attempt.cancel();
            self.release_resources();

            let reverted = {
                let mut core = self.inner.core.lock();
                if core.state == SessionState::Connecting {
                    core.state = SessionState::Idle;
                    true
                } else {
                    false
                }
            };
            log::warn!("live session connect failed: {}", err);
            if reverted {
                self.notify_state(SessionState::Idle);
            }
            self.notify_error(err);
        }
        result
    }

    /// Tear the session down. Idempotent; safe before, during and after `connect`.
    pub fn disconnect(&self) {
        self.terminate(None);
    }

    async fn open(&self, attempt: &CancellationToken) -> Result<(), LabError> {
        let inner = &self.inner;
        let cancelled = || LabError::Connect("cancelled by disconnect".into());

        let credential = inner
            .pool
            .next(SelectionStrategy::Random)
            .map_err(|e| LabError::Connect(e.to_string()))?;
        log::info!("starting live session with key {}", credential);

        let (audio_tx, audio_rx) = mpsc::channel(OUTBOUND_FRAMES);
        let pipeline = Arc::new(CapturePipeline::new(
            &inner.config,
            audio_tx,
            Arc::clone(&inner.diagnostics),
            inner.delegate.read().clone(),
        ));

        inner
            .capture
            .lock()
            .start(&inner.config.capture, pipeline.callback())
            .map_err(|e| LabError::Connect(format!("microphone: {}", e)))?;
        {
            let mut core = inner.core.lock();
            core.capture_running = true;
            core.pipeline = Some(Arc::clone(&pipeline));
        }
        if attempt.is_cancelled() {
            return Err(cancelled());
        }

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let setup = self.connect_config();
        let channel = tokio::select! {
            biased;
            _ = attempt.cancelled() => return Err(cancelled()),
            result = inner.connector.connect(credential, setup, event_tx) => {
                result.map_err(|e| LabError::Connect(e.to_string()))?
            }
        };
        {
            let mut core = inner.core.lock();
            core.channel = Some(Arc::clone(&channel));
        }
        if attempt.is_cancelled() {
            return Err(cancelled());
        }

        loop {
            let event = tokio::select! {
                biased;
                _ = attempt.cancelled() => return Err(cancelled()),
                event = event_rx.recv() => event,
            };
            match event {
                Some(ChannelEvent::Opened) => break,
                Some(ChannelEvent::Message(_)) => {
                    log::debug!("dropping message received before open");
                }
                Some(ChannelEvent::Error(reason)) => return Err(LabError::Connect(reason)),
                Some(ChannelEvent::Closed) | None => {
                    return Err(LabError::Connect("channel closed before open".into()))
                }
            }
        }

        {
            let mut core = inner.core.lock();
            if core.state != SessionState::Connecting {
                return Err(cancelled());
            }
            core.state = SessionState::Connected;

            let outbound = tokio::spawn(run_outbound(
                Arc::clone(&channel),
                audio_rx,
                attempt.clone(),
                inner.config.capture.sample_rate,
            ));
            let events = tokio::spawn(Self::run_events(
                Arc::downgrade(&self.inner),
                event_rx,
                attempt.clone(),
            ));
            core.tasks.push(outbound);
            core.tasks.push(events);
            pipeline.set_forwarding(true);
        }
        log::info!("live session connected");
        self.notify_state(SessionState::Connected);
        Ok(())
    }

    fn connect_config(&self) -> LiveConnectConfig {
        let config = &self.inner.config;
        let transcript = self.inner.transcript.lock();
        LiveConnectConfig {
            model: config.model.clone(),
            response_modalities: vec![Modality::Audio],
            system_instruction: compose_system_instruction(
                &config.persona,
                &config.context,
                transcript.messages(),
            ),
            input_audio_transcription: true,
            output_audio_transcription: true,
            voice_name: config.persona.voice.clone(),
        }
    }

    async fn run_events(
        weak: Weak<Inner<D, M, P>>,
        mut events: mpsc::UnboundedReceiver<ChannelEvent>,
        token: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                event = events.recv() => event,
            };
            let Some(inner) = weak.upgrade() else {
                break;
            };
            let session = Self { inner };
            match event {
                Some(ChannelEvent::Message(message)) => {
                    if token.is_cancelled() {
                        break;
                    }
                    session.dispatch(message);
                }
                Some(ChannelEvent::Opened) => {}
                Some(ChannelEvent::Error(reason)) => {
                    log::error!("live channel error: {}", reason);
                    session.terminate(Some(LabError::Channel(reason)));
                    break;
                }
                Some(ChannelEvent::Closed) | None => {
                    log::info!("live channel closed by remote");
                    session.terminate(Some(LabError::ChannelClosed));
                    break;
                }
            }
        }
    }

    /// Interruption, transcripts and audio may all ride on one message.
    fn dispatch(&self, message: ServerMessage) {
        let inner = &self.inner;

        if message.interrupted {
            inner.scheduler.flush();
            inner.diagnostics.lock().interruptions += 1;
        }

        if let Some(text) = message.output_transcript.as_deref() {
            self.record_transcript(Role::Model, text);
        }
        if let Some(text) = message.input_transcript.as_deref() {
            self.record_transcript(Role::User, text);
        }

        if let Some(audio) = message.audio.as_deref() {
            match inner.scheduler.enqueue_pcm(audio) {
                Ok(Some(_)) => inner.diagnostics.lock().fragments_scheduled += 1,
                Ok(None) => {}
                Err(err) => {
                    log::warn!("failed to schedule audio fragment: {}", err);
                    self.notify_error(&err);
                }
            }
        }
    }

    fn record_transcript(&self, role: Role, text: &str) {
        if text.is_empty() {
            return;
        }
        let snapshot = {
            let mut transcript = self.inner.transcript.lock();
            transcript.push(role, text);
            transcript.messages().to_vec()
        };
        self.inner.diagnostics.lock().transcript_fragments += 1;
        if let Some(delegate) = self.delegate() {
            delegate.on_transcript_updated(&snapshot);
        }
    }

    /// Move to `Disconnected` and release everything. Only the first call acts.
    fn terminate(&self, reason: Option<LabError>) {
        let previous = {
            let mut core = self.inner.core.lock();
            if core.state.is_terminal() {
                return;
            }
            std::mem::replace(&mut core.state, SessionState::Disconnected)
        };
        log::info!("live session disconnecting (was {})", previous);

        self.inner.shutdown.cancel();
        self.release_resources();
        self.inner.scheduler.close();

        self.notify_state(SessionState::Disconnected);
        if let Some(err) = reason {
            self.notify_error(&err);
        }
    }

    fn release_resources(&self) {
        let (pipeline, channel, tasks, capture_running) = {
            let mut core = self.inner.core.lock();
            (
                core.pipeline.take(),
                core.channel.take(),
                std::mem::take(&mut core.tasks),
                std::mem::replace(&mut core.capture_running, false),
            )
        };

        if let Some(pipeline) = pipeline {
            pipeline.set_forwarding(false);
        }
        for task in tasks {
            task.abort();
        }
        if capture_running {
            if let Err(err) = self.inner.capture.lock().stop() {
                log::warn!("failed to stop microphone: {}", err);
            }
        }
        if let Some(channel) = channel {
            channel.close();
        }
        self.inner.scheduler.flush();
    }

    fn delegate(&self) -> Option<Arc<dyn SessionDelegate>> {
        self.inner.delegate.read().clone()
    }

    fn notify_state(&self, state: SessionState) {
        if let Some(delegate) = self.delegate() {
            delegate.on_state_changed(state);
        }
    }

    fn notify_error(&self, err: &LabError) {
        if let Some(delegate) = self.delegate() {
            delegate.on_error(err);
        }
    }
}

impl<D, M: CaptureSource, P: PlaybackSink> Drop for Inner<D, M, P> {
    fn drop(&mut self) {
        self.shutdown.cancel();
        let core = self.core.get_mut();
        if !core.state.is_idle() && !core.state.is_terminal() {
            log::info!("live session dropped while {}, releasing resources", core.state);
        }

        if let Some(pipeline) = core.pipeline.take() {
            pipeline.set_forwarding(false);
        }
        for task in core.tasks.drain(..) {
            task.abort();
        }
        if std::mem::replace(&mut core.capture_running, false) {
            if let Err(err) = self.capture.get_mut().stop() {
                log::warn!("failed to stop microphone: {}", err);
            }
        }
        if let Some(channel) = core.channel.take() {
            channel.close();
        }
        self.scheduler.close();
    }
}

/// Drains encoded microphone frames into the channel, one send at a time.
async fn run_outbound(
    channel: Arc<dyn DuplexChannel>,
    mut frames: mpsc::Receiver<Vec<u8>>,
    token: CancellationToken,
    sample_rate: u32,
) {
    loop {
        let bytes = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            frame = frames.recv() => match frame {
                Some(bytes) => bytes,
                None => break,
            },
        };
        if token.is_cancelled() {
            break;
        }
        if let Err(err) = channel.send_realtime_input(MediaChunk::pcm(&bytes, sample_rate)).await {
            log::warn!("failed to send audio frame: {}", err);
        }
    }
}
