use std::collections::HashSet;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::models::error::LabError;
use crate::processing::pcm;
use crate::traits::playback_sink::{PlaybackBuffer, PlaybackSink, VoiceId};

/// Where and when a fragment landed on the output timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledFragment {
    pub id: VoiceId,
    pub start_time: f64,
    pub duration: f64,
}

impl ScheduledFragment {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    next_start_time: f64,
    pending: HashSet<VoiceId>,
    next_id: u64,
    closed: bool,
}

/// Lays inbound audio fragments end to end on the sink's clock.
///
/// `start = max(now, next_start_time)`, then `next_start_time = start + duration`:
/// fragments arriving faster than realtime queue up without gaps, fragments
/// arriving late start immediately. The state lock is held across sink calls
/// so a flush can never miss a buffer that is mid-schedule.
pub struct PlaybackScheduler<P: PlaybackSink> {
    sink: Arc<P>,
    state: Arc<Mutex<SchedulerState>>,
    sample_rate: u32,
}

impl<P: PlaybackSink> PlaybackScheduler<P> {
    pub fn new(sink: Arc<P>, sample_rate: u32) -> Self {
        Self {
            sink,
            state: Arc::new(Mutex::new(SchedulerState::default())),
            sample_rate,
        }
    }

    pub fn sink(&self) -> &Arc<P> {
        &self.sink
    }

    /// Decode a 16-bit PCM fragment and schedule it.
    ///
    /// Returns `None` for empty fragments and after [`close`](Self::close).
    pub fn enqueue_pcm(&self, bytes: &[u8]) -> Result<Option<ScheduledFragment>, LabError> {
        self.enqueue_samples(pcm::pcm16_to_float(bytes))
    }

    pub fn enqueue_samples(&self, samples: Vec<f32>) -> Result<Option<ScheduledFragment>, LabError> {
        if samples.is_empty() {
            return Ok(None);
        }
        let buffer = PlaybackBuffer::new(samples, self.sample_rate);
        let duration = buffer.duration();

        let mut state = self.state.lock();
        if state.closed {
            return Ok(None);
        }

        let start_time = self.sink.current_time().max(state.next_start_time);
        let id = VoiceId(state.next_id);
        state.next_id += 1;

        let on_ended = Self::removal(Arc::downgrade(&self.state), id);
        self.sink.schedule(id, buffer, start_time, on_ended)?;

        state.pending.insert(id);
        state.next_start_time = start_time + duration;

        Ok(Some(ScheduledFragment {
            id,
            start_time,
            duration,
        }))
    }

    /// Stop everything queued or playing and pull the timeline back to now.
    pub fn flush(&self) {
        let mut state = self.state.lock();
        self.flush_locked(&mut state);
    }

    /// Flush and refuse further fragments.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.flush_locked(&mut state);
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Buffers scheduled but not yet finished.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn next_start_time(&self) -> f64 {
        self.state.lock().next_start_time
    }

    fn flush_locked(&self, state: &mut SchedulerState) {
        let stopped = state.pending.len();
        for id in state.pending.drain() {
            self.sink.stop(id);
        }
        state.next_start_time = self.sink.current_time();
        if stopped > 0 {
            log::debug!("playback flushed, {} buffers stopped", stopped);
        }
    }

    fn removal(state: Weak<Mutex<SchedulerState>>, id: VoiceId) -> Box<dyn FnOnce() + Send> {
        Box::new(move || {
            if let Some(state) = state.upgrade() {
                state.lock().pending.remove(&id);
            }
        })
    }
}

/// In-memory sink with a hand-driven clock.
#[cfg(test)]
pub(crate) mod test_sink {
    use std::collections::BTreeMap;

    use super::*;
    use crate::traits::playback_sink::EndedCallback;

    pub(crate) struct Voice {
        pub start_time: f64,
        pub duration: f64,
        pub on_ended: EndedCallback,
    }

    #[derive(Default)]
    pub(crate) struct FakeSink {
        pub now: Mutex<f64>,
        pub voices: Mutex<BTreeMap<VoiceId, Voice>>,
        pub stopped: Mutex<Vec<VoiceId>>,
        pub fail_next: Mutex<bool>,
    }

    impl FakeSink {
        pub fn set_time(&self, t: f64) {
            *self.now.lock() = t;
        }

        /// Move the clock and fire completion for every voice that finished.
        pub fn advance_to(&self, t: f64) {
            self.set_time(t);
            let finished: Vec<Voice> = {
                let mut voices = self.voices.lock();
                let done: Vec<VoiceId> = voices
                    .iter()
                    .filter(|(_, v)| v.start_time + v.duration <= t)
                    .map(|(id, _)| *id)
                    .collect();
                done.iter().filter_map(|id| voices.remove(id)).collect()
            };
            for voice in finished {
                (voice.on_ended)();
            }
        }

        pub fn live_voices(&self) -> usize {
            self.voices.lock().len()
        }
    }

    impl PlaybackSink for FakeSink {
        fn current_time(&self) -> f64 {
            *self.now.lock()
        }

        fn schedule(
            &self,
            id: VoiceId,
            buffer: PlaybackBuffer,
            start_time: f64,
            on_ended: EndedCallback,
        ) -> Result<(), LabError> {
            if std::mem::take(&mut *self.fail_next.lock()) {
                return Err(LabError::DeviceNotAvailable);
            }
            self.voices.lock().insert(
                id,
                Voice {
                    start_time,
                    duration: buffer.duration(),
                    on_ended,
                },
            );
            Ok(())
        }

        fn stop(&self, id: VoiceId) {
            self.voices.lock().remove(&id);
            self.stopped.lock().push(id);
        }
    }
}
