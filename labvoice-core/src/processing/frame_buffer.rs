use std::collections::VecDeque;

/// Accumulates arbitrarily sized hardware buffers into fixed-size frames.
///
/// Bounded: once `capacity` samples are queued, the oldest are dropped, so
/// an oversized hardware buffer cannot grow memory on the audio thread.
/// Backpressure from the network is handled by the outbound queue instead.
#[derive(Debug)]
pub struct FrameBuffer {
    samples: VecDeque<f32>,
    frame_size: usize,
    capacity: usize,
    dropped: u64,
}

impl FrameBuffer {
    /// `capacity` is clamped up to at least one frame.
    pub fn new(frame_size: usize, capacity: usize) -> Self {
        let frame_size = frame_size.max(1);
        let capacity = capacity.max(frame_size);
        Self {
            samples: VecDeque::with_capacity(capacity),
            frame_size,
            capacity,
            dropped: 0,
        }
    }

    pub fn push(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        // Only the tail of an oversized write can survive anyway.
        let samples = if samples.len() > self.capacity {
            self.dropped += (samples.len() - self.capacity) as u64;
            &samples[samples.len() - self.capacity..]
        } else {
            samples
        };

        let overflow = (self.samples.len() + samples.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            self.samples.drain(..overflow);
            self.dropped += overflow as u64;
        }
        self.samples.extend(samples.iter().copied());
    }

    /// Remove and return the next full frame, if one is queued.
    pub fn pop_frame(&mut self) -> Option<Vec<f32>> {
        if self.samples.len() < self.frame_size {
            return None;
        }
        Some(self.samples.drain(..self.frame_size).collect())
    }

    /// Samples queued but not yet emitted.
    pub fn pending(&self) -> usize {
        self.samples.len()
    }

    /// Samples discarded by overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_only_full_frames() {
        let mut buf = FrameBuffer::new(4, 16);
        buf.push(&[1.0, 2.0, 3.0]);
        assert!(buf.pop_frame().is_none());

        buf.push(&[4.0, 5.0]);
        assert_eq!(buf.pop_frame(), Some(vec![1.0, 2.0, 3.0, 4.0]));
        assert!(buf.pop_frame().is_none());
        assert_eq!(buf.pending(), 1);
    }

    #[test]
    fn one_push_can_yield_several_frames() {
        let mut buf = FrameBuffer::new(2, 16);
        buf.push(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(buf.pop_frame(), Some(vec![1.0, 2.0]));
        assert_eq!(buf.pop_frame(), Some(vec![3.0, 4.0]));
        assert!(buf.pop_frame().is_none());
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut buf = FrameBuffer::new(2, 4);
        buf.push(&[1.0, 2.0, 3.0, 4.0]);
        buf.push(&[5.0, 6.0]);

        assert_eq!(buf.dropped(), 2);
        assert_eq!(buf.pop_frame(), Some(vec![3.0, 4.0]));
        assert_eq!(buf.pop_frame(), Some(vec![5.0, 6.0]));
    }

    #[test]
    fn oversized_push_keeps_tail() {
        let mut buf = FrameBuffer::new(3, 3);
        buf.push(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(buf.dropped(), 2);
        assert_eq!(buf.pop_frame(), Some(vec![3.0, 4.0, 5.0]));
    }

    #[test]
    fn clear_discards_partial_frame() {
        let mut buf = FrameBuffer::new(4, 8);
        buf.push(&[1.0, 2.0]);
        buf.clear();
        buf.push(&[3.0, 4.0, 5.0, 6.0]);
        assert_eq!(buf.pop_frame(), Some(vec![3.0, 4.0, 5.0, 6.0]));
    }
}
