/// Linear-interpolation resampler for mono audio.
///
/// Good enough for speech between 16/24/48 kHz; not band-limited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resampler {
    pub target_rate: u32,
}

impl Resampler {
    pub fn new(target_rate: u32) -> Self {
        Self { target_rate }
    }

    /// Resample `samples` from `source_rate` to the target rate.
    ///
    /// Returns the input unchanged when rates match.
    pub fn process(&self, samples: &[f32], source_rate: u32) -> Vec<f32> {
        if source_rate == self.target_rate || source_rate == 0 || samples.is_empty() {
            return samples.to_vec();
        }

        let step = source_rate as f64 / self.target_rate as f64;
        let output_len =
            (samples.len() as u64 * self.target_rate as u64 / source_rate as u64) as usize;

        (0..output_len)
            .map(|i| {
                let position = i as f64 * step;
                let index = position as usize;
                let fraction = (position - index as f64) as f32;
                match (samples.get(index), samples.get(index + 1)) {
                    (Some(&a), Some(&b)) => a * (1.0 - fraction) + b * fraction,
                    (Some(&a), None) => a,
                    _ => 0.0,
                }
            })
            .collect()
    }
}

/// Linear-interpolation resampler for one continuous stream split into buffers.
///
/// Carries the read position and the last input sample from one call to the
/// next, so buffer boundaries neither lose samples nor restart the
/// interpolation phase. A change of source rate starts the stream over.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamResampler {
    target_rate: u32,
    source_rate: u32,
    /// Next output position, in source samples, counted from `last`.
    position: f64,
    last: Option<f32>,
}

impl StreamResampler {
    pub fn new(target_rate: u32) -> Self {
        Self {
            target_rate,
            source_rate: 0,
            position: 0.0,
            last: None,
        }
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    pub fn reset(&mut self) {
        self.position = 0.0;
        self.last = None;
    }

    /// Resample the next buffer of the stream from `source_rate`.
    pub fn process(&mut self, samples: &[f32], source_rate: u32) -> Vec<f32> {
        if source_rate != self.source_rate {
            self.source_rate = source_rate;
            self.reset();
        }
        if source_rate == self.target_rate || source_rate == 0 || samples.is_empty() {
            return samples.to_vec();
        }

        let step = source_rate as f64 / self.target_rate as f64;
        let previous = self.last.unwrap_or_default();
        let offset = usize::from(self.last.is_some());
        let len = samples.len() + offset;
        let at = |i: usize| match i.checked_sub(offset) {
            Some(j) => samples[j],
            None => previous,
        };

        let mut out = Vec::with_capacity((samples.len() as f64 / step) as usize + 1);
        let mut position = self.position;
        while (position as usize) + 1 < len {
            let index = position as usize;
            let fraction = (position - index as f64) as f32;
            out.push(at(index) * (1.0 - fraction) + at(index + 1) * fraction);
            position += step;
        }

        self.position = position - (len - 1) as f64;
        self.last = samples.last().copied();
        out
    }
}
