/// Display ceiling for the level estimate.
pub const MAX_LEVEL: f32 = 100.0;

const GAIN: f32 = 500.0;

/// Coarse input volume in `0.0..=100.0`.
///
/// Averages the magnitude of every `stride`th sample and applies a fixed
/// display gain. Not an RMS or VU reading; it only has to be cheap enough
/// for the capture callback.
pub fn sparse_level(samples: &[f32], stride: usize) -> f32 {
    let stride = stride.max(1);
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().step_by(stride).map(|s| s.abs()).sum();
    let slots = samples.len() as f32 / stride as f32;
    (sum / slots * GAIN).min(MAX_LEVEL)
}
