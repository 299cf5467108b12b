//! Conversions between normalized float samples and 16-bit little-endian PCM.

/// Float `[-1.0, 1.0]` to 16-bit PCM bytes.
///
/// Out-of-range input is clamped. Negative samples scale by 32768 and
/// positive by 32767 so both extremes are reachable.
pub fn float_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let s = sample.clamp(-1.0, 1.0);
        let value = if s < 0.0 {
            (s * 32768.0) as i16
        } else {
            (s * 32767.0) as i16
        };
        data.extend_from_slice(&value.to_le_bytes());
    }
    data
}

/// 16-bit PCM bytes to float samples in `[-1.0, 1.0)`.
///
/// A trailing odd byte is ignored.
pub fn pcm16_to_float(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

/// Average interleaved channels down to mono.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_at(pcm: &[u8], index: usize) -> i16 {
        i16::from_le_bytes([pcm[index * 2], pcm[index * 2 + 1]])
    }

    #[test]
    fn float_to_pcm16_extremes() {
        let pcm = float_to_pcm16(&[0.0, 1.0, -1.0, 0.5]);
        assert_eq!(pcm.len(), 8);
        assert_eq!(sample_at(&pcm, 0), 0);
        assert_eq!(sample_at(&pcm, 1), i16::MAX);
        assert_eq!(sample_at(&pcm, 2), i16::MIN);
        assert_eq!(sample_at(&pcm, 3), 16383);
    }

    #[test]
    fn float_to_pcm16_clamps() {
        let pcm = float_to_pcm16(&[2.0, -3.0]);
        assert_eq!(sample_at(&pcm, 0), i16::MAX);
        assert_eq!(sample_at(&pcm, 1), i16::MIN);
    }

    #[test]
    fn pcm16_to_float_scales_by_32768() {
        let mut bytes = Vec::new();
        for v in [0i16, i16::MIN, 16384] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.push(0xFF);

        let samples = pcm16_to_float(&bytes);
        assert_eq!(samples.len(), 3);
        assert_relative_eq!(samples[0], 0.0);
        assert_relative_eq!(samples[1], -1.0);
        assert_relative_eq!(samples[2], 0.5);
    }

    #[test]
    fn downmix_averages_frames() {
        let mono = downmix_to_mono(&[0.2, 0.4, -1.0, 1.0], 2);
        assert_eq!(mono.len(), 2);
        assert_relative_eq!(mono[0], 0.3, epsilon = 1e-6);
        assert_relative_eq!(mono[1], 0.0);
    }
}
