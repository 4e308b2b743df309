//! Typed sample block passed from the WAV stream to the threshold and detector stages.

/// A contiguous block of mono 16-bit samples at a known sample rate.
///
/// Allocated once per block read; blocks are bounded so a whole file never
/// has to be resident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBlock {
    /// Mono samples (stereo sources are downmixed before this point).
    pub samples: Vec<i16>,
    /// Sample rate in Hz (e.g. 16000, 44100, 48000).
    pub sample_rate: u32,
    /// Always 1 once a block leaves `MonoSampleStream`.
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl SampleBlock {
    pub fn new(samples: Vec<i16>, sample_rate: u32, bits_per_sample: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
            bits_per_sample,
        }
    }

    /// Returns the duration of this block in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the block contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_from_rate() {
        let block = SampleBlock::new(vec![0; 8_000], 16_000, 16);
        assert_eq!(block.channels, 1);
        assert!((block.duration_secs() - 0.5).abs() < 1e-12);
        assert!(!block.is_empty());
    }
}
