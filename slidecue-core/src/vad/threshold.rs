//! Adaptive silence threshold from the smoothed amplitude envelope.
//!
//! ## Algorithm
//!
//! 1. Rectify each sample and feed it through a one-pole smoother:
//!    `smoothed += (|x| - smoothed) * 0.2`.
//! 2. Ignore the first 100 samples while the smoother settles.
//! 3. Track the running min/max of the smoothed envelope.
//! 4. `threshold(w) = trunc(min + (max - min) * clamp(w, 0, 1))`.
//!
//! Steps 1–3 are the only `O(N)` part and run once per file. Every weight
//! afterwards is an `O(1)` evaluation. The same pass counts the samples, so
//! the media duration comes for free.

use tracing::debug;

use crate::audio::SampleSource;
use crate::error::Result;

pub const ENVELOPE_SMOOTHING: f32 = 0.2;

/// Samples fed to the smoother before min/max tracking begins.
pub const WARMUP_SAMPLES: u64 = 100;

/// Incremental envelope statistics. Feed every sample of the file, then call
/// [`EnvelopeTracker::finish`].
#[derive(Debug, Clone)]
pub struct EnvelopeTracker {
    smoothed: f32,
    count: u64,
    min: f32,
    max: f32,
}

impl EnvelopeTracker {
    pub fn new() -> Self {
        Self {
            smoothed: 0.0,
            count: 0,
            min: f32::MAX,
            max: 0.0,
        }
    }

    pub fn push(&mut self, sample: i16) {
        let level = i32::from(sample).abs() as f32;
        self.count += 1;
        self.smoothed += (level - self.smoothed) * ENVELOPE_SMOOTHING;
        if self.count > WARMUP_SAMPLES {
            self.min = self.min.min(self.smoothed);
            self.max = self.max.max(self.smoothed);
        }
    }

    pub fn push_block(&mut self, samples: &[i16]) {
        for &s in samples {
            self.push(s);
        }
    }

    /// Samples fed so far, warm-up included.
    pub fn samples(&self) -> u64 {
        self.count
    }

    pub fn finish(self) -> SilenceThresholdEstimator {
        if self.count <= WARMUP_SAMPLES {
            // Nothing was tracked; every threshold collapses to zero.
            return SilenceThresholdEstimator::from_envelope(0.0, 0.0);
        }
        SilenceThresholdEstimator::from_envelope(self.min, self.max)
    }
}

impl Default for EnvelopeTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Cached envelope bounds; maps a weight to an amplitude threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceThresholdEstimator {
    min: f32,
    max: f32,
    samples: u64,
    sample_rate: u32,
}

impl SilenceThresholdEstimator {
    pub fn from_envelope(min: f32, max: f32) -> Self {
        Self {
            min,
            max,
            samples: 0,
            sample_rate: 0,
        }
    }

    /// One full pass over `source`.
    pub fn scan(source: &dyn SampleSource) -> Result<Self> {
        let mut tracker = EnvelopeTracker::new();
        let mut blocks = 0usize;
        let mut sample_rate = 0;
        for block in source.blocks()? {
            let block = block?;
            sample_rate = block.sample_rate;
            tracker.push_block(&block.samples);
            blocks += 1;
        }
        let samples = tracker.samples();
        let estimator = Self {
            samples,
            sample_rate,
            ..tracker.finish()
        };
        debug!(
            blocks,
            samples,
            min = estimator.min,
            max = estimator.max,
            "envelope scan complete"
        );
        Ok(estimator)
    }

    /// Length of the scanned audio. Zero for estimators not built by
    /// [`SilenceThresholdEstimator::scan`].
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples as f64 / f64::from(self.sample_rate)
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Silence threshold for `weight`. Larger weights classify more of the
    /// signal as silence, which splits speech more finely.
    pub fn threshold(&self, weight: f32) -> f32 {
        let weight = weight.clamp(0.0, 1.0);
        (self.min + (self.max - self.min) * weight).trunc()
    }
}
