//! Speech interval detection.
//!
//! The `SpeechIntervalSource` trait is the seam the aligner consumes: swap
//! in the built-in [`splitter::ParallelCandidateSplitter`] (amplitude based,
//! self-tuning) or a precomputed [`segments::SegmentList`] produced by an
//! external segmenter without touching the alignment code.

pub mod detector;
pub mod segments;
pub mod splitter;
pub mod threshold;

use serde::{Deserialize, Serialize};

/// Half-open speech interval `[start, end)` in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechInterval {
    pub start: u64,
    pub end: u64,
    pub sample_rate: u32,
}

impl SpeechInterval {
    pub fn new(start: u64, end: u64, sample_rate: u32) -> Self {
        debug_assert!(start < end, "empty interval {start}..{end}");
        Self {
            start,
            end,
            sample_rate,
        }
    }

    pub fn len_samples(&self) -> u64 {
        self.end - self.start
    }

    pub fn start_secs(&self) -> f64 {
        self.start as f64 / self.sample_rate as f64
    }

    pub fn end_secs(&self) -> f64 {
        self.end as f64 / self.sample_rate as f64
    }

    pub fn to_span(&self) -> SpeechSpan {
        SpeechSpan::new(self.start_secs(), self.end_secs())
    }
}

/// A speech interval in seconds. This is what alignment works with, so that
/// sources without a sample clock (external segmenters) fit the same seam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeechSpan {
    pub start: f64,
    pub end: f64,
}

impl SpeechSpan {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Provider of detected speech spans for a time window.
///
/// Implementors do their expensive work up front; `scan` is expected to be
/// cheap and idempotent so it can be called once per slide.
pub trait SpeechIntervalSource: Send + Sync {
    /// Return the spans to align against for the window `[start, end]`
    /// (seconds), trying to supply at least `expected` of them inside it.
    ///
    /// The result may hold fewer than `expected` spans (including none).
    /// That is a normal outcome which callers handle with a fallback.
    fn scan(&self, expected: usize, start: f64, end: f64) -> Vec<SpeechSpan>;
}
