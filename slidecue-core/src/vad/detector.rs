//! Amplitude-threshold speech interval detector.
//!
//! ## Algorithm
//!
//! 1. In `Silent`, the first sample with `|x| > threshold` opens an interval
//!    that starts 0.5 s earlier (clamped to 0) so word onsets are not clipped.
//! 2. In `Speech`, every sample with `|x| < threshold` extends a quiet run;
//!    any other sample resets it.
//! 3. When the quiet run reaches 1.0 s (the hangover), the interval closes at
//!    the index where the run began and the state returns to `Silent`.
//! 4. After the pass: intervals shorter than 1.0 s are dropped, and
//!    successive intervals separated by less than 1.0 s are merged.
//!
//! The transition itself is the pure [`step`] function; the detector only
//! owns the running sample index and the collected intervals.

use tracing::trace;

use super::SpeechInterval;
use crate::audio::SampleBlock;

/// Pre-roll added before the first loud sample.
pub const START_MARGIN_SECS: f64 = 0.5;
/// Quiet time needed before an interval closes.
pub const HANGOVER_SECS: f64 = 1.0;
/// Shorter intervals are discarded.
pub const MIN_INTERVAL_SECS: f64 = 1.0;
/// Intervals separated by less than this are merged.
pub const MERGE_GAP_SECS: f64 = 1.0;

/// Detector state. The sub-threshold run lives inside `Speech` because it is
/// meaningless in `Silent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Silent,
    Speech { start: u64, quiet_run: u64 },
}

/// Sample-rate dependent constants for [`step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorParams {
    pub threshold: f32,
    pub start_margin: u64,
    pub hangover: u64,
}

impl DetectorParams {
    pub fn new(threshold: f32, sample_rate: u32) -> Self {
        let rate = f64::from(sample_rate);
        Self {
            threshold,
            start_margin: (rate * START_MARGIN_SECS) as u64,
            hangover: ((rate * HANGOVER_SECS) as u64).max(1),
        }
    }
}

/// One transition: `(state, sample) -> (state, closed interval?)`.
///
/// `index` is the absolute sample index of `level`. A closed interval is
/// returned as `(start, end)` sample indices.
pub fn step(
    params: &DetectorParams,
    state: DetectorState,
    index: u64,
    level: f32,
) -> (DetectorState, Option<(u64, u64)>) {
    match state {
        DetectorState::Silent => {
            if level > params.threshold {
                let start = index.saturating_sub(params.start_margin);
                (DetectorState::Speech { start, quiet_run: 0 }, None)
            } else {
                (DetectorState::Silent, None)
            }
        }
        DetectorState::Speech { start, quiet_run } => {
            if level < params.threshold {
                let quiet_run = quiet_run + 1;
                if quiet_run >= params.hangover {
                    let run_began = index + 1 - quiet_run;
                    (DetectorState::Silent, Some((start, run_began)))
                } else {
                    (DetectorState::Speech { start, quiet_run }, None)
                }
            } else {
                (DetectorState::Speech { start, quiet_run: 0 }, None)
            }
        }
    }
}

/// Streaming detector for one threshold.
#[derive(Debug, Clone)]
pub struct SpeechIntervalDetector {
    threshold: f32,
    params: Option<DetectorParams>,
    sample_rate: u32,
    state: DetectorState,
    index: u64,
    raw: Vec<(u64, u64)>,
}

impl SpeechIntervalDetector {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            params: None,
            sample_rate: 0,
            state: DetectorState::Silent,
            index: 0,
            raw: Vec::new(),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Consume the next block. Blocks must arrive in stream order.
    pub fn push_block(&mut self, block: &SampleBlock) {
        if block.sample_rate != self.sample_rate || self.params.is_none() {
            self.sample_rate = block.sample_rate;
            self.params = Some(DetectorParams::new(self.threshold, block.sample_rate));
        }
        let Some(params) = self.params else {
            return;
        };

        for &sample in &block.samples {
            let level = i32::from(sample).abs() as f32;
            let (next, closed) = step(&params, self.state, self.index, level);
            if let Some((start, end)) = closed {
                trace!(start, end, threshold = self.threshold, "interval closed");
                self.raw.push((start, end));
            }
            self.state = next;
            self.index += 1;
        }
    }

    /// End the stream and return the filtered, merged intervals.
    ///
    /// An interval still open at end of stream closes where its pending quiet
    /// run began, or at the last sample when no run is pending.
    pub fn finish(mut self) -> Vec<SpeechInterval> {
        if let DetectorState::Speech { start, quiet_run } = self.state {
            let end = self.index - quiet_run;
            if end > start {
                self.raw.push((start, end));
            }
        }
        if self.sample_rate == 0 {
            return Vec::new();
        }
        post_process(&self.raw, self.sample_rate)
    }
}

/// Drop short intervals, then merge neighbours closer than [`MERGE_GAP_SECS`].
///
/// `raw` must be ordered by start.
pub fn post_process(raw: &[(u64, u64)], sample_rate: u32) -> Vec<SpeechInterval> {
    let rate = f64::from(sample_rate);
    let min_len = (rate * MIN_INTERVAL_SECS) as u64;
    let merge_gap = (rate * MERGE_GAP_SECS) as u64;

    let mut merged: Vec<SpeechInterval> = Vec::new();
    for &(start, end) in raw.iter().filter(|(s, e)| e > s && e - s >= min_len) {
        match merged.last_mut() {
            Some(last) if start.saturating_sub(last.end) < merge_gap => {
                last.end = last.end.max(end);
            }
            _ => merged.push(SpeechInterval::new(start, end, sample_rate)),
        }
    }
    merged
}
