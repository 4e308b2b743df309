//! Multi-threshold speech splitter.
//!
//! ## Design
//!
//! A single silence threshold rarely suits a whole recording: too low and
//! adjacent sentences fuse into one interval, too high and quiet speech
//! vanishes. The splitter therefore runs a ladder of candidate thresholds
//! (weights `0.05 * i + 0.001`, `i = 10..=0`) and lets each query pick the
//! first candidate that yields enough intervals inside its window.
//!
//! ```text
//!                       ┌─► worker 0 (weight 0.501) ─┐
//! blocks ── dispatch ───┼─► worker 1 (weight 0.451) ─┼─► cached candidates
//!   (one pass)          └─► ...        worker 10    ─┘
//! ```
//!
//! Every block is sent to every worker before the next block is read, and
//! each worker consumes its bounded queue in order, so the hangover counters
//! see samples exactly as they appear in the file.
//!
//! All audio work happens in [`ParallelCandidateSplitter::new`]. Queries only
//! count cached intervals, and the selected candidate per query is memoized.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use super::detector::SpeechIntervalDetector;
use super::threshold::SilenceThresholdEstimator;
use super::{SpeechInterval, SpeechIntervalSource, SpeechSpan};
use crate::audio::{SampleBlock, SampleSource};
use crate::error::Result;

/// Configuration for [`ParallelCandidateSplitter`].
#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Weight increment between candidates. Default: 0.05.
    pub speed: f32,
    /// Weight of the most permissive candidate. Default: 0.001.
    pub bias: f32,
    /// Candidates are `speed * i + bias` for `i = steps..=0`. Default: 10.
    pub steps: usize,
    /// Fan blocks out to one worker thread per candidate. Default: true.
    pub parallel: bool,
    /// Bounded queue depth per worker, in blocks. Default: 4.
    pub queue_depth: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            speed: 0.05,
            bias: 0.001,
            steps: 10,
            parallel: true,
            queue_depth: 4,
        }
    }
}

impl SplitterConfig {
    /// Candidate weights in evaluation order.
    pub fn weights(&self) -> Vec<f32> {
        (0..=self.steps)
            .rev()
            .map(|i| self.speed * i as f32 + self.bias)
            .collect()
    }
}

/// One threshold candidate and its cached detection result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSegmentation {
    pub weight: f32,
    pub threshold: f32,
    pub intervals: Vec<SpeechInterval>,
}

impl CandidateSegmentation {
    /// Number of intervals lying entirely within `[start, end]` seconds.
    pub fn count_within(&self, start: f64, end: f64) -> usize {
        self.intervals
            .iter()
            .filter(|iv| iv.start_secs() >= start && iv.end_secs() <= end)
            .count()
    }

    pub fn spans(&self) -> Vec<SpeechSpan> {
        self.intervals.iter().map(SpeechInterval::to_span).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ScanKey {
    expected: usize,
    start: u64,
    end: u64,
}

impl ScanKey {
    fn new(expected: usize, start: f64, end: f64) -> Self {
        Self {
            expected,
            start: start.to_bits(),
            end: end.to_bits(),
        }
    }
}

/// Self-tuning speech splitter over a whole audio file.
pub struct ParallelCandidateSplitter {
    estimator: SilenceThresholdEstimator,
    candidates: Vec<CandidateSegmentation>,
    /// Query → selected candidate index.
    selections: Mutex<HashMap<ScanKey, usize>>,
}

impl ParallelCandidateSplitter {
    /// Scan `source` twice (envelope, then all candidates in lockstep) and
    /// cache every candidate's intervals.
    ///
    /// # Errors
    /// Propagates container and I/O errors from `source`.
    pub fn new(source: &dyn SampleSource, config: &SplitterConfig) -> Result<Self> {
        let estimator = SilenceThresholdEstimator::scan(source)?;
        let weights = config.weights();

        let detectors: Vec<SpeechIntervalDetector> = weights
            .iter()
            .map(|&w| SpeechIntervalDetector::new(estimator.threshold(w)))
            .collect();

        let detectors = if config.parallel && detectors.len() > 1 {
            run_parallel(source, detectors, config.queue_depth.max(1))?
        } else {
            run_sequential(source, detectors)?
        };

        let candidates: Vec<CandidateSegmentation> = weights
            .into_iter()
            .zip(detectors)
            .map(|(weight, detector)| {
                let threshold = detector.threshold();
                let intervals = detector.finish();
                debug!(weight, threshold, count = intervals.len(), "candidate ready");
                CandidateSegmentation {
                    weight,
                    threshold,
                    intervals,
                }
            })
            .collect();

        info!(
            candidates = candidates.len(),
            envelope_min = estimator.min(),
            envelope_max = estimator.max(),
            "speech candidates cached"
        );

        Ok(Self::from_parts(estimator, candidates))
    }

    /// Build a splitter from precomputed candidates, in evaluation order.
    pub fn from_candidates(candidates: Vec<CandidateSegmentation>) -> Self {
        Self::from_parts(SilenceThresholdEstimator::from_envelope(0.0, 0.0), candidates)
    }

    fn from_parts(
        estimator: SilenceThresholdEstimator,
        candidates: Vec<CandidateSegmentation>,
    ) -> Self {
        Self {
            estimator,
            candidates,
            selections: Mutex::new(HashMap::new()),
        }
    }

    pub fn estimator(&self) -> &SilenceThresholdEstimator {
        &self.estimator
    }

    pub fn candidates(&self) -> &[CandidateSegmentation] {
        &self.candidates
    }

    /// The candidate a query resolves to: the first with at least `expected`
    /// intervals inside `[start, end]`, else the last one evaluated.
    pub fn select(&self, expected: usize, start: f64, end: f64) -> Option<&CandidateSegmentation> {
        let key = ScanKey::new(expected, start, end);
        if let Some(&idx) = self.selections.lock().get(&key) {
            return self.candidates.get(idx);
        }

        let idx = self
            .candidates
            .iter()
            .position(|c| c.count_within(start, end) >= expected)
            .or_else(|| self.candidates.len().checked_sub(1))?;

        let chosen = &self.candidates[idx];
        debug!(
            expected,
            start,
            end,
            weight = chosen.weight,
            within = chosen.count_within(start, end),
            "candidate selected"
        );
        self.selections.lock().insert(key, idx);
        Some(chosen)
    }
}

impl SpeechIntervalSource for ParallelCandidateSplitter {
    fn scan(&self, expected: usize, start: f64, end: f64) -> Vec<SpeechSpan> {
        self.select(expected, start, end)
            .map(CandidateSegmentation::spans)
            .unwrap_or_default()
    }
}

fn run_sequential(
    source: &dyn SampleSource,
    mut detectors: Vec<SpeechIntervalDetector>,
) -> Result<Vec<SpeechIntervalDetector>> {
    for block in source.blocks()? {
        let block = block?;
        for detector in &mut detectors {
            detector.push_block(&block);
        }
    }
    Ok(detectors)
}

fn run_parallel(
    source: &dyn SampleSource,
    detectors: Vec<SpeechIntervalDetector>,
    queue_depth: usize,
) -> Result<Vec<SpeechIntervalDetector>> {
    std::thread::scope(|scope| -> Result<Vec<SpeechIntervalDetector>> {
        let mut senders = Vec::with_capacity(detectors.len());
        let mut workers = Vec::with_capacity(detectors.len());

        for mut detector in detectors {
            let (tx, rx) = crossbeam_channel::bounded::<Arc<SampleBlock>>(queue_depth);
            senders.push(tx);
            workers.push(scope.spawn(move || {
                for block in rx.iter() {
                    detector.push_block(&block);
                }
                detector
            }));
        }

        let dispatched = (|| -> Result<usize> {
            let mut blocks = 0usize;
            for block in source.blocks()? {
                let block = Arc::new(block?);
                for tx in &senders {
                    tx.send(Arc::clone(&block))
                        .map_err(|_| anyhow!("candidate worker exited early"))?;
                }
                blocks += 1;
            }
            Ok(blocks)
        })();

        // Closing the queues lets workers drain and return.
        drop(senders);

        let mut finished = Vec::with_capacity(workers.len());
        for worker in workers {
            let detector = worker
                .join()
                .map_err(|_| anyhow!("candidate worker panicked"))?;
            finished.push(detector);
        }

        let blocks = dispatched?;
        debug!(blocks, workers = finished.len(), "parallel detection pass complete");
        Ok(finished)
    })
}
