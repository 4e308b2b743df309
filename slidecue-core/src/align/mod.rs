//! Slide-level alignment of note segments to speech.
//!
//! ## Strategy ladder
//!
//! For a slide window `[ts, te]` with N note segments, spans are requested
//! from the [`SpeechIntervalSource`] (aiming for `ceil(N * 1.2)`) and those
//! starting inside the window are kept. Then:
//!
//! | spans     | strategy                                                  |
//! |-----------|-----------------------------------------------------------|
//! | none      | [`AlignStrategy::Proportional`]: window split by spoken length |
//! | `<= N`    | [`AlignStrategy::Uniform`]: equal slices of the speech span |
//! | `> N`     | [`AlignStrategy::Matched`]: nearest span per segment, repaired |
//!
//! Matched cues are forced into strictly increasing start order by a forward
//! then a backward repair pass. Each cue then ends where the next starts and
//! the last one is stretched to `te` if it ends earlier.

pub mod notes;

use serde::Serialize;
use tracing::{debug, warn};

use crate::cue::{sort_by_start, AlignedCue};
use crate::error::{Result, SlidecueError};
use crate::slides::SlideInfo;
use crate::text::pronunciation::PronunciationLengthEstimator;
use crate::text::Tokenizer;
use crate::vad::{SpeechIntervalSource, SpeechSpan};

use self::notes::{cumulative_fractions, segment_note, NoteSegment};

/// Spans requested per note segment.
pub const DEFAULT_EXPECTED_MARGIN: f64 = 1.2;

#[derive(Debug, Clone, PartialEq)]
pub struct AlignConfig {
    pub expected_margin: f64,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            expected_margin: DEFAULT_EXPECTED_MARGIN,
        }
    }
}

impl AlignConfig {
    pub fn expected_spans(&self, segments: usize) -> usize {
        (segments as f64 * self.expected_margin).ceil() as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignStrategy {
    Proportional,
    Uniform,
    Matched,
}

/// Outcome for one slide.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideAlignment {
    pub page_number: u32,
    pub cues: Vec<AlignedCue>,
    /// `None` when the slide produced no cues (hidden or without notes).
    pub strategy: Option<AlignStrategy>,
    pub spans_in_window: usize,
}

pub struct SegmentTimestampAligner<'a> {
    source: &'a dyn SpeechIntervalSource,
    estimator: PronunciationLengthEstimator<'a>,
    config: AlignConfig,
}

impl<'a> SegmentTimestampAligner<'a> {
    pub fn new(
        source: &'a dyn SpeechIntervalSource,
        tokenizer: &'a dyn Tokenizer,
        config: AlignConfig,
    ) -> Self {
        Self {
            source,
            estimator: PronunciationLengthEstimator::new(tokenizer),
            config,
        }
    }

    pub fn align_slide(&self, slide: &SlideInfo) -> Result<SlideAlignment> {
        let empty = |spans_in_window| SlideAlignment {
            page_number: slide.page_number,
            cues: Vec::new(),
            strategy: None,
            spans_in_window,
        };

        if slide.hidden {
            return Ok(empty(0));
        }
        if slide.time_stamp == slide.end_time_stamp {
            return Err(SlidecueError::InconsistentRecording {
                page: slide.page_number,
            });
        }

        let segments = segment_note(&slide.note_text, &self.estimator)?;
        if segments.is_empty() {
            return Ok(empty(0));
        }

        let (ts, te) = (slide.time_stamp, slide.end_time_stamp);
        let expected = self.config.expected_spans(segments.len());
        let spans: Vec<SpeechSpan> = self
            .source
            .scan(expected, ts, te)
            .into_iter()
            .filter(|s| s.start >= ts && s.start <= te)
            .collect();

        let fractions = cumulative_fractions(&segments);
        let (strategy, ranges) = if spans.is_empty() {
            (AlignStrategy::Proportional, proportional(ts, te, &fractions))
        } else if spans.len() <= segments.len() {
            let first = spans[0].start;
            let last = spans[spans.len() - 1].end;
            (AlignStrategy::Uniform, stitch(&uniform(first, last, segments.len()), te))
        } else {
            let mut picked = nearest_spans(&spans, &fractions[..segments.len()]);
            repair_forward(&mut picked, &spans);
            repair_backward(&mut picked, &spans);
            let starts: Vec<f64> = picked.iter().map(|s| s.start).collect();
            let last_end = picked.last().map_or(te, |s| s.end);
            (AlignStrategy::Matched, stitch_starts(&starts, last_end, te))
        };

        if !spans.is_empty() && spans.len() < expected {
            debug!(
                page = slide.page_number,
                spans = spans.len(),
                expected,
                "fewer speech spans than requested"
            );
        }

        let cues = cues_for(&segments, &ranges, slide.page_number);
        debug!(
            page = slide.page_number,
            segments = segments.len(),
            spans = spans.len(),
            ?strategy,
            "slide aligned"
        );
        Ok(SlideAlignment {
            page_number: slide.page_number,
            cues,
            strategy: Some(strategy),
            spans_in_window: spans.len(),
        })
    }

    /// Align every slide; cues come back sorted by start.
    pub fn align_all(&self, slides: &[SlideInfo]) -> Result<Vec<AlignedCue>> {
        let mut cues = Vec::new();
        for slide in slides {
            cues.extend(self.align_slide(slide)?.cues);
        }
        sort_by_start(&mut cues);
        Ok(cues)
    }
}

fn cues_for(segments: &[NoteSegment], ranges: &[(f64, f64)], page: u32) -> Vec<AlignedCue> {
    segments
        .iter()
        .zip(ranges)
        .map(|(segment, &(start, end))| AlignedCue::new(start, end, segment.text.clone(), page))
        .collect()
}

/// Window split at the cumulative fractions (last entry 1.0).
pub fn proportional(ts: f64, te: f64, fractions: &[f64]) -> Vec<(f64, f64)> {
    let at = |f: f64| ts + (te - ts) * f;
    fractions
        .windows(2)
        .map(|pair| (at(pair[0]), at(pair[1])))
        .collect()
}

/// `n` equal slices of `[start, end]`.
pub fn uniform(start: f64, end: f64, n: usize) -> Vec<(f64, f64)> {
    let at = |i: usize| start + (end - start) * i as f64 / n as f64;
    (0..n).map(|i| (at(i), at(i + 1))).collect()
}

/// For each fraction, the span whose normalized start within the union of
/// `spans` is nearest. The first of equally near spans wins.
pub fn nearest_spans(spans: &[SpeechSpan], fractions: &[f64]) -> Vec<SpeechSpan> {
    let Some(first) = spans.first() else {
        return Vec::new();
    };
    let origin = first.start;
    let extent = spans.iter().map(|s| s.end).fold(origin, f64::max) - origin;
    let position = |s: &SpeechSpan| {
        if extent > 0.0 {
            (s.start - origin) / extent
        } else {
            0.0
        }
    };

    fractions
        .iter()
        .map(|&f| {
            let mut best = *first;
            let mut best_diff = f64::INFINITY;
            for span in spans {
                let diff = (position(span) - f).abs();
                if diff < best_diff {
                    best_diff = diff;
                    best = *span;
                }
            }
            best
        })
        .collect()
}

/// A cue that does not start after its predecessor moves to the next span
/// starting strictly after the predecessor (the last span if none does).
pub fn repair_forward(picked: &mut [SpeechSpan], spans: &[SpeechSpan]) {
    let Some(&last) = spans.last() else {
        return;
    };
    for i in 1..picked.len() {
        if picked[i].start <= picked[i - 1].start {
            let prev = picked[i - 1].start;
            picked[i] = spans.iter().find(|s| s.start > prev).copied().unwrap_or(last);
        }
    }
}

/// Walking back from the end, a cue that does not start before its
/// successor moves to the nearest span starting strictly before the
/// successor (the first span if none does).
pub fn repair_backward(picked: &mut [SpeechSpan], spans: &[SpeechSpan]) {
    let Some(&first) = spans.first() else {
        return;
    };
    for i in (1..picked.len()).rev() {
        if picked[i].start <= picked[i - 1].start {
            let next = picked[i].start;
            picked[i - 1] = spans
                .iter()
                .rev()
                .find(|s| s.start < next)
                .copied()
                .unwrap_or(first);
        }
    }
}

/// Close each range at the next range's start and stretch the last range
/// to `window_end` if it ends earlier.
pub fn stitch(ranges: &[(f64, f64)], window_end: f64) -> Vec<(f64, f64)> {
    let starts: Vec<f64> = ranges.iter().map(|r| r.0).collect();
    let last_end = ranges.last().map_or(window_end, |r| r.1);
    stitch_starts(&starts, last_end, window_end)
}

fn stitch_starts(starts: &[f64], last_end: f64, window_end: f64) -> Vec<(f64, f64)> {
    let mut ranges: Vec<(f64, f64)> = starts
        .windows(2)
        .map(|pair| (pair[0], pair[1]))
        .collect();
    if let Some(&start) = starts.last() {
        ranges.push((start, last_end.max(window_end)));
    }
    if ranges.windows(2).any(|pair| pair[1].0 <= pair[0].0) {
        warn!("cue starts are not strictly increasing after repair");
    }
    ranges
}
