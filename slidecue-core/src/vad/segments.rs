//! Precomputed speech segmentation from an external segmenter.
//!
//! The expected input is one segment per line, `label,start,end`, with times
//! in seconds, e.g. the CSV dump of an inaSpeechSegmenter run:
//!
//! ```text
//! noEnergy,0.0,1.32
//! female,1.32,4.8
//! music,4.8,6.1
//! male,6.1,9.02
//! ```
//!
//! Only speech labels (`male`, `female`, `speech`) are kept. Any other line,
//! including a header, is ignored.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::{SpeechIntervalSource, SpeechSpan};
use crate::error::{Result, SlidecueError};

const SPEECH_LABELS: [&str; 3] = ["male", "female", "speech"];

/// Fixed speech spans, served as-is for every window.
#[derive(Debug, Clone, Default)]
pub struct SegmentList {
    spans: Vec<SpeechSpan>,
}

impl SegmentList {
    /// Spans are sorted by start; those with `end <= start` are dropped.
    pub fn from_spans(mut spans: Vec<SpeechSpan>) -> Self {
        spans.retain(|s| s.end > s.start);
        spans.sort_by(|a, b| a.start.total_cmp(&b.start));
        spans.dedup_by(|b, a| a.start == b.start);
        Self { spans }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut spans = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let Some(label) = fields.first() else {
                continue;
            };
            if !SPEECH_LABELS.iter().any(|l| l.eq_ignore_ascii_case(label)) {
                continue;
            }
            if fields.len() < 3 {
                return Err(SlidecueError::SegmentList(format!(
                    "line {}: expected label,start,end",
                    line_no + 1
                )));
            }
            let start = parse_secs(fields[1], line_no)?;
            let end = parse_secs(fields[2], line_no)?;
            spans.push(SpeechSpan::new(start, end));
        }
        debug!(segments = spans.len(), "segment list parsed");
        Ok(Self::from_spans(spans))
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn spans(&self) -> &[SpeechSpan] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

fn parse_secs(raw: &str, line_no: usize) -> Result<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            SlidecueError::SegmentList(format!("line {}: invalid time {raw:?}", line_no + 1))
        })
}

impl SpeechIntervalSource for SegmentList {
    /// Spans whose start lies in `[start, end]`. The segmentation is fixed,
    /// so `expected` cannot be honoured and is ignored.
    fn scan(&self, _expected: usize, start: f64, end: f64) -> Vec<SpeechSpan> {
        self.spans
            .iter()
            .filter(|s| s.start >= start && s.start <= end)
            .copied()
            .collect()
    }
}
