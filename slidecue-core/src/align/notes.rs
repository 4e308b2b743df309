//! Splitting slide notes into caption-sized segments.
//!
//! Segments are separated by blank lines. Single line breaks inside a
//! segment are layout only and are removed.

use crate::error::Result;
use crate::text::pronunciation::PronunciationLengthEstimator;

/// One caption's worth of narration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSegment {
    pub text: String,
    /// Spoken length of `text`.
    pub length: usize,
    /// Sum of the lengths of all preceding segments.
    pub offset: usize,
}

/// Split note text on blank lines. `\r` counts as a line break; empty
/// segments are skipped.
pub fn split_note(note: &str) -> Vec<String> {
    let normalized = note.replace('\r', "\n");
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut newlines = 0usize;

    for c in normalized.chars() {
        if c == '\n' {
            newlines += 1;
            continue;
        }
        if newlines >= 2 {
            flush(&mut current, &mut segments);
        }
        newlines = 0;
        current.push(c);
    }
    flush(&mut current, &mut segments);
    segments
}

fn flush(current: &mut String, segments: &mut Vec<String>) {
    let text = current.trim();
    if !text.is_empty() {
        segments.push(text.to_string());
    }
    current.clear();
}

/// Split and measure. Offsets accumulate in note order.
pub fn segment_note(
    note: &str,
    estimator: &PronunciationLengthEstimator<'_>,
) -> Result<Vec<NoteSegment>> {
    let mut offset = 0;
    split_note(note)
        .into_iter()
        .map(|text| {
            let length = estimator.estimate(&text)?;
            let segment = NoteSegment {
                text,
                length,
                offset,
            };
            offset += length;
            Ok(segment)
        })
        .collect()
}

/// Cumulative position of each segment in `[0, 1)`, followed by a closing
/// 1.0. Segments are spaced evenly when the total length is zero.
pub fn cumulative_fractions(segments: &[NoteSegment]) -> Vec<f64> {
    let total: usize = segments.iter().map(|s| s.length).sum();
    let n = segments.len();
    let mut fractions: Vec<f64> = if total == 0 {
        (0..n).map(|i| i as f64 / n as f64).collect()
    } else {
        segments
            .iter()
            .map(|s| s.offset as f64 / total as f64)
            .collect()
    };
    fractions.push(1.0);
    fractions
}
