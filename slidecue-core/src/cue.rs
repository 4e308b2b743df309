//! Aligned caption cues, the pipeline's output.

use serde::{Deserialize, Serialize};

/// One caption: a time range in seconds and its text.
///
/// Cues are immutable values; adjustments produce a new cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignedCue {
    pub start_sec: f64,
    pub end_sec: f64,
    pub text: String,
    /// Slide the cue belongs to.
    pub page_number: u32,
}

impl AlignedCue {
    pub fn new(start_sec: f64, end_sec: f64, text: impl Into<String>, page_number: u32) -> Self {
        Self {
            start_sec,
            end_sec,
            text: text.into(),
            page_number,
        }
    }

    pub fn with_start(&self, start_sec: f64) -> Self {
        Self {
            start_sec,
            ..self.clone()
        }
    }

    pub fn with_end(&self, end_sec: f64) -> Self {
        Self {
            end_sec,
            ..self.clone()
        }
    }

    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_sec - self.start_sec
    }
}

/// Stable sort by start time.
pub fn sort_by_start(cues: &mut [AlignedCue]) {
    cues.sort_by(|a, b| a.start_sec.total_cmp(&b.start_sec));
}
