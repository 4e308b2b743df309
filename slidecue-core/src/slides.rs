//! Slide metadata: timing windows and narration notes.
//!
//! Slides come from a [`SlideMetadataProvider`]. The bundled provider reads
//! a JSON array exported from the presentation tool:
//!
//! ```json
//! [
//!   { "pageNumber": 1, "timeStamp": 0.0, "endTimeStamp": 12.5, "noteText": "..." },
//!   { "pageNumber": 2, "timeStamp": 12.5, "endTimeStamp": 12.5, "hidden": true }
//! ]
//! ```
//!
//! A presentation's nominal timeline drifts from the rendered video when
//! transitions or embedded media run long. [`check_timeline`] reports the
//! usual symptoms and [`rescale_timeline`] stretches the timeline onto the
//! media duration.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SlidecueError};

/// Per-slide drift above which the media and presentation durations are
/// reported as inconsistent.
pub const DURATION_TOLERANCE_PER_SLIDE_SECS: f64 = 0.1;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideInfo {
    /// 1-based.
    pub page_number: u32,
    /// Slide start on the presentation timeline, seconds.
    pub time_stamp: f64,
    pub end_time_stamp: f64,
    #[serde(default)]
    pub note_text: String,
    #[serde(default)]
    pub hidden: bool,
    /// Whether the slide advances automatically after its timing.
    #[serde(default = "default_true")]
    pub advance_on_time: bool,
}

impl SlideInfo {
    pub fn new(
        page_number: u32,
        time_stamp: f64,
        end_time_stamp: f64,
        note_text: impl Into<String>,
    ) -> Self {
        Self {
            page_number,
            time_stamp,
            end_time_stamp,
            note_text: note_text.into(),
            hidden: false,
            advance_on_time: true,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn duration(&self) -> f64 {
        self.end_time_stamp - self.time_stamp
    }
}

/// Source of slide metadata. Implementations may block (file or automation
/// I/O); the pipeline calls `slides` once.
pub trait SlideMetadataProvider {
    fn slides(&self) -> Result<Vec<SlideInfo>>;
}

impl SlideMetadataProvider for Vec<SlideInfo> {
    fn slides(&self) -> Result<Vec<SlideInfo>> {
        Ok(self.clone())
    }
}

/// Slides from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonSlideFile {
    path: PathBuf,
}

impl JsonSlideFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SlideMetadataProvider for JsonSlideFile {
    fn slides(&self) -> Result<Vec<SlideInfo>> {
        let raw = fs::read_to_string(&self.path)?;
        let mut slides: Vec<SlideInfo> = serde_json::from_str(&raw)?;
        validate(&slides)?;
        slides.sort_by_key(|s| s.page_number);
        debug!(path = %self.path.display(), slides = slides.len(), "slides loaded");
        Ok(slides)
    }
}

fn validate(slides: &[SlideInfo]) -> Result<()> {
    for slide in slides {
        if !slide.time_stamp.is_finite() || !slide.end_time_stamp.is_finite() {
            return Err(SlidecueError::Other(anyhow!(
                "slide {}: non-finite timestamp",
                slide.page_number
            )));
        }
        if slide.end_time_stamp < slide.time_stamp {
            return Err(SlidecueError::Other(anyhow!(
                "slide {}: ends at {} before it starts at {}",
                slide.page_number,
                slide.end_time_stamp,
                slide.time_stamp
            )));
        }
    }
    Ok(())
}

/// End of the last slide.
pub fn presentation_duration(slides: &[SlideInfo]) -> f64 {
    slides
        .iter()
        .map(|s| s.end_time_stamp)
        .fold(0.0, f64::max)
}

/// Scale every timestamp by `media_duration / presentation_duration`.
/// Returns the slides unchanged when either duration is not positive.
pub fn rescale_timeline(slides: &[SlideInfo], media_duration: f64) -> Vec<SlideInfo> {
    let presentation = presentation_duration(slides);
    if presentation <= 0.0 || media_duration <= 0.0 {
        return slides.to_vec();
    }
    let factor = media_duration / presentation;
    info!(presentation, media = media_duration, factor, "rescaling slide timeline");
    slides
        .iter()
        .map(|s| SlideInfo {
            time_stamp: s.time_stamp * factor,
            end_time_stamp: s.end_time_stamp * factor,
            ..s.clone()
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TimelineWarning {
    /// Media and presentation disagree by more than the per-slide tolerance.
    #[serde(rename_all = "camelCase")]
    DurationMismatch {
        presentation_secs: f64,
        media_secs: f64,
        slide_count: usize,
    },
    /// Several slides share one timing, which usually means the timing was
    /// bulk-assigned rather than rehearsed.
    #[serde(rename_all = "camelCase")]
    SharedAdvanceTime { advance_secs: f64, pages: Vec<u32> },
    /// Slides that wait for a click instead of advancing on time.
    #[serde(rename_all = "camelCase")]
    ManualAdvance { pages: Vec<u32> },
}

impl fmt::Display for TimelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimelineWarning::DurationMismatch {
                presentation_secs,
                media_secs,
                slide_count,
            } => write!(
                f,
                "presentation runs {presentation_secs:.3}s but the media runs {media_secs:.3}s \
                 over {slide_count} slides; a slide may keep playing media after its timing"
            ),
            TimelineWarning::SharedAdvanceTime { advance_secs, pages } => write!(
                f,
                "slides {} all advance after {advance_secs:.3}s; timings may have been set in bulk",
                join_pages(pages)
            ),
            TimelineWarning::ManualAdvance { pages } => {
                write!(f, "slides {} do not advance automatically", join_pages(pages))
            }
        }
    }
}

fn join_pages(pages: &[u32]) -> String {
    pages
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Consistency checks between the slide timeline and the rendered media.
pub fn check_timeline(slides: &[SlideInfo], media_duration: f64) -> Vec<TimelineWarning> {
    let mut warnings = Vec::new();
    if slides.is_empty() {
        return warnings;
    }

    let manual: Vec<u32> = slides
        .iter()
        .filter(|s| !s.advance_on_time && !s.hidden)
        .map(|s| s.page_number)
        .collect();
    if !manual.is_empty() {
        warnings.push(TimelineWarning::ManualAdvance { pages: manual });
    }

    // Keyed by whole milliseconds so equal timings compare equal.
    let mut by_advance: BTreeMap<i64, Vec<u32>> = BTreeMap::new();
    for slide in slides.iter().filter(|s| !s.hidden) {
        let key = (slide.duration() * 1000.0).round() as i64;
        by_advance.entry(key).or_default().push(slide.page_number);
    }
    for (key, pages) in by_advance {
        if pages.len() >= 2 {
            warnings.push(TimelineWarning::SharedAdvanceTime {
                advance_secs: key as f64 / 1000.0,
                pages,
            });
        }
    }

    let presentation = presentation_duration(slides);
    let drift = (media_duration - presentation).abs() / slides.len() as f64;
    if drift > DURATION_TOLERANCE_PER_SLIDE_SECS {
        warnings.push(TimelineWarning::DurationMismatch {
            presentation_secs: presentation,
            media_secs: media_duration,
            slide_count: slides.len(),
        });
    }

    warnings
}
