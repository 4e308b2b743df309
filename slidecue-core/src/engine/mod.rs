//! `CaptionPipeline` - end-to-end caption generation for one presentation.
//!
//! ## Flow
//!
//! ```text
//! CaptionPipeline::new(config, tokenizer)
//!     └─► run_with_audio(slides, wav)
//!             ├─ ParallelCandidateSplitter::new (envelope + detection passes)
//!             ├─ media duration         (sample count from the envelope pass)
//!             └─► run(slides, splitter, Some(duration))
//!                     ├─ check_timeline / rescale_timeline
//!                     ├─ SegmentTimestampAligner per slide
//!                     └─ optional line wrapping of every cue
//! ```
//!
//! `run` accepts any [`SpeechIntervalSource`], so a precomputed
//! [`SegmentList`](crate::vad::segments::SegmentList) skips the audio passes
//! entirely.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    align::{AlignConfig, AlignStrategy, SegmentTimestampAligner},
    audio::SampleSource,
    cue::{sort_by_start, AlignedCue},
    error::Result,
    slides::{check_timeline, rescale_timeline, SlideMetadataProvider, TimelineWarning},
    text::{
        wrap::{LineWrapOptimizer, WrapConfig},
        Tokenizer,
    },
    vad::{
        splitter::{ParallelCandidateSplitter, SplitterConfig},
        SpeechIntervalSource,
    },
};

/// Configuration for `CaptionPipeline`.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub splitter: SplitterConfig,
    pub align: AlignConfig,
    /// Wrap cue text into caption lines. `None` leaves text on one line.
    pub wrap: Option<WrapConfig>,
    /// Stretch the slide timeline onto the media duration before aligning.
    /// Default: false.
    pub rescale_timeline: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            splitter: SplitterConfig::default(),
            align: AlignConfig::default(),
            wrap: Some(WrapConfig::default()),
            rescale_timeline: false,
        }
    }
}

/// Per-slide outcome, for logs and the `--report` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideSummary {
    pub page_number: u32,
    pub strategy: Option<AlignStrategy>,
    pub spans_in_window: usize,
    pub cues: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub cues: Vec<AlignedCue>,
    pub slides: Vec<SlideSummary>,
    pub warnings: Vec<TimelineWarning>,
    pub media_duration_secs: Option<f64>,
}

pub struct CaptionPipeline {
    config: PipelineConfig,
    tokenizer: Arc<dyn Tokenizer>,
    wrapper: Option<LineWrapOptimizer>,
}

impl CaptionPipeline {
    /// # Errors
    /// `SlidecueError::InvalidWrapBounds` when the wrap configuration is
    /// inconsistent.
    pub fn new(config: PipelineConfig, tokenizer: Arc<dyn Tokenizer>) -> Result<Self> {
        let wrapper = config.wrap.as_ref().map(LineWrapOptimizer::new).transpose()?;
        Ok(Self {
            config,
            tokenizer,
            wrapper,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Detect speech in `audio` and align the slides against it.
    pub fn run_with_audio(
        &self,
        slides: &dyn SlideMetadataProvider,
        audio: &dyn SampleSource,
    ) -> Result<PipelineReport> {
        let started = Instant::now();
        let splitter = ParallelCandidateSplitter::new(audio, &self.config.splitter)?;
        let media_duration = splitter.estimator().duration_secs();
        info!(
            media_secs = media_duration,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "audio analysed"
        );
        self.run(slides, &splitter, Some(media_duration))
    }

    /// Align the slides against an existing speech source.
    ///
    /// With `media_duration`, the timeline is checked against it (and
    /// rescaled when configured).
    pub fn run(
        &self,
        slides: &dyn SlideMetadataProvider,
        evidence: &dyn SpeechIntervalSource,
        media_duration: Option<f64>,
    ) -> Result<PipelineReport> {
        let started = Instant::now();
        let mut slides = slides.slides()?;

        let mut warnings = Vec::new();
        if let Some(media) = media_duration {
            warnings = check_timeline(&slides, media);
            for warning in &warnings {
                warn!(%warning, "timeline check");
            }
            if self.config.rescale_timeline {
                slides = rescale_timeline(&slides, media);
            }
        }

        let aligner = SegmentTimestampAligner::new(
            evidence,
            self.tokenizer.as_ref(),
            self.config.align.clone(),
        );

        let mut cues = Vec::new();
        let mut summaries = Vec::with_capacity(slides.len());
        for slide in &slides {
            let alignment = aligner.align_slide(slide)?;
            summaries.push(SlideSummary {
                page_number: alignment.page_number,
                strategy: alignment.strategy,
                spans_in_window: alignment.spans_in_window,
                cues: alignment.cues.len(),
            });
            cues.extend(alignment.cues);
        }
        sort_by_start(&mut cues);

        if let Some(wrapper) = &self.wrapper {
            cues = cues
                .iter()
                .map(|cue| Ok(cue.with_text(wrapper.wrap_text(&cue.text, self.tokenizer.as_ref())?)))
                .collect::<Result<Vec<_>>>()?;
            debug!(cues = cues.len(), max = wrapper.max_length(), "cue text wrapped");
        }

        info!(
            slides = slides.len(),
            cues = cues.len(),
            warnings = warnings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "captions aligned"
        );

        Ok(PipelineReport {
            cues,
            slides: summaries,
            warnings,
            media_duration_secs: media_duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SlidecueError;
    use crate::slides::SlideInfo;
    use crate::text::simple::SimpleTokenizer;
    use crate::vad::{segments::SegmentList, SpeechSpan};

    fn pipeline(config: PipelineConfig) -> CaptionPipeline {
        CaptionPipeline::new(config, Arc::new(SimpleTokenizer)).unwrap()
    }

    #[test]
    fn rejects_bad_wrap_bounds() {
        let config = PipelineConfig {
            wrap: Some(WrapConfig {
                min_length: 10,
                max_length: 5,
                ..WrapConfig::default()
            }),
            ..PipelineConfig::default()
        };
        let err = CaptionPipeline::new(config, Arc::new(SimpleTokenizer)).err();
        assert!(matches!(err, Some(SlidecueError::InvalidWrapBounds { min: 10, max: 5 })));
    }

    #[test]
    fn aligns_slides_in_time_order() {
        let slides = vec![
            SlideInfo::new(1, 0.0, 8.0, "One\n\nTwo"),
            SlideInfo::new(2, 8.0, 8.0, "").hidden(),
            SlideInfo::new(3, 8.0, 12.0, "Three"),
        ];
        let evidence = SegmentList::default();
        let report = pipeline(PipelineConfig::default())
            .run(&slides, &evidence, None)
            .unwrap();

        let texts: Vec<_> = report.cues.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["One", "Two", "Three"]);
        assert_eq!(report.slides.len(), 3);
        assert_eq!(report.slides[1].strategy, None);
        assert_eq!(report.slides[2].strategy, Some(AlignStrategy::Proportional));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn zero_length_slide_aborts_the_run() {
        let slides = vec![SlideInfo::new(4, 3.0, 3.0, "text")];
        let err = pipeline(PipelineConfig::default())
            .run(&slides, &SegmentList::default(), None)
            .unwrap_err();
        assert!(matches!(err, SlidecueError::InconsistentRecording { page: 4 }));
    }

    #[test]
    fn media_duration_drives_checks_and_rescale() {
        let slides = vec![
            SlideInfo::new(1, 0.0, 10.0, "a"),
            SlideInfo::new(2, 10.0, 20.0, "b"),
        ];
        let evidence = SegmentList::from_spans(vec![SpeechSpan::new(0.5, 2.0)]);
        let config = PipelineConfig {
            rescale_timeline: true,
            ..PipelineConfig::default()
        };
        let report = pipeline(config).run(&slides, &evidence, Some(30.0)).unwrap();

        assert_eq!(report.media_duration_secs, Some(30.0));
        // Equal slide timings and 5 s of drift per slide.
        assert_eq!(report.warnings.len(), 2);
        let last = report.cues.last().unwrap();
        assert_eq!(last.end_sec, 30.0);
    }

    #[test]
    fn cue_text_is_wrapped() {
        let note = "吾輩は猫である。名前はまだ無い。どこで生れたかとんと見当がつかぬ。";
        let slides = vec![SlideInfo::new(1, 0.0, 10.0, note)];
        let config = PipelineConfig {
            wrap: Some(WrapConfig {
                min_length: 10,
                max_length: 20,
                ..WrapConfig::default()
            }),
            ..PipelineConfig::default()
        };
        let report = pipeline(config)
            .run(&slides, &SegmentList::default(), None)
            .unwrap();
        let text = &report.cues[0].text;
        assert!(text.contains('\n'));
        assert!(text.lines().all(|l| l.chars().count() <= 20), "{text:?}");
    }
}
