//! # slidecue-core
//!
//! Caption alignment engine: turns slide narration notes into timed cues using
//! the rendered video's audio track as timing evidence.
//!
//! ## Architecture
//!
//! ```text
//! WAV file → WaveReader → MonoSampleStream ──► SilenceThresholdEstimator (pass 1)
//!                                   │
//!                                   └──► ParallelCandidateSplitter (pass 2, 11 detectors)
//!                                                    │
//!                                          SpeechIntervalSource::scan
//!                                                    │
//! slide notes → NoteSegments ──► SegmentTimestampAligner ──► Vec<AlignedCue>
//!                  ▲
//!        PronunciationLengthEstimator (Tokenizer)
//! ```
//!
//! The audio is read twice at splitter construction and never again; every
//! alignment query is answered from the cached interval sets.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod align;
pub mod audio;
pub mod cue;
pub mod engine;
pub mod error;
pub mod slides;
pub mod text;
pub mod vad;
pub mod wav;

// Convenience re-exports for downstream crates
pub use align::{AlignConfig, SegmentTimestampAligner};
pub use audio::{MediaDurationProvider, SampleSource, WaveFile};
pub use cue::AlignedCue;
pub use engine::{CaptionPipeline, PipelineReport};
pub use error::{Result, SlidecueError};
pub use slides::{JsonSlideFile, SlideInfo, SlideMetadataProvider};
pub use text::{
    mecab::MecabTokenizer, simple::SimpleTokenizer, wrap::LineWrapOptimizer, PartOfSpeech, Token,
    Tokenizer,
};
pub use vad::{
    segments::SegmentList, splitter::ParallelCandidateSplitter, SpeechInterval,
    SpeechIntervalSource,
};
