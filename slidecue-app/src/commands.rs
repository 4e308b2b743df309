//! Subcommand handlers.
//!
//! Each handler takes its parsed arguments plus the loaded settings and
//! returns `anyhow::Result`, so `main` only has to report errors.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use serde::Serialize;
use slidecue_core::{
    audio::{MediaDurationProvider, WaveFile},
    engine::{CaptionPipeline, PipelineReport},
    slides::{check_timeline, JsonSlideFile, SlideMetadataProvider, TimelineWarning},
    text::{mecab::MecabTokenizer, simple::SimpleTokenizer, Tokenizer},
    vad::{
        segments::SegmentList, splitter::ParallelCandidateSplitter, SpeechIntervalSource,
        SpeechSpan,
    },
};
use tracing::info;

use crate::settings::AppSettings;
use crate::subtitles::{self, SubtitleFormat};

/// Timing evidence for `generate`: a WAV file to analyse or a precomputed
/// segment list.
#[derive(Debug, Clone)]
pub enum Evidence {
    Audio(PathBuf),
    Segments(PathBuf),
}

pub fn build_tokenizer(settings: &AppSettings) -> Arc<dyn Tokenizer> {
    match settings.tokenizer.as_str() {
        "mecab" => Arc::new(
            MecabTokenizer::new(&settings.mecab_path).with_args(settings.mecab_args.clone()),
        ),
        _ => Arc::new(SimpleTokenizer::new()),
    }
}

/// Align the slides and write the subtitle file. Returns the path written.
pub fn generate(
    settings: &AppSettings,
    slides_path: &Path,
    evidence: &Evidence,
    output: Option<PathBuf>,
    report_path: Option<&Path>,
) -> anyhow::Result<PathBuf> {
    let format = SubtitleFormat::from_setting(&settings.output_format);
    let pipeline = CaptionPipeline::new(settings.pipeline_config(), build_tokenizer(settings))
        .context("invalid pipeline settings")?;
    let slides = JsonSlideFile::new(slides_path);

    let report = match evidence {
        Evidence::Audio(wav) => pipeline
            .run_with_audio(&slides, &WaveFile::new(wav))
            .with_context(|| format!("aligning against {}", wav.display()))?,
        Evidence::Segments(csv) => {
            let segments = SegmentList::load(csv)
                .with_context(|| format!("reading segments from {}", csv.display()))?;
            pipeline
                .run(&slides, &segments, None)
                .context("aligning against segment list")?
        }
    };

    let output = output.unwrap_or_else(|| slides_path.with_extension(format.extension()));
    fs::write(&output, subtitles::render(&report.cues, format))
        .with_context(|| format!("writing {}", output.display()))?;
    info!(path = %output.display(), cues = report.cues.len(), "subtitles written");

    if let Some(path) = report_path {
        write_report(path, &report)?;
    }
    Ok(output)
}

fn write_report(path: &Path, report: &PipelineReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).with_context(|| format!("writing report {}", path.display()))
}

/// Timeline consistency checks against the media duration.
pub fn check(slides_path: &Path, wav: &Path) -> anyhow::Result<Vec<TimelineWarning>> {
    let slides = JsonSlideFile::new(slides_path)
        .slides()
        .with_context(|| format!("reading slides from {}", slides_path.display()))?;
    let media = WaveFile::new(wav)
        .duration_secs()
        .with_context(|| format!("reading {}", wav.display()))?;
    Ok(check_timeline(&slides, media))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowScan {
    pub expected: usize,
    pub start: f64,
    pub end: f64,
    pub spans: Vec<SpeechSpan>,
}

/// Run speech detection alone. Without a window the full candidate table is
/// returned; with one, the spans `scan` would hand the aligner.
pub fn detect(
    settings: &AppSettings,
    wav: &Path,
    window: Option<(usize, f64, f64)>,
) -> anyhow::Result<serde_json::Value> {
    let audio = WaveFile::new(wav);
    let splitter = ParallelCandidateSplitter::new(&audio, &settings.pipeline_config().splitter)
        .with_context(|| format!("analysing {}", wav.display()))?;

    let value = match window {
        Some((expected, start, end)) => {
            if start.is_nan() || end.is_nan() || start >= end {
                bail!("window start {start} must be before end {end}");
            }
            serde_json::to_value(WindowScan {
                expected,
                start,
                end,
                spans: splitter.scan(expected, start, end),
            })?
        }
        None => serde_json::to_value(splitter.candidates())?,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_from_segment_list_writes_vtt() {
        let dir = tempfile::tempdir().unwrap();
        let slides = dir.path().join("deck.json");
        fs::write(
            &slides,
            r#"[{"pageNumber":1,"timeStamp":0,"endTimeStamp":6,"noteText":"Hello\n\nWorld"}]"#,
        )
        .unwrap();
        let csv = dir.path().join("segments.csv");
        fs::write(&csv, "male,0.5,2.0\nmusic,2.0,3.0\nfemale,3.0,5.5\n").unwrap();
        let report = dir.path().join("report.json");

        let settings = AppSettings {
            output_format: "vtt".into(),
            ..AppSettings::default()
        };
        let written = generate(
            &settings,
            &slides,
            &Evidence::Segments(csv),
            None,
            Some(&report),
        )
        .unwrap();

        assert_eq!(written, dir.path().join("deck.vtt"));
        let vtt = fs::read_to_string(&written).unwrap();
        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(vtt.contains("Hello"));
        assert!(vtt.contains("World"));
        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(report["cues"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn missing_slides_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("segments.csv");
        fs::write(&csv, "speech,0.5,2.0\n").unwrap();
        let result = generate(
            &AppSettings::default(),
            &dir.path().join("absent.json"),
            &Evidence::Segments(csv),
            Some(dir.path().join("out.srt")),
            None,
        );
        assert!(result.is_err());
    }
}
