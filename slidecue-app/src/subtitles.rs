//! Subtitle serialization (SRT, WebVTT).

use std::fmt::Write as _;

use slidecue_core::AlignedCue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

impl SubtitleFormat {
    /// Parses the normalized settings value.
    pub fn from_setting(raw: &str) -> Self {
        if raw == "vtt" {
            SubtitleFormat::Vtt
        } else {
            SubtitleFormat::Srt
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Vtt => "vtt",
        }
    }

    fn millis_separator(self) -> char {
        match self {
            SubtitleFormat::Srt => ',',
            SubtitleFormat::Vtt => '.',
        }
    }
}

/// `HH:MM:SS,mmm` (SRT) or `HH:MM:SS.mmm` (VTT), rounded to the millisecond.
pub fn format_timestamp(secs: f64, format: SubtitleFormat) -> String {
    let total_ms = if secs.is_finite() && secs > 0.0 {
        (secs * 1000.0).round() as u64
    } else {
        0
    };
    let ms = total_ms % 1000;
    let s = (total_ms / 1000) % 60;
    let m = (total_ms / 60_000) % 60;
    let h = total_ms / 3_600_000;
    format!("{h:02}:{m:02}:{s:02}{}{ms:03}", format.millis_separator())
}

pub fn render(cues: &[AlignedCue], format: SubtitleFormat) -> String {
    let mut out = String::new();
    if format == SubtitleFormat::Vtt {
        out.push_str("WEBVTT\n\n");
    }
    for (i, cue) in cues.iter().enumerate() {
        if format == SubtitleFormat::Srt {
            let _ = writeln!(out, "{}", i + 1);
        }
        let _ = writeln!(
            out,
            "{} --> {}",
            format_timestamp(cue.start_sec, format),
            format_timestamp(cue.end_sec, format)
        );
        let _ = writeln!(out, "{}\n", cue.text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps() {
        assert_eq!(format_timestamp(0.0, SubtitleFormat::Srt), "00:00:00,000");
        assert_eq!(format_timestamp(3_723.456, SubtitleFormat::Srt), "01:02:03,456");
        assert_eq!(format_timestamp(59.9996, SubtitleFormat::Vtt), "00:01:00.000");
        assert_eq!(format_timestamp(-1.0, SubtitleFormat::Srt), "00:00:00,000");
    }

    #[test]
    fn srt_blocks_are_numbered_from_one() {
        let cues = vec![
            AlignedCue::new(1.0, 2.5, "一行目\n二行目", 1),
            AlignedCue::new(2.5, 4.0, "next", 1),
        ];
        assert_eq!(
            render(&cues, SubtitleFormat::Srt),
            "1\n00:00:01,000 --> 00:00:02,500\n一行目\n二行目\n\n\
             2\n00:00:02,500 --> 00:00:04,000\nnext\n\n"
        );
    }

    #[test]
    fn vtt_has_header_and_dot_millis() {
        let cues = vec![AlignedCue::new(10.0, 12.25, "Hello", 1)];
        assert_eq!(
            render(&cues, SubtitleFormat::Vtt),
            "WEBVTT\n\n00:00:10.000 --> 00:00:12.250\nHello\n\n"
        );
    }
}
