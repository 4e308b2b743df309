//! Persistent tool settings (JSON file in the user data directory).
//!
//! Command-line flags override individual fields for one run; the file holds
//! the defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use slidecue_core::align::{AlignConfig, DEFAULT_EXPECTED_MARGIN};
use slidecue_core::engine::PipelineConfig;
use slidecue_core::text::wrap::{
    WrapConfig, DEFAULT_MAX_CANDIDATES, DEFAULT_MAX_LENGTH, DEFAULT_MIN_LENGTH,
};
use slidecue_core::vad::splitter::SplitterConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    /// `srt` or `vtt`.
    pub output_format: String,
    /// `simple` or `mecab`.
    pub tokenizer: String,
    pub mecab_path: String,
    pub mecab_args: Vec<String>,
    pub wrap_enabled: bool,
    pub wrap_min_length: usize,
    pub wrap_max_length: usize,
    pub no_break_before: Option<String>,
    pub rescale_timeline: bool,
    pub expected_margin: f64,
    pub parallel_detection: bool,
    pub queue_depth: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            output_format: "srt".into(),
            tokenizer: "simple".into(),
            mecab_path: "mecab".into(),
            mecab_args: Vec::new(),
            wrap_enabled: true,
            wrap_min_length: DEFAULT_MIN_LENGTH,
            wrap_max_length: DEFAULT_MAX_LENGTH,
            no_break_before: None,
            rescale_timeline: true,
            expected_margin: DEFAULT_EXPECTED_MARGIN,
            parallel_detection: true,
            queue_depth: 4,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.output_format = normalize_output_format(&self.output_format);
        self.tokenizer = normalize_tokenizer(&self.tokenizer);
        self.mecab_path = match self.mecab_path.trim() {
            "" => "mecab".into(),
            path => path.to_string(),
        };
        self.wrap_max_length = self.wrap_max_length.clamp(2, 200);
        if self.wrap_min_length >= self.wrap_max_length {
            self.wrap_min_length = self.wrap_max_length * 4 / 5;
        }
        self.no_break_before = self
            .no_break_before
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if !self.expected_margin.is_finite() {
            self.expected_margin = DEFAULT_EXPECTED_MARGIN;
        }
        self.expected_margin = self.expected_margin.clamp(1.0, 4.0);
        self.queue_depth = self.queue_depth.clamp(1, 64);
    }

    pub fn wrap_config(&self) -> Option<WrapConfig> {
        self.wrap_enabled.then(|| WrapConfig {
            min_length: self.wrap_min_length,
            max_length: self.wrap_max_length,
            no_break_before: self.no_break_before.clone(),
            max_candidates: DEFAULT_MAX_CANDIDATES,
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            splitter: SplitterConfig {
                parallel: self.parallel_detection,
                queue_depth: self.queue_depth,
                ..SplitterConfig::default()
            },
            align: AlignConfig {
                expected_margin: self.expected_margin,
            },
            wrap: self.wrap_config(),
            rescale_timeline: self.rescale_timeline,
        }
    }
}

pub fn normalize_output_format(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "vtt" | "webvtt" => "vtt".into(),
        _ => "srt".into(),
    }
}

pub fn normalize_tokenizer(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "mecab" => "mecab".into(),
        _ => "simple".into(),
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("slidecue")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".config")
            })
            .join("slidecue")
            .join("settings.json")
    }
}

/// Missing or unreadable files yield defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join("absent.json"));
        assert_eq!(settings.output_format, "srt");
        assert_eq!(settings.wrap_max_length, 40);
        assert_eq!(settings.wrap_min_length, 32);
        assert!(settings.rescale_timeline);
        assert!(settings.pipeline_config().rescale_timeline);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"outputFormat":" WebVTT ","tokenizer":"MeCab"}"#).unwrap();
        let settings = load_settings(&path);
        assert_eq!(settings.output_format, "vtt");
        assert_eq!(settings.tokenizer, "mecab");
        assert!(settings.wrap_enabled);
    }

    #[test]
    fn normalize_repairs_inverted_wrap_bounds() {
        let mut settings = AppSettings {
            wrap_min_length: 50,
            wrap_max_length: 20,
            expected_margin: 0.5,
            queue_depth: 0,
            no_break_before: Some("  ".into()),
            ..AppSettings::default()
        };
        settings.normalize();
        assert_eq!(settings.wrap_max_length, 20);
        assert_eq!(settings.wrap_min_length, 16);
        assert_eq!(settings.expected_margin, 1.0);
        assert_eq!(settings.queue_depth, 1);
        assert!(settings.no_break_before.is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = AppSettings {
            rescale_timeline: false,
            mecab_args: vec!["-d".into(), "/opt/dic".into()],
            ..AppSettings::default()
        };
        save_settings(&path, &settings).unwrap();
        let loaded = load_settings(&path);
        assert!(!loaded.rescale_timeline);
        assert_eq!(loaded.mecab_args, vec!["-d", "/opt/dic"]);
    }

    #[test]
    fn wrap_can_be_disabled() {
        let settings = AppSettings {
            wrap_enabled: false,
            ..AppSettings::default()
        };
        assert!(settings.pipeline_config().wrap.is_none());
    }
}
