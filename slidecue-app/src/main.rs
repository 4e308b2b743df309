//! slidecue command-line entry point.
//!
//! ```text
//! slidecue generate deck.json --wav narration.wav [-o deck.srt]
//! slidecue generate deck.json --segments narration.csv --format vtt
//! slidecue check deck.json narration.wav
//! slidecue detect narration.wav [--window 3,0,12.5]
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `slidecue=info`); logs go to
//! stderr so subtitle or JSON output on stdout stays clean.

mod commands;
mod settings;
mod subtitles;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use commands::Evidence;
use settings::{default_settings_path, load_settings, save_settings, AppSettings};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "slidecue", about = "Align slide narration notes with recorded audio", version)]
struct Cli {
    /// Settings file (default: the per-user config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce a subtitle file from slide notes and timing evidence
    Generate {
        /// Slide metadata JSON
        slides: PathBuf,

        /// Recorded narration (16-bit PCM WAV)
        #[arg(long, conflicts_with = "segments", required_unless_present = "segments")]
        wav: Option<PathBuf>,

        /// Precomputed speech segments (label,start,end CSV)
        #[arg(long)]
        segments: Option<PathBuf>,

        /// Output path (default: slides path with the format's extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the alignment report as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// Compare the slide timeline with the media duration
    Check {
        slides: PathBuf,
        wav: PathBuf,
    },
    /// Run speech detection only and print the result as JSON
    Detect {
        wav: PathBuf,

        /// Scan one window instead of dumping every candidate: EXPECTED,START,END
        #[arg(long, value_parser = parse_window)]
        window: Option<(usize, f64, f64)>,
    },
    /// Print the effective settings, optionally saving them first
    Settings {
        /// Write the current settings (with overrides) back to the file
        #[arg(long)]
        save: bool,

        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Per-run overrides of the settings file.
#[derive(Args, Default)]
struct Overrides {
    /// srt or vtt
    #[arg(short, long)]
    format: Option<String>,

    /// simple or mecab
    #[arg(long)]
    tokenizer: Option<String>,

    /// MeCab executable (implies --tokenizer mecab)
    #[arg(long)]
    mecab: Option<String>,

    /// Minimum preferred caption line length
    #[arg(long)]
    min_length: Option<usize>,

    /// Maximum caption line length
    #[arg(long)]
    max_length: Option<usize>,

    /// Leave cue text on one line
    #[arg(long)]
    no_wrap: bool,

    /// Keep the slide timeline as recorded instead of stretching it onto the
    /// media duration
    #[arg(long)]
    no_rescale: bool,

    /// Run detection candidates one after another on this thread
    #[arg(long)]
    sequential: bool,
}

impl Overrides {
    fn apply(&self, settings: &mut AppSettings) {
        if let Some(format) = &self.format {
            settings.output_format = format.clone();
        }
        if let Some(tokenizer) = &self.tokenizer {
            settings.tokenizer = tokenizer.clone();
        }
        if let Some(program) = &self.mecab {
            settings.tokenizer = "mecab".into();
            settings.mecab_path = program.clone();
        }
        if let Some(min) = self.min_length {
            settings.wrap_min_length = min;
        }
        if let Some(max) = self.max_length {
            settings.wrap_max_length = max;
        }
        if self.no_wrap {
            settings.wrap_enabled = false;
        }
        if self.no_rescale {
            settings.rescale_timeline = false;
        }
        if self.sequential {
            settings.parallel_detection = false;
        }
        settings.normalize();
    }
}

fn parse_window(raw: &str) -> Result<(usize, f64, f64), String> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let [expected, start, end] = parts.as_slice() else {
        return Err("expected EXPECTED,START,END".into());
    };
    let expected = expected
        .parse::<usize>()
        .map_err(|e| format!("bad span count {expected:?}: {e}"))?;
    let start = start
        .parse::<f64>()
        .map_err(|e| format!("bad start {start:?}: {e}"))?;
    let end = end.parse::<f64>().map_err(|e| format!("bad end {end:?}: {e}"))?;
    Ok((expected, start, end))
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings_path = cli.settings.unwrap_or_else(default_settings_path);
    let mut settings = load_settings(&settings_path);

    match cli.command {
        Commands::Generate {
            slides,
            wav,
            segments,
            output,
            report,
            overrides,
        } => {
            overrides.apply(&mut settings);
            let evidence = match (wav, segments) {
                (Some(wav), _) => Evidence::Audio(wav),
                (None, Some(csv)) => Evidence::Segments(csv),
                (None, None) => bail!("one of --wav or --segments is required"),
            };
            let written =
                commands::generate(&settings, &slides, &evidence, output, report.as_deref())?;
            println!("{}", written.display());
        }
        Commands::Check { slides, wav } => {
            let warnings = commands::check(&slides, &wav)?;
            if warnings.is_empty() {
                println!("timeline consistent with media");
            }
            for warning in &warnings {
                println!("warning: {warning}");
            }
        }
        Commands::Detect { wav, window } => {
            let value = commands::detect(&settings, &wav, window)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Settings { save, overrides } => {
            overrides.apply(&mut settings);
            if save {
                save_settings(&settings_path, &settings)
                    .with_context(|| format!("saving {}", settings_path.display()))?;
                info!(path = %settings_path.display(), "settings saved");
            }
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("slidecue=info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn window_parsing() {
        assert_eq!(parse_window("3, 0, 12.5"), Ok((3, 0.0, 12.5)));
        assert!(parse_window("3,0").is_err());
        assert!(parse_window("x,0,1").is_err());
    }

    #[test]
    fn overrides_are_normalized() {
        let mut settings = AppSettings::default();
        let overrides = Overrides {
            format: Some("VTT".into()),
            mecab: Some("/usr/local/bin/mecab".into()),
            no_wrap: true,
            no_rescale: true,
            ..Overrides::default()
        };
        assert!(settings.rescale_timeline);
        overrides.apply(&mut settings);
        assert_eq!(settings.output_format, "vtt");
        assert_eq!(settings.tokenizer, "mecab");
        assert_eq!(settings.mecab_path, "/usr/local/bin/mecab");
        assert!(!settings.wrap_enabled);
        assert!(!settings.rescale_timeline);
    }

    #[test]
    fn generate_requires_evidence() {
        assert!(Cli::try_parse_from(["slidecue", "generate", "deck.json"]).is_err());
        assert!(Cli::try_parse_from([
            "slidecue", "generate", "deck.json", "--wav", "a.wav", "--segments", "a.csv"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["slidecue", "generate", "deck.json", "--wav", "a.wav"]).is_ok());
    }
}
