//! MeCab backend.
//!
//! Runs the `mecab` executable with the default output format and parses its
//! `surface\tfeature,feature,...` lines. With IPADIC-style dictionaries the
//! first feature is the part of speech and the eighth is the katakana
//! reading; unknown words carry fewer features and no reading.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{Result, SlidecueError};
use crate::text::{PartOfSpeech, Token, Tokenizer};

const EOS: &str = "EOS";
const READING_FEATURE: usize = 7;

#[derive(Debug, Clone)]
pub struct MecabTokenizer {
    program: PathBuf,
    args: Vec<String>,
}

impl Default for MecabTokenizer {
    fn default() -> Self {
        Self::new("mecab")
    }
}

impl MecabTokenizer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Extra arguments, e.g. `["-d", "/path/to/dic"]`.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Parse MeCab's default output format.
    pub fn parse_output(output: &str) -> Vec<Token> {
        output
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| {
                if line == EOS {
                    return Token::boundary();
                }
                let (surface, features) = line.split_once('\t').unwrap_or((line, ""));
                let features: Vec<&str> = features.split(',').collect();
                let pos = map_pos(features.first().copied().unwrap_or(""));
                let reading = features
                    .get(READING_FEATURE)
                    .filter(|r| !r.is_empty() && **r != "*")
                    .map(|r| (*r).to_string());
                Token::word(surface, reading, pos)
            })
            .collect()
    }
}

fn map_pos(feature: &str) -> PartOfSpeech {
    match feature {
        "名詞" => PartOfSpeech::Noun,
        "動詞" => PartOfSpeech::Verb,
        "助詞" => PartOfSpeech::Particle,
        "助動詞" => PartOfSpeech::Auxiliary,
        "記号" => PartOfSpeech::Symbol,
        _ => PartOfSpeech::Other,
    }
}

impl Tokenizer for MecabTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SlidecueError::Tokenizer(format!("failed to start {}: {e}", self.program.display()))
            })?;

        // Feed stdin from a helper thread so a large input cannot deadlock
        // against a full stdout pipe.
        let stdin = child.stdin.take();
        let input = format!("{text}\n");
        let output = std::thread::scope(|scope| {
            let writer = scope.spawn(move || -> std::io::Result<()> {
                if let Some(mut stdin) = stdin {
                    stdin.write_all(input.as_bytes())?;
                }
                Ok(())
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));
            written.and(output)
        })
        .map_err(|e| SlidecueError::Tokenizer(format!("mecab I/O failed: {e}")))?;

        if !output.status.success() {
            return Err(SlidecueError::Tokenizer(format!(
                "mecab exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| SlidecueError::Tokenizer(format!("mecab output is not UTF-8: {e}")))?;
        let tokens = Self::parse_output(&stdout);
        debug!(tokens = tokens.len(), "mecab tokenized");
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "今日\t名詞,副詞可能,*,*,*,*,今日,キョウ,キョー\n\
                          は\t助詞,係助詞,*,*,*,*,は,ハ,ワ\n\
                          晴れ\t名詞,一般,*,*,*,*,晴れ,ハレ,ハレ\n\
                          です\t助動詞,*,*,*,特殊・デス,基本形,です,デス,デス\n\
                          。\t記号,句点,*,*,*,*,。,。,。\n\
                          Slidecue\t名詞,固有名詞,組織,*,*,*,*\n\
                          EOS\n";

    #[test]
    fn parses_surface_pos_and_reading() {
        let tokens = MecabTokenizer::parse_output(SAMPLE);
        assert_eq!(tokens.len(), 7);
        assert_eq!(tokens[0].surface, "今日");
        assert_eq!(tokens[0].reading.as_deref(), Some("キョウ"));
        assert_eq!(tokens[1].pos, PartOfSpeech::Particle);
        assert_eq!(tokens[3].pos, PartOfSpeech::Auxiliary);
        assert_eq!(tokens[4].pos, PartOfSpeech::Symbol);
        assert!(tokens[6].is_boundary());
    }

    #[test]
    fn unknown_words_have_no_reading() {
        let tokens = MecabTokenizer::parse_output(SAMPLE);
        assert_eq!(tokens[5].surface, "Slidecue");
        assert_eq!(tokens[5].pos, PartOfSpeech::Noun);
        assert!(tokens[5].reading.is_none());
    }

    #[test]
    fn missing_program_is_a_tokenizer_error() {
        let mecab = MecabTokenizer::new("/nonexistent/slidecue-mecab");
        let err = mecab.tokenize("テスト").unwrap_err();
        assert!(matches!(err, SlidecueError::Tokenizer(_)));
    }
}
