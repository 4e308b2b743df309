//! Text analysis: tokenization, spoken-length estimation and line wrapping.
//!
//! The `Tokenizer` trait decouples both consumers from any particular
//! morphological analyser. [`mecab::MecabTokenizer`] drives an installed
//! MeCab; [`simple::SimpleTokenizer`] is a dependency-free fallback that
//! splits on script boundaries.

pub mod mecab;
pub mod pronunciation;
pub mod simple;
pub mod wrap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Coarse part-of-speech categories used by the wrap heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartOfSpeech {
    Noun,
    Verb,
    /// Particle (助詞).
    Particle,
    /// Auxiliary verb (助動詞).
    Auxiliary,
    /// Punctuation and other symbols.
    Symbol,
    Whitespace,
    Other,
}

impl PartOfSpeech {
    /// Particles and auxiliaries attach to the preceding word, so lines
    /// should not start with them.
    pub fn is_functional(self) -> bool {
        matches!(self, PartOfSpeech::Particle | PartOfSpeech::Auxiliary)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Word,
    /// Sentence begin/end marker emitted by some analysers; carries no text.
    SentenceBoundary,
}

/// One analysed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub surface: String,
    /// Canonical reading (katakana for Japanese analysers), when known.
    pub reading: Option<String>,
    pub pos: PartOfSpeech,
    pub kind: TokenKind,
}

impl Token {
    pub fn word(surface: impl Into<String>, reading: Option<String>, pos: PartOfSpeech) -> Self {
        Self {
            surface: surface.into(),
            reading,
            pos,
            kind: TokenKind::Word,
        }
    }

    pub fn boundary() -> Self {
        Self {
            surface: String::new(),
            reading: None,
            pos: PartOfSpeech::Symbol,
            kind: TokenKind::SentenceBoundary,
        }
    }

    pub fn is_boundary(&self) -> bool {
        self.kind == TokenKind::SentenceBoundary
    }
}

/// Contract for tokenizer backends.
pub trait Tokenizer: Send + Sync {
    /// Split `text` into ordered tokens. Boundary markers may be interleaved;
    /// consumers skip them.
    ///
    /// # Errors
    /// Returns `SlidecueError::Tokenizer` when the backend fails.
    fn tokenize(&self, text: &str) -> Result<Vec<Token>>;
}

impl<T: Tokenizer + ?Sized> Tokenizer for Box<T> {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        (**self).tokenize(text)
    }
}

impl<T: Tokenizer + ?Sized> Tokenizer for std::sync::Arc<T> {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        (**self).tokenize(text)
    }
}
