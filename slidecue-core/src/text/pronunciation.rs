//! Spoken-length proxy for narration text.
//!
//! The unit is roughly one mora: the length of a token's katakana reading,
//! ignoring the small ャ/ュ/ョ that merge into the previous mora. Numbers are
//! read digit by digit with place-value words, so `120` counts as
//! "ヒャクニジュウ"-ish rather than three characters.

use tracing::trace;

use crate::error::Result;
use crate::text::{PartOfSpeech, Token, Tokenizer};

/// Reading length of each digit 0-9.
pub const DIGIT_READING_LENGTHS: [usize; 10] = [2, 2, 1, 2, 2, 1, 2, 2, 2, 2];
/// Per place-value word (ジュウ, ヒャク, セン, マン, ...).
const PLACE_VALUE_LENGTH: usize = 2;
/// マイナス
const MINUS_LENGTH: usize = 4;
/// テン
const DECIMAL_POINT_LENGTH: usize = 2;
const MERGED_SMALL_KANA: [char; 3] = ['ャ', 'ュ', 'ョ'];

/// Reading length of `surface` when it is a number (`-?digits(.digits)?`,
/// full-width forms accepted), `None` otherwise.
pub fn number_reading_length(surface: &str) -> Option<usize> {
    let normalized: String = surface
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            '．' => '.',
            '－' | '−' => '-',
            _ => c,
        })
        .collect();

    let (negative, unsigned) = match normalized.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, normalized.as_str()),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(integer) || fraction.is_some_and(|f| !all_digits(f)) {
        return None;
    }

    let digit_sum = |s: &str| -> usize {
        s.bytes()
            .map(|b| DIGIT_READING_LENGTHS[usize::from(b - b'0')])
            .sum()
    };

    // Place values apply to the integer part only; fraction digits are read
    // one by one.
    let mut length = digit_sum(integer) + PLACE_VALUE_LENGTH * (integer.len() - 1);
    if negative {
        length += MINUS_LENGTH;
    }
    if let Some(fraction) = fraction {
        length += DECIMAL_POINT_LENGTH + digit_sum(fraction);
    }
    Some(length)
}

/// Length of a reading with merged small kana removed.
pub fn reading_length(reading: &str) -> usize {
    reading
        .chars()
        .filter(|c| !MERGED_SMALL_KANA.contains(c))
        .count()
}

/// Spoken length of one token. Boundaries and whitespace count zero.
pub fn token_length(token: &Token) -> usize {
    if token.is_boundary() || token.pos == PartOfSpeech::Whitespace {
        return 0;
    }
    if let Some(n) = number_reading_length(&token.surface) {
        return n;
    }
    match token.reading.as_deref() {
        Some(reading) => number_reading_length(reading).unwrap_or_else(|| reading_length(reading)),
        None => reading_length(&token.surface),
    }
}

/// Estimates the spoken length of text through a [`Tokenizer`].
pub struct PronunciationLengthEstimator<'a> {
    tokenizer: &'a dyn Tokenizer,
}

impl<'a> PronunciationLengthEstimator<'a> {
    pub fn new(tokenizer: &'a dyn Tokenizer) -> Self {
        Self { tokenizer }
    }

    pub fn estimate(&self, text: &str) -> Result<usize> {
        let tokens = self.tokenizer.tokenize(text)?;
        let length = tokens.iter().map(token_length).sum();
        trace!(chars = text.chars().count(), length, "pronunciation length");
        Ok(length)
    }
}
