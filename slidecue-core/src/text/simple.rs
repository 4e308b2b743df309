//! `SimpleTokenizer` - script-boundary tokenizer with no external analyser.
//!
//! Splits text into runs of one character class (digits, latin letters,
//! hiragana, katakana, kanji), single punctuation marks and whitespace runs.
//! Hiragana runs get a katakana reading; a handful of very common particles
//! and auxiliaries are recognised so the wrap heuristics have something to
//! work with. Kanji runs have no reading, so their spoken length falls back
//! to the character count.

use crate::error::Result;
use crate::text::{PartOfSpeech, Token, Tokenizer};

const PARTICLES: &[&str] = &[
    "は", "が", "を", "に", "で", "と", "も", "の", "へ", "や", "か", "ね", "よ", "から", "まで",
    "より", "けど", "ので", "のに",
];

const AUXILIARIES: &[&str] = &[
    "です", "ます", "でした", "ました", "ません", "ない", "た", "だ", "う", "よう", "たい",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Digit,
    Latin,
    Hiragana,
    Katakana,
    Kanji,
    Space,
    Mark,
}

fn classify(c: char) -> Class {
    match c {
        '0'..='9' | '０'..='９' => Class::Digit,
        c if c.is_alphabetic() && c.is_ascii() => Class::Latin,
        '\'' => Class::Latin,
        '\u{3041}'..='\u{309F}' => Class::Hiragana,
        '\u{30A0}'..='\u{30FF}' | '\u{31F0}'..='\u{31FF}' => Class::Katakana,
        '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '々' => Class::Kanji,
        c if c.is_whitespace() => Class::Space,
        _ => Class::Mark,
    }
}

/// Hiragana → katakana by code point offset.
fn to_katakana(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{3041}'..='\u{3096}' => char::from_u32(c as u32 + 0x60).unwrap_or(c),
            _ => c,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTokenizer;

impl SimpleTokenizer {
    pub fn new() -> Self {
        Self
    }

    fn token_for(class: Class, surface: String) -> Token {
        match class {
            Class::Digit => Token::word(surface, None, PartOfSpeech::Noun),
            Class::Latin => Token::word(surface, None, PartOfSpeech::Other),
            Class::Hiragana => {
                let pos = if PARTICLES.contains(&surface.as_str()) {
                    PartOfSpeech::Particle
                } else if AUXILIARIES.contains(&surface.as_str()) {
                    PartOfSpeech::Auxiliary
                } else {
                    PartOfSpeech::Other
                };
                let reading = Some(to_katakana(&surface));
                Token::word(surface, reading, pos)
            }
            Class::Katakana => {
                let reading = Some(surface.clone());
                Token::word(surface, reading, PartOfSpeech::Noun)
            }
            Class::Kanji => Token::word(surface, None, PartOfSpeech::Noun),
            Class::Space => Token::word(surface, None, PartOfSpeech::Whitespace),
            Class::Mark => Token::word(surface, None, PartOfSpeech::Symbol),
        }
    }
}

impl Tokenizer for SimpleTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let class = classify(chars[i]);

            // A minus sign directly before a digit belongs to the number.
            if matches!(chars[i], '-' | '－' | '−')
                && chars.get(i + 1).map(|&c| classify(c)) == Some(Class::Digit)
                && (i == 0 || classify(chars[i - 1]) != Class::Digit)
            {
                let end = number_end(&chars, i + 1);
                let surface: String = chars[i..end].iter().collect();
                tokens.push(Self::token_for(Class::Digit, surface));
                i = end;
                continue;
            }

            let end = match class {
                Class::Digit => number_end(&chars, i),
                // Punctuation is always one token per mark.
                Class::Mark => i + 1,
                _ => {
                    let mut j = i + 1;
                    while j < chars.len() && classify(chars[j]) == class {
                        j += 1;
                    }
                    j
                }
            };

            let surface: String = chars[i..end].iter().collect();
            tokens.push(Self::token_for(class, surface));
            i = end;
        }

        Ok(tokens)
    }
}

/// End of a digit run starting at `start`, including one decimal point that
/// is followed by more digits.
fn number_end(chars: &[char], start: usize) -> usize {
    let digits_from = |mut j: usize| {
        while j < chars.len() && classify(chars[j]) == Class::Digit {
            j += 1;
        }
        j
    };
    let end = digits_from(start);
    if end + 1 < chars.len()
        && matches!(chars[end], '.' | '．')
        && classify(chars[end + 1]) == Class::Digit
    {
        return digits_from(end + 1);
    }
    end
}
