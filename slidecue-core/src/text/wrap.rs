//! Caption line wrapping.
//!
//! ## Search
//!
//! Candidates are generated breadth-first over the token sequence. Each
//! candidate tracks the length of its current line; after every token:
//!
//! - run > `max_length`: the candidate must break after this token;
//! - run in `(min_length, max_length]`: a copy with a break here is added and
//!   the candidate itself continues unbroken.
//!
//! Every candidate is then scored and the best one wins, the last generated
//! on ties. Text that already fits on one line is returned unbroken.
//!
//! ## Score
//!
//! −1 per break, +10/+20 for breaking after a comma/period, −5 when the next
//! line starts with a particle or auxiliary (else +5 when the previous token
//! is one), −2 for splitting two nouns, and −0.1 × variance of line lengths /
//! `max_length`. A line over `max_length`, a break at either end, or a line
//! starting with a prohibited character costs −255.

use tracing::{debug, warn};

use crate::error::{Result, SlidecueError};
use crate::text::{PartOfSpeech, Token, Tokenizer};

pub const DEFAULT_MIN_LENGTH: usize = 32;
pub const DEFAULT_MAX_LENGTH: usize = 40;
/// Characters that must not start a line.
pub const DEFAULT_NO_BREAK_BEFORE: &str = "、。」】』)）>＞》≫〕］｝";
/// Optional branching stops once this many candidates exist.
pub const DEFAULT_MAX_CANDIDATES: usize = 65_536;

const BIG_PENALTY: f64 = 255.0;
const BREAK_COST: f64 = 1.0;
const COMMA_BONUS: f64 = 10.0;
const PERIOD_BONUS: f64 = 20.0;
const FUNCTIONAL_AFTER_PENALTY: f64 = 5.0;
const FUNCTIONAL_BEFORE_BONUS: f64 = 5.0;
const SPLIT_NOUNS_PENALTY: f64 = 2.0;
const VARIANCE_WEIGHT: f64 = 0.1;

const COMMAS: [&str; 3] = ["、", ",", "，"];
const PERIODS: [&str; 3] = ["。", ".", "．"];

#[derive(Debug, Clone, PartialEq)]
pub struct WrapConfig {
    pub min_length: usize,
    pub max_length: usize,
    /// Overrides [`DEFAULT_NO_BREAK_BEFORE`].
    pub no_break_before: Option<String>,
    pub max_candidates: usize,
}

impl Default for WrapConfig {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            max_length: DEFAULT_MAX_LENGTH,
            no_break_before: None,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapToken {
    pub surface: String,
    /// Display length in characters.
    pub length: usize,
    pub pos: PartOfSpeech,
}

impl WrapToken {
    pub fn new(surface: impl Into<String>, pos: PartOfSpeech) -> Self {
        let surface = surface.into();
        let length = surface.chars().count();
        Self { surface, length, pos }
    }

    fn is_whitespace(&self) -> bool {
        self.pos == PartOfSpeech::Whitespace
    }
}

impl From<&Token> for WrapToken {
    fn from(token: &Token) -> Self {
        WrapToken::new(token.surface.clone(), token.pos)
    }
}

/// Break positions, ascending. Position `p` breaks between token `p - 1` and
/// token `p`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakPlacement {
    breaks: Vec<usize>,
}

impl BreakPlacement {
    pub fn new(mut breaks: Vec<usize>) -> Self {
        breaks.sort_unstable();
        breaks.dedup();
        Self { breaks }
    }

    pub fn positions(&self) -> &[usize] {
        &self.breaks
    }

    pub fn is_unbroken(&self) -> bool {
        self.breaks.is_empty()
    }

    pub fn lines<'t>(&self, tokens: &'t [WrapToken]) -> Vec<&'t [WrapToken]> {
        let mut lines = Vec::with_capacity(self.breaks.len() + 1);
        let mut from = 0;
        for &p in &self.breaks {
            let p = p.min(tokens.len());
            lines.push(&tokens[from..p]);
            from = p;
        }
        lines.push(&tokens[from..]);
        lines
    }

    pub fn line_lengths(&self, tokens: &[WrapToken]) -> Vec<usize> {
        self.lines(tokens)
            .iter()
            .map(|line| line.iter().map(|t| t.length).sum())
            .collect()
    }

    /// Joins lines with `\n`, trimming whitespace at each line edge.
    pub fn render(&self, tokens: &[WrapToken]) -> String {
        self.lines(tokens)
            .iter()
            .map(|line| line.iter().map(|t| t.surface.as_str()).collect::<String>())
            .map(|line| line.trim().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone)]
struct Partial {
    breaks: Vec<usize>,
    run: usize,
}

#[derive(Debug, Clone)]
pub struct LineWrapOptimizer {
    min_length: usize,
    max_length: usize,
    no_break_before: Vec<char>,
    max_candidates: usize,
}

impl LineWrapOptimizer {
    pub fn new(config: &WrapConfig) -> Result<Self> {
        if config.min_length >= config.max_length {
            return Err(SlidecueError::InvalidWrapBounds {
                min: config.min_length,
                max: config.max_length,
            });
        }
        let no_break_before = config
            .no_break_before
            .as_deref()
            .unwrap_or(DEFAULT_NO_BREAK_BEFORE)
            .chars()
            .collect();
        Ok(Self {
            min_length: config.min_length,
            max_length: config.max_length,
            no_break_before,
            max_candidates: config.max_candidates.max(1),
        })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// All break placements, in generation order.
    pub fn candidates(&self, tokens: &[WrapToken]) -> Vec<BreakPlacement> {
        let mut partials = vec![Partial {
            breaks: Vec::new(),
            run: 0,
        }];
        let mut capped = false;

        for (i, token) in tokens.iter().enumerate() {
            let mut branched = Vec::new();
            for partial in partials.iter_mut() {
                partial.run += token.length;
                if partial.run > self.max_length {
                    partial.breaks.push(i + 1);
                    partial.run = 0;
                } else if partial.run > self.min_length && !capped {
                    let mut breaks = partial.breaks.clone();
                    breaks.push(i + 1);
                    branched.push(Partial { breaks, run: 0 });
                }
            }
            if partials.len() + branched.len() > self.max_candidates {
                let room = self.max_candidates.saturating_sub(partials.len());
                branched.truncate(room);
                if !capped {
                    warn!(
                        limit = self.max_candidates,
                        tokens = tokens.len(),
                        "wrap search capped; later optional breaks not explored"
                    );
                }
                capped = true;
            }
            partials.extend(branched);
        }

        partials
            .into_iter()
            .map(|p| BreakPlacement { breaks: p.breaks })
            .collect()
    }

    pub fn score(&self, tokens: &[WrapToken], placement: &BreakPlacement) -> f64 {
        let lengths = placement.line_lengths(tokens);
        if lengths.iter().any(|&l| l > self.max_length) {
            return -BIG_PENALTY;
        }

        let n = tokens.len();
        let mut score = -BREAK_COST * placement.breaks.len() as f64;

        for &p in &placement.breaks {
            if p == 0 || p >= n {
                score -= BIG_PENALTY;
                continue;
            }
            // Whitespace between words is transparent to the heuristics.
            let before = tokens[..p].iter().rev().find(|t| !t.is_whitespace());
            let after = tokens[p..].iter().find(|t| !t.is_whitespace());
            let (Some(before), Some(after)) = (before, after) else {
                score -= BIG_PENALTY;
                continue;
            };

            if COMMAS.contains(&before.surface.as_str()) {
                score += COMMA_BONUS;
            }
            if PERIODS.contains(&before.surface.as_str()) {
                score += PERIOD_BONUS;
            }
            if after
                .surface
                .chars()
                .next()
                .is_some_and(|c| self.no_break_before.contains(&c))
            {
                score -= BIG_PENALTY;
            }
            if after.pos.is_functional() {
                score -= FUNCTIONAL_AFTER_PENALTY;
            } else if before.pos.is_functional() {
                score += FUNCTIONAL_BEFORE_BONUS;
            }
            if before.pos == PartOfSpeech::Noun && after.pos == PartOfSpeech::Noun {
                score -= SPLIT_NOUNS_PENALTY;
            }
        }

        score - VARIANCE_WEIGHT * variance(&lengths) / self.max_length as f64
    }

    /// Best placement for `tokens`.
    pub fn best(&self, tokens: &[WrapToken]) -> BreakPlacement {
        let total: usize = tokens.iter().map(|t| t.length).sum();
        if total <= self.max_length {
            return BreakPlacement::default();
        }

        let mut best: Option<(f64, BreakPlacement)> = None;
        let candidates = self.candidates(tokens);
        let considered = candidates.len();
        for candidate in candidates {
            let score = self.score(tokens, &candidate);
            if best.as_ref().map_or(true, |(b, _)| score >= *b) {
                best = Some((score, candidate));
            }
        }

        match best {
            Some((score, placement)) if self.fits(tokens, &placement) => {
                debug!(considered, score, breaks = placement.breaks.len(), "wrap chosen");
                placement
            }
            _ => {
                debug!(considered, "no acceptable wrap; breaking greedily");
                self.greedy(tokens)
            }
        }
    }

    /// Every line non-empty and within `max_length`.
    fn fits(&self, tokens: &[WrapToken], placement: &BreakPlacement) -> bool {
        placement
            .line_lengths(tokens)
            .iter()
            .all(|&l| l > 0 && l <= self.max_length)
    }

    /// Break before any token that would overflow the current line.
    fn greedy(&self, tokens: &[WrapToken]) -> BreakPlacement {
        let mut breaks = Vec::new();
        let mut run = 0;
        for (i, token) in tokens.iter().enumerate() {
            if run > 0 && run + token.length > self.max_length {
                breaks.push(i);
                run = 0;
            }
            run += token.length;
        }
        BreakPlacement { breaks }
    }

    /// Wrap pre-tokenized text. Tokens longer than a line are split by
    /// character first.
    pub fn wrap_tokens(&self, tokens: &[WrapToken]) -> String {
        let tokens = self.split_oversized(tokens);
        self.best(&tokens).render(&tokens)
    }

    pub fn wrap_text(&self, text: &str, tokenizer: &dyn Tokenizer) -> Result<String> {
        let tokens: Vec<WrapToken> = tokenizer
            .tokenize(text)?
            .iter()
            .filter(|t| !t.is_boundary())
            .map(WrapToken::from)
            .collect();
        Ok(self.wrap_tokens(&tokens))
    }

    fn split_oversized(&self, tokens: &[WrapToken]) -> Vec<WrapToken> {
        let mut out = Vec::with_capacity(tokens.len());
        for token in tokens {
            if token.length <= self.max_length {
                out.push(token.clone());
                continue;
            }
            let chars: Vec<char> = token.surface.chars().collect();
            for piece in chars.chunks(self.max_length) {
                out.push(WrapToken::new(piece.iter().collect::<String>(), token.pos));
            }
        }
        out
    }
}

fn variance(values: &[usize]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::simple::SimpleTokenizer;

    fn optimizer(min: usize, max: usize) -> LineWrapOptimizer {
        LineWrapOptimizer::new(&WrapConfig {
            min_length: min,
            max_length: max,
            ..WrapConfig::default()
        })
        .unwrap()
    }

    fn words(spec: &[(&str, PartOfSpeech)]) -> Vec<WrapToken> {
        spec.iter().map(|&(s, pos)| WrapToken::new(s, pos)).collect()
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let err = LineWrapOptimizer::new(&WrapConfig {
            min_length: 40,
            max_length: 40,
            ..WrapConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, SlidecueError::InvalidWrapBounds { min: 40, max: 40 }));
    }

    #[test]
    fn short_text_is_not_wrapped() {
        let opt = optimizer(4, 10);
        let tokens = words(&[("abc", PartOfSpeech::Noun), ("defgh", PartOfSpeech::Noun)]);
        assert!(opt.best(&tokens).is_unbroken());
        assert_eq!(opt.wrap_tokens(&tokens), "abcdefgh");
    }

    #[test]
    fn mandatory_break_after_overflowing_token() {
        let opt = optimizer(8, 10);
        let tokens = words(&[("aaaaaa", PartOfSpeech::Noun), ("bbbbbb", PartOfSpeech::Noun)]);
        let candidates = opt.candidates(&tokens);
        // Run hits 12 > 10 at the second token: forced break after it.
        assert_eq!(candidates, vec![BreakPlacement::new(vec![2])]);
    }

    #[test]
    fn optional_window_branches() {
        let opt = optimizer(4, 10);
        let tokens = words(&[
            ("aaa", PartOfSpeech::Noun),
            ("bb", PartOfSpeech::Noun),
            ("cc", PartOfSpeech::Noun),
        ]);
        // Runs 3, 5, 7: both later gaps fall in (4, 10]. The copy broken
        // after "bb" restarts at 2 and never branches again.
        let candidates = opt.candidates(&tokens);
        assert_eq!(
            candidates,
            vec![
                BreakPlacement::new(vec![]),
                BreakPlacement::new(vec![2]),
                BreakPlacement::new(vec![3]),
            ]
        );
    }

    #[test]
    fn prefers_break_after_period() {
        let opt = optimizer(4, 12);
        let tokens = words(&[
            ("今日は", PartOfSpeech::Other),
            ("晴れ", PartOfSpeech::Noun),
            ("。", PartOfSpeech::Symbol),
            ("明日", PartOfSpeech::Noun),
            ("は", PartOfSpeech::Particle),
            ("雨", PartOfSpeech::Noun),
            ("です", PartOfSpeech::Auxiliary),
            ("。", PartOfSpeech::Symbol),
        ]);
        assert_eq!(opt.wrap_tokens(&tokens), "今日は晴れ。\n明日は雨です。");
    }

    #[test]
    fn never_starts_line_with_prohibited_mark() {
        let opt = optimizer(2, 6);
        let tokens = words(&[
            ("あいう", PartOfSpeech::Other),
            ("、", PartOfSpeech::Symbol),
            ("えお", PartOfSpeech::Other),
            ("かき", PartOfSpeech::Other),
        ]);
        let placement = opt.best(&tokens);
        assert!(!placement.positions().contains(&1));
        assert_eq!(opt.wrap_tokens(&tokens), "あいう、\nえおかき");
    }

    #[test]
    fn break_at_the_end_is_penalised() {
        let opt = optimizer(2, 6);
        let tokens = words(&[("abc", PartOfSpeech::Noun), ("def", PartOfSpeech::Noun)]);
        let score = opt.score(&tokens, &BreakPlacement::new(vec![2]));
        assert!(score <= -BIG_PENALTY);
    }

    #[test]
    fn overlong_line_scores_exactly_big_penalty() {
        let opt = optimizer(2, 6);
        let tokens = words(&[("abcdefgh", PartOfSpeech::Noun)]);
        assert_eq!(opt.score(&tokens, &BreakPlacement::default()), -BIG_PENALTY);
    }

    /// Score of a single break between two equal-length lines, so the
    /// variance term is zero.
    fn single_break(before: PartOfSpeech, after: PartOfSpeech) -> f64 {
        let tokens = words(&[("ab", before), ("cd", after)]);
        optimizer(1, 10).score(&tokens, &BreakPlacement::new(vec![1]))
    }

    #[test]
    fn comma_and_period_bonuses() {
        let opt = optimizer(1, 10);
        let comma = words(&[
            ("a", PartOfSpeech::Other),
            ("、", PartOfSpeech::Symbol),
            ("cd", PartOfSpeech::Other),
        ]);
        assert_eq!(opt.score(&comma, &BreakPlacement::new(vec![2])), -1.0 + 10.0);

        let period = words(&[
            ("a", PartOfSpeech::Other),
            ("。", PartOfSpeech::Symbol),
            ("cd", PartOfSpeech::Other),
        ]);
        assert_eq!(opt.score(&period, &BreakPlacement::new(vec![2])), -1.0 + 20.0);
    }

    #[test]
    fn plain_break_costs_one() {
        assert_eq!(single_break(PartOfSpeech::Other, PartOfSpeech::Other), -1.0);
    }

    #[test]
    fn functional_word_opening_a_line_is_penalised() {
        assert_eq!(single_break(PartOfSpeech::Other, PartOfSpeech::Particle), -1.0 - 5.0);
        assert_eq!(single_break(PartOfSpeech::Verb, PartOfSpeech::Auxiliary), -1.0 - 5.0);
    }

    #[test]
    fn functional_word_closing_a_line_earns_bonus() {
        assert_eq!(single_break(PartOfSpeech::Particle, PartOfSpeech::Other), -1.0 + 5.0);
        assert_eq!(single_break(PartOfSpeech::Auxiliary, PartOfSpeech::Verb), -1.0 + 5.0);
    }

    #[test]
    fn closing_bonus_is_skipped_when_next_line_opens_with_functional_word() {
        assert_eq!(single_break(PartOfSpeech::Particle, PartOfSpeech::Auxiliary), -1.0 - 5.0);
    }

    #[test]
    fn splitting_two_nouns_is_penalised() {
        assert_eq!(single_break(PartOfSpeech::Noun, PartOfSpeech::Noun), -1.0 - 2.0);
        assert_eq!(single_break(PartOfSpeech::Noun, PartOfSpeech::Verb), -1.0);
    }

    #[test]
    fn whitespace_is_skipped_when_finding_neighbours() {
        let opt = optimizer(1, 10);
        let tokens = words(&[
            ("ab", PartOfSpeech::Noun),
            (" ", PartOfSpeech::Whitespace),
            ("c", PartOfSpeech::Noun),
        ]);
        // Lines "ab " and "c": lengths 3 and 1, variance 1.
        let score = opt.score(&tokens, &BreakPlacement::new(vec![2]));
        approx::assert_abs_diff_eq!(score, -1.0 - 2.0 - 0.1 * 1.0 / 10.0, epsilon = 1e-12);
    }

    #[test]
    fn unequal_lines_pay_variance() {
        let opt = optimizer(1, 10);
        let tokens = words(&[("abcd", PartOfSpeech::Other), ("ef", PartOfSpeech::Other)]);
        // Lengths 4 and 2: mean 3, variance 1.
        let score = opt.score(&tokens, &BreakPlacement::new(vec![1]));
        approx::assert_abs_diff_eq!(score, -1.0 - 0.1 * 1.0 / 10.0, epsilon = 1e-12);
    }

    #[test]
    fn ties_go_to_the_last_generated_candidate() {
        let opt = optimizer(0, 2);
        let tokens = words(&[
            ("a", PartOfSpeech::Other),
            ("b", PartOfSpeech::Other),
            ("c", PartOfSpeech::Other),
        ]);
        let candidates = opt.candidates(&tokens);
        let first = BreakPlacement::new(vec![1]);
        let second = BreakPlacement::new(vec![2]);
        let first_at = candidates.iter().position(|c| *c == first).unwrap();
        let second_at = candidates.iter().position(|c| *c == second).unwrap();
        assert!(first_at < second_at);
        // "a|bc" and "ab|c" score the same; nothing else beats them.
        let top = opt.score(&tokens, &first);
        assert_eq!(top, opt.score(&tokens, &second));
        assert!(candidates.iter().all(|c| opt.score(&tokens, c) <= top));

        assert_eq!(opt.best(&tokens), second);
        assert_eq!(opt.wrap_tokens(&tokens), "ab\nc");
    }

    #[test]
    fn custom_prohibited_set() {
        let opt = LineWrapOptimizer::new(&WrapConfig {
            min_length: 2,
            max_length: 6,
            no_break_before: Some("x".into()),
            ..WrapConfig::default()
        })
        .unwrap();
        let tokens = words(&[("abc", PartOfSpeech::Other), ("xyz", PartOfSpeech::Other)]);
        let score = opt.score(&tokens, &BreakPlacement::new(vec![1]));
        assert!(score < -200.0);
    }

    #[test]
    fn every_line_fits_when_wrapping_is_required() {
        let opt = optimizer(12, 16);
        let text = "吾輩は猫である。名前はまだ無い。どこで生れたかとんと見当がつかぬ。\
                    何でも薄暗いじめじめした所でニャーニャー泣いていた事だけは記憶している。";
        let wrapped = opt.wrap_text(text, &SimpleTokenizer).unwrap();
        assert!(wrapped.contains('\n'));
        for line in wrapped.lines() {
            assert!(line.chars().count() <= 16, "{line:?}");
        }
        assert_eq!(wrapped.replace('\n', ""), text);
    }

    #[test]
    fn oversized_token_is_split() {
        let opt = optimizer(2, 4);
        let tokens = words(&[("abcdefghij", PartOfSpeech::Other)]);
        let wrapped = opt.wrap_tokens(&tokens);
        for line in wrapped.lines() {
            assert!(line.chars().count() <= 4, "{line:?}");
        }
        assert_eq!(wrapped.replace('\n', ""), "abcdefghij");
    }

    #[test]
    fn latin_lines_are_trimmed() {
        let opt = optimizer(8, 12);
        let wrapped = opt
            .wrap_text("alpha beta gamma delta epsilon", &SimpleTokenizer)
            .unwrap();
        for line in wrapped.lines() {
            assert_eq!(line, line.trim());
            assert!(line.chars().count() <= 12, "{line:?}");
        }
    }
}
