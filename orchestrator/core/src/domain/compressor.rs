// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # MDL Context Encoder
//!
//! Lossy, minimum-description-length inspired text compression used to keep
//! rumination prompts small. Repeated word n-grams are swapped for two-letter
//! codes (`AA`, `BB`, … `ZZ`) and whitespace is collapsed.
//!
//! The substitution is a raw substring replacement and is not word-boundary
//! aware, so it can rewrite unrelated text that happens to contain a pattern.
//! [`MdlEncoder::decode`] is the identity: the code table is not retained, so
//! encoded text cannot be expanded again.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Prompt context normalization for the trace store

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").expect("word regex is valid"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

/// Patterns shorter than this (in bytes) are never substituted.
pub const MIN_PATTERN_LENGTH: usize = 3;

/// Upper bound on retained patterns per pass.
pub const MAX_PATTERNS: usize = 50;

/// Number of distinct codes available (`AA` through `ZZ`).
pub const CODE_ALPHABET: usize = 26;

const MIN_NGRAM: usize = 2;
const MAX_NGRAM: usize = 5;

/// A repeated n-gram and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub text: String,
    pub count: usize,
}

/// Stateful encoder. The token frequency table persists across calls but is
/// bookkeeping only: pattern selection never consults it.
#[derive(Debug, Clone)]
pub struct MdlEncoder {
    token_frequencies: HashMap<String, usize>,
}

impl MdlEncoder {
    pub fn new() -> Self {
        let token_frequencies = [("the", 1000), ("be", 800), ("to", 700), ("of", 600), ("and", 500)]
            .into_iter()
            .map(|(token, count)| (token.to_string(), count))
            .collect();

        Self { token_frequencies }
    }

    /// Lowercased `\b\w+\b` tokens in order of appearance.
    pub fn tokenize(text: &str) -> Vec<String> {
        WORD.find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect()
    }

    pub fn update_frequencies(&mut self, text: &str) {
        for token in Self::tokenize(text) {
            *self.token_frequencies.entry(token).or_insert(0) += 1;
        }
    }

    pub fn frequency(&self, token: &str) -> usize {
        self.token_frequencies.get(token).copied().unwrap_or(0)
    }

    /// Repeated 2..=5-grams sorted by descending count, capped at [`MAX_PATTERNS`].
    ///
    /// Ties keep their discovery order (shorter n first, then lexicographic).
    pub fn extract_patterns(text: &str) -> Vec<Pattern> {
        let tokens = Self::tokenize(text);
        let mut patterns = Vec::new();

        for n in MIN_NGRAM..=MAX_NGRAM {
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for window in tokens.windows(n) {
                *counts.entry(window.join(" ")).or_insert(0) += 1;
            }

            patterns.extend(
                counts
                    .into_iter()
                    .filter(|(text, count)| *count >= 2 && text.len() >= MIN_PATTERN_LENGTH)
                    .map(|(text, count)| Pattern { text, count }),
            );
        }

        patterns.sort_by(|a, b| b.count.cmp(&a.count));
        patterns.truncate(MAX_PATTERNS);
        patterns
    }

    /// Substitute the first [`CODE_ALPHABET`] patterns with their codes.
    pub fn replace_patterns(text: &str, patterns: &[Pattern]) -> String {
        let codes: BTreeMap<&str, String> = patterns
            .iter()
            .take(CODE_ALPHABET)
            .zip(b'A'..=b'Z')
            .map(|(pattern, symbol)| {
                let symbol = symbol as char;
                (pattern.text.as_str(), format!("{symbol}{symbol}"))
            })
            .collect();

        let mut result = text.to_string();
        for (pattern, code) in codes {
            if code.len() < pattern.len() {
                result = result.replace(pattern, &code);
            }
        }
        result
    }

    pub fn compress(&mut self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        self.update_frequencies(text);
        let patterns = Self::extract_patterns(text);
        Self::replace_patterns(text, &patterns)
    }

    /// Compress, collapse whitespace runs to a single space and trim.
    pub fn encode(&mut self, text: &str) -> String {
        let compressed = self.compress(text);
        WHITESPACE.replace_all(&compressed, " ").trim().to_string()
    }

    /// Identity. Pattern substitution is irreversible, so this does not undo
    /// [`encode`](Self::encode).
    pub fn decode(&self, encoded: &str) -> String {
        encoded.to_string()
    }

    /// Approximate description length in bits: byte-level Shannon entropy
    /// times length, truncated. Diagnostic only.
    pub fn description_length(text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let mut histogram = [0usize; 256];
        for byte in text.bytes() {
            histogram[byte as usize] += 1;
        }

        let total = text.len() as f64;
        let entropy: f64 = histogram
            .iter()
            .filter(|&&count| count > 0)
            .map(|&count| {
                let p = count as f64 / total;
                -p * p.log2()
            })
            .sum();

        (entropy * total) as usize
    }
}

impl Default for MdlEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_words() {
        let tokens = MdlEncoder::tokenize("Hello, World! snake_case 42");
        assert_eq!(tokens, vec!["hello", "world", "snake_case", "42"]);
    }

    #[test]
    fn test_frequency_table_is_seeded_and_updated() {
        let mut encoder = MdlEncoder::new();
        assert_eq!(encoder.frequency("the"), 1000);
        assert_eq!(encoder.frequency("agent"), 0);

        encoder.update_frequencies("The agent and the agent");
        assert_eq!(encoder.frequency("the"), 1002);
        assert_eq!(encoder.frequency("agent"), 2);
        assert_eq!(encoder.frequency("and"), 501);
    }

    #[test]
    fn test_extract_patterns_keeps_repeated_ngrams() {
        let patterns = MdlEncoder::extract_patterns("red fox jumps red fox runs red fox");

        assert_eq!(patterns[0], Pattern { text: "red fox".to_string(), count: 3 });
        assert!(patterns.iter().all(|p| p.count >= 2));
        assert!(!patterns.iter().any(|p| p.text == "fox jumps"));
    }

    #[test]
    fn test_extract_patterns_caps_at_fifty() {
        let text: String = (0..40)
            .map(|i| format!("w{i} x{i} "))
            .collect::<String>()
            .repeat(2);

        let patterns = MdlEncoder::extract_patterns(&text);
        assert_eq!(patterns.len(), MAX_PATTERNS);
    }

    #[test]
    fn test_replace_patterns_uses_doubled_codes() {
        let patterns = vec![
            Pattern { text: "red fox".to_string(), count: 3 },
            Pattern { text: "blue bird".to_string(), count: 2 },
        ];

        let replaced = MdlEncoder::replace_patterns("red fox and blue bird and red fox", &patterns);
        assert_eq!(replaced, "AA and BB and AA");
    }

    #[test]
    fn test_replace_patterns_is_not_boundary_aware() {
        let patterns = vec![Pattern { text: "ab cd".to_string(), count: 2 }];
        let replaced = MdlEncoder::replace_patterns("xab cdx", &patterns);
        assert_eq!(replaced, "xAAx");
    }

    #[test]
    fn test_replace_patterns_only_assigns_26_codes() {
        let patterns: Vec<Pattern> = (0..30)
            .map(|i| Pattern { text: format!("long pattern {i:02}"), count: 2 })
            .collect();
        let text = "long pattern 29";

        assert_eq!(MdlEncoder::replace_patterns(text, &patterns), text);
    }

    #[test]
    fn test_encode_collapses_whitespace_and_trims() {
        let mut encoder = MdlEncoder::new();
        assert_eq!(encoder.encode("  one\n\n two\tthree  "), "one two three");
        assert_eq!(encoder.encode(""), "");
    }

    #[test]
    fn test_encode_is_idempotent_on_its_output() {
        let mut encoder = MdlEncoder::new();
        let once = encoder.encode("Agents   share\nfindings with   peers.");
        let twice = encoder.encode(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_encode_substitutes_repeated_phrases() {
        let mut encoder = MdlEncoder::new();
        let encoded = encoder.encode("market risk rises; market risk falls");
        assert_eq!(encoded, "AA rises; AA falls");
    }

    #[test]
    fn test_decode_is_identity() {
        let encoder = MdlEncoder::new();
        assert_eq!(encoder.decode("AA rises"), "AA rises");
    }

    #[test]
    fn test_description_length() {
        assert_eq!(MdlEncoder::description_length(""), 0);
        assert_eq!(MdlEncoder::description_length("aaaa"), 0);
        // Two equiprobable symbols: one bit each.
        assert_eq!(MdlEncoder::description_length("abab"), 4);
    }
}
