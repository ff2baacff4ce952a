// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Keyword extraction and text normalization shared by scoring and learning.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static KEYWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{Hangul}\p{Alphabetic}\p{Nd}_-]+").expect("Invalid regex"));

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("Invalid regex"));

/// Conjunctions, pronouns and function words never treated as keywords.
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "그리고", "그런데", "하지만", "그래서", "그러면", "이것", "저것", "그것", "입니다",
    "the", "an", "me", "to", "of", "and", "or", "is", "are", "was", "for", "in", "on", "at",
    "about", "please", "it", "its", "my", "you", "your", "can", "could", "with", "some",
    "what", "do", "does", "be",
];

/// Minimum keyword length in characters.
pub const MIN_KEYWORD_CHARS: usize = 2;

/// Splits text into lowercase keywords: runs of letters, digits, `_` and `-`
/// at least two characters long, stopwords removed.
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    stopwords: HashSet<String>,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::with_stopwords(DEFAULT_STOPWORDS.iter().copied())
    }
}

impl KeywordExtractor {
    pub fn with_stopwords<I, S>(stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            stopwords: stopwords
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    /// Default stopwords plus `extra`.
    pub fn extended<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut extractor = Self::default();
        extractor
            .stopwords
            .extend(extra.into_iter().map(|s| s.as_ref().trim().to_lowercase()));
        extractor
    }

    /// Keywords in order of appearance, duplicates kept.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        KEYWORD_RE
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|w| w.chars().count() >= MIN_KEYWORD_CHARS)
            .filter(|w| !self.stopwords.contains(*w))
            .map(str::to_string)
            .collect()
    }

    /// Keywords in order of first appearance, duplicates dropped.
    pub fn extract_unique(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.extract(text)
            .into_iter()
            .filter(|k| seen.insert(k.clone()))
            .collect()
    }

    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }
}

/// Lowercase, collapse whitespace runs to one space, trim.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").to_lowercase()
}

/// Lowercase with every whitespace character removed.
pub fn strip_whitespace(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// First `max_chars` characters of `text`.
pub fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_drops_short_words_and_stopwords() {
        let extractor = KeywordExtractor::default();
        assert_eq!(
            extractor.extract("find me videos about Q"),
            vec!["find", "videos"]
        );
    }

    #[test]
    fn test_extract_handles_hangul_and_punctuation() {
        let extractor = KeywordExtractor::default();
        assert_eq!(
            extractor.extract("주식 관련 유튜브 영상 찾아줘!"),
            vec!["주식", "관련", "유튜브", "영상", "찾아줘"]
        );
        assert_eq!(extractor.extract("그리고 video_id abc-12"), vec!["video_id", "abc-12"]);
    }

    #[test]
    fn test_extract_unique_keeps_first_occurrence() {
        let extractor = KeywordExtractor::default();
        assert_eq!(extractor.extract_unique("Joke joke funny"), vec!["joke", "funny"]);
    }

    #[test]
    fn test_whitespace_normalization() {
        assert_eq!(strip_whitespace("위 에  검색한"), "위에검색한");
        assert_eq!(collapse_whitespace("  Full \t Content  "), "full content");
    }

    #[test]
    fn test_char_prefix_respects_char_boundaries() {
        assert_eq!(char_prefix("주식투자", 2), "주식");
        assert_eq!(char_prefix("ab", 10), "ab");
    }
}
