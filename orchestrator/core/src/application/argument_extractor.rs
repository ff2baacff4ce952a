// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Argument Extractor
//!
//! Turns a routed message into the tool's argument object according to the
//! tool's declared [`ArgumentRule`].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Per-tool argument rules, compiled once from configuration

use concierge_cortex::domain::ToolId;
use regex::{Regex, RegexBuilder};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::domain::dispatch_config::{ArgumentRule, ConfigError, DispatchConfigSpec, RegionCue};

const VIDEO_ID_LEN: usize = 11;

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn trim_decoration(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
}

enum CompiledRule {
    Question,
    Query { strip_terms: Vec<String>, max_results: u32 },
    Concept { triggers: Option<Regex> },
    VideoId { default_id: String },
    Region { regions: Vec<RegionCue>, default_region: String, max_results: u32 },
    Topic { triggers: Vec<String>, default_topic: String },
}

impl CompiledRule {
    fn compile(tool_id: &ToolId, rule: &ArgumentRule) -> Result<Self, ConfigError> {
        let lowercase = |words: &[String]| {
            words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect::<Vec<_>>()
        };

        Ok(match rule {
            ArgumentRule::Question => CompiledRule::Question,
            ArgumentRule::Query { strip_terms, max_results } => CompiledRule::Query {
                strip_terms: lowercase(strip_terms),
                max_results: *max_results,
            },
            ArgumentRule::Concept { triggers } => {
                let alternatives: Vec<String> = lowercase(triggers).iter().map(|t| regex::escape(t)).collect();
                let triggers = if alternatives.is_empty() {
                    None
                } else {
                    let pattern = alternatives.join("|");
                    let compiled = RegexBuilder::new(&pattern)
                        .case_insensitive(true)
                        .build()
                        .map_err(|source| ConfigError::InvalidPattern {
                            tool_id: tool_id.clone(),
                            pattern,
                            source,
                        })?;
                    Some(compiled)
                };
                CompiledRule::Concept { triggers }
            }
            ArgumentRule::VideoId { default_id } => CompiledRule::VideoId {
                default_id: default_id.clone(),
            },
            ArgumentRule::Region { regions, default_region, max_results } => CompiledRule::Region {
                regions: regions
                    .iter()
                    .map(|region| RegionCue {
                        code: region.code.clone(),
                        cues: lowercase(&region.cues),
                    })
                    .collect(),
                default_region: default_region.clone(),
                max_results: *max_results,
            },
            ArgumentRule::Topic { triggers, default_topic } => CompiledRule::Topic {
                triggers: lowercase(triggers),
                default_topic: default_topic.clone(),
            },
        })
    }

    fn apply(&self, message: &str) -> Map<String, Value> {
        let mut args = Map::new();
        match self {
            CompiledRule::Question => {
                args.insert("question".to_string(), json!(message));
            }
            CompiledRule::Query { strip_terms, max_results } => {
                args.insert("query".to_string(), json!(extract_query(message, strip_terms)));
                args.insert("max_results".to_string(), json!(max_results));
            }
            CompiledRule::Concept { triggers } => {
                args.insert("concept".to_string(), json!(extract_concept(message, triggers.as_ref())));
            }
            CompiledRule::VideoId { default_id } => {
                let video_id = extract_video_id(message).unwrap_or(default_id.as_str());
                args.insert("video_id".to_string(), json!(video_id));
            }
            CompiledRule::Region { regions, default_region, max_results } => {
                let region = extract_region(message, regions).unwrap_or(default_region.as_str());
                args.insert("region_code".to_string(), json!(region));
                args.insert("max_results".to_string(), json!(max_results));
            }
            CompiledRule::Topic { triggers, default_topic } => {
                let topic = extract_topic(message, triggers).unwrap_or(default_topic.as_str());
                args.insert("topic".to_string(), json!(topic));
            }
        }
        args
    }
}

/// Argument rules of every registered tool
pub struct ArgumentExtractor {
    rules: HashMap<ToolId, CompiledRule>,
}

impl ArgumentExtractor {
    pub fn from_config(spec: &DispatchConfigSpec) -> Result<Self, ConfigError> {
        let rules = spec
            .tools
            .iter()
            .map(|tool| Ok((tool.id.clone(), CompiledRule::compile(&tool.id, &tool.arguments)?)))
            .collect::<Result<HashMap<_, _>, ConfigError>>()?;
        Ok(Self { rules })
    }

    /// Tools without a rule get `{question: message}`
    pub fn extract(&self, tool_id: &ToolId, message: &str) -> Map<String, Value> {
        self.rules
            .get(tool_id)
            .unwrap_or(&CompiledRule::Question)
            .apply(message)
    }
}

/// Drop trigger tokens. ASCII terms match whole tokens; other terms also
/// match tokens they prefix, covering attached particles (검색해줘).
fn extract_query(message: &str, strip_terms: &[String]) -> String {
    let kept: Vec<&str> = message
        .split_whitespace()
        .filter(|token| {
            let bare = trim_decoration(token).to_lowercase();
            !strip_terms
                .iter()
                .any(|term| bare == *term || (!term.is_ascii() && bare.starts_with(term.as_str())))
        })
        .collect();

    let query = trim_decoration(&kept.join(" ")).to_string();
    if query.is_empty() {
        message.trim().to_string()
    } else {
        query
    }
}

/// Everything before the first trigger
fn extract_concept(message: &str, triggers: Option<&Regex>) -> String {
    let concept = match triggers.and_then(|re| re.find(message)) {
        Some(found) => trim_decoration(&message[..found.start()]),
        None => trim_decoration(message),
    };
    if concept.is_empty() {
        message.trim().to_string()
    } else {
        concept.to_string()
    }
}

/// Watch or short URL first (host matched case-insensitively), then a
/// standalone 11-character id token that is not a plain lowercase word.
fn extract_video_id(message: &str) -> Option<&str> {
    // ASCII lowercasing keeps byte offsets aligned with `message`
    let lower = message.to_ascii_lowercase();
    for prefix in ["youtube.com/watch?v=", "youtu.be/"] {
        if let Some(start) = lower.find(prefix).map(|i| i + prefix.len()) {
            let rest = &message[start..];
            let end = rest.find(|c: char| !is_id_char(c)).unwrap_or(rest.len());
            if end > 0 {
                return Some(&rest[..end]);
            }
        }
    }

    message
        .split(|c: char| !is_id_char(c))
        .find(|token| token.len() == VIDEO_ID_LEN && !token.chars().all(|c| c.is_ascii_lowercase()))
}

/// First region with a matching cue. ASCII cues match whole tokens, others
/// match anywhere.
fn extract_region<'a>(message: &str, regions: &'a [RegionCue]) -> Option<&'a str> {
    let lower = message.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    regions
        .iter()
        .find(|region| {
            region.cues.iter().any(|cue| {
                if cue.is_ascii() {
                    tokens.iter().any(|t| t == cue)
                } else {
                    lower.contains(cue.as_str())
                }
            })
        })
        .map(|region| region.code.as_str())
}

fn extract_topic<'a>(message: &'a str, triggers: &[String]) -> Option<&'a str> {
    message
        .split_whitespace()
        .map(trim_decoration)
        .find(|token| !token.is_empty() && !triggers.iter().any(|t| *t == token.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ArgumentExtractor {
        ArgumentExtractor::from_config(&DispatchConfigSpec::default()).unwrap()
    }

    fn arg(args: &Map<String, Value>, key: &str) -> String {
        args[key].as_str().unwrap().to_string()
    }

    #[test]
    fn test_query_strips_trigger_terms() {
        let extractor = extractor();
        let search = ToolId::new("search_videos");

        let args = extractor.extract(&search, "find me videos about Q");
        assert_eq!(arg(&args, "query"), "Q");
        assert_eq!(args["max_results"], json!(5));

        assert_eq!(arg(&extractor.extract(&search, "주식 유튜브 검색해줘"), "query"), "주식");
        assert_eq!(arg(&extractor.extract(&search, "Search for rust tutorials!"), "query"), "rust tutorials");
        // Nothing left after stripping
        assert_eq!(arg(&extractor.extract(&search, "유튜브 검색"), "query"), "유튜브 검색");
    }

    #[test]
    fn test_concept_is_text_before_trigger() {
        let extractor = extractor();
        let explain = ToolId::new("explain_concept");

        assert_eq!(arg(&extractor.extract(&explain, "블록체인 설명해줘"), "concept"), "블록체인");
        assert_eq!(arg(&extractor.extract(&explain, "Explain monads"), "concept"), "Explain monads");
    }

    #[test]
    fn test_video_id_sources() {
        let extractor = extractor();
        let info = ToolId::new("video_info");

        let url = extractor.extract(&info, "https://www.youtube.com/watch?v=abcDEF12345&t=3 정보");
        assert_eq!(arg(&url, "video_id"), "abcDEF12345");

        let short = extractor.extract(&info, "youtu.be/XyZ_987-abc 상세");
        assert_eq!(arg(&short, "video_id"), "XyZ_987-abc");

        let bare = extractor.extract(&info, "dQw4w9WgXcQ 조회수");
        assert_eq!(arg(&bare, "video_id"), "dQw4w9WgXcQ");

        // "information" is an 11-letter word, not an id
        let fallback = extractor.extract(&info, "video information please");
        assert_eq!(arg(&fallback, "video_id"), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_video_url_host_is_case_insensitive() {
        let extractor = extractor();
        let info = ToolId::new("video_info");

        let args = extractor.extract(&info, "12345678901 https://YouTube.com/watch?v=abcDEF12345");
        assert_eq!(arg(&args, "video_id"), "abcDEF12345");

        let args = extractor.extract(&info, "12345678901 YOUTU.BE/XyZ_987-abc");
        assert_eq!(arg(&args, "video_id"), "XyZ_987-abc");
    }

    #[test]
    fn test_region_cues() {
        let extractor = extractor();
        let trending = ToolId::new("trending_videos");

        assert_eq!(arg(&extractor.extract(&trending, "미국 인기 동영상"), "region_code"), "US");
        assert_eq!(arg(&extractor.extract(&trending, "trending in Japan"), "region_code"), "JP");
        // "us" inside "music" is not a cue
        let args = extractor.extract(&trending, "trending music");
        assert_eq!(arg(&args, "region_code"), "KR");
        assert_eq!(args["max_results"], json!(10));
    }

    #[test]
    fn test_topic_and_question() {
        let extractor = extractor();

        let joke = extractor.extract(&ToolId::new("tell_joke"), "tell me a joke about cats");
        assert_eq!(arg(&joke, "topic"), "cats");

        let default = extractor.extract(&ToolId::new("tell_joke"), "농담");
        assert_eq!(arg(&default, "topic"), "프로그래머");

        let question = extractor.extract(&ToolId::new("ask_assistant"), "왜 하늘은 파래?");
        assert_eq!(arg(&question, "question"), "왜 하늘은 파래?");

        let unknown = extractor.extract(&ToolId::new("not_registered"), "hello");
        assert_eq!(arg(&unknown, "question"), "hello");
    }
}
