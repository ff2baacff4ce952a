// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Reference Resolver
//!
//! Detects anaphoric references ("위에 검색한 영상", "that one") and rewrites
//! the message against the most relevant earlier tool output.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Pure detection, target selection and paraphrase; no I/O
//!
//! Target selection scans assistant turns newest first through three gates:
//! a family cue restricts candidates to that family (and its result marker),
//! a topic cue must also appear in the candidate, and without a family cue
//! the candidate must share the hint's tool or family or have a content type
//! named in the message. When nothing passes, the preferred family supplies
//! the target: a topical turn first, then its most recent turn.

use concierge_cortex::domain::lexicon::{char_prefix, strip_whitespace};
use concierge_cortex::domain::{ToolId, Turn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

use crate::domain::dispatch_config::{DispatchConfigSpec, RewriteStyle, RewriteTemplates, ToolFamily};
use crate::domain::reference::{ReferenceAnalysis, ReferenceType};

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("Invalid regex"));

const MAX_ITEMS: usize = 3;
const MAX_ITEM_CHARS: usize = 30;
/// Characters scanned for a topic keyword in explanatory output
const TOPIC_SCAN_CHARS: usize = 100;
/// Characters scanned for the keyword prefixed onto unresolved paraphrases
const PREFIX_SCAN_CHARS: usize = 50;

pub struct ReferenceResolver {
    /// Phrases are stored lowercase with whitespace removed
    categories: Vec<(ReferenceType, Vec<String>)>,
    families: Vec<ToolFamily>,
    topic_cues: Vec<String>,
    preferred_family: Option<String>,
    content_types: HashMap<ToolId, Vec<String>>,
    rewrite_styles: HashMap<ToolId, RewriteStyle>,
    templates: RewriteTemplates,
}

impl ReferenceResolver {
    pub fn from_config(spec: &DispatchConfigSpec) -> Self {
        let lowercase = |words: &[String]| words.iter().map(|w| w.to_lowercase()).collect::<Vec<_>>();

        let categories = spec
            .reference_phrases
            .iter()
            .map(|category| {
                let phrases = category
                    .phrases
                    .iter()
                    .map(|p| strip_whitespace(p))
                    .filter(|p| !p.is_empty())
                    .collect();
                (category.reference_type, phrases)
            })
            .collect();

        let families = spec
            .families
            .iter()
            .map(|family| ToolFamily {
                cues: lowercase(&family.cues),
                ..family.clone()
            })
            .collect();

        let content_types = spec
            .tools
            .iter()
            .map(|tool| (tool.id.clone(), lowercase(&tool.content_types)))
            .collect();

        let rewrite_styles = spec
            .tools
            .iter()
            .filter_map(|tool| tool.rewrite.clone().map(|style| (tool.id.clone(), style)))
            .collect();

        Self {
            categories,
            families,
            topic_cues: lowercase(&spec.topic_cues),
            preferred_family: spec.preferred_family.clone(),
            content_types,
            rewrite_styles,
            templates: spec.rewrite_templates.clone(),
        }
    }

    /// First category (declaration order) with a phrase occurring in the
    /// message. Whitespace is ignored on both sides. Plural demonstratives
    /// such as "이것들" contain "이것" and so resolve as `This`.
    pub fn detect(&self, message: &str) -> ReferenceAnalysis {
        let normalized = strip_whitespace(message);
        if normalized.is_empty() {
            return ReferenceAnalysis::none(message);
        }

        self.categories
            .iter()
            .find(|(_, phrases)| phrases.iter().any(|p| normalized.contains(p.as_str())))
            .map(|(reference_type, _)| ReferenceAnalysis::detected(message, *reference_type))
            .unwrap_or_else(|| ReferenceAnalysis::none(message))
    }

    /// Detect, pick a target turn from `history` (chronological) and rewrite.
    /// Without a reference or a target the message is returned unchanged.
    pub fn resolve(&self, message: &str, history: &[Turn], hint: Option<&ToolId>) -> ReferenceAnalysis {
        let analysis = self.detect(message);
        let Some(reference_type) = analysis.reference_type else {
            return analysis;
        };

        match self.find_target(message, history, hint) {
            Some(target) => {
                let rewritten = self.rewrite_with_context(message, target, reference_type);
                debug!(
                    reference_type = %reference_type,
                    target_tool = ?target.tool_used,
                    "Resolved reference against earlier turn"
                );
                analysis.resolved(target.clone(), rewritten)
            }
            None => {
                debug!(reference_type = %reference_type, "No context found for reference");
                analysis
            }
        }
    }

    pub fn find_target<'a>(&self, message: &str, history: &'a [Turn], hint: Option<&ToolId>) -> Option<&'a Turn> {
        let message_lower = message.to_lowercase();
        let domain = self
            .families
            .iter()
            .find(|family| family.cues.iter().any(|cue| message_lower.contains(cue.as_str())));
        let topic = self.topic_cues.iter().find(|cue| message_lower.contains(cue.as_str()));

        for turn in history.iter().rev() {
            let Some(tool_id) = turn.produced_by() else {
                continue;
            };
            let content = turn.content.to_lowercase();

            let accepted = match (domain, topic) {
                (Some(family), _) => {
                    family.contains(tool_id)
                        && family
                            .result_marker
                            .as_ref()
                            .map_or(true, |marker| turn.content.contains(marker.as_str()))
                        && topic.map_or(true, |cue| content.contains(cue.as_str()))
                }
                (None, Some(cue)) => content.contains(cue.as_str()),
                (None, None) => self.is_related(tool_id, hint, &message_lower),
            };

            if accepted {
                return Some(turn);
            }
        }

        let family = self
            .preferred_family
            .as_deref()
            .and_then(|name| self.families.iter().find(|f| f.name == name))?;

        let family_turns: Vec<&'a Turn> = history
            .iter()
            .rev()
            .filter(|turn| turn.produced_by().is_some_and(|tool| family.contains(tool)))
            .collect();

        family_turns
            .iter()
            .copied()
            .find(|turn| {
                let content = turn.content.to_lowercase();
                match topic {
                    Some(cue) => content.contains(cue.as_str()),
                    None => self.topic_cues.iter().any(|cue| content.contains(cue.as_str())),
                }
            })
            .or_else(|| family_turns.first().copied())
    }

    fn is_related(&self, previous: &ToolId, hint: Option<&ToolId>, message_lower: &str) -> bool {
        if let Some(hint) = hint {
            if hint == previous {
                return true;
            }
            if self
                .families
                .iter()
                .any(|family| family.contains(hint) && family.contains(previous))
            {
                return true;
            }
        }

        self.content_types
            .get(previous)
            .is_some_and(|words| words.iter().any(|w| message_lower.contains(w.as_str())))
    }

    /// Paraphrase `message` around `target`. Never fails; the worst case is
    /// the original message.
    pub fn rewrite_with_context(&self, message: &str, target: &Turn, reference_type: ReferenceType) -> String {
        if reference_type.is_positional() {
            if let Some(rewritten) = self.rewrite_positional(message, target) {
                return rewritten;
            }
        }

        match leading_keyword(&target.content, PREFIX_SCAN_CHARS) {
            Some(keyword) => render(
                &self.templates.keyword_prefix,
                &[("keyword", keyword), ("message", message)],
            ),
            None => message.to_string(),
        }
    }

    fn rewrite_positional(&self, message: &str, target: &Turn) -> Option<String> {
        let style = target.produced_by().and_then(|tool| self.rewrite_styles.get(tool))?;
        let intent = self.templates.intent_of(&message.to_lowercase());

        match style {
            RewriteStyle::Items { marker, subject } => {
                let items = extract_items(&target.content, marker);
                if items.is_empty() {
                    return None;
                }
                Some(render(
                    self.templates.items.for_intent(intent),
                    &[("subject", subject), ("items", &items.join(", ")), ("message", message)],
                ))
            }
            RewriteStyle::Summary { subject } => Some(render(
                self.templates.summary.for_intent(intent),
                &[("subject", subject), ("message", message)],
            )),
            RewriteStyle::Topic => {
                let topic = leading_keyword(&target.content, TOPIC_SCAN_CHARS)
                    .unwrap_or(&self.templates.missing_topic);
                Some(render(
                    self.templates.topic.for_intent(intent),
                    &[("topic", topic), ("message", message)],
                ))
            }
        }
    }
}

/// Text following each `marker`, sanitized, at most three
fn extract_items(content: &str, marker: &str) -> Vec<String> {
    content
        .lines()
        .flat_map(|line| line.split(marker).skip(1))
        .map(sanitize_item)
        .filter(|item| !item.is_empty())
        .take(MAX_ITEMS)
        .collect()
}

fn sanitize_item(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.chars().count() > MAX_ITEM_CHARS {
        format!("{}...", char_prefix(cleaned, MAX_ITEM_CHARS))
    } else {
        cleaned.to_string()
    }
}

fn leading_keyword(content: &str, scan_chars: usize) -> Option<&str> {
    WORD_RE.find(char_prefix(content, scan_chars)).map(|m| m.as_str())
}

fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |out, (name, value)| {
        out.replace(&format!("{{{name}}}"), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ReferenceResolver {
        ReferenceResolver::from_config(&DispatchConfigSpec::default())
    }

    fn tool_turn(tool: &str, content: &str) -> Turn {
        Turn::assistant(content, Some(ToolId::new(tool)))
    }

    #[test]
    fn test_detect_ignores_whitespace() {
        let resolver = resolver();
        for message in ["위에 검색한 영상", "위에검색한 영상", "위 에 검색한 영상"] {
            let analysis = resolver.detect(message);
            assert!(analysis.has_reference, "{message}");
            assert_eq!(analysis.reference_type, Some(ReferenceType::Above));
        }
    }

    #[test]
    fn test_detect_category_order_breaks_ties() {
        let resolver = resolver();
        // "이것들" also contains the earlier "this" phrase
        assert_eq!(resolver.detect("이것들 요약").reference_type, Some(ReferenceType::This));
        assert_eq!(resolver.detect("그것 어때?").reference_type, Some(ReferenceType::That));
        assert!(!resolver.detect("find me videos about Q").has_reference);
        assert!(!resolver.detect("").has_reference);
    }

    #[test]
    fn test_resolve_without_history_is_unchanged() {
        let analysis = resolver().resolve("이것 어때?", &[], None);
        assert!(analysis.has_reference);
        assert!(!analysis.context_found);
        assert_eq!(analysis.resolved_message, "이것 어때?");
        assert!(analysis.reference_target.is_none());
    }

    #[test]
    fn test_positional_reference_to_search_results_splices_items() {
        let history = vec![
            Turn::user("주식 유튜브 검색해줘"),
            tool_turn(
                "search_videos",
                "검색 결과입니다\n📺 삼성전자 주가 전망!! 2024\n📺 초보를 위한 ETF 투자 가이드 완전 정복 시리즈 제1편\n📺 배당주 고르는 법\n📺 네번째 영상",
            ),
        ];

        let analysis = resolver().resolve("위에 검색한 동영상들 요약해줘", &history, None);
        assert!(analysis.context_found);
        assert_eq!(
            analysis.resolved_message,
            "다음 유튜브 동영상들을 요약해주세요: 삼성전자 주가 전망 2024, 초보를 위한 ETF 투자 가이드 완전 정복 시리즈 제1..., 배당주 고르는 법"
        );
    }

    #[test]
    fn test_topic_cue_gate_prefers_topical_media_turn() {
        let history = vec![
            tool_turn("search_videos", "📺 주식 차트 읽는 법"),
            tool_turn("search_videos", "📺 고양이 브이로그"),
        ];

        let analysis = resolver().resolve("위에 검색한 주식 유튜브 영상 분석해줘", &history, None);
        let target = analysis.reference_target.unwrap();
        assert!(target.content.contains("주식"));
        assert_eq!(analysis.resolved_message, "다음 유튜브 동영상들을 분석해주세요: 주식 차트 읽는 법");
    }

    #[test]
    fn test_family_cue_requires_result_marker() {
        let history = vec![
            tool_turn("search_videos", "📺 첫번째 결과"),
            tool_turn("search_videos", "검색 결과가 없습니다"),
        ];

        let analysis = resolver().resolve("위에 나온 동영상 추천해줘", &history, None);
        assert_eq!(analysis.reference_target.unwrap().content, "📺 첫번째 결과");
    }

    #[test]
    fn test_content_type_relevance_and_topic_rewrite() {
        let history = vec![
            tool_turn("explain_concept", "블록체인은 분산 원장 기술입니다"),
            tool_turn("tell_joke", "프로그래머가 좋아하는 농담"),
        ];

        let analysis = resolver().resolve("앞서 말한 개념 다시", &history, None);
        assert_eq!(
            analysis.reference_target.as_ref().and_then(|t| t.tool_used.clone()),
            Some(ToolId::new("explain_concept"))
        );
        assert_eq!(analysis.resolved_message, "앞서 설명한 블록체인은에 대해 앞서 말한 개념 다시");
    }

    #[test]
    fn test_hint_family_matches_sibling_tool() {
        let history = vec![tool_turn("trending_videos", "오늘의 인기 목록")];
        let hint = ToolId::new("search_videos");

        let analysis = resolver().resolve("아까 검색 결과 요약", &history, Some(&hint));
        assert!(analysis.context_found);
        assert_eq!(analysis.resolved_message, "앞서 검색한 인기 동영상들을 요약해주세요");
    }

    #[test]
    fn test_falls_back_to_preferred_family() {
        let history = vec![
            tool_turn("search_videos", "📺 주식 투자 기초"),
            tool_turn("tell_joke", "재미있는 이야기 하나"),
        ];

        let analysis = resolver().resolve("그것 어때?", &history, None);
        assert!(analysis.context_found);
        assert_eq!(analysis.resolved_message, "주식에 대해 그것 어때?");
    }

    #[test]
    fn test_no_candidate_and_no_preferred_family_turn() {
        let history = vec![Turn::user("안녕"), tool_turn("tell_joke", "농담 하나")];
        let analysis = resolver().resolve("그것 어때?", &history, None);
        assert!(!analysis.context_found);
        assert_eq!(analysis.resolved_message, "그것 어때?");
    }

    #[test]
    fn test_items_without_markers_fall_back_to_keyword_prefix() {
        let resolver = resolver();
        let target = tool_turn("search_videos", "결과 없음");
        assert_eq!(
            resolver.rewrite_with_context("위에 요약", &target, ReferenceType::Above),
            "결과에 대해 위에 요약"
        );

        let empty = tool_turn("search_videos", "!!!");
        assert_eq!(
            resolver.rewrite_with_context("위에 요약", &empty, ReferenceType::Above),
            "위에 요약"
        );
    }
}
