// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Dispatch Configuration Types
//
// Defines the configuration schema of a Concierge dispatch engine:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Ordered tool registry with tiered keywords, patterns and argument rules
// - Tool families and topic cues driving reference resolution
// - Memory, storage, identity and pruner settings
//
// The built-in default carries the bilingual (Korean/English) lexicon.

use concierge_cortex::application::{KeywordPrunerConfig, DEFAULT_NEGATION_WORDS};
use concierge_cortex::domain::{
    KeywordExtractor, RegistryError, TieredKeywords, ToolDefinition, ToolId, ToolRegistry,
    DEFAULT_SESSION_WINDOW,
};
use concierge_cortex::infrastructure::DEFAULT_EMBEDDING_DIMENSIONS;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::reference::ReferenceType;

pub const API_VERSION: &str = "concierge.dev/v1";
pub const KIND: &str = "DispatchConfig";

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "CONCIERGE_CONFIG_PATH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid apiVersion: '{0}'. Must be 'concierge.dev/v1'")]
    InvalidApiVersion(String),

    #[error("Invalid kind: '{0}'. Must be 'DispatchConfig'")]
    InvalidKind(String),

    #[error("metadata.name cannot be empty")]
    EmptyName,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{context} references unknown tool '{tool_id}'")]
    UnknownTool { context: String, tool_id: ToolId },

    #[error("invalid pattern '{pattern}' for tool {tool_id}: {source}")]
    InvalidPattern {
        tool_id: ToolId,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("preferred_family '{0}' is not declared in families")]
    UnknownFamily(String),

    #[error("{0}")]
    Invalid(String),
}

/// Top-level Kubernetes-style dispatch configuration manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfigManifest {
    /// API version (must be "concierge.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "DispatchConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: DispatchConfigSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Content under `spec:`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfigSpec {
    /// Registry order is the tie-break for scoring and pattern matching
    pub tools: Vec<ToolConfig>,

    /// Used for empty messages and zero-confidence routes without a pattern
    pub fallback_tool: ToolId,

    #[serde(default)]
    pub families: Vec<ToolFamily>,

    /// Narrower cues (e.g. a market topic) that must match between message and target turn
    #[serde(default)]
    pub topic_cues: Vec<String>,

    /// Family consulted when no history turn passes the relevance gates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_family: Option<String>,

    /// Ordered; the first category with a matching phrase wins
    #[serde(default)]
    pub reference_phrases: Vec<ReferenceCategory>,

    #[serde(default)]
    pub rewrite_templates: RewriteTemplates,

    #[serde(default)]
    pub feedback: FeedbackConfig,

    #[serde(default)]
    pub stopwords: StopwordConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub pruner: KeywordPrunerConfig,
}

/// One routable tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub id: ToolId,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub keywords: TieredKeywords,

    #[serde(default)]
    pub relevance: Vec<String>,

    #[serde(default)]
    pub content_types: Vec<String>,

    /// Structural regexes, matched case-insensitively against the
    /// whitespace-collapsed message
    #[serde(default)]
    pub patterns: Vec<String>,

    #[serde(default)]
    pub arguments: ArgumentRule,

    /// How a positional reference to this tool's output is paraphrased
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<RewriteStyle>,
}

impl ToolConfig {
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            id: self.id.clone(),
            description: self.description.clone(),
            keywords: self.keywords.clone(),
            relevance: self.relevance.clone(),
            content_types: self.content_types.clone(),
        }
    }
}

/// How arguments are pulled out of the (resolved) message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArgumentRule {
    /// `{question: message}`
    #[default]
    Question,
    /// `{query, max_results}`; trigger terms are stripped from the message
    Query {
        #[serde(default)]
        strip_terms: Vec<String>,
        #[serde(default = "default_query_max_results")]
        max_results: u32,
    },
    /// `{concept}`: text before the first trigger
    Concept {
        #[serde(default)]
        triggers: Vec<String>,
    },
    /// `{video_id}`
    VideoId {
        #[serde(default = "default_video_id")]
        default_id: String,
    },
    /// `{region_code, max_results}`
    Region {
        #[serde(default)]
        regions: Vec<RegionCue>,
        #[serde(default = "default_region")]
        default_region: String,
        #[serde(default = "default_region_max_results")]
        max_results: u32,
    },
    /// `{topic}`: first token that is not a trigger
    Topic {
        #[serde(default)]
        triggers: Vec<String>,
        #[serde(default = "default_topic")]
        default_topic: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionCue {
    pub code: String,
    pub cues: Vec<String>,
}

/// Tools whose results are interchangeable as reference targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFamily {
    pub name: String,
    pub tools: Vec<ToolId>,
    /// Message words that restrict reference targets to this family
    #[serde(default)]
    pub cues: Vec<String>,
    /// When set, a target turn's content must contain it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_marker: Option<String>,
}

impl ToolFamily {
    pub fn contains(&self, tool_id: &ToolId) -> bool {
        self.tools.iter().any(|t| t == tool_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCategory {
    #[serde(rename = "type")]
    pub reference_type: ReferenceType,
    /// Literal phrases; whitespace is ignored on both sides when matching
    pub phrases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum RewriteStyle {
    /// Splice up to three items found after `marker` into the paraphrase
    Items { marker: String, subject: String },
    /// Fixed paraphrase naming `subject`
    Summary { subject: String },
    /// Paraphrase around the target's leading keyword
    Topic,
}

/// Intent of a message referring back to earlier output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteIntent {
    Summarize,
    Analyze,
    Recommend,
    Detail,
    Other,
}

/// Paraphrases per intent. Unset intents use `default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentTemplates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summarize: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyze: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub default: String,
}

impl IntentTemplates {
    pub fn for_intent(&self, intent: RewriteIntent) -> &str {
        let chosen = match intent {
            RewriteIntent::Summarize => self.summarize.as_deref(),
            RewriteIntent::Analyze => self.analyze.as_deref(),
            RewriteIntent::Recommend => self.recommend.as_deref(),
            RewriteIntent::Detail => self.detail.as_deref(),
            RewriteIntent::Other => None,
        };
        chosen.unwrap_or(&self.default)
    }
}

/// Rewrite templates. Placeholders: `{subject}`, `{items}`, `{topic}`,
/// `{keyword}` and `{message}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteTemplates {
    #[serde(default)]
    pub summarize_cues: Vec<String>,
    #[serde(default)]
    pub analyze_cues: Vec<String>,
    #[serde(default)]
    pub recommend_cues: Vec<String>,
    #[serde(default)]
    pub detail_cues: Vec<String>,
    pub items: IntentTemplates,
    pub summary: IntentTemplates,
    pub topic: IntentTemplates,
    /// Used by topic templates when the target has no leading keyword
    pub missing_topic: String,
    /// Fallback for non-positional references
    pub keyword_prefix: String,
}

impl RewriteTemplates {
    /// First intent whose cue occurs in the lowercased message
    pub fn intent_of(&self, message_lower: &str) -> RewriteIntent {
        let has = |cues: &[String]| cues.iter().any(|c| message_lower.contains(c.as_str()));
        if has(&self.summarize_cues) {
            RewriteIntent::Summarize
        } else if has(&self.analyze_cues) {
            RewriteIntent::Analyze
        } else if has(&self.recommend_cues) {
            RewriteIntent::Recommend
        } else if has(&self.detail_cues) {
            RewriteIntent::Detail
        } else {
            RewriteIntent::Other
        }
    }
}

impl Default for RewriteTemplates {
    fn default() -> Self {
        Self {
            summarize_cues: words(&["요약", "summarize", "summary"]),
            analyze_cues: words(&["분석", "analyze", "analysis"]),
            recommend_cues: words(&["추천", "recommend"]),
            detail_cues: words(&["자세히", "in detail", "more detail"]),
            items: IntentTemplates {
                summarize: Some("다음 {subject}을 요약해주세요: {items}".to_string()),
                analyze: Some("다음 {subject}을 분석해주세요: {items}".to_string()),
                recommend: Some("다음 {subject} 중에서 추천해주세요: {items}".to_string()),
                detail: None,
                default: "앞서 검색한 {subject}에 대해 {message}".to_string(),
            },
            summary: IntentTemplates {
                summarize: Some("앞서 검색한 {subject}을 요약해주세요".to_string()),
                analyze: Some("앞서 검색한 {subject}을 분석해주세요".to_string()),
                recommend: None,
                detail: None,
                default: "앞서 검색한 {subject}에 대해 {message}".to_string(),
            },
            topic: IntentTemplates {
                summarize: Some("{topic}에 대한 설명을 요약해주세요".to_string()),
                analyze: None,
                recommend: None,
                detail: Some("{topic}에 대해 더 자세히 설명해주세요".to_string()),
                default: "앞서 설명한 {topic}에 대해 {message}".to_string(),
            },
            missing_topic: "앞서 설명한 내용".to_string(),
            keyword_prefix: "{keyword}에 대해 {message}".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    #[serde(default = "default_negation_words")]
    pub negation_words: Vec<String>,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            negation_words: default_negation_words(),
        }
    }
}

/// Stopwords added to the built-in list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopwordConfig {
    #[serde(default)]
    pub extra: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Turns kept per user session
    #[serde(default = "default_session_window")]
    pub session_window: usize,

    /// Recent turns handed to the reference resolver
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Records recalled from vector memory when history has no target
    #[serde(default = "default_recall_k")]
    pub recall_k: usize,

    #[serde(default = "default_embedding_timeout_ms")]
    pub embedding_timeout_ms: u64,

    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,
}

impl MemoryConfig {
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_millis(self.embedding_timeout_ms)
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            session_window: default_session_window(),
            context_window: default_context_window(),
            recall_k: default_recall_k(),
            embedding_timeout_ms: default_embedding_timeout_ms(),
            embedding_dimensions: default_embedding_dimensions(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    InMemory,
    Sled,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database directory for the sled backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Salt for pseudonymous user ids
    #[serde(default = "default_identity_salt")]
    pub salt: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            salt: default_identity_salt(),
        }
    }
}

fn default_query_max_results() -> u32 {
    5
}

fn default_region_max_results() -> u32 {
    10
}

fn default_video_id() -> String {
    "dQw4w9WgXcQ".to_string()
}

fn default_region() -> String {
    "KR".to_string()
}

fn default_topic() -> String {
    "프로그래머".to_string()
}

fn default_negation_words() -> Vec<String> {
    words(DEFAULT_NEGATION_WORDS)
}

fn default_session_window() -> usize {
    DEFAULT_SESSION_WINDOW
}

fn default_context_window() -> usize {
    10
}

fn default_recall_k() -> usize {
    3
}

fn default_embedding_timeout_ms() -> u64 {
    500
}

fn default_embedding_dimensions() -> usize {
    DEFAULT_EMBEDDING_DIMENSIONS
}

fn default_identity_salt() -> String {
    "concierge".to_string()
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

fn tiers(high: &[&str], medium: &[&str], low: &[&str]) -> TieredKeywords {
    TieredKeywords {
        high: words(high),
        medium: words(medium),
        low: words(low),
    }
}

const MEDIA_FAMILY: &str = "media";
const VIDEO_MARKER: &str = "📺";

fn default_tools() -> Vec<ToolConfig> {
    vec![
        ToolConfig {
            id: ToolId::new("tell_joke"),
            description: "Tell a short joke about a topic".to_string(),
            keywords: tiers(
                &["농담", "재미있는", "웃긴", "유머", "joke", "jokes", "funny"],
                &["농담", "재미있는", "humor"],
                &["농담"],
            ),
            relevance: words(&["농담", "재미있는", "웃긴", "유머", "joke", "funny"]),
            content_types: words(&["농담", "유머", "joke"]),
            patterns: words(&["농담", "재미있는", "웃긴", "유머", r"\bjokes?\b", r"\bfunny\b"]),
            arguments: ArgumentRule::Topic {
                triggers: words(&[
                    "농담", "재미있는", "웃긴", "유머", "joke", "jokes", "funny", "tell", "me", "a",
                    "about",
                ]),
                default_topic: default_topic(),
            },
            rewrite: None,
        },
        ToolConfig {
            id: ToolId::new("summarize_video"),
            description: "Fetch a video's details and summarize them".to_string(),
            keywords: tiers(&["요약", "summarize", "summary"], &["상세", "확인"], &["정리"]),
            relevance: words(&["요약", "상세", "확인", "정리", "summarize", "summary"]),
            content_types: words(&["요약", "정리", "summary"]),
            patterns: words(&[
                r"상세\s*내용.*확인.*요약",
                r"상세\s*정보.*확인.*요약",
                r"상세\s*내용.*요약",
                r"확인.*요약",
                r"상세.*요약",
                r"내용.*요약",
                r"정보.*요약",
                r"확인하고\s*요약",
                r"상세\s*내용.*확인.*정리",
                r"상세\s*정보.*확인.*정리",
                r"\bsummari[sz]e\b.*\bvideo\b",
            ]),
            arguments: ArgumentRule::VideoId {
                default_id: default_video_id(),
            },
            rewrite: None,
        },
        ToolConfig {
            id: ToolId::new("video_full_content"),
            description: "Fetch the full description text of a video".to_string(),
            keywords: tiers(&["전체", "transcript"], &["모든", "본문"], &["텍스트"]),
            relevance: words(&["전체", "본문", "텍스트", "transcript"]),
            content_types: words(&["전체내용", "본문", "transcript"]),
            patterns: words(&[
                r"(전체|모든|완전한)\s*(내용|설명|텍스트|본문)",
                r"(내용|설명|텍스트|본문).*전체",
                r"전체.*(내용|설명|텍스트|본문)",
                r"\bfull\s+(content|transcript|description)\b",
            ]),
            arguments: ArgumentRule::VideoId {
                default_id: default_video_id(),
            },
            rewrite: None,
        },
        ToolConfig {
            id: ToolId::new("video_info"),
            description: "Look up title, views, likes and comments of a video".to_string(),
            keywords: tiers(
                &[
                    "정보", "상세", "조회수", "좋아요", "댓글", "id", "비디오정보", "영상정보", "views",
                    "likes", "comments",
                ],
                &["정보", "상세", "자세히", "details"],
                &["정보"],
            ),
            relevance: words(&[
                "정보", "상세", "조회수", "좋아요", "댓글", "id", "views", "likes", "comments",
            ]),
            content_types: words(&["비디오정보", "동영상정보", "상세정보", "details"]),
            patterns: words(&[
                r"(비디오|동영상|video)\s*id\s*[a-z0-9_-]+",
                r"(비디오|동영상)\s*(상세|자세히)",
                r"(비디오|영상) 정보",
                r"조회수",
                r"좋아요",
                r"댓글",
                r"[a-z0-9_-]{11}\s*(상세|정보)",
                r"제목.*(찾아줘|알려줘|검색|조회)",
                r"(유튜브|youtube|영상|비디오).*제목",
                r"youtube\.com/watch\?v=[a-z0-9_-]+",
                r"youtu\.be/[a-z0-9_-]+",
            ]),
            arguments: ArgumentRule::VideoId {
                default_id: default_video_id(),
            },
            rewrite: None,
        },
        ToolConfig {
            id: ToolId::new("search_videos"),
            description: "Search videos for a query".to_string(),
            keywords: tiers(
                &[
                    "유튜브", "youtube", "영상", "비디오", "검색", "찾아줘", "주식", "투자", "조선",
                    "한화", "videos", "video", "search", "find",
                ],
                &["동영상", "영상", "비디오", "검색", "찾아줘", "clips"],
                &["영상", "비디오", "clip"],
            ),
            relevance: words(&[
                "유튜브", "youtube", "영상", "비디오", "검색", "찾아줘", "주식", "투자", "조선", "한화",
                "video", "videos", "search", "find", "stock", "stocks",
            ]),
            content_types: words(&[
                "유튜브", "동영상", "비디오", "영상", "채널", "youtube", "video", "channel",
            ]),
            patterns: words(&[
                "유튜브",
                "youtube",
                "검색",
                "찾아줘",
                "영상",
                "비디오",
                "조선주",
                "한화오션",
                "주식",
                "투자",
                r"\bsearch\b",
                r"\bfind\b.*\b(videos?|clips?)\b",
            ]),
            arguments: ArgumentRule::Query {
                strip_terms: words(&[
                    "유튜브", "youtube", "검색", "찾아줘", "영상", "동영상", "비디오", "search", "find",
                    "show", "me", "video", "videos", "clips", "about", "for", "on", "please",
                ]),
                max_results: default_query_max_results(),
            },
            rewrite: Some(RewriteStyle::Items {
                marker: VIDEO_MARKER.to_string(),
                subject: "유튜브 동영상들".to_string(),
            }),
        },
        ToolConfig {
            id: ToolId::new("trending_videos"),
            description: "List currently trending videos for a region".to_string(),
            keywords: tiers(
                &["인기", "트렌딩", "trending", "인기동영상", "핫한", "popular"],
                &["인기", "트렌딩", "hot"],
                &["인기"],
            ),
            relevance: words(&["인기", "트렌딩", "trending", "인기동영상", "핫한", "popular"]),
            content_types: words(&["인기", "트렌딩", "인기동영상", "트렌드", "trending", "popular"]),
            patterns: words(&["인기", "트렌딩", "trending", "인기동영상", "핫한", r"\bpopular\b"]),
            arguments: ArgumentRule::Region {
                regions: vec![
                    RegionCue {
                        code: "US".to_string(),
                        cues: words(&["미국", "usa", "us", "america"]),
                    },
                    RegionCue {
                        code: "JP".to_string(),
                        cues: words(&["일본", "japan", "jp"]),
                    },
                    RegionCue {
                        code: "GB".to_string(),
                        cues: words(&["영국", "uk", "gb", "britain"]),
                    },
                ],
                default_region: default_region(),
                max_results: default_region_max_results(),
            },
            rewrite: Some(RewriteStyle::Summary {
                subject: "인기 동영상들".to_string(),
            }),
        },
        ToolConfig {
            id: ToolId::new("ask_assistant"),
            description: "Answer a free-form question".to_string(),
            keywords: tiers(
                &[
                    "질문", "궁금", "알려줘", "뭐야", "어떻게", "왜", "언제", "어디서", "question", "how",
                    "why", "when", "where",
                ],
                &["질문", "궁금", "알려줘", "tell"],
                &["질문"],
            ),
            relevance: words(&[
                "질문", "궁금", "알려줘", "뭐야", "어떻게", "왜", "언제", "어디서", "question", "how",
                "why", "when", "where",
            ]),
            content_types: words(&["설명", "답변", "정보", "내용", "answer"]),
            patterns: words(&[
                "질문",
                "궁금",
                "알려줘",
                "뭐야",
                "어떻게",
                "왜",
                "언제",
                "어디서",
                r"^(what|how|why|when|where|who)\b",
            ]),
            arguments: ArgumentRule::Question,
            rewrite: Some(RewriteStyle::Topic),
        },
        ToolConfig {
            id: ToolId::new("explain_concept"),
            description: "Explain a concept in plain words".to_string(),
            keywords: tiers(
                &[
                    "설명", "뜻", "의미", "개념", "이해", "explain", "concept", "meaning", "define",
                ],
                &["설명", "뜻", "의미", "definition"],
                &["설명"],
            ),
            relevance: words(&[
                "설명", "뜻", "의미", "개념", "이해", "explain", "concept", "meaning", "define",
            ]),
            content_types: words(&["개념", "설명", "이해", "정의", "concept", "definition"]),
            patterns: words(&[
                "설명",
                "뜻",
                "의미",
                "개념",
                "이해",
                r"\bexplain\b",
                r"\bconcept\b",
                r"\bmeaning\b",
            ]),
            arguments: ArgumentRule::Concept {
                triggers: words(&[
                    "설명", "의미", "뜻", "개념", "이해", "explain", "meaning", "concept", "define",
                ]),
            },
            rewrite: Some(RewriteStyle::Topic),
        },
    ]
}

fn default_reference_phrases() -> Vec<ReferenceCategory> {
    let category = |reference_type, phrases: &[&str]| ReferenceCategory {
        reference_type,
        phrases: words(phrases),
    };

    vec![
        category(
            ReferenceType::Above,
            &["위에검색한", "위에나온", "위에있는", "위의검색", "위에서검색", "위검색한", "위에", "above"],
        ),
        category(ReferenceType::Below, &["아래에", "아래의", "아래에서", "below"]),
        category(
            ReferenceType::Previous,
            &[
                "앞서검색한",
                "앞서말한",
                "앞서언급한",
                "이전에검색",
                "앞에말한",
                "앞에언급한",
                "previous",
                "you mentioned",
            ],
        ),
        category(
            ReferenceType::Recent,
            &["최근에검색", "방금전검색", "조금전검색", "아까검색", "just searched"],
        ),
        category(
            ReferenceType::Last,
            &["마지막에검색", "끝에검색", "마지막검색", "last one"],
        ),
        category(ReferenceType::Earlier, &["일찍이", "먼저", "처음에", "earlier"]),
        category(ReferenceType::Later, &["나중에", "그다음", "그후", "later on"]),
        category(ReferenceType::This, &["이것", "이거", "이내용", "이정보", "this one"]),
        category(ReferenceType::That, &["그것", "그거", "그내용", "그정보", "that one"]),
        category(ReferenceType::These, &["이것들", "이거들", "이내용들", "these ones"]),
        category(ReferenceType::Those, &["그것들", "그거들", "그내용들", "those ones"]),
    ]
}

impl Default for DispatchConfigSpec {
    fn default() -> Self {
        Self {
            tools: default_tools(),
            fallback_tool: ToolId::new("ask_assistant"),
            families: vec![ToolFamily {
                name: MEDIA_FAMILY.to_string(),
                tools: vec![ToolId::new("search_videos"), ToolId::new("trending_videos")],
                cues: words(&["유튜브", "동영상", "비디오", "youtube", "video", "videos"]),
                result_marker: Some(VIDEO_MARKER.to_string()),
            }],
            topic_cues: words(&["주식", "투자", "stock", "stocks", "invest"]),
            preferred_family: Some(MEDIA_FAMILY.to_string()),
            reference_phrases: default_reference_phrases(),
            rewrite_templates: RewriteTemplates::default(),
            feedback: FeedbackConfig::default(),
            stopwords: StopwordConfig::default(),
            memory: MemoryConfig::default(),
            storage: StorageConfig::default(),
            identity: IdentityConfig::default(),
            pruner: KeywordPrunerConfig::default(),
        }
    }
}

impl Default for DispatchConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "concierge".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: DispatchConfigSpec::default(),
        }
    }
}

impl DispatchConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. CONCIERGE_CONFIG_PATH environment variable
    /// 2. ./concierge-config.yaml (working directory)
    /// 3. ~/.concierge/config.yaml (user home)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./concierge-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".concierge").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to the built-in default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::info!("No configuration file found in standard locations. Using built-in lexicon.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("CONCIERGE_STORAGE_PATH") {
            if !path.trim().is_empty() {
                tracing::info!("Environment override: CONCIERGE_STORAGE_PATH={}", path);
                self.spec.storage.backend = StorageBackend::Sled;
                self.spec.storage.path = Some(PathBuf::from(path));
            }
        }

        if let Ok(salt) = std::env::var("CONCIERGE_IDENTITY_SALT") {
            tracing::info!("Environment override: CONCIERGE_IDENTITY_SALT");
            self.spec.identity.salt = salt;
        }

        if let Ok(val) = std::env::var("CONCIERGE_EMBEDDING_TIMEOUT_MS") {
            match val.trim().parse::<u64>() {
                Ok(ms) => {
                    tracing::info!("Environment override: CONCIERGE_EMBEDDING_TIMEOUT_MS={}", ms);
                    self.spec.memory.embedding_timeout_ms = ms;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for CONCIERGE_EMBEDDING_TIMEOUT_MS: '{}'. Expected milliseconds. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration eagerly; every error here is fatal at startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_version != API_VERSION {
            return Err(ConfigError::InvalidApiVersion(self.api_version.clone()));
        }

        if self.kind != KIND {
            return Err(ConfigError::InvalidKind(self.kind.clone()));
        }

        if self.metadata.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }

        let spec = &self.spec;
        let registry = self.registry()?;

        let require = |context: &str, tool_id: &ToolId| {
            if registry.contains(tool_id) {
                Ok(())
            } else {
                Err(ConfigError::UnknownTool {
                    context: context.to_string(),
                    tool_id: tool_id.clone(),
                })
            }
        };

        require("fallback_tool", &spec.fallback_tool)?;

        let mut family_names = HashSet::new();
        for family in &spec.families {
            if family.name.trim().is_empty() {
                return Err(ConfigError::Invalid("family name cannot be empty".to_string()));
            }
            if !family_names.insert(family.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate family '{}'", family.name)));
            }
            for tool_id in &family.tools {
                require(&format!("family '{}'", family.name), tool_id)?;
            }
        }

        if let Some(preferred) = &spec.preferred_family {
            if !family_names.contains(preferred.as_str()) {
                return Err(ConfigError::UnknownFamily(preferred.clone()));
            }
        }

        for tool in &spec.tools {
            for pattern in &tool.patterns {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigError::InvalidPattern {
                        tool_id: tool.id.clone(),
                        pattern: pattern.clone(),
                        source,
                    })?;
            }

            match &tool.arguments {
                ArgumentRule::VideoId { default_id } if default_id.trim().is_empty() => {
                    return Err(ConfigError::Invalid(format!(
                        "tool {} declares an empty default video id",
                        tool.id
                    )));
                }
                ArgumentRule::Region { default_region, .. } if default_region.trim().is_empty() => {
                    return Err(ConfigError::Invalid(format!(
                        "tool {} declares an empty default region",
                        tool.id
                    )));
                }
                _ => {}
            }
        }

        for category in &spec.reference_phrases {
            if category.phrases.iter().any(|p| p.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "empty phrase in reference category '{}'",
                    category.reference_type
                )));
            }
        }

        if spec.memory.session_window == 0 {
            return Err(ConfigError::Invalid("memory.session_window must be at least 1".to_string()));
        }

        if spec.storage.backend == StorageBackend::Sled && spec.storage.path.is_none() {
            return Err(ConfigError::Invalid("storage.path is required for the sled backend".to_string()));
        }

        Ok(())
    }

    /// Ordered tool registry built from `spec.tools`
    pub fn registry(&self) -> Result<ToolRegistry, RegistryError> {
        ToolRegistry::new(self.spec.tools.iter().map(ToolConfig::definition).collect())
    }

    /// Base pattern table in registry order
    pub fn base_patterns(&self) -> Vec<(ToolId, Vec<String>)> {
        self.spec
            .tools
            .iter()
            .map(|tool| (tool.id.clone(), tool.patterns.clone()))
            .collect()
    }

    pub fn keyword_extractor(&self) -> KeywordExtractor {
        KeywordExtractor::extended(self.spec.stopwords.extra.iter().cloned())
    }

    pub fn tool(&self, tool_id: &ToolId) -> Option<&ToolConfig> {
        self.spec.tools.iter().find(|tool| &tool.id == tool_id)
    }

    pub fn family(&self, name: &str) -> Option<&ToolFamily> {
        self.spec.families.iter().find(|family| family.name == name)
    }
}
