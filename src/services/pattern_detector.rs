//! 模式检测 - 业务能力层
//!
//! 根据问题文本的关键词命中数选择最合适的模式。
//! 关键词方案可解释、速度快；误判由下游的豁免机制兜底

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::services::pattern_library::{by_priority_then_id, PatternLibrary};
use crate::models::pattern::FormatPattern;

/// 一次检测的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub pattern: FormatPattern,
    pub hits: usize,
    /// hits / 去重后的关键词数
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
}

/// 模式检测器
pub struct PatternDetector {
    library: Arc<PatternLibrary>,
    suggestion_limit: usize,
    low_confidence_threshold: f64,
    last_confidence: Mutex<f64>,
}

/// 小写、标点替换为空格、按空白切分
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// 按分词后的形式去重，保留首次出现的写法；分词后为空的关键词丢弃
fn distinct_keywords(keywords: &[String]) -> Vec<(String, &str)> {
    let mut seen = HashSet::new();
    keywords
        .iter()
        .filter_map(|keyword| {
            let needle = tokenize(keyword).join(" ");
            (!needle.is_empty() && seen.insert(needle.clone())).then(|| (needle, keyword.as_str()))
        })
        .collect()
}

impl PatternDetector {
    pub fn new(library: Arc<PatternLibrary>) -> Self {
        Self {
            library,
            suggestion_limit: 3,
            low_confidence_threshold: 0.34,
            last_confidence: Mutex::new(0.0),
        }
    }

    pub fn with_limits(mut self, suggestion_limit: usize, low_confidence_threshold: f64) -> Self {
        self.suggestion_limit = suggestion_limit;
        self.low_confidence_threshold = low_confidence_threshold;
        self
    }

    /// 检测问题最匹配的模式，没有任何关键词命中时返回 None
    ///
    /// 同时记录本次置信度，供 `get_confidence` 读取
    pub fn detect_pattern(&self, question_text: &str) -> Option<FormatPattern> {
        let detection = self.detect(question_text);
        let confidence = detection.as_ref().map(|d| d.confidence).unwrap_or(0.0);
        match self.last_confidence.lock() {
            Ok(mut last) => *last = confidence,
            Err(poisoned) => *poisoned.into_inner() = confidence,
        }
        detection.map(|d| d.pattern)
    }

    /// 上一次 `detect_pattern` 的置信度，范围 [0, 1]
    pub fn get_confidence(&self) -> f64 {
        match self.last_confidence.lock() {
            Ok(last) => *last,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// 无副作用的检测，返回完整命中信息
    pub fn detect(&self, question_text: &str) -> Option<Detection> {
        let best = self.rank(question_text).into_iter().next();
        match &best {
            Some(d) => debug!(
                "检测到模式 {} (命中 {} 个关键词, 置信度 {:.2})",
                d.pattern.id, d.hits, d.confidence
            ),
            None => debug!("未检测到匹配的模式"),
        }
        best
    }

    /// 候选模式列表，用于置信度低时让上层选择
    pub fn get_suggested_patterns(&self, question_text: &str) -> Vec<FormatPattern> {
        self.rank(question_text)
            .into_iter()
            .take(self.suggestion_limit)
            .map(|d| d.pattern)
            .collect()
    }

    pub fn is_low_confidence(&self, confidence: f64) -> bool {
        confidence < self.low_confidence_threshold
    }

    /// 所有命中 > 0 的模式，按命中数、优先级、ID 排序
    fn rank(&self, question_text: &str) -> Vec<Detection> {
        let haystack = format!(" {} ", tokenize(question_text).join(" "));

        let mut ranked: Vec<Detection> = self
            .library
            .snapshot()
            .values()
            .filter_map(|pattern| {
                let keywords = distinct_keywords(&pattern.keywords);
                let matched_keywords: Vec<String> = keywords
                    .iter()
                    .filter(|(needle, _)| haystack.contains(&format!(" {} ", needle)))
                    .map(|(_, keyword)| keyword.to_string())
                    .collect();

                let hits = matched_keywords.len();
                if hits == 0 {
                    return None;
                }
                Some(Detection {
                    pattern: pattern.clone(),
                    hits,
                    confidence: hits as f64 / keywords.len() as f64,
                    matched_keywords,
                })
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.hits
                .cmp(&a.hits)
                .then_with(|| by_priority_then_id(&a.pattern, &b.pattern))
        });
        ranked
    }
}
