//! 自动格式化 - 业务能力层
//!
//! 只应用有结构化修复描述的违规，其余的转成人工修改建议

use std::sync::Arc;

use tracing::debug;

use crate::models::pattern::FormatPattern;
use crate::models::validation::{Fix, FixType, FormatSuggestion, ValidationResult};
use crate::services::format_validator::{suggestion_for, FormatValidator};

/// 应用单个修复
///
/// 预期的原文与当前文本不一致时什么都不做，因此重复应用是安全的
pub fn apply_fix(text: &str, fix: &Fix) -> String {
    let (start, end) = (fix.range.start, fix.range.end);
    if start > end
        || end > text.len()
        || !text.is_char_boundary(start)
        || !text.is_char_boundary(end)
    {
        debug!("修复区间无效，跳过: {}", fix.description);
        return text.to_string();
    }

    let applies = match fix.fix_type {
        FixType::Insert => {
            fix.range.is_empty()
                && text[..start].ends_with(fix.target.as_str())
                && !text[start..].starts_with(fix.replacement.as_str())
        }
        FixType::Replace | FixType::Reformat | FixType::Delete => text[start..end] == fix.target,
    };
    if !applies {
        debug!("文本已不是修复前的状态，跳过: {}", fix.description);
        return text.to_string();
    }

    let replacement = match fix.fix_type {
        FixType::Delete => "",
        _ => fix.replacement.as_str(),
    };
    let mut output = String::with_capacity(text.len() + replacement.len());
    output.push_str(&text[..start]);
    output.push_str(replacement);
    output.push_str(&text[end..]);
    output
}

/// 自动格式化器
pub struct AutoFormatter {
    validator: Arc<FormatValidator>,
}

impl AutoFormatter {
    pub fn new(validator: Arc<FormatValidator>) -> Self {
        Self { validator }
    }

    /// 应用所有可机械修复的违规
    ///
    /// 按位置从后往前应用，前面的偏移不会被后面的修改影响。不会失败
    pub fn format(&self, answer_text: &str, pattern: &FormatPattern) -> String {
        let result = self.validator.check(answer_text, pattern);

        let mut fixes: Vec<&Fix> = result
            .violations
            .iter()
            .filter_map(|v| v.fix.as_ref())
            .collect();
        fixes.sort_by(|a, b| {
            b.range
                .start
                .cmp(&a.range.start)
                .then_with(|| b.range.end.cmp(&a.range.end))
        });

        debug!("模式 {} 可自动修复 {} 处", pattern.id, fixes.len());
        fixes
            .into_iter()
            .fold(answer_text.to_string(), |text, fix| apply_fix(&text, fix))
    }

    /// 应用单个修复
    pub fn apply_fix(&self, answer_text: &str, fix: &Fix) -> String {
        apply_fix(answer_text, fix)
    }

    /// 为无法自动修复的违规生成人工修改建议
    pub fn suggest_fixes(&self, result: &ValidationResult) -> Vec<FormatSuggestion> {
        result
            .violations
            .iter()
            .filter(|v| !v.is_fixable())
            .map(|v| FormatSuggestion {
                violation: v.clone(),
                fixes: Vec::new(),
                priority: v.severity.rank(),
                description: format!("[{}] {}", v.severity, suggestion_for(v)),
            })
            .collect()
    }
}
