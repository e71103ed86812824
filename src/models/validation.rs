use serde::{Deserialize, Serialize};

use crate::models::pattern::Severity;

/// 文本位置（1-based 行列号）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// 字节偏移区间 `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// 插入点（空区间）
    pub fn at(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// 修复类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixType {
    Insert,
    Replace,
    Delete,
    Reformat,
}

/// 结构化的修复描述
///
/// `target` 是应用前的预期状态：
/// - replace / delete / reformat：`range` 内的原文
/// - insert：插入点之前的上下文
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fix {
    pub fix_type: FixType,
    pub range: TextRange,
    pub target: String,
    pub replacement: String,
    pub description: String,
}

/// 一条校验违规
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationViolation {
    /// 规则 ID 或内置检查名
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<Fix>,
}

impl ValidationViolation {
    pub fn new(rule: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            severity,
            message: message.into(),
            location: None,
            fix: None,
        }
    }

    pub fn at(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    pub fn with_fix(mut self, fix: Fix) -> Self {
        self.fix = Some(fix);
        self
    }

    /// 是否可以被机械修复
    pub fn is_fixable(&self) -> bool {
        self.fix.is_some()
    }
}

impl std::fmt::Display for ValidationViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "[{}] {} ({}:{}) {}",
                self.severity, self.rule, loc.line, loc.column, self.message
            ),
            None => write!(f, "[{}] {} {}", self.severity, self.rule, self.message),
        }
    }
}

/// 校验结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub score: u32,
    /// 按严重程度排序，最严重的在前
    pub violations: Vec<ValidationViolation>,
    pub suggestions: Vec<String>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == Severity::Error)
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == severity)
            .count()
    }
}

/// 无法自动修复的违规对应的人工修改建议
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSuggestion {
    pub violation: ValidationViolation,
    pub fixes: Vec<Fix>,
    /// error:1, warning:2, info:3（越小越紧急）
    pub priority: u8,
    pub description: String,
}
