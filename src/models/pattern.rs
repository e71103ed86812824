use serde::{Deserialize, Serialize};

/// 严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// 排序用等级，数字越小越严重
    pub fn rank(self) -> u8 {
        match self {
            Severity::Error => 1,
            Severity::Warning => 2,
            Severity::Info => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 段落格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionFormat {
    Text,
    List,
    Table,
    Code,
    Diagram,
    Process,
    ProsCons,
    Troubleshooting,
}

/// 段落约束，例如 `{ type = "columns", value = "Feature, A, B" }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionConstraint {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// 模式中的一个段落
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSection {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    pub format: SectionFormat,
    #[serde(default)]
    pub constraints: Vec<SectionConstraint>,
}

impl PatternSection {
    /// 查找指定类型的约束值
    pub fn constraint(&self, kind: &str) -> Option<&str> {
        self.constraints
            .iter()
            .find(|c| c.kind.eq_ignore_ascii_case(kind))
            .map(|c| c.value.as_str())
    }

    /// 表格列提示（`columns` 约束，逗号分隔）
    pub fn column_hints(&self) -> Vec<String> {
        match self.constraint("columns") {
            Some(value) => value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => Vec::new(),
        }
    }

    /// 列表最少条目数（`min_items` 约束）
    pub fn min_items(&self) -> Option<usize> {
        self.constraint("min_items").and_then(|v| v.trim().parse().ok())
    }
}

/// 规则检查方式
///
/// 大多数规则是数据；`Custom` 通过名字引用在校验器上注册的谓词
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCheck {
    /// 必须包含指定标题的段落
    RequiredSection { section: String },
    /// 必须匹配正则
    RegexPresent { pattern: String },
    /// 不得匹配正则
    RegexAbsent { pattern: String },
    /// 最少字符数
    MinLength { chars: usize },
    /// 最多字符数
    MaxLength { chars: usize },
    /// 自定义谓词
    Custom { predicate: String },
}

/// 格式规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatRule {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub check: RuleCheck,
    pub error_message: String,
    pub severity: Severity,
}

/// 模式结构
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PatternStructure {
    #[serde(default)]
    pub sections: Vec<PatternSection>,
}

/// 答案格式模式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatPattern {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub structure: PatternStructure,
    #[serde(default)]
    pub rules: Vec<FormatRule>,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// 未匹配到模式时使用的空模式 ID
pub const FREE_FORM_PATTERN_ID: &str = "free-form";

impl FormatPattern {
    /// 创建只有 ID 和名称的空模式
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            keywords: Vec::new(),
            priority: 0,
            structure: PatternStructure::default(),
            rules: Vec::new(),
            template: String::new(),
            examples: Vec::new(),
        }
    }

    /// 自由格式：没有段落也没有规则，永远通过
    pub fn free_form() -> Self {
        Self::new(FREE_FORM_PATTERN_ID, "Free Form")
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_section(mut self, section: PatternSection) -> Self {
        self.structure.sections.push(section);
        self
    }

    pub fn with_rule(mut self, rule: FormatRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// 必填段落
    pub fn required_sections(&self) -> impl Iterator<Item = &PatternSection> {
        self.structure.sections.iter().filter(|s| s.required)
    }

    pub fn has_required_sections(&self) -> bool {
        self.required_sections().next().is_some()
    }
}

impl std::fmt::Display for FormatPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_check_toml_roundtrip_shape() {
        let rule: FormatRule = toml::from_str(
            r#"
            id = "no-todo"
            severity = "warning"
            error_message = "Answer contains TODO markers"
            check = { type = "regex_absent", pattern = "(?i)\\btodo\\b" }
            "#,
        )
        .unwrap();

        assert_eq!(rule.severity, Severity::Warning);
        assert_eq!(
            rule.check,
            RuleCheck::RegexAbsent {
                pattern: "(?i)\\btodo\\b".to_string()
            }
        );
    }

    #[test]
    fn test_section_column_hints() {
        let section = PatternSection {
            name: "Comparison".to_string(),
            required: true,
            format: SectionFormat::Table,
            constraints: vec![SectionConstraint {
                kind: "columns".to_string(),
                value: "Feature, Redis ,Memcached,".to_string(),
            }],
        };
        assert_eq!(section.column_hints(), vec!["Feature", "Redis", "Memcached"]);
        assert_eq!(section.min_items(), None);
    }

    #[test]
    fn test_section_format_kebab_case() {
        let format: SectionFormat = serde_json::from_str("\"pros-cons\"").unwrap();
        assert_eq!(format, SectionFormat::ProsCons);
    }

    #[test]
    fn test_free_form_has_no_requirements() {
        let pattern = FormatPattern::free_form();
        assert!(!pattern.has_required_sections());
        assert!(pattern.rules.is_empty());
    }
}
