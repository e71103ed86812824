//! 内置模式集合
//!
//! 在没有外部模式定义文件时使用

use crate::models::pattern::{
    FormatPattern, FormatRule, PatternSection, RuleCheck, SectionConstraint, SectionFormat,
    Severity,
};

/// 构造段落
pub fn section(name: &str, required: bool, format: SectionFormat) -> PatternSection {
    PatternSection {
        name: name.to_string(),
        required,
        format,
        constraints: Vec::new(),
    }
}

/// 构造带约束的段落
pub fn section_with(
    name: &str,
    required: bool,
    format: SectionFormat,
    constraints: &[(&str, &str)],
) -> PatternSection {
    PatternSection {
        constraints: constraints
            .iter()
            .map(|(kind, value)| SectionConstraint {
                kind: kind.to_string(),
                value: value.to_string(),
            })
            .collect(),
        ..section(name, required, format)
    }
}

/// 构造规则
pub fn rule(id: &str, check: RuleCheck, severity: Severity, error_message: &str) -> FormatRule {
    FormatRule {
        id: id.to_string(),
        description: String::new(),
        check,
        error_message: error_message.to_string(),
        severity,
    }
}

fn regex_present(pattern: &str) -> RuleCheck {
    RuleCheck::RegexPresent {
        pattern: pattern.to_string(),
    }
}

pub fn comparison_table() -> FormatPattern {
    let mut pattern = FormatPattern::new("comparison-table", "Comparison Table")
        .with_keywords([
            "compare",
            "comparison",
            "vs",
            "versus",
            "difference",
            "differences",
            "better",
        ])
        .with_priority(10)
        .with_section(section("Overview", false, SectionFormat::Text))
        .with_section(section_with(
            "Comparison",
            true,
            SectionFormat::Table,
            &[("columns", "Aspect, Option A, Option B")],
        ))
        .with_section(section("Recommendation", false, SectionFormat::Text))
        .with_rule(rule(
            "has-recommendation",
            regex_present(r"(?i)\b(recommend|recommendation|conclusion|in summary|choose)\b"),
            Severity::Warning,
            "Comparison answers should end with a recommendation",
        ))
        .with_rule(rule(
            "min-length",
            RuleCheck::MinLength { chars: 150 },
            Severity::Warning,
            "Comparison answer is too short to cover both options",
        ));
    pattern.template = "## Overview\n\n## Comparison\n\n| Aspect | Option A | Option B |\n| --- | --- | --- |\n\n## Recommendation\n".to_string();
    pattern.examples = vec!["Redis vs Memcached for session storage".to_string()];
    pattern
}

pub fn step_by_step() -> FormatPattern {
    let mut pattern = FormatPattern::new("step-by-step", "Step-by-Step Process")
        .with_keywords([
            "how to", "how do i", "steps", "install", "setup", "set up", "configure", "guide",
        ])
        .with_priority(8)
        .with_section(section_with(
            "Steps",
            true,
            SectionFormat::Process,
            &[("min_items", "2")],
        ))
        .with_rule(rule(
            "numbered-steps",
            regex_present(r"(?m)^\s*\d+[.)]\s+\S"),
            Severity::Error,
            "Steps must be written as a numbered list",
        ));
    pattern.template = "## Steps\n\n1. \n2. \n3. \n".to_string();
    pattern.examples = vec!["How do I install the CLI on Ubuntu?".to_string()];
    pattern
}

pub fn code_example() -> FormatPattern {
    let mut pattern = FormatPattern::new("code-example", "Code Example")
        .with_keywords(["code", "example", "snippet", "implement", "function", "write"])
        .with_priority(7)
        .with_section(section("Explanation", true, SectionFormat::Text))
        .with_section(section("Code", true, SectionFormat::Code))
        .with_rule(rule(
            "explain-code",
            RuleCheck::MinLength { chars: 40 },
            Severity::Warning,
            "Code examples need a short explanation",
        ));
    pattern.template = "Short explanation.\n\n```language\n// code\n```\n".to_string();
    pattern.examples = vec!["Show an example function that parses a date".to_string()];
    pattern
}

pub fn troubleshooting() -> FormatPattern {
    let mut pattern = FormatPattern::new("troubleshooting", "Troubleshooting")
        .with_keywords([
            "error",
            "fix",
            "not working",
            "fails",
            "failing",
            "troubleshoot",
            "issue",
            "broken",
        ])
        .with_priority(9)
        .with_section(section("Symptoms", false, SectionFormat::Text))
        .with_section(section("Cause", false, SectionFormat::Text))
        .with_section(section("Solution", true, SectionFormat::Process))
        .with_rule(rule(
            "explains-cause",
            regex_present(r"(?i)\b(cause|because|due to|reason)\b"),
            Severity::Warning,
            "Troubleshooting answers should explain the cause",
        ));
    pattern.template = "## Symptoms\n\n## Cause\n\n## Solution\n\n1. \n".to_string();
    pattern.examples = vec!["The build fails with a linker error".to_string()];
    pattern
}

pub fn pros_cons() -> FormatPattern {
    let mut pattern = FormatPattern::new("pros-cons", "Pros and Cons")
        .with_keywords([
            "pros",
            "cons",
            "advantages",
            "disadvantages",
            "should i use",
            "worth it",
            "tradeoffs",
            "trade-offs",
        ])
        .with_priority(6)
        .with_section(section_with("Pros", true, SectionFormat::List, &[("min_items", "2")]))
        .with_section(section_with("Cons", true, SectionFormat::List, &[("min_items", "2")]))
        .with_rule(rule(
            "pros-heading",
            RuleCheck::RequiredSection {
                section: "Pros".to_string(),
            },
            Severity::Error,
            "Missing a 'Pros' section",
        ))
        .with_rule(rule(
            "cons-heading",
            RuleCheck::RequiredSection {
                section: "Cons".to_string(),
            },
            Severity::Error,
            "Missing a 'Cons' section",
        ));
    pattern.template = "## Pros\n\n- \n- \n\n## Cons\n\n- \n- \n".to_string();
    pattern.examples = vec!["Is Kubernetes worth it for a small team?".to_string()];
    pattern
}

pub fn architecture_diagram() -> FormatPattern {
    let mut pattern = FormatPattern::new("architecture-diagram", "Architecture Diagram")
        .with_keywords(["architecture", "diagram", "flow", "design", "components", "system"])
        .with_priority(5)
        .with_section(section("Diagram", true, SectionFormat::Diagram))
        .with_section(section("Components", false, SectionFormat::List))
        .with_rule(rule(
            "has-diagram",
            regex_present(r"```(mermaid|plantuml)|-->|->|┌"),
            Severity::Warning,
            "Architecture answers should include a diagram",
        ));
    pattern.template = "```mermaid\nflowchart LR\n  A --> B\n```\n\n## Components\n\n- \n".to_string();
    pattern.examples = vec!["What does the ingestion system architecture look like?".to_string()];
    pattern
}

/// 全部内置模式
pub fn builtin_patterns() -> Vec<FormatPattern> {
    vec![
        comparison_table(),
        step_by_step(),
        code_example(),
        troubleshooting(),
        pros_cons(),
        architecture_diagram(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_ids_unique() {
        let patterns = builtin_patterns();
        let ids: HashSet<_> = patterns.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids.len(), patterns.len());
    }

    #[test]
    fn test_builtin_regexes_compile() {
        for pattern in builtin_patterns() {
            for rule in &pattern.rules {
                if let RuleCheck::RegexPresent { pattern: re } | RuleCheck::RegexAbsent { pattern: re } =
                    &rule.check
                {
                    assert!(regex::Regex::new(re).is_ok(), "{} / {}", pattern.id, rule.id);
                }
            }
        }
    }
}
