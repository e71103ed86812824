//! 格式校验 - 业务能力层
//!
//! 按模式的段落和规则检查答案，输出按严重程度排序的违规列表和分数。
//! 校验结果是内容质量结论，不是错误；相同输入永远得到相同结果

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock};

use once_cell::sync::Lazy;
use phf::phf_map;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::ScoringConfig;
use crate::models::pattern::{FormatPattern, FormatRule, PatternSection, RuleCheck, SectionFormat, Severity};
use crate::models::validation::{Fix, FixType, TextRange, ValidationResult, ValidationViolation};
use crate::utils::TextIndex;

/// 内置检查名
pub mod checks {
    pub const EMPTY_ANSWER: &str = "empty-answer";
    pub const MISSING_TABLE: &str = "missing-table";
    pub const VAGUE_PROCESS_STEPS: &str = "vague-process-steps";
    pub const CODE_BLOCK_LANGUAGE: &str = "code-block-language";
    pub const MISSING_CODE_BLOCK: &str = "missing-code-block";
    pub const INSUFFICIENT_LIST_ITEMS: &str = "insufficient-list-items";
}

/// 自定义谓词：返回 Ok(true) 表示通过，Err 表示谓词本身执行失败
pub type CustomPredicate = Arc<dyn Fn(&str) -> Result<bool, String> + Send + Sync>;

static VAGUE_PHRASING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)should\s+be|need\s+to\s+run|check\s+if").unwrap());
static NUMBERED_STEP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\d+[.)]\s+\S").unwrap());
static LIST_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([-*+]|\d+[.)])\s+\S").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`\n]+`").unwrap());
static TABLE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\|.*\|\s*$").unwrap());
static TABLE_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\|?\s*:?-{3,}:?\s*(\|\s*:?-{3,}:?\s*)*\|?\s*$").unwrap()
});

/// 代码特征 → 语言
static LANGUAGE_MARKERS: phf::Map<&'static str, &'static str> = phf_map! {
    "fn " => "rust",
    "let mut " => "rust",
    "println!" => "rust",
    "impl " => "rust",
    "use std" => "rust",
    "def " => "python",
    "elif " => "python",
    "print(" => "python",
    "self." => "python",
    "function " => "javascript",
    "console.log" => "javascript",
    "=>" => "javascript",
    "require(" => "javascript",
    "#include" => "c",
    "printf(" => "c",
    "int main" => "c",
    "select " => "sql",
    "insert into" => "sql",
    "create table" => "sql",
    "sudo " => "bash",
    "apt " => "bash",
    "npm " => "bash",
    "cargo " => "bash",
    "echo " => "bash",
    "pip install" => "bash",
    "public class" => "java",
    "system.out" => "java",
    "package main" => "go",
    "func " => "go",
    ":=" => "go",
    "apiversion:" => "yaml",
    "kind:" => "yaml",
    "<div" => "html",
    "</" => "html",
};

const DEFAULT_TABLE_COLUMNS: [&str; 3] = ["Aspect", "Option A", "Option B"];

/// 一个围栏代码块
#[derive(Debug, Clone)]
struct CodeFence<'a> {
    /// 开始行的字节区间（不含换行）
    open_start: usize,
    open_end: usize,
    open_line: &'a str,
    info: &'a str,
    body: &'a str,
    /// 未闭合的块延伸到文本末尾
    closed: bool,
}

/// 扫描围栏代码块，未闭合的块延伸到文本末尾
fn scan_code_fences(text: &str) -> Vec<CodeFence<'_>> {
    let mut fences = Vec::new();
    let mut open: Option<(usize, usize, &str, &str, usize)> = None;
    let mut offset = 0;

    for raw_line in text.split_inclusive('\n') {
        let line = raw_line.trim_end_matches(|c: char| c == '\n' || c == '\r');
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            match open.take() {
                None => {
                    let info = trimmed.trim_start_matches('`').trim();
                    open = Some((offset, offset + line.len(), line, info, offset + raw_line.len()));
                }
                Some((open_start, open_end, open_line, info, body_start)) => {
                    fences.push(CodeFence {
                        open_start,
                        open_end,
                        open_line,
                        info,
                        body: &text[body_start..offset],
                        closed: true,
                    });
                }
            }
        }
        offset += raw_line.len();
    }

    if let Some((open_start, open_end, open_line, info, body_start)) = open {
        fences.push(CodeFence {
            open_start,
            open_end,
            open_line,
            info,
            body: &text[body_start.min(text.len())..],
            closed: false,
        });
    }
    fences
}

/// 围栏代码块之外的行（行首字节偏移, 行内容）
fn lines_outside_fences(text: &str) -> Vec<(usize, &str)> {
    let mut lines = Vec::new();
    let mut in_fence = false;
    let mut offset = 0;
    for raw_line in text.split_inclusive('\n') {
        let line = raw_line.trim_end_matches(|c: char| c == '\n' || c == '\r');
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        } else if !in_fence {
            lines.push((offset, line));
        }
        offset += raw_line.len();
    }
    lines
}

/// 判断一行是否是标题，返回标题文本
///
/// 支持 `## Name`、`**Name**`、`Name:` 三种写法
fn heading_title(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let looks_like_heading =
        trimmed.starts_with('#') || trimmed.starts_with("**") || trimmed.ends_with(':');
    if !looks_like_heading {
        return None;
    }
    let title = trimmed
        .trim_start_matches('#')
        .trim_matches(|c: char| c == '*' || c == '_' || c == ':' || c.is_whitespace());
    (!title.is_empty() && title.chars().count() <= 80).then_some(title)
}

fn is_heading_for(line: &str, section_name: &str) -> bool {
    let Some(title) = heading_title(line) else {
        return false;
    };
    let title = title.to_lowercase();
    let name = section_name.trim().to_lowercase();
    title == name || title.starts_with(&format!("{} ", name))
}

/// 段落正文：从匹配的标题到下一个标题；找不到标题时返回全文
fn section_body<'a>(text: &'a str, section_name: &str) -> &'a str {
    let lines = lines_outside_fences(text);
    let Some(pos) = lines.iter().position(|(_, l)| is_heading_for(l, section_name)) else {
        return text;
    };
    let (heading_offset, heading_line) = lines[pos];
    let start = (heading_offset + heading_line.len() + 1).min(text.len());
    let end = lines[pos + 1..]
        .iter()
        .find(|(_, l)| heading_title(l).is_some())
        .map(|(offset, _)| *offset)
        .unwrap_or(text.len());
    &text[start..end.max(start)]
}

fn count_tables(text: &str) -> usize {
    let lines = lines_outside_fences(text);
    lines
        .windows(2)
        .filter(|pair| TABLE_ROW.is_match(pair[0].1) && TABLE_SEPARATOR.is_match(pair[1].1))
        .count()
}

fn count_list_items(text: &str) -> usize {
    lines_outside_fences(text)
        .iter()
        .filter(|(_, l)| LIST_ITEM.is_match(l))
        .count()
}

/// 根据代码特征猜测语言，平局按语言名排序，没有特征时返回 "text"
pub fn detect_language(code: &str) -> &'static str {
    let lowered = code.to_lowercase();
    let mut scores: HashMap<&'static str, usize> = HashMap::new();
    for (marker, language) in LANGUAGE_MARKERS.entries() {
        if lowered.contains(*marker) {
            *scores.entry(*language).or_default() += 1;
        }
    }
    scores
        .into_iter()
        .max_by(|(la, sa), (lb, sb)| sa.cmp(sb).then_with(|| lb.cmp(la)))
        .map(|(language, _)| language)
        .unwrap_or("text")
}

/// 文本末尾最多 `max_chars` 个字符
fn tail(text: &str, max_chars: usize) -> &str {
    let start = text
        .char_indices()
        .rev()
        .nth(max_chars.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    &text[start..]
}

fn table_skeleton(section: &PatternSection) -> String {
    let mut columns = section.column_hints();
    if columns.is_empty() {
        columns = DEFAULT_TABLE_COLUMNS.iter().map(|s| s.to_string()).collect();
    }
    let header = format!("| {} |", columns.join(" | "));
    let separator = format!("| {} |", vec!["---"; columns.len()].join(" | "));
    let row = format!("|{}", "  |".repeat(columns.len()));
    format!("## {}\n\n{}\n{}\n{}\n", section.name, header, separator, row)
}

/// 格式校验器
pub struct FormatValidator {
    scoring: ScoringConfig,
    predicates: RwLock<HashMap<String, CustomPredicate>>,
    regex_cache: Mutex<HashMap<String, Regex>>,
    last_result: Mutex<Option<ValidationResult>>,
}

impl Default for FormatValidator {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl FormatValidator {
    /// 创建新的校验器
    pub fn new(scoring: ScoringConfig) -> Self {
        Self {
            scoring,
            predicates: RwLock::new(HashMap::new()),
            regex_cache: Mutex::new(HashMap::new()),
            last_result: Mutex::new(None),
        }
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    /// 注册自定义谓词，供 `RuleCheck::Custom` 按名字引用
    pub fn register_predicate<F>(&self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&str) -> Result<bool, String> + Send + Sync + 'static,
    {
        let mut guard = match self.predicates.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.insert(name.into(), Arc::new(predicate));
    }

    /// 校验答案
    ///
    /// # 参数
    /// - `answer_text`: 答案正文（Markdown）
    /// - `pattern`: 目标模式
    ///
    /// # 返回
    /// 返回校验结果，同时保存为"上一次结果"
    pub fn validate(&self, answer_text: &str, pattern: &FormatPattern) -> ValidationResult {
        let result = self.check(answer_text, pattern);
        debug!(
            "校验完成: 模式 {} | 分数 {} | 违规 {} 条 | 通过: {}",
            pattern.id,
            result.score,
            result.violations.len(),
            result.is_valid
        );
        match self.last_result.lock() {
            Ok(mut last) => *last = Some(result.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(result.clone()),
        }
        result
    }

    /// 上一次校验的违规列表
    pub fn get_violations(&self) -> Vec<ValidationViolation> {
        self.last()
            .map(|r| r.violations)
            .unwrap_or_default()
    }

    /// 上一次校验的修改建议
    pub fn get_suggestions(&self) -> Vec<String> {
        self.last()
            .map(|r| r.suggestions)
            .unwrap_or_default()
    }

    fn last(&self) -> Option<ValidationResult> {
        match self.last_result.lock() {
            Ok(last) => last.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 无副作用的校验，不更新"上一次结果"
    pub fn check(&self, answer: &str, pattern: &FormatPattern) -> ValidationResult {
        if answer.trim().is_empty() && pattern.has_required_sections() {
            let violations = vec![ValidationViolation::new(
                checks::EMPTY_ANSWER,
                Severity::Error,
                "Answer is empty",
            )];
            let suggestions = vec![format!(
                "Write an answer following the '{}' structure",
                pattern.name
            )];
            return ValidationResult {
                is_valid: false,
                score: 0,
                violations,
                suggestions,
            };
        }

        let index = TextIndex::new(answer);
        let mut violations = Vec::new();

        self.check_sections(answer, pattern, &index, &mut violations);
        for rule in &pattern.rules {
            if let Some(violation) = self.check_rule(rule, answer, &index) {
                violations.push(violation);
            }
        }

        violations.sort_by_key(|v| v.severity.rank());
        let score = self.score(&violations);
        let suggestions = derive_suggestions(&violations);

        let mut result = ValidationResult {
            is_valid: false,
            score,
            violations,
            suggestions,
        };
        result.is_valid = score >= self.scoring.pass_threshold && !result.has_errors();
        result
    }

    /// 100 起扣，结果限制在 [0, 100]
    fn score(&self, violations: &[ValidationViolation]) -> u32 {
        let penalty: u32 = violations
            .iter()
            .map(|v| match v.severity {
                Severity::Error => self.scoring.error_penalty,
                Severity::Warning => self.scoring.warning_penalty,
                Severity::Info => self.scoring.info_penalty,
            })
            .fold(0u32, u32::saturating_add);
        100u32.saturating_sub(penalty)
    }

    // ========== 内置段落检查 ==========

    fn check_sections(
        &self,
        answer: &str,
        pattern: &FormatPattern,
        index: &TextIndex<'_>,
        violations: &mut Vec<ValidationViolation>,
    ) {
        let sections = &pattern.structure.sections;
        let fences = scan_code_fences(answer);

        let table_count = count_tables(answer);
        for section in sections
            .iter()
            .filter(|s| s.required && s.format == SectionFormat::Table)
        {
            if table_count == 0 {
                violations.push(self.missing_table(answer, section, &fences, index));
            }
        }

        if sections.iter().any(|s| s.format == SectionFormat::Process) {
            if let Some(violation) = check_vague_process(answer, &fences, index) {
                violations.push(violation);
            }
        }

        for section in sections
            .iter()
            .filter(|s| matches!(s.format, SectionFormat::List | SectionFormat::Process))
        {
            let Some(min_items) = section.min_items() else {
                continue;
            };
            let found = count_list_items(section_body(answer, &section.name));
            if found < min_items {
                violations.push(ValidationViolation::new(
                    checks::INSUFFICIENT_LIST_ITEMS,
                    Severity::Warning,
                    format!(
                        "Section '{}' needs at least {} list items, found {}",
                        section.name, min_items, found
                    ),
                ));
            }
        }

        if sections.iter().any(|s| s.format == SectionFormat::Code) {
            if fences.is_empty() {
                if sections
                    .iter()
                    .any(|s| s.required && s.format == SectionFormat::Code)
                {
                    violations.push(ValidationViolation::new(
                        checks::MISSING_CODE_BLOCK,
                        Severity::Error,
                        "Answer must include a fenced code block",
                    ));
                }
            } else {
                for fence in fences.iter().filter(|f| f.info.is_empty()) {
                    violations.push(code_language_violation(answer, fence, index));
                }
            }
        }
    }

    fn missing_table(
        &self,
        answer: &str,
        section: &PatternSection,
        fences: &[CodeFence<'_>],
        index: &TextIndex<'_>,
    ) -> ValidationViolation {
        // 文本停在未闭合的代码块里时先补上结束围栏，表格才会落在块外
        let unclosed = fences.last().map(|f| !f.closed).unwrap_or(false);
        let separator = match (unclosed, answer.ends_with('\n')) {
            (true, true) => "```\n\n",
            (true, false) => "\n```\n\n",
            (false, true) => "\n",
            (false, false) => "\n\n",
        };
        let fix = Fix {
            fix_type: FixType::Insert,
            range: TextRange::at(answer.len()),
            target: tail(answer, 32).to_string(),
            replacement: format!("{}{}", separator, table_skeleton(section)),
            description: format!("Insert a table skeleton for section '{}'", section.name),
        };
        ValidationViolation::new(
            checks::MISSING_TABLE,
            Severity::Error,
            format!(
                "Section '{}' requires a markdown table but none was found",
                section.name
            ),
        )
        .at(index.location(answer.len()))
        .with_fix(fix)
    }

    // ========== 自定义规则 ==========

    fn check_rule(
        &self,
        rule: &FormatRule,
        answer: &str,
        index: &TextIndex<'_>,
    ) -> Option<ValidationViolation> {
        match self.evaluate_rule(rule, answer) {
            Ok(None) => None,
            Ok(Some(offset)) => Some(
                ValidationViolation::new(&rule.id, rule.severity, &rule.error_message)
                    .at(offset.and_then(|o| index.location(o))),
            ),
            Err(reason) => {
                warn!("规则 {} 执行失败，降级为 info: {}", rule.id, reason);
                Some(ValidationViolation::new(
                    &rule.id,
                    Severity::Info,
                    format!("Rule evaluation failed: {}", reason),
                ))
            }
        }
    }

    /// Ok(None) 通过；Ok(Some(offset)) 失败（可能带位置）；Err 规则本身出错
    fn evaluate_rule(&self, rule: &FormatRule, answer: &str) -> Result<Option<Option<usize>>, String> {
        let failed = |passed: bool| if passed { None } else { Some(None) };
        match &rule.check {
            RuleCheck::RequiredSection { section } => Ok(failed(
                lines_outside_fences(answer)
                    .iter()
                    .any(|(_, line)| is_heading_for(line, section)),
            )),
            RuleCheck::RegexPresent { pattern } => Ok(failed(self.regex(pattern)?.is_match(answer))),
            RuleCheck::RegexAbsent { pattern } => {
                Ok(self.regex(pattern)?.find(answer).map(|m| Some(m.start())))
            }
            RuleCheck::MinLength { chars } => {
                Ok(failed(answer.trim().chars().count() >= *chars))
            }
            RuleCheck::MaxLength { chars } => {
                Ok(failed(answer.trim().chars().count() <= *chars))
            }
            RuleCheck::Custom { predicate } => {
                let callable = {
                    let guard = match self.predicates.read() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    guard.get(predicate).cloned()
                };
                let callable =
                    callable.ok_or_else(|| format!("unknown predicate '{}'", predicate))?;
                match catch_unwind(AssertUnwindSafe(|| callable(answer))) {
                    Ok(Ok(passed)) => Ok(failed(passed)),
                    Ok(Err(reason)) => Err(reason),
                    Err(_) => Err(format!("predicate '{}' panicked", predicate)),
                }
            }
        }
    }

    fn regex(&self, pattern: &str) -> Result<Regex, String> {
        let mut cache = match self.regex_cache.lock() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(re) = cache.get(pattern) {
            return Ok(re.clone());
        }
        let re = Regex::new(pattern).map_err(|e| format!("invalid regex '{}': {}", pattern, e))?;
        cache.insert(pattern.to_string(), re.clone());
        Ok(re)
    }
}

fn check_vague_process(
    answer: &str,
    fences: &[CodeFence<'_>],
    index: &TextIndex<'_>,
) -> Option<ValidationViolation> {
    let vague = VAGUE_PHRASING.find(answer)?;
    let has_concrete_step =
        NUMBERED_STEP.is_match(answer) || INLINE_CODE.is_match(answer) || !fences.is_empty();
    if has_concrete_step {
        return None;
    }
    Some(
        ValidationViolation::new(
            checks::VAGUE_PROCESS_STEPS,
            Severity::Warning,
            format!(
                "Steps are vague ('{}') and contain no concrete command or numbered step",
                vague.as_str()
            ),
        )
        .at(index.location(vague.start())),
    )
}

fn code_language_violation(
    answer: &str,
    fence: &CodeFence<'_>,
    index: &TextIndex<'_>,
) -> ValidationViolation {
    let language = detect_language(fence.body);
    let violation = ValidationViolation::new(
        checks::CODE_BLOCK_LANGUAGE,
        Severity::Warning,
        format!("Code block is missing a language identifier (looks like {})", language),
    )
    .at(index.location(fence.open_start));

    // 开始行后没有换行时无法安全修复
    let line_end = fence.open_end;
    if answer[line_end..].starts_with("\r\n") || answer[line_end..].starts_with('\n') {
        let newline = if answer[line_end..].starts_with("\r\n") { "\r\n" } else { "\n" };
        violation.with_fix(Fix {
            fix_type: FixType::Replace,
            range: TextRange::new(fence.open_start, line_end + newline.len()),
            target: format!("{}{}", fence.open_line, newline),
            replacement: format!("{}{}{}", fence.open_line, language, newline),
            description: format!("Tag code block as {}", language),
        })
    } else {
        violation
    }
}

/// 没有机械修复的违规转成去重后的人工建议
fn derive_suggestions(violations: &[ValidationViolation]) -> Vec<String> {
    let mut seen = HashSet::new();
    violations
        .iter()
        .filter(|v| !v.is_fixable())
        .map(suggestion_for)
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

pub(crate) fn suggestion_for(violation: &ValidationViolation) -> String {
    match violation.rule.as_str() {
        checks::VAGUE_PROCESS_STEPS => {
            "Rewrite the steps as a numbered list of concrete actions that start with a verb, e.g. '1. Run `npm install`'".to_string()
        }
        checks::MISSING_CODE_BLOCK => {
            "Add a fenced code block with a language identifier".to_string()
        }
        checks::CODE_BLOCK_LANGUAGE => {
            "Add a language identifier after the opening ``` of each code block".to_string()
        }
        _ => violation.message.clone(),
    }
}
