//! 答案处理流程 - 流程层
//!
//! 核心职责：定义"一条答案"的完整处理流程
//!
//! 流程顺序：
//! 1. 确定模式（指定的 hint 或关键词检测，都没有则用 free-form）
//! 2. 校验 → 未通过且允许时自动修复 → 重新校验
//! 3. 记录指标
//! 4. 最终仍未通过时查询豁免，决定接受还是拒绝

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::models::metrics::{AutoFixEvent, PatternDetectionEvent, ValidationEvent};
use crate::models::pattern::{FormatPattern, Severity};
use crate::models::submission::AnswerSubmission;
use crate::models::validation::ValidationResult;
use crate::services::{
    AutoFormatter, FormatValidator, MetricsCollector, OverrideStore, PatternDetector,
    PatternLibrary, RetentionPolicy,
};
use crate::utils::logging::truncate_text;
use crate::workflow::answer_ctx::AnswerCtx;

/// 最终处理结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// 首次校验即通过
    Accepted,
    /// 自动修复后通过
    AutoFixed,
    /// 未通过，但存在人工豁免
    Overridden,
    /// 未通过
    Rejected,
}

impl Decision {
    pub fn is_accepted(self) -> bool {
        !matches!(self, Decision::Rejected)
    }
}

/// 单条答案的处理结果
#[derive(Debug, Clone)]
pub struct EngineOutcome {
    pub question_id: String,
    /// 检测到或指定的模式；None 表示按 free-form 校验
    pub pattern: Option<FormatPattern>,
    pub confidence: f64,
    /// 最终校验结果（自动修复后的结果优先）
    pub validation_result: ValidationResult,
    /// 自动修复改动了文本时的新答案
    pub formatted_answer: Option<String>,
    pub decision: Decision,
    pub metrics_recorded: bool,
}

impl EngineOutcome {
    pub fn pattern_id(&self) -> &str {
        self.pattern
            .as_ref()
            .map(|p| p.id.as_str())
            .unwrap_or(crate::models::pattern::FREE_FORM_PATTERN_ID)
    }
}

/// 答案处理流程
///
/// - 编排检测、校验、修复、豁免、指标
/// - 各能力通过 Arc 共享，可在多个任务间复用
/// - 不做任何 IO
pub struct AnswerFlow {
    library: Arc<PatternLibrary>,
    detector: PatternDetector,
    validator: Arc<FormatValidator>,
    formatter: AutoFormatter,
    overrides: Arc<OverrideStore>,
    metrics: Arc<MetricsCollector>,
    auto_fix_enabled: bool,
    verbose_logging: bool,
}

impl AnswerFlow {
    /// 创建新的答案处理流程
    ///
    /// # 参数
    /// - `config`: 配置（评分、检测阈值、自动修复开关）
    /// - `library`: 模式库
    /// - `overrides`: 豁免存储
    /// - `metrics`: 指标收集器
    pub fn new(
        config: &Config,
        library: Arc<PatternLibrary>,
        overrides: Arc<OverrideStore>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let validator = Arc::new(FormatValidator::new(config.scoring.clone()));
        Self {
            detector: PatternDetector::new(Arc::clone(&library))
                .with_limits(config.suggestion_limit, config.low_confidence_threshold),
            formatter: AutoFormatter::new(Arc::clone(&validator)),
            library,
            validator,
            overrides,
            metrics,
            auto_fix_enabled: config.auto_fix_enabled,
            verbose_logging: config.verbose_logging,
        }
    }

    /// 使用默认配置和给定模式创建，方便嵌入其他程序
    pub fn with_patterns(config: &Config, patterns: Vec<FormatPattern>) -> EngineResult<Self> {
        config.scoring.validate()?;
        let retention = RetentionPolicy {
            max_age_days: Some(config.metrics_retention_days),
            max_events: Some(config.metrics_max_events),
        };
        Ok(Self::new(
            config,
            Arc::new(PatternLibrary::with_patterns(patterns)?),
            Arc::new(OverrideStore::new()),
            Arc::new(MetricsCollector::new(retention)),
        ))
    }

    pub fn library(&self) -> &Arc<PatternLibrary> {
        &self.library
    }

    pub fn detector(&self) -> &PatternDetector {
        &self.detector
    }

    pub fn validator(&self) -> &Arc<FormatValidator> {
        &self.validator
    }

    pub fn formatter(&self) -> &AutoFormatter {
        &self.formatter
    }

    pub fn overrides(&self) -> &Arc<OverrideStore> {
        &self.overrides
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// 处理一条答案
    ///
    /// # 返回
    /// 内容问题体现在 `validation_result` 中；只有指定了不存在的模式时返回错误
    pub fn run(&self, submission: &AnswerSubmission, ctx: &AnswerCtx) -> EngineResult<EngineOutcome> {
        self.log_question(ctx, &submission.question_text);

        // ========== 步骤 1: 确定模式 ==========
        let (pattern, confidence, hinted) = self.resolve_pattern(submission, ctx)?;
        self.metrics.record_pattern_detection(PatternDetectionEvent {
            question_id: submission.question_id.clone(),
            timestamp: Utc::now(),
            detected_pattern: pattern.as_ref().map(|p| p.id.clone()),
            pattern_name: pattern.as_ref().map(|p| p.name.clone()),
            confidence,
            hinted,
        });

        let free_form;
        let effective = match &pattern {
            Some(p) => p,
            None => {
                free_form = FormatPattern::free_form();
                &free_form
            }
        };

        // ========== 步骤 2: 校验与自动修复 ==========
        let mut result = self.validator.check(&submission.answer_text, effective);
        info!(
            "{} 📝 模式 {} 校验分数: {} (error {} / warning {} / info {})",
            ctx,
            effective.id,
            result.score,
            result.count_by_severity(Severity::Error),
            result.count_by_severity(Severity::Warning),
            result.count_by_severity(Severity::Info)
        );

        let mut formatted_answer = None;
        let mut fixed = false;
        if !result.is_valid && self.auto_fix_enabled {
            let formatted = self.formatter.format(&submission.answer_text, effective);
            let after = self.validator.check(&formatted, effective);
            self.metrics.record_auto_fix(AutoFixEvent {
                question_id: submission.question_id.clone(),
                timestamp: Utc::now(),
                pattern_id: pattern.as_ref().map(|p| p.id.clone()),
                before_score: result.score,
                after_score: after.score,
                success: after.is_valid,
            });
            info!(
                "{} 🔧 自动修复: {} → {}",
                ctx, result.score, after.score
            );

            fixed = after.is_valid;
            if formatted != submission.answer_text {
                formatted_answer = Some(formatted);
            }
            result = after;
        }

        // ========== 步骤 3: 记录指标 ==========
        self.metrics.record_validation(ValidationEvent {
            question_id: submission.question_id.clone(),
            timestamp: Utc::now(),
            pattern_id: pattern.as_ref().map(|p| p.id.clone()),
            pattern_name: pattern.as_ref().map(|p| p.name.clone()),
            score: result.score,
            passed: result.is_valid,
            violation_count: result.violations.len(),
            channel: submission.channel.clone(),
        });

        // ========== 步骤 4: 结论 ==========
        let decision = if result.is_valid {
            if fixed {
                Decision::AutoFixed
            } else {
                Decision::Accepted
            }
        } else if self.overrides.has_override(&submission.question_id) {
            info!("{} 📝 存在人工豁免，接受答案", ctx);
            Decision::Overridden
        } else {
            warn!("{} ❌ 答案未达到格式要求 (分数 {})", ctx, result.score);
            Decision::Rejected
        };

        Ok(EngineOutcome {
            question_id: submission.question_id.clone(),
            pattern,
            confidence,
            validation_result: result,
            formatted_answer,
            decision,
            metrics_recorded: true,
        })
    }

    /// 返回 (模式, 置信度, 是否由 hint 指定)
    fn resolve_pattern(
        &self,
        submission: &AnswerSubmission,
        ctx: &AnswerCtx,
    ) -> EngineResult<(Option<FormatPattern>, f64, bool)> {
        if let Some(hint) = &submission.pattern_id_hint {
            let pattern = self
                .library
                .get_pattern(hint)
                .ok_or_else(|| EngineError::pattern_not_found(hint.as_str()))?;
            debug!("{} 使用指定模式 {}", ctx, pattern.id);
            return Ok((Some(pattern), 1.0, true));
        }

        match self.detector.detect(&submission.question_text) {
            Some(detection) => {
                info!(
                    "{} 🔍 检测到模式 {} (置信度 {:.2})",
                    ctx, detection.pattern.id, detection.confidence
                );
                if self.detector.is_low_confidence(detection.confidence) && self.verbose_logging {
                    let candidates: Vec<String> = self
                        .detector
                        .get_suggested_patterns(&submission.question_text)
                        .into_iter()
                        .map(|p| p.id)
                        .collect();
                    debug!("{} 置信度较低，候选模式: {:?}", ctx, candidates);
                }
                Ok((Some(detection.pattern), detection.confidence, false))
            }
            None => {
                info!("{} 未检测到模式，按 free-form 校验", ctx);
                Ok((None, 0.0, false))
            }
        }
    }

    fn log_question(&self, ctx: &AnswerCtx, question_text: &str) {
        if self.verbose_logging {
            debug!("{} 问题: {}", ctx, truncate_text(question_text, 60));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::builtin::builtin_patterns;
    use crate::models::override_record::NewOverride;
    use crate::services::format_validator::checks;

    fn flow() -> AnswerFlow {
        AnswerFlow::with_patterns(&Config::default(), builtin_patterns()).unwrap()
    }

    fn ctx(id: &str) -> AnswerCtx {
        AnswerCtx::new("test", 1, id, "faq")
    }

    #[test]
    fn test_untagged_code_block_is_accepted_with_warning() {
        let flow = flow();
        let submission = AnswerSubmission::new(
            "q1",
            "Show me a code example of reading a file",
            "Use the standard library to read the whole file into a string at once:\n\n```\nlet s = std::fs::read_to_string(\"a.txt\")?;\n```\n",
            "docs",
        );
        let outcome = flow.run(&submission, &ctx("q1")).unwrap();

        assert_eq!(outcome.pattern_id(), "code-example");
        assert_eq!(outcome.decision, Decision::Accepted);
        assert_eq!(outcome.validation_result.score, 90);
        assert_eq!(outcome.validation_result.violations.len(), 1);
        assert_eq!(
            outcome.validation_result.violations[0].rule,
            checks::CODE_BLOCK_LANGUAGE
        );
        assert!(outcome.formatted_answer.is_none());
    }

    #[test]
    fn test_missing_table_is_auto_fixed() {
        let flow = flow();
        let submission = AnswerSubmission::new(
            "q2",
            "Compare Redis vs Memcached",
            "Redis keeps richer data structures and can persist to disk, while Memcached is a simpler pure in-memory cache. I recommend Redis when you need persistence or pub/sub features.",
            "faq",
        );
        let outcome = flow.run(&submission, &ctx("q2")).unwrap();

        assert_eq!(outcome.pattern_id(), "comparison-table");
        assert_eq!(outcome.decision, Decision::AutoFixed);
        assert!(outcome.validation_result.is_valid);
        assert!(outcome
            .formatted_answer
            .as_deref()
            .unwrap()
            .contains("| Aspect | Option A | Option B |"));

        let metrics = flow.metrics().get_metrics();
        assert_eq!(metrics.auto_fix_attempts, 1);
        assert_eq!(metrics.auto_fix_success_rate, 100.0);
        // 自动修复后通过不计入首次通过率
        assert_eq!(metrics.validation_pass_rate, 0.0);
        assert_eq!(metrics.compliance_rate, 100.0);
    }

    #[test]
    fn test_override_only_changes_decision() {
        let flow = flow();
        let submission = AnswerSubmission::new("q3", "How to install nginx?", "just do it", "faq");

        let rejected = flow.run(&submission, &ctx("q3")).unwrap();
        assert_eq!(rejected.decision, Decision::Rejected);

        flow.overrides()
            .add_override(NewOverride::new("q3", "answer approved by the docs team"))
            .unwrap();
        let overridden = flow.run(&submission, &ctx("q3")).unwrap();
        assert_eq!(overridden.decision, Decision::Overridden);
        assert_eq!(
            overridden.validation_result.score,
            rejected.validation_result.score
        );
        assert_eq!(
            overridden.validation_result.violations,
            rejected.validation_result.violations
        );
    }

    #[test]
    fn test_unknown_hint_is_error() {
        let flow = flow();
        let submission = AnswerSubmission::new("q4", "anything", "text", "faq").with_hint("nope");
        assert_eq!(
            flow.run(&submission, &ctx("q4")).unwrap_err(),
            EngineError::PatternNotFound {
                id: "nope".to_string()
            }
        );
    }

    #[test]
    fn test_hint_and_free_form() {
        let flow = flow();
        let hinted = AnswerSubmission::new("q5", "tell me a joke", "```\nSELECT 1\n```", "faq")
            .with_hint("code-example");
        let outcome = flow.run(&hinted, &ctx("q5")).unwrap();
        assert_eq!(outcome.confidence, 1.0);
        assert_eq!(outcome.pattern_id(), "code-example");

        let plain = AnswerSubmission::new("q6", "tell me a joke", "Why did the chicken cross the road?", "faq");
        let outcome = flow.run(&plain, &ctx("q6")).unwrap();
        assert!(outcome.pattern.is_none());
        assert_eq!(outcome.pattern_id(), "free-form");
        assert_eq!(outcome.decision, Decision::Accepted);
        assert_eq!(outcome.validation_result.score, 100);

        let export = flow.metrics().export_data();
        assert_eq!(export.detections.len(), 2);
        assert!(export.detections[0].hinted);
        assert_eq!(export.detections[1].detected_pattern, None);
    }
}
