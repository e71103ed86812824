//! 指标收集 - 业务能力层
//!
//! 只追加事件日志；`FormatMetrics` 始终由保留窗口内的事件重新推导，
//! 缓存在每次追加后失效

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::debug;

use crate::models::metrics::{
    AutoFixEvent, ChannelBreakdown, FormatMetrics, MetricsExport, PatternDetectionEvent,
    PatternUsage, TrendBucket, ValidationEvent,
};

/// 每个渠道列出的热门模式数量
const TOP_PATTERNS_PER_CHANNEL: usize = 3;

/// 保留策略，按时间和数量双重限制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_age_days: Option<i64>,
    /// 每类事件最多保留条数
    pub max_events: Option<usize>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age_days: Some(30),
            max_events: Some(10_000),
        }
    }
}

impl RetentionPolicy {
    /// 不做任何裁剪
    pub fn unbounded() -> Self {
        Self {
            max_age_days: None,
            max_events: None,
        }
    }
}

#[derive(Debug, Default)]
struct EventLog {
    detections: Vec<PatternDetectionEvent>,
    validations: Vec<ValidationEvent>,
    auto_fixes: Vec<AutoFixEvent>,
}

impl EventLog {
    fn clear(&mut self) {
        self.detections.clear();
        self.validations.clear();
        self.auto_fixes.clear();
    }

    fn prune_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.detections.len() + self.validations.len() + self.auto_fixes.len();
        self.detections.retain(|e| e.timestamp >= cutoff);
        self.validations.retain(|e| e.timestamp >= cutoff);
        self.auto_fixes.retain(|e| e.timestamp >= cutoff);
        before - (self.detections.len() + self.validations.len() + self.auto_fixes.len())
    }
}

#[derive(Debug, Default)]
struct CollectorState {
    log: EventLog,
    cached: Option<Arc<FormatMetrics>>,
}

/// 指标收集器
#[derive(Debug, Default)]
pub struct MetricsCollector {
    retention: RetentionPolicy,
    state: Mutex<CollectorState>,
}

/// 超出数量上限时丢弃最旧的事件
fn trim_to<T>(events: &mut Vec<T>, max_events: Option<usize>) {
    if let Some(max) = max_events {
        if events.len() > max {
            let excess = events.len() - max;
            events.drain(..excess);
        }
    }
}

impl MetricsCollector {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            retention,
            state: Mutex::new(CollectorState::default()),
        }
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    fn lock(&self) -> MutexGuard<'_, CollectorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn record_pattern_detection(&self, event: PatternDetectionEvent) {
        let mut state = self.lock();
        state.log.detections.push(event);
        trim_to(&mut state.log.detections, self.retention.max_events);
        self.expire(&mut state);
        state.cached = None;
    }

    pub fn record_validation(&self, event: ValidationEvent) {
        let mut state = self.lock();
        state.log.validations.push(event);
        trim_to(&mut state.log.validations, self.retention.max_events);
        self.expire(&mut state);
        state.cached = None;
    }

    pub fn record_auto_fix(&self, event: AutoFixEvent) {
        let mut state = self.lock();
        state.log.auto_fixes.push(event);
        trim_to(&mut state.log.auto_fixes, self.retention.max_events);
        self.expire(&mut state);
        state.cached = None;
    }

    /// 追加时按保留天数删除过期事件
    fn expire(&self, state: &mut CollectorState) {
        if let Some(days) = self.retention.max_age_days {
            let removed = state.log.prune_before(Utc::now() - Duration::days(days));
            if removed > 0 {
                debug!("指标保留策略删除了 {} 条过期事件", removed);
            }
        }
    }

    /// 删除早于 `cutoff` 的事件，返回删除数量
    pub fn prune_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut state = self.lock();
        let removed = state.log.prune_before(cutoff);
        if removed > 0 {
            debug!("指标保留策略删除了 {} 条过期事件", removed);
            state.cached = None;
        }
        removed
    }

    /// 当前指标快照（返回副本）
    ///
    /// 只读：不删除任何事件，过期事件在下一次追加或 `prune_older_than` 时清理
    pub fn get_metrics(&self) -> FormatMetrics {
        let mut state = self.lock();
        if let Some(cached) = &state.cached {
            return FormatMetrics::clone(cached);
        }
        let metrics = Arc::new(compute_metrics(
            &state.log.detections,
            &state.log.validations,
            &state.log.auto_fixes,
        ));
        state.cached = Some(Arc::clone(&metrics));
        FormatMetrics::clone(&metrics)
    }

    /// 完整事件导出
    pub fn export_data(&self) -> MetricsExport {
        let state = self.lock();
        MetricsExport {
            detections: state.log.detections.clone(),
            validations: state.log.validations.clone(),
            auto_fixes: state.log.auto_fixes.clone(),
            exported_at: Utc::now(),
        }
    }

    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.export_data())
    }

    /// 清空全部事件
    pub fn clear_metrics(&self) {
        let mut state = self.lock();
        state.log.clear();
        state.cached = None;
    }
}

// ========== 纯函数聚合 ==========

/// 整数百分比
fn percent(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    (numerator as f64 / denominator as f64 * 100.0).round()
}

/// 保留两位小数的平均值
fn mean(sum: u64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    (sum as f64 / count as f64 * 100.0).round() / 100.0
}

#[derive(Default)]
struct PatternAcc {
    name: Option<String>,
    detections: usize,
    applications: usize,
    passed: usize,
    score_sum: u64,
}

#[derive(Default)]
struct ChannelAcc {
    total: usize,
    passed: usize,
    score_sum: u64,
    patterns: HashMap<String, usize>,
}

#[derive(Default)]
struct DayAcc {
    detections: usize,
    validations: usize,
    passed: usize,
    score_sum: u64,
    fixes: usize,
    fix_successes: usize,
}

/// 由事件日志推导指标，不读取时钟
pub fn compute_metrics(
    detections: &[PatternDetectionEvent],
    validations: &[ValidationEvent],
    auto_fixes: &[AutoFixEvent],
) -> FormatMetrics {
    let question_ids: HashSet<&str> = detections
        .iter()
        .map(|e| e.question_id.as_str())
        .chain(validations.iter().map(|e| e.question_id.as_str()))
        .chain(auto_fixes.iter().map(|e| e.question_id.as_str()))
        .collect();

    let passed = validations.iter().filter(|e| e.passed).count();
    let score_sum: u64 = validations.iter().map(|e| e.score as u64).sum();
    let violation_sum: u64 = validations.iter().map(|e| e.violation_count as u64).sum();

    let fixed_questions: HashSet<&str> =
        auto_fixes.iter().map(|e| e.question_id.as_str()).collect();
    let first_pass = validations
        .iter()
        .filter(|e| e.passed && !fixed_questions.contains(e.question_id.as_str()))
        .count();
    let fix_successes = auto_fixes.iter().filter(|e| e.success).count();

    // 模式维度
    let mut patterns: BTreeMap<String, PatternAcc> = BTreeMap::new();
    for event in detections {
        if let Some(id) = &event.detected_pattern {
            let acc = patterns.entry(id.clone()).or_default();
            acc.detections += 1;
            if acc.name.is_none() {
                acc.name = event.pattern_name.clone();
            }
        }
    }
    for event in validations {
        if let Some(id) = &event.pattern_id {
            let acc = patterns.entry(id.clone()).or_default();
            acc.applications += 1;
            acc.score_sum += event.score as u64;
            if event.passed {
                acc.passed += 1;
            }
            if acc.name.is_none() {
                acc.name = event.pattern_name.clone();
            }
        }
    }
    let pattern_usage = patterns
        .into_iter()
        .map(|(id, acc)| {
            let usage = PatternUsage {
                name: acc.name.unwrap_or_else(|| id.clone()),
                detection_count: acc.detections,
                application_count: acc.applications,
                success_rate: percent(acc.passed, acc.detections),
                average_score: mean(acc.score_sum, acc.applications),
            };
            (id, usage)
        })
        .collect();

    // 渠道维度
    let mut channels: BTreeMap<&str, ChannelAcc> = BTreeMap::new();
    for event in validations {
        let acc = channels.entry(event.channel.as_str()).or_default();
        acc.total += 1;
        acc.score_sum += event.score as u64;
        if event.passed {
            acc.passed += 1;
        }
        if let Some(id) = &event.pattern_id {
            *acc.patterns.entry(id.clone()).or_default() += 1;
        }
    }
    let channel_breakdown = channels
        .into_iter()
        .map(|(channel, acc)| {
            let mut ranked: Vec<(String, usize)> = acc.patterns.into_iter().collect();
            ranked.sort_by(|(ia, ca), (ib, cb)| cb.cmp(ca).then_with(|| ia.cmp(ib)));
            ChannelBreakdown {
                channel: channel.to_string(),
                total_questions: acc.total,
                compliance_rate: percent(acc.passed, acc.total),
                average_score: mean(acc.score_sum, acc.total),
                top_patterns: ranked
                    .into_iter()
                    .take(TOP_PATTERNS_PER_CHANNEL)
                    .map(|(id, _)| id)
                    .collect(),
            }
        })
        .collect();

    // 按天趋势
    let mut days: BTreeMap<NaiveDate, DayAcc> = BTreeMap::new();
    for event in detections {
        days.entry(event.timestamp.date_naive()).or_default().detections += 1;
    }
    for event in validations {
        let acc = days.entry(event.timestamp.date_naive()).or_default();
        acc.validations += 1;
        acc.score_sum += event.score as u64;
        if event.passed {
            acc.passed += 1;
        }
    }
    for event in auto_fixes {
        let acc = days.entry(event.timestamp.date_naive()).or_default();
        acc.fixes += 1;
        if event.success {
            acc.fix_successes += 1;
        }
    }
    let trends = days
        .into_iter()
        .map(|(date, acc)| TrendBucket {
            date,
            detections: acc.detections,
            validations: acc.validations,
            compliance_rate: percent(acc.passed, acc.validations),
            average_score: mean(acc.score_sum, acc.validations),
            auto_fix_attempts: acc.fixes,
            auto_fix_success_rate: percent(acc.fix_successes, acc.fixes),
        })
        .collect();

    let last_updated = detections
        .iter()
        .map(|e| e.timestamp)
        .chain(validations.iter().map(|e| e.timestamp))
        .chain(auto_fixes.iter().map(|e| e.timestamp))
        .max();

    FormatMetrics {
        total_questions: question_ids.len(),
        compliance_rate: percent(passed, validations.len()),
        average_score: mean(score_sum, validations.len()),
        validation_pass_rate: percent(first_pass, validations.len()),
        auto_fix_attempts: auto_fixes.len(),
        auto_fix_successes: fix_successes,
        auto_fix_success_rate: percent(fix_successes, auto_fixes.len()),
        average_violations_per_question: mean(violation_sum, validations.len()),
        pattern_usage,
        channel_breakdown,
        trends,
        last_updated,
    }
}
