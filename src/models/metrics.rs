use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 模式检测事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternDetectionEvent {
    pub question_id: String,
    pub timestamp: DateTime<Utc>,
    /// 检测到（或指定）的模式，未检测到时为 None
    pub detected_pattern: Option<String>,
    pub pattern_name: Option<String>,
    pub confidence: f64,
    /// 是否由调用方直接指定，而非关键词检测
    #[serde(default)]
    pub hinted: bool,
}

/// 校验事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationEvent {
    pub question_id: String,
    pub timestamp: DateTime<Utc>,
    pub pattern_id: Option<String>,
    pub pattern_name: Option<String>,
    pub score: u32,
    pub passed: bool,
    pub violation_count: usize,
    pub channel: String,
}

/// 自动修复事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFixEvent {
    pub question_id: String,
    pub timestamp: DateTime<Utc>,
    pub pattern_id: Option<String>,
    pub before_score: u32,
    pub after_score: u32,
    pub success: bool,
}

/// 单个模式的使用统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternUsage {
    pub name: String,
    pub detection_count: usize,
    pub application_count: usize,
    pub success_rate: f64,
    pub average_score: f64,
}

/// 渠道维度统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelBreakdown {
    pub channel: String,
    pub total_questions: usize,
    pub compliance_rate: f64,
    pub average_score: f64,
    pub top_patterns: Vec<String>,
}

/// 按天聚合的趋势桶
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendBucket {
    pub date: NaiveDate,
    pub detections: usize,
    pub validations: usize,
    pub compliance_rate: f64,
    pub average_score: f64,
    pub auto_fix_attempts: usize,
    pub auto_fix_success_rate: f64,
}

/// 由事件日志推导出的指标快照，本身不持有可变状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatMetrics {
    pub total_questions: usize,
    pub compliance_rate: f64,
    pub average_score: f64,
    pub validation_pass_rate: f64,
    pub auto_fix_attempts: usize,
    pub auto_fix_successes: usize,
    pub auto_fix_success_rate: f64,
    pub average_violations_per_question: f64,
    pub pattern_usage: BTreeMap<String, PatternUsage>,
    pub channel_breakdown: Vec<ChannelBreakdown>,
    pub trends: Vec<TrendBucket>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// 完整事件导出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsExport {
    pub detections: Vec<PatternDetectionEvent>,
    pub validations: Vec<ValidationEvent>,
    pub auto_fixes: Vec<AutoFixEvent>,
    pub exported_at: DateTime<Utc>,
}
