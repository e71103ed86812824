use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// 评分参数
///
/// 扣分权重和通过阈值都是可调配置，而不是写死的常量
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// 每个 error 扣分
    pub error_penalty: u32,
    /// 每个 warning 扣分
    pub warning_penalty: u32,
    /// 每个 info 扣分
    pub info_penalty: u32,
    /// 通过阈值（含）
    pub pass_threshold: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            error_penalty: 30,
            warning_penalty: 10,
            info_penalty: 2,
            pass_threshold: 70,
        }
    }
}

impl ScoringConfig {
    /// 检查参数是否合法
    pub fn validate(&self) -> EngineResult<()> {
        if self.pass_threshold > 100 {
            return Err(EngineError::InvalidConfig(format!(
                "pass_threshold 必须在 [0, 100] 内, 实际为 {}",
                self.pass_threshold
            )));
        }
        Ok(())
    }
}

/// 程序配置文件
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 模式定义文件目录（TOML / JSON）
    pub pattern_folder: String,
    /// 待检查答案批次目录
    pub submission_folder: String,
    /// 同时处理的答案数量
    pub max_concurrent_submissions: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 被拒绝答案写入的文件
    pub reject_file: String,
    /// 指标导出文件
    pub metrics_export_file: String,
    /// 校验失败时是否尝试自动修复
    pub auto_fix_enabled: bool,
    // --- 评分配置 ---
    pub scoring: ScoringConfig,
    // --- 指标配置 ---
    pub metrics_retention_days: i64,
    pub metrics_max_events: usize,
    // --- 模式检测配置 ---
    pub suggestion_limit: usize,
    pub low_confidence_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pattern_folder: "patterns".to_string(),
            submission_folder: "submissions".to_string(),
            max_concurrent_submissions: 16,
            verbose_logging: false,
            output_log_file: "format_report.txt".to_string(),
            reject_file: "rejected.txt".to_string(),
            metrics_export_file: "format_metrics.json".to_string(),
            auto_fix_enabled: true,
            scoring: ScoringConfig::default(),
            metrics_retention_days: 30,
            metrics_max_events: 10_000,
            suggestion_limit: 3,
            low_confidence_threshold: 0.34,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            pattern_folder: std::env::var("PATTERN_FOLDER").unwrap_or(default.pattern_folder),
            submission_folder: std::env::var("SUBMISSION_FOLDER").unwrap_or(default.submission_folder),
            max_concurrent_submissions: std::env::var("MAX_CONCURRENT_SUBMISSIONS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_submissions),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            reject_file: std::env::var("REJECT_FILE").unwrap_or(default.reject_file),
            metrics_export_file: std::env::var("METRICS_EXPORT_FILE").unwrap_or(default.metrics_export_file),
            auto_fix_enabled: std::env::var("AUTO_FIX_ENABLED").ok().and_then(|v| v.parse().ok()).unwrap_or(default.auto_fix_enabled),
            scoring: ScoringConfig {
                error_penalty: std::env::var("SCORE_ERROR_PENALTY").ok().and_then(|v| v.parse().ok()).unwrap_or(default.scoring.error_penalty),
                warning_penalty: std::env::var("SCORE_WARNING_PENALTY").ok().and_then(|v| v.parse().ok()).unwrap_or(default.scoring.warning_penalty),
                info_penalty: std::env::var("SCORE_INFO_PENALTY").ok().and_then(|v| v.parse().ok()).unwrap_or(default.scoring.info_penalty),
                pass_threshold: std::env::var("SCORE_PASS_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(default.scoring.pass_threshold),
            },
            metrics_retention_days: std::env::var("METRICS_RETENTION_DAYS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.metrics_retention_days),
            metrics_max_events: std::env::var("METRICS_MAX_EVENTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.metrics_max_events),
            suggestion_limit: std::env::var("SUGGESTION_LIMIT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.suggestion_limit),
            low_confidence_threshold: std::env::var("LOW_CONFIDENCE_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(default.low_confidence_threshold),
        }
    }

    /// 从 TOML 文件加载配置，缺失的字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))?;
        config.scoring.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scoring_constants() {
        let scoring = ScoringConfig::default();
        assert_eq!(scoring.error_penalty, 30);
        assert_eq!(scoring.warning_penalty, 10);
        assert_eq!(scoring.info_penalty, 2);
        assert_eq!(scoring.pass_threshold, 70);
        assert!(scoring.validate().is_ok());
    }

    #[test]
    fn test_scoring_threshold_out_of_range() {
        let scoring = ScoringConfig {
            pass_threshold: 120,
            ..Default::default()
        };
        assert!(matches!(
            scoring.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_partial_toml_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(
            &path,
            "auto_fix_enabled = false\n\n[scoring]\npass_threshold = 80\n",
        )
        .unwrap();

        let config = Config::from_toml_file(&path).unwrap();
        assert!(!config.auto_fix_enabled);
        assert_eq!(config.scoring.pass_threshold, 80);
        assert_eq!(config.scoring.error_penalty, 30);
        assert_eq!(config.metrics_max_events, 10_000);
    }
}
