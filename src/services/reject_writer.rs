//! 拒绝记录写入服务 - 业务能力层
//!
//! 只负责"写 rejected.txt"能力，不关心流程

use anyhow::{Context, Result};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::validation::ValidationResult;
use crate::utils::logging::truncate_text;

/// 拒绝记录写入服务
///
/// 职责：
/// - 将未通过校验、也没有豁免的答案写入 rejected.txt
/// - 只处理单个答案
/// - 并发任务共用同一个文件，写入时串行
pub struct RejectWriter {
    reject_file_path: String,
    write_lock: Mutex<()>,
}

impl RejectWriter {
    /// 创建新的拒绝记录写入服务
    pub fn new() -> Self {
        Self::with_path("rejected.txt")
    }

    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            reject_file_path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// 写入一条拒绝记录
    ///
    /// # 参数
    /// - `question_id`: 题目ID
    /// - `pattern_id`: 使用的模式
    /// - `result`: 最终校验结果
    /// - `answer_text`: 答案原文（截断后写入）
    pub async fn write(
        &self,
        question_id: &str,
        pattern_id: &str,
        result: &ValidationResult,
        answer_text: &str,
    ) -> Result<()> {
        debug!(
            "写入拒绝记录: 题目 {} | 模式 {} | 分数 {}",
            question_id, pattern_id, result.score
        );

        let mut entry = format!(
            "题目 {} | 模式 {} | 分数 {} | 答案: {}\n",
            question_id,
            pattern_id,
            result.score,
            truncate_text(&answer_text.replace('\n', " "), 80)
        );
        for violation in &result.violations {
            entry.push_str(&format!("    - {}\n", violation));
        }

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.reject_file_path)
            .await
            .with_context(|| format!("无法打开拒绝记录文件: {}", self.reject_file_path))?;
        file.write_all(entry.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

impl Default for RejectWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pattern::Severity;
    use crate::models::validation::ValidationViolation;

    #[tokio::test]
    async fn test_write_appends_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rejected.txt");
        let writer = RejectWriter::with_path(path.to_str().unwrap());

        let result = ValidationResult {
            is_valid: false,
            score: 40,
            violations: vec![ValidationViolation::new(
                "missing-section",
                Severity::Error,
                "Missing required section: Steps",
            )],
            suggestions: Vec::new(),
        };
        writer.write("q1", "step-by-step", &result, "line one\nline two").await.unwrap();
        writer.write("q2", "free-form", &result, "other").await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("题目 q1 | 模式 step-by-step | 分数 40 | 答案: line one line two"));
        assert!(content.contains("Missing required section: Steps"));
        assert_eq!(content.matches("题目 ").count(), 2);
    }
}
