//! 批量答案处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量答案的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：加载模式库（目录为空时使用内置模式）、创建共享的流程对象
//! 2. **批量加载**：扫描并加载所有待处理的答案批次（`Vec<SubmissionBatch>`）
//! 3. **并发控制**：使用 Semaphore 限制同时处理的答案数量
//! 4. **全局统计**：汇总所有答案的结论，并导出指标

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::models::builtin::builtin_patterns;
use crate::models::pattern::FormatPattern;
use crate::models::submission::SubmissionBatch;
use crate::orchestrator::submission_processor;
use crate::services::{
    MetricsCollector, OverrideStore, PatternLibrary, RejectWriter, RetentionPolicy,
};
use crate::utils::logging::{init_log_file, log_startup, print_final_stats, FinalStats};
use crate::workflow::{AnswerCtx, AnswerFlow, Decision};

/// 应用主结构
pub struct App {
    config: Config,
    flow: Arc<AnswerFlow>,
    rejects: Arc<RejectWriter>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.scoring.validate()?;

        // 初始化报告文件
        init_log_file(&config.output_log_file)?;

        let patterns = load_patterns(&config.pattern_folder).await;
        let library = Arc::new(PatternLibrary::with_patterns(patterns)?);
        log_startup(library.len(), config.max_concurrent_submissions);

        let metrics = Arc::new(MetricsCollector::new(RetentionPolicy {
            max_age_days: Some(config.metrics_retention_days),
            max_events: Some(config.metrics_max_events),
        }));
        let flow = Arc::new(AnswerFlow::new(
            &config,
            library,
            Arc::new(OverrideStore::new()),
            metrics,
        ));
        let rejects = Arc::new(RejectWriter::with_path(config.reject_file.clone()));

        Ok(Self {
            config,
            flow,
            rejects,
        })
    }

    /// 共享的流程对象（可用于在运行前登记豁免、注册自定义规则）
    pub fn flow(&self) -> &Arc<AnswerFlow> {
        &self.flow
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<FinalStats> {
        info!("\n📁 正在扫描待处理的答案批次...");
        let batches = match crate::models::load_all_submission_files(&self.config.submission_folder).await {
            Ok(batches) => batches,
            Err(e) => {
                warn!("⚠️ 无法加载答案批次: {:#}", e);
                Vec::new()
            }
        };

        if batches.is_empty() {
            warn!("⚠️ 没有找到待处理的TOML文件，程序结束");
            return Ok(FinalStats::default());
        }

        let stats = self.process_batches(batches).await?;

        let metrics = self.flow.metrics().get_metrics();
        self.write_report_summary(&stats, metrics.compliance_rate)?;
        self.export_metrics()?;
        print_final_stats(&stats, metrics.compliance_rate, &self.config.output_log_file);

        Ok(stats)
    }

    /// 处理所有批次
    ///
    /// 所有答案共用一个 Semaphore，批次之间不互相等待
    pub async fn process_batches(&self, batches: Vec<SubmissionBatch>) -> Result<FinalStats> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_submissions.max(1)));
        let total: usize = batches.iter().map(|b| b.submissions.len()).sum();
        info!(
            "✓ 找到 {} 个批次，共 {} 条答案",
            batches.len(),
            total
        );

        let mut indices = Vec::with_capacity(total);
        let mut handles = Vec::with_capacity(total);
        let mut index = 0;
        for batch in batches {
            for submission in batch.submissions {
                index += 1;
                let permit = semaphore.clone().acquire_owned().await?;
                let ctx = AnswerCtx::new(
                    batch.name.clone(),
                    index,
                    submission.question_id.clone(),
                    submission.channel.clone(),
                );
                let flow = Arc::clone(&self.flow);
                let rejects = Arc::clone(&self.rejects);

                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    submission_processor::process_submission(&flow, &rejects, &submission, &ctx)
                        .await
                });
                indices.push(index);
                handles.push(handle);
            }
        }

        let mut stats = FinalStats {
            total,
            ..Default::default()
        };
        // 等待所有任务完成
        for (index, joined) in indices.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(Ok(Decision::Accepted)) => stats.accepted += 1,
                Ok(Ok(Decision::AutoFixed)) => stats.auto_fixed += 1,
                Ok(Ok(Decision::Overridden)) => stats.overridden += 1,
                Ok(Ok(Decision::Rejected)) => stats.rejected += 1,
                Ok(Err(_)) => stats.failed += 1,
                Err(e) => {
                    error!("[答案 {}] 任务执行失败: {}", index, e);
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    /// 导出指标事件到 JSON 文件
    fn export_metrics(&self) -> Result<()> {
        let json = self.flow.metrics().export_json()?;
        std::fs::write(&self.config.metrics_export_file, json)
            .with_context(|| format!("无法写入指标文件: {}", self.config.metrics_export_file))?;
        info!("📈 指标已导出至: {}", self.config.metrics_export_file);
        Ok(())
    }

    fn write_report_summary(&self, stats: &FinalStats, compliance_rate: f64) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.output_log_file)?;
        writeln!(
            file,
            "总数 {} | 通过 {} | 自动修复 {} | 豁免 {} | 拒绝 {} | 出错 {} | 合规率 {:.0}%",
            stats.total,
            stats.accepted,
            stats.auto_fixed,
            stats.overridden,
            stats.rejected,
            stats.failed,
            compliance_rate
        )?;
        Ok(())
    }
}

/// 加载模式定义，目录不存在或没有任何模式时使用内置模式
async fn load_patterns(folder: &str) -> Vec<FormatPattern> {
    match crate::models::load_all_pattern_files(folder).await {
        Ok(patterns) if !patterns.is_empty() => patterns,
        Ok(_) => {
            info!("📚 模式目录 {} 为空，使用内置模式", folder);
            builtin_patterns()
        }
        Err(e) => {
            info!("📚 无法读取模式目录 ({:#})，使用内置模式", e);
            builtin_patterns()
        }
    }
}
