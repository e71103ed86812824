use anyhow::Result;
/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 日志
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug / info。重复调用是安全的
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化报告文件
///
/// # 参数
/// - `log_file_path`: 报告文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n答案格式检查报告 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
///
/// # 参数
/// - `pattern_count`: 已加载的模式数量
/// - `max_concurrent`: 最大并发数
pub fn log_startup(pattern_count: usize, max_concurrent: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 答案格式检查");
    info!("📚 已加载模式: {} 个", pattern_count);
    info!("📊 最大并发数: {}", max_concurrent);
    info!("{}", "=".repeat(60));
}

/// 最终统计
#[derive(Debug, Default, Clone, Copy)]
pub struct FinalStats {
    pub total: usize,
    pub accepted: usize,
    pub auto_fixed: usize,
    pub overridden: usize,
    pub rejected: usize,
    pub failed: usize,
}

/// 打印最终统计信息
///
/// # 参数
/// - `stats`: 汇总结果
/// - `compliance_rate`: 指标中的合规率
/// - `log_file_path`: 报告文件路径
pub fn print_final_stats(stats: &FinalStats, compliance_rate: f64, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 直接通过: {}/{}", stats.accepted, stats.total);
    info!("🔧 自动修复后通过: {}", stats.auto_fixed);
    info!("📝 人工豁免: {}", stats.overridden);
    info!("❌ 拒绝: {}", stats.rejected);
    if stats.failed > 0 {
        info!("⚠️ 处理出错: {}", stats.failed);
    }
    info!("📈 合规率: {:.0}%", compliance_rate);
    info!("{}", "=".repeat(60));
    info!("\n报告已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("比较两种缓存方案", 4), "比较两种...");
    }

    #[test]
    fn test_init_log_file_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        init_log_file(path.to_str().unwrap()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("答案格式检查报告"));
    }
}
