//! 单条答案处理器 - 编排层
//!
//! ## 职责
//!
//! 把一条答案交给 `AnswerFlow`，再根据结论决定是否写入拒绝记录。
//! 流程本身不做 IO，所有文件写入都在这里完成。

use anyhow::Result;
use tracing::{error, info};

use crate::models::submission::AnswerSubmission;
use crate::services::RejectWriter;
use crate::workflow::{AnswerCtx, AnswerFlow, Decision};

/// 处理单条答案
///
/// # 参数
/// - `flow`: 答案处理流程（共享）
/// - `rejects`: 拒绝记录写入服务（共享）
/// - `submission`: 答案
/// - `ctx`: 上下文（用于日志）
///
/// # 返回
/// 返回最终结论；流程错误（如指定了不存在的模式）向上传递
pub async fn process_submission(
    flow: &AnswerFlow,
    rejects: &RejectWriter,
    submission: &AnswerSubmission,
    ctx: &AnswerCtx,
) -> Result<Decision> {
    let outcome = match flow.run(submission, ctx) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{} ❌ 处理失败: {}", ctx, e);
            return Err(e.into());
        }
    };

    match outcome.decision {
        Decision::Accepted => info!("{} ✅ 通过 (分数 {})", ctx, outcome.validation_result.score),
        Decision::AutoFixed => info!(
            "{} 🔧 自动修复后通过 (分数 {})",
            ctx, outcome.validation_result.score
        ),
        Decision::Overridden => info!("{} 📝 人工豁免", ctx),
        Decision::Rejected => {
            rejects
                .write(
                    &outcome.question_id,
                    outcome.pattern_id(),
                    &outcome.validation_result,
                    outcome
                        .formatted_answer
                        .as_deref()
                        .unwrap_or(&submission.answer_text),
                )
                .await?;
        }
    }

    Ok(outcome.decision)
}
