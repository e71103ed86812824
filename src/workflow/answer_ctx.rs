//! 答案处理上下文
//!
//! 封装"我正在处理哪个批次的第几条答案"这一信息

use std::fmt::Display;

/// 答案处理上下文
#[derive(Debug, Clone)]
pub struct AnswerCtx {
    /// 批次名称
    pub batch_name: String,

    /// 答案在全部待处理答案中的序号（从1开始，仅用于日志显示）
    pub index: usize,

    /// 题目ID
    pub question_id: String,

    /// 渠道
    pub channel: String,
}

impl AnswerCtx {
    /// 创建新的答案上下文
    pub fn new(
        batch_name: impl Into<String>,
        index: usize,
        question_id: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            batch_name: batch_name.into(),
            index,
            question_id: question_id.into(),
            channel: channel.into(),
        }
    }
}

impl Display for AnswerCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[批次 {} 答案#{} 题目 ID#{} 渠道#{}]",
            self.batch_name, self.index, self.question_id, self.channel
        )
    }
}
