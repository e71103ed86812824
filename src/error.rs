use thiserror::Error;

/// 引擎 API 使用错误
///
/// 只表示调用方误用了 API（重复 ID、缺少字段等）。
/// 内容质量问题永远不会走这里，而是作为 `ValidationResult.violations` 返回。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// 模式不存在
    #[error("模式不存在: {id}")]
    PatternNotFound { id: String },

    /// 模式 ID 重复
    #[error("模式 ID 重复: {id}")]
    DuplicatePatternId { id: String },

    /// 更新时模式 ID 与目标 ID 不一致
    #[error("模式 ID 不可修改: 目标 {expected}, 实际 {actual}")]
    PatternIdMismatch { expected: String, actual: String },

    /// 缺少题目 ID
    #[error("豁免记录缺少 questionId")]
    MissingQuestionId,

    /// 豁免理由过短
    #[error("豁免理由过短: {length} 个字符 (至少 {min} 个)")]
    JustificationTooShort { length: usize, min: usize },

    /// 该题目已存在生效中的豁免
    #[error("题目 {question_id} 已存在豁免记录")]
    DuplicateOverride { question_id: String },

    /// 豁免记录不存在
    #[error("题目 {question_id} 没有豁免记录")]
    OverrideNotFound { question_id: String },

    /// 配置错误
    #[error("配置错误: {0}")]
    InvalidConfig(String),
}

// ========== 便捷构造函数 ==========

impl EngineError {
    /// 创建模式不存在错误
    pub fn pattern_not_found(id: impl Into<String>) -> Self {
        EngineError::PatternNotFound { id: id.into() }
    }

    /// 创建模式 ID 重复错误
    pub fn duplicate_pattern(id: impl Into<String>) -> Self {
        EngineError::DuplicatePatternId { id: id.into() }
    }

    /// 创建豁免记录不存在错误
    pub fn override_not_found(question_id: impl Into<String>) -> Self {
        EngineError::OverrideNotFound {
            question_id: question_id.into(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 引擎结果类型
pub type EngineResult<T> = Result<T, EngineError>;
