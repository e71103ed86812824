//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量答案处理器
//! - 管理应用生命周期（初始化、运行）
//! - 加载模式库和答案批次（Vec<SubmissionBatch>）
//! - 控制并发数量（Semaphore）
//! - 输出全局统计信息并导出指标
//!
//! ### `submission_processor` - 单条答案处理器
//! - 调用 AnswerFlow
//! - 写入拒绝记录
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<SubmissionBatch>)
//!     ↓
//! submission_processor (处理单条 AnswerSubmission)
//!     ↓
//! workflow::AnswerFlow (检测 → 校验 → 修复 → 豁免)
//!     ↓
//! services (能力层：library / detector / validator / formatter / overrides / metrics)
//! ```

pub mod batch_processor;
pub mod submission_processor;

// 重新导出主要类型
pub use batch_processor::App;
pub use submission_processor::process_submission;
