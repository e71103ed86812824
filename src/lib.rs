//! # Answer Format Standards
//!
//! 问答平台的答案格式规范引擎：识别问题类型、按模式校验答案结构、
//! 自动修复可机械修复的问题、支持人工豁免并统计合规指标
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 数据层（Models）
//! - `models/` - 模式、校验结果、豁免、指标事件等纯数据类型
//! - `models/loaders` - 从 TOML / JSON 加载模式与答案批次
//! - `models/builtin` - 内置的六种答案模式
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单条答案
//! - `PatternLibrary` - 模式库（增删改查）
//! - `PatternDetector` - 关键词检测
//! - `FormatValidator` - 结构与规则校验、评分
//! - `AutoFormatter` - 应用修复描述
//! - `OverrideStore` - 人工豁免
//! - `MetricsCollector` - 事件日志与指标聚合
//! - `RejectWriter` - 写 rejected.txt 能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一条答案"的完整处理流程
//! - `AnswerCtx` - 上下文封装（批次 + 序号 + 题目ID）
//! - `AnswerFlow` - 流程编排（detect → validate → fix → override → metrics）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量处理器，管理并发与统计
//! - `orchestrator/submission_processor` - 单条答案处理器
//!
//! ## 模块结构

pub mod config;
pub mod error;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, ScoringConfig};
pub use error::{EngineError, EngineResult};
pub use models::{
    AnswerSubmission, FormatMetrics, FormatPattern, OverrideRecord, Severity, ValidationResult,
    ValidationViolation,
};
pub use orchestrator::App;
pub use services::{
    AutoFormatter, FormatValidator, MetricsCollector, OverrideStore, PatternDetector,
    PatternLibrary,
};
pub use workflow::{AnswerCtx, AnswerFlow, Decision, EngineOutcome};
