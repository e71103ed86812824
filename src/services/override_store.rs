//! 豁免存储 - 业务能力层
//!
//! 按 questionId 保存人工审核通过的豁免。
//! 豁免只影响调用方是否拒绝，不改变分数和违规列表

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::models::override_record::{NewOverride, OverrideRecord};

/// 豁免理由最少字符数
pub const MIN_JUSTIFICATION_CHARS: usize = 10;

/// 豁免存储
#[derive(Debug, Default)]
pub struct OverrideStore {
    records: Mutex<HashMap<String, OverrideRecord>>,
}

impl OverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从外部存储恢复记录，questionId 重复时失败
    pub fn from_records(records: Vec<OverrideRecord>) -> EngineResult<Self> {
        let mut map = HashMap::with_capacity(records.len());
        for record in records {
            if map.contains_key(&record.question_id) {
                return Err(EngineError::DuplicateOverride {
                    question_id: record.question_id,
                });
            }
            map.insert(record.question_id.clone(), record);
        }
        Ok(Self {
            records: Mutex::new(map),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, OverrideRecord>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 所有豁免，按时间、questionId 排序
    pub fn get_overrides(&self) -> Vec<OverrideRecord> {
        let mut all: Vec<OverrideRecord> = self.lock().values().cloned().collect();
        all.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.question_id.cmp(&b.question_id))
        });
        all
    }

    /// 新增豁免，时间戳由存储分配
    ///
    /// 同一 questionId 已有豁免时拒绝，不做合并
    pub fn add_override(&self, request: NewOverride) -> EngineResult<OverrideRecord> {
        let question_id = request
            .question_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(EngineError::MissingQuestionId)?;

        let length = request.justification.trim().chars().count();
        if length < MIN_JUSTIFICATION_CHARS {
            return Err(EngineError::JustificationTooShort {
                length,
                min: MIN_JUSTIFICATION_CHARS,
            });
        }

        let mut records = self.lock();
        if records.contains_key(&question_id) {
            return Err(EngineError::DuplicateOverride { question_id });
        }

        let record = OverrideRecord {
            question_id: question_id.clone(),
            justification: request.justification,
            override_pattern: request.override_pattern,
            original_pattern: request.original_pattern,
            timestamp: Utc::now(),
            user_id: request.user_id,
        };
        records.insert(question_id, record.clone());
        info!(
            "📝 新增豁免: 题目 {} (操作人: {})",
            record.question_id, record.user_id
        );
        Ok(record)
    }

    /// 删除豁免
    pub fn remove_override(&self, question_id: &str) -> EngineResult<OverrideRecord> {
        let removed = self
            .lock()
            .remove(question_id)
            .ok_or_else(|| EngineError::override_not_found(question_id))?;
        info!("🗑️ 删除豁免: 题目 {}", question_id);
        Ok(removed)
    }

    pub fn has_override(&self, question_id: &str) -> bool {
        self.lock().contains_key(question_id)
    }

    pub fn get_override(&self, question_id: &str) -> Option<OverrideRecord> {
        self.lock().get(question_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
