use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 人工审核通过的豁免记录
///
/// 一经创建不再修改；替换 = 删除 + 新增
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRecord {
    pub question_id: String,
    pub justification: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_pattern: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
}

/// 新增豁免的请求，时间戳由存储分配
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOverride {
    #[serde(default)]
    pub question_id: Option<String>,
    pub justification: String,
    #[serde(default)]
    pub override_pattern: Option<String>,
    #[serde(default)]
    pub original_pattern: Option<String>,
    #[serde(default)]
    pub user_id: String,
}

impl NewOverride {
    pub fn new(question_id: impl Into<String>, justification: impl Into<String>) -> Self {
        Self {
            question_id: Some(question_id.into()),
            justification: justification.into(),
            ..Default::default()
        }
    }

    pub fn by_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_patterns(
        mut self,
        original_pattern: Option<String>,
        override_pattern: Option<String>,
    ) -> Self {
        self.original_pattern = original_pattern;
        self.override_pattern = override_pattern;
        self
    }
}
