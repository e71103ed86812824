use serde::{Deserialize, Serialize};

/// 待检查的一条问答
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerSubmission {
    #[serde(deserialize_with = "deserialize_question_id")]
    pub question_id: String,
    pub question_text: String,
    pub answer_text: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_id_hint: Option<String>,
}

impl AnswerSubmission {
    pub fn new(
        question_id: impl Into<String>,
        question_text: impl Into<String>,
        answer_text: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            question_text: question_text.into(),
            answer_text: answer_text.into(),
            channel: channel.into(),
            pattern_id_hint: None,
        }
    }

    pub fn with_hint(mut self, pattern_id: impl Into<String>) -> Self {
        self.pattern_id_hint = Some(pattern_id.into());
        self
    }
}

/// 一个批次文件（TOML），对应一个渠道的一批答案
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionBatch {
    pub name: String,
    #[serde(default)]
    pub channel: String,
    pub submissions: Vec<AnswerSubmission>,
    #[serde(skip_serializing, skip_deserializing)]
    pub file_path: Option<String>,
}

impl SubmissionBatch {
    /// 子项未填写渠道时继承批次渠道
    pub fn normalized(mut self) -> Self {
        for submission in &mut self.submissions {
            if submission.channel.is_empty() {
                submission.channel = self.channel.clone();
            }
        }
        self
    }
}

// question_id 既可以写成字符串也可以写成整数
fn deserialize_question_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct QuestionIdVisitor;

    impl<'de> Visitor<'de> for QuestionIdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer question id")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(QuestionIdVisitor)
}
