use crate::models::pattern::FormatPattern;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 模式定义文件：`[[patterns]]` 列表
#[derive(Debug, Deserialize)]
struct PatternFile {
    #[serde(default)]
    patterns: Vec<FormatPattern>,
}

/// 按扩展名解析模式定义（toml / json）
///
/// JSON 既可以是 `{ "patterns": [...] }`，也可以直接是数组
pub fn parse_patterns(content: &str, extension: &str) -> Result<Vec<FormatPattern>> {
    match extension {
        "toml" => {
            let file: PatternFile = toml::from_str(content).context("无法解析 TOML 模式定义")?;
            Ok(file.patterns)
        }
        "json" => {
            if content.trim_start().starts_with('[') {
                serde_json::from_str(content).context("无法解析 JSON 模式数组")
            } else {
                let file: PatternFile =
                    serde_json::from_str(content).context("无法解析 JSON 模式定义")?;
                Ok(file.patterns)
            }
        }
        other => anyhow::bail!("不支持的模式文件格式: {}", other),
    }
}

/// 从单个文件加载模式
pub async fn load_pattern_file(path: &Path) -> Result<Vec<FormatPattern>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取模式文件: {}", path.display()))?;

    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or_default();
    parse_patterns(&content, extension)
        .with_context(|| format!("无法解析模式文件: {}", path.display()))
}

/// 从文件夹中加载所有模式定义文件
///
/// 文件按文件名排序后依次加载，保证结果顺序稳定；单个文件失败只记录警告
pub async fn load_all_pattern_files(folder_path: &str) -> Result<Vec<FormatPattern>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("toml") | Some("json")
        ) {
            files.push(path);
        }
    }
    files.sort();

    let mut patterns = Vec::new();
    for path in files {
        tracing::info!(
            "正在加载模式文件: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_pattern_file(&path).await {
            Ok(loaded) => {
                tracing::info!("成功加载 {} 个模式", loaded.len());
                patterns.extend(loaded);
            }
            Err(e) => {
                tracing::warn!("加载模式文件失败 {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pattern::{RuleCheck, SectionFormat};

    const PATTERN_TOML: &str = r#"
[[patterns]]
id = "glossary"
name = "Glossary Entry"
keywords = ["define", "meaning"]
priority = 3

[[patterns.structure.sections]]
name = "Definition"
required = true
format = "text"

[[patterns.rules]]
id = "short-definition"
error_message = "Definitions should stay under 600 characters"
severity = "info"
check = { type = "max_length", chars = 600 }
"#;

    #[test]
    fn test_parse_toml_patterns() {
        let patterns = parse_patterns(PATTERN_TOML, "toml").unwrap();
        assert_eq!(patterns.len(), 1);

        let glossary = &patterns[0];
        assert_eq!(glossary.id, "glossary");
        assert_eq!(glossary.priority, 3);
        assert_eq!(glossary.structure.sections[0].format, SectionFormat::Text);
        assert_eq!(glossary.rules[0].check, RuleCheck::MaxLength { chars: 600 });
    }

    #[test]
    fn test_parse_json_array() {
        let json = r#"[{"id": "faq", "name": "FAQ", "keywords": ["faq"]}]"#;
        let patterns = parse_patterns(json, "json").unwrap();
        assert_eq!(patterns[0].id, "faq");
        assert!(patterns[0].rules.is_empty());
    }

    #[test]
    fn test_unknown_extension_rejected() {
        assert!(parse_patterns("", "yaml").is_err());
    }

    #[tokio::test]
    async fn test_load_folder_skips_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.toml"), PATTERN_TOML).unwrap();
        std::fs::write(dir.path().join("b.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let patterns = load_all_pattern_files(dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(patterns.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_folder_is_error() {
        assert!(load_all_pattern_files("/definitely/not/here").await.is_err());
    }
}
