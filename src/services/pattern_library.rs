//! 模式库 - 业务能力层
//!
//! 只负责"存取模式定义"能力。读多写少：
//! 写操作复制整张表后整体替换，读者拿到的永远是某个完整快照

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::models::pattern::FormatPattern;

type PatternMap = BTreeMap<String, FormatPattern>;

/// 模式库
///
/// 显式构造后注入到检测器 / 校验流程中，不使用全局单例
#[derive(Debug, Default)]
pub struct PatternLibrary {
    patterns: RwLock<Arc<PatternMap>>,
}

/// 优先级降序，ID 升序
pub(crate) fn by_priority_then_id(a: &FormatPattern, b: &FormatPattern) -> Ordering {
    b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id))
}

impl PatternLibrary {
    /// 创建空模式库
    pub fn new() -> Self {
        Self::default()
    }

    /// 用给定模式创建模式库
    pub fn with_patterns(patterns: Vec<FormatPattern>) -> EngineResult<Self> {
        let library = Self::new();
        library.initialize_patterns(patterns)?;
        Ok(library)
    }

    /// 整体替换模式库内容
    ///
    /// 输入中存在重复 ID 时失败，且不修改现有内容
    pub fn initialize_patterns(&self, patterns: Vec<FormatPattern>) -> EngineResult<()> {
        let mut seen = HashSet::new();
        for pattern in &patterns {
            if !seen.insert(pattern.id.as_str()) {
                return Err(EngineError::duplicate_pattern(&pattern.id));
            }
        }

        let map: PatternMap = patterns.into_iter().map(|p| (p.id.clone(), p)).collect();
        let count = map.len();
        self.replace(map);
        info!("📚 模式库已初始化: {} 个模式", count);
        Ok(())
    }

    /// 当前快照
    pub fn snapshot(&self) -> Arc<BTreeMap<String, FormatPattern>> {
        match self.patterns.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn get_pattern(&self, id: &str) -> Option<FormatPattern> {
        self.snapshot().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// 全部模式，按优先级降序、ID 升序
    pub fn get_all_patterns(&self) -> Vec<FormatPattern> {
        let mut all: Vec<FormatPattern> = self.snapshot().values().cloned().collect();
        all.sort_by(by_priority_then_id);
        all
    }

    /// 按关键词重合数排序的模式列表，重合数为 0 的不返回
    pub fn search_patterns<S: AsRef<str>>(&self, keywords: &[S]) -> Vec<FormatPattern> {
        let wanted: HashSet<String> = keywords
            .iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        let mut ranked: Vec<(usize, FormatPattern)> = self
            .snapshot()
            .values()
            .filter_map(|pattern| {
                let overlap = pattern
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .collect::<HashSet<_>>()
                    .intersection(&wanted)
                    .count();
                (overlap > 0).then(|| (overlap, pattern.clone()))
            })
            .collect();

        ranked.sort_by(|(oa, a), (ob, b)| ob.cmp(oa).then_with(|| by_priority_then_id(a, b)));
        ranked.into_iter().map(|(_, p)| p).collect()
    }

    /// 新增模式，ID 已存在时失败
    pub fn add_pattern(&self, pattern: FormatPattern) -> EngineResult<()> {
        let mut guard = self.write_guard();
        if guard.contains_key(&pattern.id) {
            return Err(EngineError::duplicate_pattern(&pattern.id));
        }
        debug!("新增模式: {}", pattern);
        let mut next = PatternMap::clone(&guard);
        next.insert(pattern.id.clone(), pattern);
        *guard = Arc::new(next);
        Ok(())
    }

    /// 替换已有模式，ID 不可修改
    pub fn update_pattern(&self, id: &str, pattern: FormatPattern) -> EngineResult<()> {
        if pattern.id != id {
            return Err(EngineError::PatternIdMismatch {
                expected: id.to_string(),
                actual: pattern.id,
            });
        }
        let mut guard = self.write_guard();
        if !guard.contains_key(id) {
            return Err(EngineError::pattern_not_found(id));
        }
        debug!("更新模式: {}", pattern);
        let mut next = PatternMap::clone(&guard);
        next.insert(id.to_string(), pattern);
        *guard = Arc::new(next);
        Ok(())
    }

    /// 删除模式
    pub fn remove_pattern(&self, id: &str) -> EngineResult<FormatPattern> {
        let mut guard = self.write_guard();
        let mut next = PatternMap::clone(&guard);
        let removed = next
            .remove(id)
            .ok_or_else(|| EngineError::pattern_not_found(id))?;
        *guard = Arc::new(next);
        debug!("删除模式: {}", removed);
        Ok(removed)
    }

    fn replace(&self, map: PatternMap) {
        *self.write_guard() = Arc::new(map);
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, Arc<PatternMap>> {
        match self.patterns.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(id: &str, priority: i32, keywords: &[&str]) -> FormatPattern {
        FormatPattern::new(id, id.to_uppercase())
            .with_priority(priority)
            .with_keywords(keywords.iter().copied())
    }

    #[test]
    fn test_initialize_rejects_duplicates() {
        let library = PatternLibrary::new();
        library
            .initialize_patterns(vec![pattern("a", 1, &[])])
            .unwrap();

        let err = library
            .initialize_patterns(vec![pattern("b", 1, &[]), pattern("b", 2, &[])])
            .unwrap_err();
        assert_eq!(err, EngineError::DuplicatePatternId { id: "b".into() });
        // 失败时保持原内容
        assert!(library.get_pattern("a").is_some());
        assert!(library.get_pattern("b").is_none());
    }

    #[test]
    fn test_get_all_patterns_order() {
        let library = PatternLibrary::with_patterns(vec![
            pattern("zeta", 5, &[]),
            pattern("alpha", 5, &[]),
            pattern("beta", 9, &[]),
        ])
        .unwrap();

        let ids: Vec<_> = library.get_all_patterns().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["beta", "alpha", "zeta"]);
    }

    #[test]
    fn test_search_patterns_ranking() {
        let library = PatternLibrary::with_patterns(vec![
            pattern("one-hit", 10, &["compare", "install"]),
            pattern("two-hits", 1, &["compare", "vs", "table"]),
            pattern("tie", 1, &["Compare", "VS"]),
            pattern("none", 100, &["diagram"]),
        ])
        .unwrap();

        let ids: Vec<_> = library
            .search_patterns(&["compare", "vs"])
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["tie", "two-hits", "one-hit"]);
    }

    #[test]
    fn test_add_and_update() {
        let library = PatternLibrary::new();
        library.add_pattern(pattern("a", 1, &[])).unwrap();
        assert!(matches!(
            library.add_pattern(pattern("a", 2, &[])),
            Err(EngineError::DuplicatePatternId { .. })
        ));

        library.update_pattern("a", pattern("a", 7, &[])).unwrap();
        assert_eq!(library.get_pattern("a").unwrap().priority, 7);

        assert!(matches!(
            library.update_pattern("missing", pattern("missing", 1, &[])),
            Err(EngineError::PatternNotFound { .. })
        ));
        assert!(matches!(
            library.update_pattern("a", pattern("b", 1, &[])),
            Err(EngineError::PatternIdMismatch { .. })
        ));
    }

    #[test]
    fn test_snapshot_unaffected_by_later_writes() {
        let library = PatternLibrary::with_patterns(vec![pattern("a", 1, &[])]).unwrap();
        let before = library.snapshot();
        library.add_pattern(pattern("b", 1, &[])).unwrap();
        library.remove_pattern("a").unwrap();

        assert_eq!(before.len(), 1);
        assert!(before.contains_key("a"));
        assert_eq!(library.len(), 1);
        assert!(library.get_pattern("b").is_some());
    }
}
