//! 文本定位工具
//!
//! 预先记录每行起始偏移，通过二分查找把字节偏移转换为 1-based 行列号

use crate::models::validation::Location;

/// 行起始偏移索引
#[derive(Debug, Clone)]
pub struct TextIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> TextIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, line_starts }
    }

    /// 字节偏移 → 行列号；列号按字符计
    ///
    /// 偏移超出文本或不在字符边界上时返回 None
    pub fn location(&self, offset: usize) -> Option<Location> {
        if offset > self.text.len() || !self.text.is_char_boundary(offset) {
            return None;
        }
        let line_idx = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let line_start = self.line_starts[line_idx];
        let column = self.text[line_start..offset].chars().count() + 1;
        Some(Location {
            line: line_idx + 1,
            column,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_first_line() {
        let index = TextIndex::new("hello\nworld");
        assert_eq!(index.location(0), Some(Location { line: 1, column: 1 }));
        assert_eq!(index.location(4), Some(Location { line: 1, column: 5 }));
    }

    #[test]
    fn test_location_after_newline() {
        let index = TextIndex::new("hello\nworld\n");
        assert_eq!(index.location(6), Some(Location { line: 2, column: 1 }));
        assert_eq!(index.location(12), Some(Location { line: 3, column: 1 }));
    }

    #[test]
    fn test_location_counts_chars_not_bytes() {
        let text = "答案: ok";
        let index = TextIndex::new(text);
        let offset = text.find("ok").unwrap();
        assert_eq!(index.location(offset), Some(Location { line: 1, column: 5 }));
        // 落在多字节字符中间
        assert_eq!(index.location(1), None);
    }

    #[test]
    fn test_out_of_range() {
        let index = TextIndex::new("abc");
        assert_eq!(index.location(3), Some(Location { line: 1, column: 4 }));
        assert_eq!(index.location(4), None);
    }
}
