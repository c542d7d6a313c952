// WHY: annotator offsets count characters, Rust strings index bytes
// Every substring the crate hands out goes through this mapping

use serde::{Deserialize, Serialize};

/// Half-open character interval `[begin, end)` into the original input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub begin: usize,
    pub end: usize,
}

impl Span {
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.begin)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.begin
    }
}

impl From<(usize, usize)> for Span {
    fn from((begin, end): (usize, usize)) -> Self {
        Self { begin, end }
    }
}

/// Unit the annotator counts offsets in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetUnit {
    /// Unicode scalar values
    Chars,
    /// UTF-16 code units (Java `char`), as CoreNLP reports them; differs from
    /// `Chars` only outside the BMP
    #[default]
    Utf16,
}

impl OffsetUnit {
    /// Length of `text` counted in this unit
    pub fn measure(self, text: &str) -> usize {
        match self {
            OffsetUnit::Chars => text.chars().count(),
            OffsetUnit::Utf16 => text.encode_utf16().count(),
        }
    }
}

/// Offset-to-byte lookup table for one input string
#[derive(Debug, Clone)]
pub struct OffsetIndex<'a> {
    text: &'a str,
    unit: OffsetUnit,
    /// `(offset, byte)` for every character boundary, end of text included
    boundaries: Vec<(usize, usize)>,
}

impl<'a> OffsetIndex<'a> {
    pub fn new(text: &'a str, unit: OffsetUnit) -> Self {
        let mut boundaries = Vec::with_capacity(text.len() + 1);
        let mut offset = 0;
        for (byte, ch) in text.char_indices() {
            boundaries.push((offset, byte));
            offset += match unit {
                OffsetUnit::Chars => 1,
                OffsetUnit::Utf16 => ch.len_utf16(),
            };
        }
        boundaries.push((offset, text.len()));
        Self { text, unit, boundaries }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn unit(&self) -> OffsetUnit {
        self.unit
    }

    /// Length of the text in offset units
    pub fn len(&self) -> usize {
        self.boundaries.last().map_or(0, |&(offset, _)| offset)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Byte position of `offset`, if it lands on a character boundary
    pub fn byte_at(&self, offset: usize) -> Option<usize> {
        match self.unit {
            OffsetUnit::Chars => self.boundaries.get(offset).map(|&(_, byte)| byte),
            OffsetUnit::Utf16 => self
                .boundaries
                .binary_search_by_key(&offset, |&(o, _)| o)
                .ok()
                .map(|i| self.boundaries[i].1),
        }
    }

    /// Exact substring for `span`; `None` if it is reversed, past the end, or splits a character
    pub fn slice(&self, span: Span) -> Option<&'a str> {
        if span.begin > span.end {
            return None;
        }
        let start = self.byte_at(span.begin)?;
        let end = self.byte_at(span.end)?;
        self.text.get(start..end)
    }

    /// Like `slice`, but offsets past the end are clamped and a reversed span is empty
    pub fn slice_clamped(&self, span: Span) -> Option<&'a str> {
        let len = self.len();
        let end = span.end.min(len);
        let begin = span.begin.min(end);
        self.slice(Span::new(begin, end))
    }
}

/// One-shot substring lookup without keeping an index around
pub fn substring(text: &str, span: Span, unit: OffsetUnit) -> Option<&str> {
    OffsetIndex::new(text, unit).slice(span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_slice() {
        let index = OffsetIndex::new("Hello world.", OffsetUnit::Chars);
        assert_eq!(index.slice(Span::new(0, 5)), Some("Hello"));
        assert_eq!(index.slice(Span::new(5, 11)), Some(" world"));
        assert_eq!(index.slice(Span::new(12, 12)), Some(""));
        assert_eq!(index.slice(Span::new(11, 13)), None);
        assert_eq!(index.slice(Span::new(4, 2)), None);
    }

    #[test]
    fn test_arabic_offsets_are_characters() {
        let text = "تخرج توم من";
        let index = OffsetIndex::new(text, OffsetUnit::Chars);
        assert_eq!(index.len(), 11);
        assert_eq!(index.slice(Span::new(0, 4)), Some("تخرج"));
        assert_eq!(index.slice(Span::new(5, 8)), Some("توم"));
        assert_eq!(index.slice(Span::new(9, 11)), Some("من"));
    }

    #[test]
    fn test_utf16_units_outside_bmp() {
        let text = "a🦀b";
        let chars = OffsetIndex::new(text, OffsetUnit::Chars);
        assert_eq!(chars.slice(Span::new(2, 3)), Some("b"));

        let utf16 = OffsetIndex::new(text, OffsetUnit::Utf16);
        assert_eq!(utf16.len(), 4);
        assert_eq!(utf16.slice(Span::new(1, 3)), Some("🦀"));
        assert_eq!(utf16.slice(Span::new(3, 4)), Some("b"));
        // Offset 2 falls between the surrogate halves
        assert_eq!(utf16.slice(Span::new(2, 4)), None);
    }

    #[test]
    fn test_default_unit_counts_java_chars() {
        assert_eq!(OffsetUnit::default(), OffsetUnit::Utf16);
        assert_eq!(OffsetUnit::Utf16.measure("🦀 a"), 4);
        assert_eq!(OffsetUnit::Chars.measure("🦀 a"), 3);
        assert_eq!(OffsetUnit::Utf16.measure("تخرج"), 4);
    }

    #[test]
    fn test_clamped_slice() {
        let index = OffsetIndex::new("abc", OffsetUnit::Chars);
        assert_eq!(index.slice_clamped(Span::new(1, 10)), Some("bc"));
        assert_eq!(index.slice_clamped(Span::new(7, 10)), Some(""));
        assert_eq!(index.slice_clamped(Span::new(2, 1)), Some(""));
    }

    #[test]
    fn test_substring_helper() {
        assert_eq!(substring("x y z", Span::new(2, 3), OffsetUnit::Chars), Some("y"));
        assert_eq!(Span::from((3, 7)).len(), 4);
        assert!(Span::new(4, 4).is_empty());
    }
}
