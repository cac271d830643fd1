//! Line and column lookup for byte offsets.

use tern_ir::Span;

/// Start offset of every line, for binary-search lookups.
///
/// ```
/// use tern_diagnostic::span_utils::LineOffsetTable;
///
/// let source = "a := 1\nb := a";
/// let table = LineOffsetTable::build(source);
/// assert_eq!(table.line_col(source, 0), (1, 1));
/// assert_eq!(table.line_col(source, 12), (2, 6));
/// ```
#[derive(Clone, Debug, Default)]
pub struct LineOffsetTable {
    starts: Vec<u32>,
}

impl LineOffsetTable {
    pub fn build(source: &str) -> Self {
        let mut starts = vec![0u32];
        starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| u32::try_from(i + 1).unwrap_or(u32::MAX)),
        );
        LineOffsetTable { starts }
    }

    /// 1-based line containing `offset`.
    pub fn line(&self, offset: u32) -> u32 {
        let idx = match self.starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert) => insert.saturating_sub(1),
        };
        u32::try_from(idx).unwrap_or(u32::MAX - 1) + 1
    }

    /// 1-based `(line, column)`, counting columns in characters.
    pub fn line_col(&self, source: &str, offset: u32) -> (u32, u32) {
        let line = self.line(offset);
        let start = self.starts[(line - 1) as usize] as usize;
        let end = (offset as usize).min(source.len()).max(start);
        let column = source
            .get(start..end)
            .map_or(0, |s| s.chars().count());
        (line, u32::try_from(column).unwrap_or(u32::MAX - 1) + 1)
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }
}

/// One-off `(line, column)` of a span's start. Prefer [`LineOffsetTable`]
/// for repeated lookups.
pub fn span_line_col(source: &str, span: Span) -> (u32, u32) {
    LineOffsetTable::build(source).line_col(source, span.start)
}
