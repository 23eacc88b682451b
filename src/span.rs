//! Byte offsets and spans threaded through every token, AST node, and diagnostic.
//!
//! Re-exports [`text_size`]'s newtypes so offset arithmetic never silently mixes
//! bytes with other units, and adds the line index used to project a byte
//! offset into a (line, UTF-16 column) pair for diagnostics and source maps.

pub use text_size::{TextRange, TextSize};

/// Pre-scans source text once, recording the byte offset of every line start.
///
/// Lookups are binary search over the recorded offsets. Recognized line
/// terminators: LF, CRLF (one logical newline), lone CR. Offsets past the end
/// of the source clamp to the last valid position instead of failing, so
/// diagnostics and source maps never panic on an out-of-range span.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the start of each line. `line_starts[0]` is always 0.
    line_starts: Vec<TextSize>,
    source_len: TextSize,
}

/// A 0-based line and 0-based column, in the units requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LineCol {
    pub line: u32,
    pub column: u32,
}

impl LineIndex {
    /// Scans `source` once and records every line start.
    #[must_use]
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![TextSize::from(0)];
        let bytes = source.as_bytes();
        let mut i = 0usize;
        while i < bytes.len() {
            match bytes[i] {
                b'\r' => {
                    // CRLF is one logical newline; lone CR is also one.
                    let next = if i + 1 < bytes.len() && bytes[i + 1] == b'\n' { i + 2 } else { i + 1 };
                    line_starts.push(TextSize::try_from(next).expect("source too large"));
                    i = next;
                }
                b'\n' => {
                    line_starts.push(TextSize::try_from(i + 1).expect("source too large"));
                    i += 1;
                }
                _ => i += 1,
            }
        }
        Self {
            line_starts,
            source_len: TextSize::try_from(source.len()).expect("source too large"),
        }
    }

    fn clamp(&self, offset: TextSize) -> TextSize {
        offset.min(self.source_len)
    }

    /// Returns the 0-based line number containing `offset`, clamping out-of-range offsets.
    #[must_use]
    pub fn line(&self, offset: TextSize) -> u32 {
        let offset = self.clamp(offset);
        match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact as u32,
            Err(insert_at) => (insert_at - 1) as u32,
        }
    }

    /// Converts a byte offset into a (line, byte-column) pair, clamping out-of-range offsets.
    #[must_use]
    pub fn line_col_byte(&self, offset: TextSize) -> LineCol {
        let offset = self.clamp(offset);
        let line = self.line(offset);
        let line_start = self.line_starts[line as usize];
        LineCol { line, column: u32::from(offset - line_start) }
    }

    /// Converts a byte offset into a (line, UTF-16 column) pair, clamping out-of-range offsets.
    ///
    /// Source map output requires UTF-16 columns: a supplementary-plane code
    /// point (outside the BMP) counts as two units, matching JavaScript's
    /// notion of string length.
    #[must_use]
    pub fn line_col_utf16(&self, source: &str, offset: TextSize) -> LineCol {
        let offset = self.clamp(offset);
        let line = self.line(offset);
        let line_start = self.line_starts[line as usize];
        let line_text = &source[usize::from(line_start)..usize::from(offset)];
        let column: u32 = line_text.chars().map(|c| u32::from(c.len_utf16() as u32)).sum();
        LineCol { line, column }
    }

    /// Converts a (line, byte-column) pair back to a byte offset, clamping out-of-range inputs.
    #[must_use]
    pub fn offset(&self, line: u32, byte_column: u32) -> TextSize {
        let line = (line as usize).min(self.line_starts.len() - 1);
        let line_start = self.line_starts[line];
        let line_end = self
            .line_starts
            .get(line + 1)
            .copied()
            .unwrap_or(self.source_len);
        (line_start + TextSize::from(byte_column)).min(line_end).min(self.source_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_byte_columns() {
        let source = "abc\ndef\r\nghi\rjkl";
        let index = LineIndex::new(source);
        for (pos, _) in source.char_indices() {
            let offset = TextSize::try_from(pos).unwrap();
            let lc = index.line_col_byte(offset);
            let back = index.offset(lc.line, lc.column);
            assert_eq!(back, offset, "round-trip failed at byte {pos}");
        }
    }

    #[test]
    fn crlf_is_one_newline() {
        let index = LineIndex::new("a\r\nb");
        assert_eq!(index.line(TextSize::from(3)), 1);
        assert_eq!(index.line_col_byte(TextSize::from(3)), LineCol { line: 1, column: 0 });
    }

    #[test]
    fn out_of_range_clamps() {
        let index = LineIndex::new("abc");
        let lc = index.line_col_byte(TextSize::from(1000));
        assert_eq!(lc, LineCol { line: 0, column: 3 });
    }

    #[test]
    fn utf16_counts_supplementary_plane_as_two() {
        // U+1F600 is outside the BMP and needs a surrogate pair (2 UTF-16 units).
        let source = "a\u{1F600}b";
        let index = LineIndex::new(source);
        let offset_of_b = TextSize::try_from(source.find('b').unwrap()).unwrap();
        let lc = index.line_col_utf16(source, offset_of_b);
        assert_eq!(lc.column, 3); // 'a' (1) + emoji (2)
    }
}
