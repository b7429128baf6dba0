use serde::Serialize;

/// Identifier of a source file in the [`FileTable`].
///
/// The expression compiler never owns file names; tokens and errors carry a
/// `FileId` and the table maps it back to a path for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FileId(pub u32);

/// Position of a token in the original source, as reported by the parser.
///
/// The parser front-end reports 1-based line and column numbers. Every
/// expression token and every diagnostic carries one of these; the core
/// never recomputes positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SrcInfo {
    pub file: FileId,
    pub line: u32,
    pub col: u32,
}

impl SrcInfo {
    /// Create a new source position.
    pub fn new(file: FileId, line: u32, col: u32) -> Self {
        Self { file, line, col }
    }

    /// A synthetic position for tokens generated by the compiler itself
    /// (inserted ternary ends, implicit promotions). Line 0 never occurs in
    /// parser output.
    pub fn synthetic() -> Self {
        Self { file: FileId(0), line: 0, col: 0 }
    }
}

/// Registry of source file names, indexed by [`FileId`].
#[derive(Debug, Default)]
pub struct FileTable {
    names: Vec<String>,
}

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file name and return its id. The same name registered
    /// twice yields two ids; the parser registers each file once.
    pub fn add(&mut self, name: impl Into<String>) -> FileId {
        self.names.push(name.into());
        FileId((self.names.len() - 1) as u32)
    }

    /// Look up a file name. Unknown ids render as `<unknown>` rather than
    /// panicking so diagnostics never abort the compiler.
    pub fn name(&self, id: FileId) -> &str {
        self.names
            .get(id.0 as usize)
            .map(String::as_str)
            .unwrap_or("<unknown>")
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Pre-computed index of line start offsets for a source string.
///
/// Diagnostics rendering needs byte offsets while the parser reports
/// line/column pairs; this maps between the two representations.
#[derive(Debug)]
pub struct LineIndex {
    /// Byte offset of the start of each line. The first entry is always 0.
    line_starts: Vec<u32>,
}

impl LineIndex {
    /// Build a line index by scanning the source text for newlines.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    /// Byte offset of the start of a 1-based line. Lines past the end of
    /// the source clamp to the last line start.
    pub fn line_offset(&self, line: u32) -> u32 {
        let idx = (line.max(1) as usize - 1).min(self.line_starts.len() - 1);
        self.line_starts[idx]
    }

    /// Byte offset of a 1-based (line, column) pair.
    pub fn offset(&self, line: u32, col: u32) -> u32 {
        self.line_offset(line) + col.max(1) - 1
    }

    /// Convert a byte offset back to a 1-based (line, column) pair.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let line_idx = self.line_starts.partition_point(|&start| start <= offset);
        let line_idx = line_idx.saturating_sub(1);
        let line = (line_idx as u32) + 1;
        let col = offset - self.line_starts[line_idx] + 1;
        (line, col)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_table_add_and_name() {
        let mut files = FileTable::new();
        let a = files.add("main.stv");
        let b = files.add("lib.stv");
        assert_eq!(files.name(a), "main.stv");
        assert_eq!(files.name(b), "lib.stv");
        assert_eq!(files.name(FileId(99)), "<unknown>");
    }

    #[test]
    fn src_info_synthetic_is_line_zero() {
        assert_eq!(SrcInfo::synthetic().line, 0);
    }

    #[test]
    fn line_index_round_trip() {
        let src = "hello\nworld\nfoo";
        let idx = LineIndex::new(src);
        assert_eq!(idx.offset(1, 1), 0);
        assert_eq!(idx.offset(2, 1), 6);
        assert_eq!(idx.offset(3, 2), 13);
        assert_eq!(idx.line_col(6), (2, 1));
        assert_eq!(idx.line_col(13), (3, 2));
        assert_eq!(idx.line_count(), 3);
    }

    #[test]
    fn line_index_clamps_out_of_range_lines() {
        let idx = LineIndex::new("ab\ncd");
        assert_eq!(idx.line_offset(10), 3);
    }
}
