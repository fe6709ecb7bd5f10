/// Byte range plus line/column extents for a node in a source file.
///
/// The parsing collaborator fills these in; the core only reads them. Byte
/// offsets drive miette labels, line/column pairs drive the external
/// diagnostic rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
            end_line: line,
            end_column: column + end.saturating_sub(start),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(&self, other: Span) -> Span {
        let (start, line, column) = if self.start <= other.start {
            (self.start, self.line, self.column)
        } else {
            (other.start, other.line, other.column)
        };
        let (end, end_line, end_column) = if self.end >= other.end {
            (self.end, self.end_line, self.end_column)
        } else {
            (other.end, other.end_line, other.end_column)
        };
        Span {
            start,
            end,
            line,
            column,
            end_line,
            end_column,
        }
    }

    /// Sort key for position-ordered diagnostic reporting.
    pub fn position_key(&self) -> (usize, usize, usize) {
        (self.line, self.column, self.start)
    }
}
