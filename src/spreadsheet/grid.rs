use crate::spreadsheet::cell::CellValue;

/// The uninterpreted content of one sheet: rows of cells with no header assumed.
///
/// Row `i` is spreadsheet row `i + 1`. Rows may have different lengths.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<CellValue>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

