use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::reference::MAX_COLUMNS;
use crate::spreadsheet::reference::MAX_ROWS;
use crate::spreadsheet::SheetError;

/// Non-empty cells one sheet may hold, counting repeated cells one by one.
pub(crate) const MAX_CELLS: usize = 4_194_304;

/// Cells collected from one worksheet, in the order the reader produced them.
pub(crate) struct Sheet {
    /// Sheet name
    pub(crate) name: String,
    /// All non-empty cells in the sheet
    pub(crate) cells: Vec<Cell>,
    /// Largest row index seen so far
    pub(crate) row_upper_bound: Option<usize>,
}

impl Sheet {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            cells: Vec::new(),
            row_upper_bound: None,
        }
    }

    /// Returns true if the sheet contains no cells.
    pub(crate) fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell; empty cells carry no information and are dropped.
    pub(crate) fn push(&mut self, cell: Cell) -> Result<(), SheetError> {
        if cell.kind == CellType::Empty || cell.value.is_empty() {
            return Ok(());
        }
        if cell.row >= MAX_ROWS || cell.col >= MAX_COLUMNS {
            return Err(SheetError::CellOutOfRangeError(cell.row, cell.col));
        }
        if self.cells.len() >= MAX_CELLS {
            return Err(SheetError::SheetTooLargeError(MAX_CELLS));
        }
        self.row_upper_bound = Some(self.row_upper_bound.map_or(cell.row, |row| row.max(cell.row)));
        self.cells.push(cell);
        Ok(())
    }

    /// Adds `cell` to every position of the `rows` x `cols` block it starts.
    ///
    /// The block is clipped to the addressable grid; a block that would take
    /// the sheet past [`MAX_CELLS`] fails before anything is added.
    pub(crate) fn push_repeated(&mut self, cell: Cell, rows: usize, cols: usize) -> Result<(), SheetError> {
        if cell.kind == CellType::Empty || cell.value.is_empty() {
            return Ok(());
        }
        let rows = rows.min(MAX_ROWS.saturating_sub(cell.row));
        let cols = cols.min(MAX_COLUMNS.saturating_sub(cell.col));
        if self.cells.len().saturating_add(rows.saturating_mul(cols)) > MAX_CELLS {
            return Err(SheetError::SheetTooLargeError(MAX_CELLS));
        }
        for row in cell.row..cell.row + rows {
            for col in cell.col..cell.col + cols {
                self.push(Cell {
                    row,
                    col,
                    kind: cell.kind,
                    value: cell.value.clone(),
                })?;
            }
        }
        Ok(())
    }

    /// Returns true once `row` lies below the last addressable row.
    pub(crate) fn is_past_last_row(row: usize) -> bool {
        row >= MAX_ROWS
    }

    /// Lays the collected cells out as rows anchored at the first spreadsheet row.
    ///
    /// Each row stops at its last non-empty cell, so rows may differ in length.
    pub(crate) fn into_grid(self) -> Grid {
        let mut rows: Vec<Vec<CellValue>> = match self.row_upper_bound {
            Some(row_upper_bound) => vec![Vec::new(); row_upper_bound + 1],
            None => Vec::new(),
        };
        for cell in &self.cells {
            let row = &mut rows[cell.row];
            if row.len() <= cell.col {
                row.resize(cell.col + 1, CellValue::Empty);
            }
            row[cell.col] = cell.to_value();
        }
        for row in &mut rows {
            while row.last().is_some_and(CellValue::is_empty) {
                row.pop();
            }
        }
        Grid::new(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(row: usize, col: usize, value: &str) -> Cell {
        Cell {
            row,
            col,
            kind: CellType::InlineString,
            value: value.to_owned(),
        }
    }

    fn push(sheet: &mut Sheet, row: usize, col: usize, value: &str) {
        sheet.push(text(row, col, value)).unwrap();
    }

    #[test]
    fn sheet_initial() {
        let sheet = Sheet::new("Sheet1");
        assert!(sheet.is_empty());
        assert_eq!(sheet.row_upper_bound, None);
        assert!(sheet.into_grid().is_empty());
    }

    #[test]
    fn sheet_skips_empty_cells() {
        let mut sheet = Sheet::new("Sheet1");
        push(&mut sheet, 4, 0, "");
        assert!(sheet.is_empty());
        assert_eq!(sheet.row_upper_bound, None);
    }

    #[test]
    fn sheet_to_grid_keeps_leading_rows_and_gaps() {
        let mut sheet = Sheet::new("Sheet1");
        push(&mut sheet, 1, 1, "b2");
        push(&mut sheet, 3, 0, "a4");
        push(&mut sheet, 3, 2, "c4");
        let grid = sheet.into_grid();

        assert_eq!(grid.len(), 4);
        assert_eq!(grid.rows()[0], Vec::<CellValue>::new());
        assert_eq!(grid.rows()[1], vec![CellValue::Empty, CellValue::from("b2")]);
        assert_eq!(grid.rows()[2], Vec::<CellValue>::new());
        assert_eq!(
            grid.rows()[3],
            vec![CellValue::from("a4"), CellValue::Empty, CellValue::from("c4")]
        );
    }

    #[test]
    fn sheet_rejects_cells_off_the_grid() {
        let mut sheet = Sheet::new("Sheet1");
        assert!(matches!(
            sheet.push(text(MAX_ROWS, 0, "x")),
            Err(SheetError::CellOutOfRangeError(MAX_ROWS, 0))
        ));
        assert!(matches!(sheet.push(text(0, MAX_COLUMNS, "x")), Err(SheetError::CellOutOfRangeError(..))));
        assert!(sheet.is_empty());
    }

    #[test]
    fn sheet_expands_repeated_cells() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.push_repeated(text(1, 1, "x"), 2, 3).unwrap();
        assert_eq!(sheet.cells.len(), 6);
        assert_eq!(sheet.row_upper_bound, Some(2));

        let mut clipped = Sheet::new("Sheet1");
        clipped.push_repeated(text(MAX_ROWS - 2, 0, "x"), 1_000, 1).unwrap();
        assert_eq!(clipped.cells.len(), 2);
    }

    #[test]
    fn sheet_refuses_oversized_repeat_blocks() {
        let mut sheet = Sheet::new("Sheet1");
        let result = sheet.push_repeated(text(0, 0, "x"), MAX_ROWS, 1_024);
        assert!(matches!(result, Err(SheetError::SheetTooLargeError(MAX_CELLS))));
        assert!(sheet.is_empty());
        assert!(Sheet::is_past_last_row(MAX_ROWS));
        assert!(!Sheet::is_past_last_row(MAX_ROWS - 1));
    }
}
