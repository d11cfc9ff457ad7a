//! Header normalization: reinterprets one grid row as column labels and
//! squares the rows after it into a rectangular [`Dataset`].

use crate::error::InsightError;
use crate::spreadsheet::Grid;
use serde::Serialize;

/// Column labels plus data rows, every row as wide as the labels.
///
/// Labels are kept verbatim, duplicates and blanks included. Cells are text;
/// an absent cell is `""`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Dataset {
    labels: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    /// Builds a dataset, padding short rows with `""` and truncating long ones
    /// to the label width.
    pub fn new(labels: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = labels.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { labels, rows }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.labels.len()
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<String>>) {
        (self.labels, self.rows)
    }
}

/// Uses grid row `header_row` (1-based) as labels and every later row as data.
///
/// Rows above the header are discarded. Fails with
/// [`InsightError::HeaderRowOutOfRange`] unless `1 <= header_row <= grid.len()`.
pub fn normalize(grid: &Grid, header_row: usize) -> Result<Dataset, InsightError> {
    if header_row < 1 || header_row > grid.len() {
        return Err(InsightError::HeaderRowOutOfRange {
            header_row,
            row_count: grid.len(),
        });
    }
    let rows = grid.rows();
    let labels = rows[header_row - 1].iter().map(ToString::to_string).collect();
    let data = rows[header_row..]
        .iter()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect();
    Ok(Dataset::new(labels, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::CellValue;

    fn grid(rows: &[&[&str]]) -> Grid {
        Grid::new(
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|cell| if cell.is_empty() { CellValue::Empty } else { CellValue::from(*cell) })
                        .collect()
                })
                .collect(),
        )
    }

    #[test]
    fn short_rows_are_padded() {
        let dataset = normalize(&grid(&[&["a", "b"], &["1", "2"], &["3"]]), 1).unwrap();
        assert_eq!(dataset.labels(), ["a", "b"]);
        assert_eq!(dataset.rows(), [vec!["1", "2"], vec!["3", ""]]);
        assert_eq!(dataset.row_count(), 2);
    }

    #[test]
    fn long_rows_are_truncated() {
        let dataset = normalize(&grid(&[&["a"], &["1", "2", "3"]]), 1).unwrap();
        assert_eq!(dataset.rows(), [vec!["1"]]);
    }

    #[test]
    fn rows_above_header_are_discarded() {
        let dataset = normalize(&grid(&[&["Report"], &["x", "y"], &["1", "2"]]), 2).unwrap();
        assert_eq!(dataset.labels(), ["x", "y"]);
        assert_eq!(dataset.rows(), [vec!["1", "2"]]);
    }

    #[test]
    fn labels_are_kept_verbatim() {
        let dataset = normalize(&grid(&[&["id", "", "id"], &["1"]]), 1).unwrap();
        assert_eq!(dataset.labels(), ["id", "", "id"]);
        assert_eq!(dataset.rows(), [vec!["1", "", ""]]);
    }

    #[test]
    fn numbers_render_as_text() {
        let grid = Grid::new(vec![
            vec![CellValue::from("qty"), CellValue::from("price")],
            vec![CellValue::Number(3.0), CellValue::Number(9.75)],
        ]);
        assert_eq!(normalize(&grid, 1).unwrap().rows(), [vec!["3", "9.75"]]);
    }

    #[test]
    fn row_count_matches_header_position() {
        let grid = grid(&[&["a"], &["b"], &["c"], &["d"], &["e"]]);
        for header_row in 1..=grid.len() {
            let dataset = normalize(&grid, header_row).unwrap();
            assert_eq!(dataset.row_count(), grid.len() - header_row);
        }
    }

    #[test]
    fn header_row_out_of_range() {
        let grid = grid(&[&["a"], &["1"]]);
        for header_row in [0, 3, 100] {
            assert!(matches!(
                normalize(&grid, header_row),
                Err(InsightError::HeaderRowOutOfRange { row_count: 2, .. })
            ));
        }
        assert!(normalize(&Grid::default(), 1).is_err());
    }
}
