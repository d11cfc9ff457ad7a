//! Bounded text previews of raw grids and normalized datasets.

use crate::dataset::Dataset;
use crate::spreadsheet::column_name;
use crate::spreadsheet::Grid;
use serde::Serialize;
use std::fmt::Display;

/// Rows shown when previewing a raw grid.
pub const RAW_PREVIEW_ROWS: usize = 10;
/// Rows shown when previewing a dataset.
pub const DATASET_PREVIEW_ROWS: usize = 20;

const SEPARATOR: &str = " | ";

/// How preview rows are numbered.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RowNumbering {
    /// Spreadsheet row numbers, matching the header row a user picks.
    OneBased,
    /// Data row offsets.
    ZeroBased,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PreviewRow {
    pub number: usize,
    pub cells: Vec<String>,
}

/// The first rows of a table, ready to print.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Preview {
    pub header: Vec<String>,
    pub rows: Vec<PreviewRow>,
    /// Rows in the source, shown or not
    pub total_rows: usize,
}

impl Preview {
    pub fn is_truncated(&self) -> bool {
        self.total_rows > self.rows.len()
    }
}

/// Takes at most `max_rows` rows, rendering every cell to text.
pub fn preview<T: ToString>(
    header: Vec<String>,
    rows: &[Vec<T>],
    max_rows: usize,
    numbering: RowNumbering,
) -> Preview {
    let offset = match numbering {
        RowNumbering::OneBased => 1,
        RowNumbering::ZeroBased => 0,
    };
    Preview {
        header,
        rows: rows
            .iter()
            .take(max_rows)
            .enumerate()
            .map(|(index, row)| PreviewRow {
                number: index + offset,
                cells: row.iter().map(ToString::to_string).collect(),
            })
            .collect(),
        total_rows: rows.len(),
    }
}

/// Raw rows headed by column letters and numbered like the spreadsheet.
pub fn preview_grid(grid: &Grid, max_rows: usize) -> Preview {
    let width = grid.rows().iter().take(max_rows).map(Vec::len).max().unwrap_or(0);
    let header = (0..width).map(column_name).collect();
    preview(header, grid.rows(), max_rows, RowNumbering::OneBased)
}

/// Dataset rows headed by their labels and numbered from 0.
pub fn preview_dataset(dataset: &Dataset, max_rows: usize) -> Preview {
    preview(dataset.labels().to_vec(), dataset.rows(), max_rows, RowNumbering::ZeroBased)
}

impl Display for Preview {
    /// Aligned plain-text table; the first column holds row numbers.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.rows.is_empty() {
            return writeln!(f, "(empty)");
        }
        let numbers = self.rows.iter().map(|row| row.number.to_string()).collect::<Vec<_>>();
        let columns = self.rows.iter().map(|row| row.cells.len()).chain([self.header.len()]).max().unwrap_or(0);
        let mut widths = vec![0usize; columns + 1];
        widths[0] = numbers.iter().map(|number| number.len()).max().unwrap_or(0);
        for row in std::iter::once(&self.header).chain(self.rows.iter().map(|row| &row.cells)) {
            for (index, cell) in row.iter().enumerate() {
                widths[index + 1] = widths[index + 1].max(flatten(cell).chars().count());
            }
        }

        let header = std::iter::once(String::new()).chain(self.header.iter().cloned()).collect::<Vec<_>>();
        write_line(f, &header, &widths)?;
        let rule = widths.iter().map(|width| "-".repeat(*width)).collect::<Vec<_>>().join("-+-");
        writeln!(f, "{}", rule.trim_end())?;
        for (number, row) in numbers.into_iter().zip(&self.rows) {
            let line = std::iter::once(number).chain(row.cells.iter().cloned()).collect::<Vec<_>>();
            write_line(f, &line, &widths)?;
        }
        if self.is_truncated() {
            let hidden = self.total_rows - self.rows.len();
            writeln!(f, "... {hidden} more {}", if hidden == 1 { "row" } else { "rows" })?;
        }
        Ok(())
    }
}

fn write_line(f: &mut std::fmt::Formatter<'_>, cells: &[String], widths: &[usize]) -> std::fmt::Result {
    let line = widths
        .iter()
        .enumerate()
        .map(|(index, &width)| {
            let cell = cells.get(index).map(|cell| flatten(cell)).unwrap_or_default();
            if index == 0 {
                format!("{cell:>width$}")
            } else {
                format!("{cell:<width$}")
            }
        })
        .collect::<Vec<_>>()
        .join(SEPARATOR);
    writeln!(f, "{}", line.trim_end())
}

fn flatten(cell: &str) -> String {
    cell.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::normalize;
    use crate::spreadsheet::CellValue;

    fn grid() -> Grid {
        Grid::new(vec![
            vec![CellValue::from("Export")],
            vec![CellValue::from("Region"), CellValue::from("Total")],
            vec![CellValue::from("North"), CellValue::Number(12.0)],
            vec![CellValue::from("South"), CellValue::Number(7.5)],
        ])
    }

    #[test]
    fn grid_preview_is_one_based() {
        let preview = preview_grid(&grid(), RAW_PREVIEW_ROWS);
        assert_eq!(preview.header, ["A", "B"]);
        assert_eq!(preview.rows[0], PreviewRow { number: 1, cells: vec!["Export".to_owned()] });
        assert_eq!(preview.rows[3].number, 4);
        assert_eq!(preview.rows[2].cells, ["North", "12"]);
        assert!(!preview.is_truncated());
    }

    #[test]
    fn dataset_preview_is_zero_based() {
        let dataset = normalize(&grid(), 2).unwrap();
        let preview = preview_dataset(&dataset, DATASET_PREVIEW_ROWS);
        assert_eq!(preview.header, ["Region", "Total"]);
        assert_eq!(preview.rows.iter().map(|row| row.number).collect::<Vec<_>>(), [0, 1]);
        assert_eq!(preview.total_rows, 2);
    }

    #[test]
    fn preview_truncates() {
        let rows = (0..25).map(|index| vec![index]).collect::<Vec<_>>();
        let shown = preview(vec!["n".to_owned()], &rows, 20, RowNumbering::ZeroBased);
        assert_eq!(shown.rows.len(), 20);
        assert_eq!(shown.total_rows, 25);
        assert!(shown.is_truncated());
        assert!(shown.to_string().ends_with("... 5 more rows\n"));
    }

    #[test]
    fn renders_aligned_table() {
        let dataset = normalize(&grid(), 2).unwrap();
        let text = preview_dataset(&dataset, 1).to_string();
        assert_eq!(
            text,
            "  | Region | Total\n\
             --+--------+------\n\
             0 | North  | 12\n\
             ... 1 more row\n"
        );
    }

    #[test]
    fn empty_preview() {
        let empty = preview_grid(&Grid::default(), RAW_PREVIEW_ROWS);
        assert!(empty.header.is_empty());
        assert_eq!(empty.to_string(), "(empty)\n");
        let rows: Vec<Vec<String>> = Vec::new();
        assert_eq!(preview(Vec::new(), &rows, 0, RowNumbering::OneBased).total_rows, 0);
    }
}
