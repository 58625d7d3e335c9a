// 📋 Raw Grid - explicit 2-D cell model for one sheet
// Replaces implicit dataframe broadcasting with bounds-checked index lookups.

use crate::amount::format_plain;
use serde::{Deserialize, Serialize};

// ============================================================================
// CELL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

static EMPTY_CELL: Cell = Cell::Empty;

impl Cell {
    /// Build a text cell; blank strings collapse to `Empty`
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(v) => v.is_nan(),
        }
    }

    /// Display form used for headers, descriptors and label text
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(v) => format_plain(*v),
        }
    }

    /// True when the cell contains at least one alphabetic character
    pub fn has_alphabetic(&self) -> bool {
        match self {
            Cell::Text(s) => s.chars().any(char::is_alphabetic),
            _ => false,
        }
    }
}

/// Spreadsheet-style column name: 0 -> A, 25 -> Z, 26 -> AA
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

// ============================================================================
// RAW GRID
// ============================================================================

/// One sheet of one source file. Rows may be ragged; missing cells read as `Empty`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawGrid {
    rows: Vec<Vec<Cell>>,
}

impl RawGrid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        RawGrid { rows }
    }

    /// Convenience constructor for text-only grids
    pub fn from_strings(rows: &[Vec<&str>]) -> Self {
        RawGrid::new(
            rows.iter()
                .map(|r| r.iter().map(|s| Cell::text(*s)).collect())
                .collect(),
        )
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(Cell::is_empty))
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Text of every non-empty cell in the first `limit` rows
    pub fn texts(&self, limit: usize) -> impl Iterator<Item = String> + '_ {
        self.rows
            .iter()
            .take(limit)
            .flat_map(|r| r.iter())
            .filter(|c| !c.is_empty())
            .map(Cell::as_text)
    }

    /// Drop fully empty rows and columns, pad the rest to a rectangle.
    /// Also returns the original index of every kept row.
    pub fn compact(&self) -> (RawGrid, Vec<usize>) {
        let width = self.width();
        let keep_cols: Vec<usize> = (0..width)
            .filter(|&c| self.rows.iter().any(|r| r.get(c).is_some_and(|cell| !cell.is_empty())))
            .collect();

        let mut kept_rows = Vec::new();
        let mut rows = Vec::new();
        for (i, r) in self.rows.iter().enumerate() {
            if r.iter().all(Cell::is_empty) {
                continue;
            }
            kept_rows.push(i);
            rows.push(
                keep_cols
                    .iter()
                    .map(|&c| r.get(c).cloned().unwrap_or_default())
                    .collect(),
            );
        }

        (RawGrid { rows }, kept_rows)
    }

    /// First row with at least two non-empty cells, 0 if none
    pub fn header_row_index(&self) -> usize {
        self.rows
            .iter()
            .position(|r| r.iter().filter(|c| !c.is_empty()).count() >= 2)
            .unwrap_or(0)
    }
}

// ============================================================================
// TABLE (grid with a located header row)
// ============================================================================

/// A tidied grid: empty rows/columns dropped, header row split off.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub header: Vec<Cell>,
    pub rows: Vec<Vec<Cell>>,

    /// Original grid row of every data row (0-based)
    pub source_rows: Vec<usize>,
}

impl Table {
    /// Drop empties, locate the header row, keep the rows below it as data
    pub fn from_grid(grid: &RawGrid) -> Table {
        let (tidy, kept) = grid.compact();
        if tidy.height() == 0 {
            return Table::default();
        }

        let h = tidy.header_row_index();
        let mut rows = tidy.rows;
        let data = rows.split_off(h + 1);
        let header = rows.pop().unwrap_or_default();

        Table {
            header,
            rows: data,
            source_rows: kept[h + 1..].to_vec(),
        }
    }

    /// 1-based spreadsheet row number of data row `row`
    pub fn source_row(&self, row: usize) -> usize {
        self.source_rows.get(row).map_or(row + 1, |i| i + 1)
    }

    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.header.len()))
            .max()
            .unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn header_text(&self, col: usize) -> String {
        self.header.get(col).map(Cell::as_text).unwrap_or_default()
    }

    /// Column descriptors: header text, or the column letter when the
    /// header cell is blank or purely numeric
    pub fn descriptors(&self) -> Vec<String> {
        (0..self.width())
            .map(|c| {
                let cell = self.header.get(c).unwrap_or(&EMPTY_CELL);
                let text = cell.as_text();
                let numeric = matches!(cell, Cell::Number(_))
                    || text.chars().all(|ch| ch.is_ascii_digit());
                if text.is_empty() || numeric {
                    column_letter(c)
                } else {
                    text
                }
            })
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(1), "B");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_out_of_bounds_reads_empty() {
        let grid = RawGrid::from_strings(&[vec!["a"], vec!["b", "c"]]);
        assert_eq!(grid.width(), 2);
        assert_eq!(grid.cell(0, 1), &Cell::Empty);
        assert_eq!(grid.cell(9, 9), &Cell::Empty);
        assert_eq!(grid.cell(1, 1), &Cell::Text("c".to_string()));
    }

    #[test]
    fn test_drop_empty_rows_and_columns() {
        let grid = RawGrid::from_strings(&[
            vec!["", "", ""],
            vec!["x", "", "1"],
            vec!["", "", ""],
            vec!["y", " ", "2"],
        ]);
        let (tidy, kept) = grid.compact();
        assert_eq!(kept, vec![1, 3]);
        assert_eq!(tidy.height(), 2);
        assert_eq!(tidy.width(), 2);
        assert_eq!(tidy.cell(1, 0), &Cell::Text("y".to_string()));
        assert_eq!(tidy.cell(1, 1), &Cell::Text("2".to_string()));
    }

    #[test]
    fn test_header_row_is_first_with_two_cells() {
        let grid = RawGrid::from_strings(&[
            vec!["Balance sheet", ""],
            vec!["Item", "Amount"],
            vec!["Cash", "10"],
        ]);
        assert_eq!(grid.header_row_index(), 1);

        let single = RawGrid::from_strings(&[vec!["only"], vec!["column"]]);
        assert_eq!(single.header_row_index(), 0);
    }

    #[test]
    fn test_table_from_grid() {
        let grid = RawGrid::from_strings(&[
            vec!["Title", "", ""],
            vec!["Item", "", "2024"],
            vec!["Cash", "", "10"],
            vec!["Loans", "", "20"],
        ]);
        let table = Table::from_grid(&grid);
        assert_eq!(table.header_text(0), "Item");
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.source_row(0), 3);
        assert_eq!(table.source_row(1), 4);
        assert_eq!(table.descriptors(), vec!["Item".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_descriptors_replace_blank_headers() {
        let table = Table {
            header: vec![Cell::text("Metric"), Cell::Empty, Cell::Number(1.0), Cell::text("USD")],
            rows: vec![vec![Cell::text("a"), Cell::text("1"), Cell::text("2"), Cell::text("3")]],
            ..Default::default()
        };
        assert_eq!(table.descriptors(), vec!["Metric", "B", "C", "USD"]);
    }

    #[test]
    fn test_cell_helpers() {
        assert!(Cell::text("   ").is_empty());
        assert_eq!(Cell::Number(3.0).as_text(), "3");
        assert!(Cell::text("Kreditlər").has_alphabetic());
        assert!(!Cell::text("1.5.6").has_alphabetic());
        assert!(!Cell::Number(1.0).has_alphabetic());
    }
}
