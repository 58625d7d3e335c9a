// 📂 Sources - discover `{bank}/{period}/**` files and load them as raw grids
// Workbooks go through calamine, pre-extracted PDF tables arrive as CSV.

use crate::error::EtlError;
use crate::grid::{Cell, RawGrid};
use crate::normalize::normalize;
use crate::record::IndicatorTable;
use anyhow::Result;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];
pub const GRID_EXTENSIONS: &[&str] = &["csv"];

/// Rows scanned for a report-type hint when sheet names say nothing
pub const SHEET_CONTENT_PEEK_ROWS: usize = 60;

// ============================================================================
// DISCOVERY
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: PathBuf,

    /// Path relative to the input root, `/`-separated
    pub relative: String,
    pub bank: String,

    /// Name of the period directory as found on disk
    pub period_dir: String,
}

impl SourceFile {
    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

pub fn is_supported(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    // office lock files and hidden files
    if name.starts_with("~$") || name.starts_with('.') {
        return false;
    }
    extension(path).is_some_and(|e| {
        WORKBOOK_EXTENSIONS.contains(&e.as_str()) || GRID_EXTENSIONS.contains(&e.as_str())
    })
}

/// Every supported file under `{root}/{bank}/{period}/`, in lexicographic path order
pub fn discover(root: &Path) -> Result<Vec<SourceFile>> {
    if !root.is_dir() {
        return Err(EtlError::MissingInputRoot(root.to_path_buf()).into());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(3).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_supported(entry.path()) {
            continue;
        }

        let rel = match entry.path().strip_prefix(root) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        if parts.len() < 3 {
            continue;
        }

        files.push(SourceFile {
            path: entry.path().to_path_buf(),
            relative: parts.join("/"),
            bank: parts[0].clone(),
            period_dir: parts[1].clone(),
        });
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

// ============================================================================
// LOADING
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub grid: RawGrid,
}

fn unreadable(path: &Path, reason: impl ToString) -> EtlError {
    EtlError::UnreadableSource {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Load every sheet of a source file
pub fn load_sheets(path: &Path) -> std::result::Result<Vec<Sheet>, EtlError> {
    match extension(path).as_deref() {
        Some("csv") => Ok(vec![load_csv_grid(path)?]),
        Some(_) => load_workbook(path),
        None => Err(unreadable(path, "no file extension")),
    }
}

fn data_to_cell(v: &Data) -> Cell {
    match v {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::text(s.as_str()),
        Data::Bool(b) => Cell::text(if *b { "TRUE" } else { "FALSE" }),
        Data::DateTime(dt) => Cell::text(dt.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s.as_str()),
        Data::Error(_) => Cell::Empty,
    }
}

fn load_workbook(path: &Path) -> std::result::Result<Vec<Sheet>, EtlError> {
    let mut wb = open_workbook_auto(path).map_err(|e| unreadable(path, e))?;

    let mut sheets = Vec::new();
    for name in wb.sheet_names() {
        let range = match wb.worksheet_range(&name) {
            Ok(r) => r,
            Err(e) => {
                debug!(sheet = %name, "skipping unreadable sheet: {}", e);
                continue;
            }
        };

        // keep spreadsheet coordinates: pad up to the range's top-left corner
        let (row0, col0) = range
            .start()
            .map_or((0, 0), |(r, c)| (r as usize, c as usize));
        let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row0];
        for row in range.rows() {
            let mut cells = vec![Cell::Empty; col0];
            cells.extend(row.iter().map(data_to_cell));
            rows.push(cells);
        }

        sheets.push(Sheet {
            name,
            grid: RawGrid::new(rows),
        });
    }

    if sheets.is_empty() {
        return Err(unreadable(path, "workbook has no readable sheets"));
    }
    Ok(sheets)
}

fn load_csv_grid(path: &Path) -> std::result::Result<Sheet, EtlError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| unreadable(path, e))?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| unreadable(path, e))?;
        rows.push(
            record
                .iter()
                .map(|s| Cell::text(s.trim_start_matches('\u{feff}')))
                .collect(),
        );
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(Sheet {
        name,
        grid: RawGrid::new(rows),
    })
}

// ============================================================================
// SHEET SELECTION
// ============================================================================

/// Sheet to read for a single-column report: name hint, then content hint,
/// then the first sheet
pub fn select_sheet(sheets: &[Sheet], table: IndicatorTable) -> Option<usize> {
    if sheets.is_empty() {
        return None;
    }
    let hints = table.sheet_hints();

    if let Some(i) = sheets
        .iter()
        .position(|s| contains_hint(&normalize(&s.name), hints))
    {
        return Some(i);
    }

    if let Some(i) = sheets.iter().position(|s| {
        s.grid
            .texts(SHEET_CONTENT_PEEK_ROWS)
            .any(|t| contains_hint(&normalize(&t), hints))
    }) {
        return Some(i);
    }

    Some(0)
}

fn contains_hint(text: &str, hints: &[&str]) -> bool {
    hints.iter().any(|h| text.contains(h))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn create_test_sheet(name: &str, rows: &[Vec<&str>]) -> Sheet {
        Sheet {
            name: name.to_string(),
            grid: RawGrid::from_strings(rows),
        }
    }

    #[test]
    fn test_discover_orders_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for rel in [
            "kapital/2024_Q1/balance.csv",
            "abb/2024_Q2/balance.csv",
            "abb/2024_Q1/sub/credit_risk.csv",
            "abb/2024_Q1/balance.xlsx",
            "abb/2024_Q1/notes.txt",
            "abb/2024_Q1/~$balance.xlsx",
            "abb/stray.csv",
        ] {
            let p = root.join(rel);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(&p, b"x").unwrap();
        }

        let files = discover(root).unwrap();
        let rels: Vec<&str> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(
            rels,
            vec![
                "abb/2024_Q1/balance.xlsx",
                "abb/2024_Q1/sub/credit_risk.csv",
                "abb/2024_Q2/balance.csv",
                "kapital/2024_Q1/balance.csv",
            ]
        );
        assert_eq!(files[1].bank, "abb");
        assert_eq!(files[1].period_dir, "2024_Q1");
        assert_eq!(files[1].file_stem(), "credit_risk");
    }

    #[test]
    fn test_discover_missing_root() {
        let err = discover(Path::new("/nonexistent/input")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::MissingInputRoot(_))
        ));
    }

    #[test]
    fn test_load_csv_grid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("balance.csv");
        fs::write(&path, "\u{feff}Maddə,Cari\nNağd pul,\"42 653\"\n\nKreditlər,\"1,5\",extra\n").unwrap();

        let sheets = load_sheets(&path).unwrap();
        assert_eq!(sheets.len(), 1);
        let grid = &sheets[0].grid;
        assert_eq!(sheets[0].name, "balance");
        assert_eq!(grid.cell(0, 0), &Cell::text("Maddə"));
        assert_eq!(grid.cell(1, 1), &Cell::text("42 653"));
        assert_eq!(grid.width(), 3);
    }

    #[test]
    fn test_unreadable_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        fs::write(&path, b"not a zip archive").unwrap();

        let err = load_sheets(&path).unwrap_err();
        assert!(matches!(err, EtlError::UnreadableSource { .. }));
    }

    #[test]
    fn test_select_sheet_by_name() {
        let sheets = vec![
            create_test_sheet("Cover", &[vec!["Bank ABB"]]),
            create_test_sheet("Maliyyə vəziyyəti", &[vec!["x", "1"]]),
        ];
        assert_eq!(select_sheet(&sheets, IndicatorTable::BalanceSheet), Some(1));
    }

    #[test]
    fn test_select_sheet_by_content() {
        let sheets = vec![
            create_test_sheet("Cover", &[vec!["Bank ABB"]]),
            create_test_sheet("S2", &[vec!["Mənfəət və zərər haqqında hesabat"]]),
        ];
        assert_eq!(select_sheet(&sheets, IndicatorTable::ProfitAndLoss), Some(1));
    }

    #[test]
    fn test_select_sheet_defaults_to_first() {
        let sheets = vec![
            create_test_sheet("A", &[vec!["x"]]),
            create_test_sheet("B", &[vec!["y"]]),
        ];
        assert_eq!(select_sheet(&sheets, IndicatorTable::CapitalAdequacy), Some(0));
        assert_eq!(select_sheet(&[], IndicatorTable::CapitalAdequacy), None);
    }
}
