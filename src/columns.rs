// 🧭 Column detection - which column holds the amount, the label, the code
//
// Reporting column: header keywords are a strong signal when present,
// numeric density is the tie-break and the sole fallback.

use crate::amount::parse_amount;
use crate::grid::{Cell, Table};
use crate::normalize::normalize;
use crate::taxonomy::is_element_code;

/// Rows inspected when scoring numeric density
pub const REPORTING_SAMPLE_ROWS: usize = 120;

/// Rows inspected by the label/code detector
pub const DETECTOR_SAMPLE_ROWS: usize = 150;

/// Columns inspected by the label/code detector
pub const DETECTOR_MAX_COLUMNS: usize = 4;

pub const PREFER_WEIGHT: i64 = 3000;
pub const AVOID_WEIGHT: i64 = 2500;

/// Minimal combined score a keyword-ranked column needs before we trust it
pub const MIN_COLUMN_SCORE: i64 = 1;

/// Minimal share of matching cells for the code/label detector
pub const DETECTOR_MIN_FRACTION: f64 = 0.25;

/// "current / reporting period" markers (normalized)
const PREFER_KEYWORDS: &[&str] = &["hesabat", "cari", "current", "reporting"];

/// "previous / prior / year-end" and "total" markers (normalized)
const AVOID_KEYWORDS: &[&str] = &[
    "oten", "kecen", "previous", "prior", "sonu", "year end", "last", "cemi", "yekun", "total",
];

// ============================================================================
// REPORTING-COLUMN SELECTOR
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnScore {
    pub column: usize,
    pub keyword_weight: i64,
    pub numeric_density: usize,
}

impl ColumnScore {
    pub fn total(&self) -> i64 {
        self.keyword_weight + self.numeric_density as i64
    }
}

/// Keyword weight of a header text
pub fn header_weight(header: &str) -> i64 {
    let h = normalize(header);
    let mut weight = 0;
    if PREFER_KEYWORDS.iter().any(|k| h.contains(k)) {
        weight += PREFER_WEIGHT;
    }
    if AVOID_KEYWORDS.iter().any(|k| h.contains(k)) {
        weight -= AVOID_WEIGHT;
    }
    weight
}

/// Count of parseable amounts in the first `sample` rows of a column
pub fn numeric_density(table: &Table, col: usize, sample: usize) -> usize {
    (0..table.rows.len().min(sample))
        .filter(|&r| parse_amount(table.cell(r, col)).is_some())
        .count()
}

/// Score every candidate column (all but the first; column 0 for one-column tables)
pub fn score_columns(table: &Table) -> Vec<ColumnScore> {
    let width = table.width();
    let candidates: Vec<usize> = if width <= 1 {
        (0..width).collect()
    } else {
        (1..width).collect()
    };

    candidates
        .into_iter()
        .map(|col| ColumnScore {
            column: col,
            keyword_weight: header_weight(&table.header_text(col)),
            numeric_density: numeric_density(table, col, REPORTING_SAMPLE_ROWS),
        })
        .collect()
}

/// Pick the column holding the current reporting-period amount.
///
/// Returns `None` only when no candidate column contains a parseable number.
pub fn select_column(table: &Table) -> Option<usize> {
    let scores: Vec<ColumnScore> = score_columns(table)
        .into_iter()
        .filter(|s| s.numeric_density > 0)
        .collect();

    let mut best: Option<&ColumnScore> = None;
    for s in &scores {
        if best.map_or(true, |b| s.total() > b.total()) {
            best = Some(s);
        }
    }

    let best = best?;
    if best.total() >= MIN_COLUMN_SCORE {
        return Some(best.column);
    }

    // every column was penalized: densest one wins
    let mut densest = best;
    for s in &scores {
        if s.numeric_density > densest.numeric_density {
            densest = s;
        }
    }
    Some(densest.column)
}

// ============================================================================
// LABEL / CODE DETECTOR
// ============================================================================

fn fraction(table: &Table, col: usize, sample: usize, pred: impl Fn(&Cell) -> bool) -> f64 {
    let n = table.rows.len().min(sample);
    if n == 0 {
        return 0.0;
    }
    let hits = (0..n).filter(|&r| pred(table.cell(r, col))).count();
    hits as f64 / n as f64
}

fn looks_like_code(cell: &Cell) -> bool {
    match cell {
        Cell::Empty => false,
        other => is_element_code(&other.as_text()),
    }
}

/// Returns `(label_column, code_column)`
pub fn detect_columns(table: &Table) -> (usize, Option<usize>) {
    let n = table.width().min(DETECTOR_MAX_COLUMNS);
    if n == 0 {
        return (0, None);
    }

    let code_frac: Vec<f64> = (0..n)
        .map(|c| fraction(table, c, DETECTOR_SAMPLE_ROWS, looks_like_code))
        .collect();
    let text_frac: Vec<f64> = (0..n)
        .map(|c| fraction(table, c, DETECTOR_SAMPLE_ROWS, Cell::has_alphabetic))
        .collect();

    let code_col = argmax(&code_frac, None).filter(|&c| code_frac[c] >= DETECTOR_MIN_FRACTION);

    let label_col = argmax(&text_frac, code_col)
        .filter(|&c| text_frac[c] >= DETECTOR_MIN_FRACTION)
        .unwrap_or(0);

    (label_col, code_col)
}

/// Index of the highest value (leftmost on ties), skipping `exclude`
fn argmax(values: &[f64], exclude: Option<usize>) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, v) in values.iter().enumerate() {
        if Some(i) == exclude {
            continue;
        }
        if best.map_or(true, |b| *v > values[b]) {
            best = Some(i);
        }
    }
    best
}

// ============================================================================
// TESTS
// ============================================================================
