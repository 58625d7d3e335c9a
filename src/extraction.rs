// 🧮 Row Extraction - raw grid -> extracted records
//
// Two strategies, picked by report type:
//   SingleColumn: one reporting column, one label per row (balance sheet, P&L, capital)
//   WideRow:      every cell of a metric row is a fact (credit risk, currency risk)

use crate::amount::{format_plain, parse_amount};
use crate::columns::{detect_columns, select_column};
use crate::error::EtlError;
use crate::grid::{Cell, RawGrid, Table};
use crate::matcher::{Resolution, TaxonomyMatcher};
use crate::normalize::normalize;
use crate::processing_log::{EventKind, LogEvent};
use crate::record::{ExtractedRecord, IndicatorTable};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Metric rows matching this (normalized) are totals and never emitted
static TOTAL_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(total|subtotal|cem|cemi|umumi|yekun|итог|итого|всего)\b")
        .expect("valid total pattern")
});

static TIER_ONE_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\btier (i|1)\b|\bbirinci dereceli\b|\bi dereceli\b").expect("valid tier pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    SingleColumn,
    WideRow,
}

impl ExtractionStrategy {
    pub fn for_table(table: IndicatorTable) -> Self {
        match table {
            IndicatorTable::BalanceSheet
            | IndicatorTable::ProfitAndLoss
            | IndicatorTable::CapitalAdequacy => ExtractionStrategy::SingleColumn,
            IndicatorTable::CreditRisk | IndicatorTable::CurrencyRisk => ExtractionStrategy::WideRow,
        }
    }
}

// ============================================================================
// CONTEXT & OUTCOME
// ============================================================================

/// Where a sheet comes from; stamped onto every record and event
#[derive(Debug, Clone)]
pub struct SheetContext<'a> {
    pub bank: &'a str,
    pub period: &'a str,
    pub file: &'a str,
    pub sheet: &'a str,
    pub table: IndicatorTable,
}

impl SheetContext<'_> {
    fn record(&self) -> ExtractedRecord {
        ExtractedRecord::new(self.bank, self.period, self.table)
            .with_source(&format!("{}::{}", self.file, self.sheet))
    }

    fn event(&self, kind: EventKind, row: usize, detail: String) -> LogEvent {
        LogEvent::new(kind, detail)
            .with_bank(self.bank)
            .with_period(self.period)
            .with_file(self.file)
            .with_sheet(self.sheet)
            .with_row(row)
    }
}

#[derive(Debug, Default)]
pub struct SheetOutcome {
    pub records: Vec<ExtractedRecord>,
    pub events: Vec<LogEvent>,
}

/// Extract one sheet with the strategy of its report type
pub fn extract_sheet(
    grid: &RawGrid,
    ctx: &SheetContext<'_>,
    matcher: &TaxonomyMatcher<'_>,
) -> Result<SheetOutcome, EtlError> {
    match ExtractionStrategy::for_table(ctx.table) {
        ExtractionStrategy::SingleColumn => extract_single_column(grid, ctx, matcher),
        ExtractionStrategy::WideRow => Ok(extract_wide(grid, ctx, matcher)),
    }
}

// ============================================================================
// SINGLE-COLUMN STRATEGY
// ============================================================================

/// Read the reporting column of every label row and reconcile the label
pub fn extract_single_column(
    grid: &RawGrid,
    ctx: &SheetContext<'_>,
    matcher: &TaxonomyMatcher<'_>,
) -> Result<SheetOutcome, EtlError> {
    let table = Table::from_grid(grid);
    let amount_col = select_column(&table).ok_or_else(|| EtlError::NoReportingColumnFound {
        sheet: ctx.sheet.to_string(),
    })?;
    let (label_col, code_col) = detect_columns(&table);
    let amount_header = table.header_text(amount_col);
    debug!(sheet = ctx.sheet, amount_col, label_col, ?code_col, "columns detected");

    let mut out = SheetOutcome::default();

    for r in 0..table.rows.len() {
        let row_no = table.source_row(r);
        let cell = table.cell(r, amount_col);

        let amount = match parse_amount(cell) {
            Some(v) => v,
            None => {
                if !cell.is_empty() {
                    out.events.push(ctx.event(
                        EventKind::MalformedNumber,
                        row_no,
                        format!("column {:?}: {:?}", amount_header, cell.as_text()),
                    ));
                }
                continue;
            }
        };

        let raw_label = clean_label(&table.cell(r, label_col).as_text());
        let code_hint = code_col.map(|c| table.cell(r, c).as_text());

        match matcher.resolve(&raw_label, code_hint.as_deref()) {
            Some(res) => out.records.push(shape_single(ctx, &res, &raw_label, amount)),
            None => out.events.push(ctx.event(
                EventKind::UnresolvedLabel,
                row_no,
                raw_label,
            )),
        }
    }

    Ok(out)
}

fn clean_label(text: &str) -> String {
    text.trim().trim_end_matches(':').trim().to_string()
}

fn shape_single(
    ctx: &SheetContext<'_>,
    res: &Resolution<'_>,
    raw_label: &str,
    amount: f64,
) -> ExtractedRecord {
    let code = res.entry.code.as_str();
    let rec = ctx.record().with_element(code).with_amount(Some(amount));

    match ctx.table {
        IndicatorTable::ProfitAndLoss => {
            let mut rec = rec
                .with_item(&res.entry.label)
                .with_amount_vs_share("Amount");
            if let Some(line) = pnl_fs_line(code) {
                rec = rec.with_fs_line(line);
            }
            if !raw_label.is_empty() {
                rec = rec.with_sub_element(raw_label);
            }
            rec
        }
        IndicatorTable::CapitalAdequacy => {
            let (fs_line, kind) = classify_capital(raw_label);
            rec.with_fs_line(fs_line.unwrap_or(raw_label))
                .with_item(raw_label)
                .with_amount_vs_share(kind)
        }
        _ => rec.with_sub_element(&res.entry.group.to_string()),
    }
}

/// P&L statement line from the first code component
pub fn pnl_fs_line(code: &str) -> Option<&'static str> {
    let line = match code.split('.').next()? {
        "1" => "Interest income",
        "2" => "Interest expense",
        "3" => "Net interest income",
        "4" => "Non-interest income",
        "5" => "Operating expenses",
        "6" => "Specific reserves",
        "7" => "Profit before tax",
        "8" => "Profit tax",
        "9" => "Net profit (loss)",
        _ => return None,
    };
    Some(line)
}

/// Capital-adequacy line and whether the value is a ratio.
///
/// Risk-weighted assets are checked first: their labels also mention capital.
pub fn classify_capital(label: &str) -> (Option<&'static str>, &'static str) {
    let n = normalize(label);
    let is_ratio = ["ratio", "emsal", "%", "adekvatliq"]
        .iter()
        .any(|k| n.contains(k));
    let kind = if is_ratio { "Ratio %" } else { "Amount" };

    let risk_weighted = n.contains("risk") && (n.contains("weight") || n.contains("cekil"));
    let tier_one = TIER_ONE_RX.is_match(&n);

    let line = if risk_weighted {
        Some("Risk-weighted assets")
    } else if is_ratio && tier_one {
        Some("Tier I Ratio")
    } else if is_ratio {
        Some("Total Capital Ratio")
    } else if tier_one {
        Some("Tier I Capital")
    } else if n.contains("total cap") || n.contains("mecmu kapital") {
        Some("Total Capital")
    } else {
        None
    };

    (line, kind)
}

// ============================================================================
// WIDE-ROW STRATEGY
// ============================================================================

/// One non-empty cell of a metric row
#[derive(Debug, Clone, PartialEq)]
pub struct TidyCell {
    /// 1-based spreadsheet row
    pub row: usize,
    pub metric: String,
    pub descriptor: String,
    pub value: Cell,
}

pub fn is_total_label(text: &str) -> bool {
    TOTAL_RX.is_match(&normalize(text))
}

/// Cell-wise tidy of a wide sheet: one `TidyCell` per value of every
/// non-total metric row
pub fn tidy_sheet(grid: &RawGrid) -> Vec<TidyCell> {
    let table = Table::from_grid(grid);
    let descriptors = table.descriptors();
    let mut cells = Vec::new();

    for (r, row) in table.rows.iter().enumerate() {
        let Some(metric_idx) = row.iter().position(Cell::has_alphabetic) else {
            continue;
        };
        let metric = row[metric_idx].as_text();
        if metric.is_empty() || is_total_label(&metric) {
            continue;
        }

        for (c, cell) in row.iter().enumerate() {
            if c == metric_idx || cell.is_empty() {
                continue;
            }
            cells.push(TidyCell {
                row: table.source_row(r),
                metric: metric.clone(),
                descriptor: descriptors.get(c).cloned().unwrap_or_default(),
                value: cell.clone(),
            });
        }
    }

    cells
}

/// Consecutive tidy cells of the same spreadsheet row
fn group_rows(cells: Vec<TidyCell>) -> Vec<Vec<TidyCell>> {
    let mut groups: Vec<Vec<TidyCell>> = Vec::new();
    for cell in cells {
        let same_row = groups.last().is_some_and(|g| g[0].row == cell.row);
        if !same_row {
            groups.push(Vec::new());
        }
        if let Some(g) = groups.last_mut() {
            g.push(cell);
        }
    }
    groups
}

pub fn extract_wide(
    grid: &RawGrid,
    ctx: &SheetContext<'_>,
    matcher: &TaxonomyMatcher<'_>,
) -> SheetOutcome {
    let mut out = SheetOutcome::default();

    for row in group_rows(tidy_sheet(grid)) {
        match ctx.table {
            IndicatorTable::CurrencyRisk => shape_currency_row(&row, ctx, &mut out),
            _ => shape_credit_row(&row, ctx, matcher, &mut out),
        }
    }

    out
}

/// Parse a tidy value, logging non-empty cells that are not numbers
fn cell_amount(cell: &TidyCell, ctx: &SheetContext<'_>, out: &mut SheetOutcome) -> Option<f64> {
    let v = parse_amount(&cell.value);
    if v.is_none() {
        out.events.push(ctx.event(
            EventKind::MalformedNumber,
            cell.row,
            format!("column {:?}: {:?}", cell.descriptor, cell.value.as_text()),
        ));
    }
    v
}

fn is_share_descriptor(norm: &str) -> bool {
    norm.contains("share") || norm.contains('%') || norm.contains("pay")
}

fn is_total_descriptor(norm: &str) -> bool {
    ["total", "cem", "umumi", "yekun"].iter().any(|k| norm.contains(k))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Days31To60,
    Days61To90,
    Days91Plus,
}

fn aging_bucket(norm: &str) -> Option<Bucket> {
    if norm.contains("31") && norm.contains("60") {
        Some(Bucket::Days31To60)
    } else if norm.contains("61") && norm.contains("90") {
        Some(Bucket::Days61To90)
    } else if norm.contains("91") || norm.contains("90+") || norm.contains(">90") {
        Some(Bucket::Days91Plus)
    } else {
        None
    }
}

fn shape_credit_row(
    row: &[TidyCell],
    ctx: &SheetContext<'_>,
    matcher: &TaxonomyMatcher<'_>,
    out: &mut SheetOutcome,
) {
    let metric = &row[0].metric;
    let Some(res) = matcher.resolve(metric, None) else {
        out.events.push(ctx.event(EventKind::UnresolvedLabel, row[0].row, metric.clone()));
        return;
    };

    let mut rec = ctx
        .record()
        .with_element(&res.entry.code)
        .with_fs_line(metric)
        .with_item("Loan portfolio")
        .with_amount_vs_share("Amount");
    let mut any_value = false;

    for cell in row {
        let d = normalize(&cell.descriptor);
        let Some(v) = cell_amount(cell, ctx, out) else {
            continue;
        };
        let share = is_share_descriptor(&d);
        let slot = match (aging_bucket(&d), share) {
            (Some(Bucket::Days31To60), false) => &mut rec.aging.days_31_60,
            (Some(Bucket::Days61To90), false) => &mut rec.aging.days_61_90,
            (Some(Bucket::Days91Plus), false) => &mut rec.aging.days_91_plus,
            (Some(Bucket::Days31To60), true) => &mut rec.aging.share_31_60,
            (Some(Bucket::Days61To90), true) => &mut rec.aging.share_61_90,
            (Some(Bucket::Days91Plus), true) => &mut rec.aging.share_91_plus,
            (None, _) if is_total_descriptor(&d) => &mut rec.total,
            (None, _) if ["azn", "amount", "mebleg", "manat"].iter().any(|k| d.contains(k)) => {
                &mut rec.amount
            }
            _ => {
                debug!(descriptor = %cell.descriptor, "unmapped credit-risk column");
                out.events.push(ctx.event(
                    EventKind::UnmappedColumn,
                    cell.row,
                    format!("column {:?}: {}", cell.descriptor, format_plain(v)),
                ));
                continue;
            }
        };
        *slot = Some(v);
        any_value = true;
    }

    if any_value {
        out.records.push(rec);
    }
}

fn shape_currency_row(row: &[TidyCell], ctx: &SheetContext<'_>, out: &mut SheetOutcome) {
    let metric = &row[0].metric;
    let mut total = None;
    let mut values: Vec<(&TidyCell, f64)> = Vec::new();

    for cell in row {
        let Some(v) = cell_amount(cell, ctx, out) else {
            continue;
        };
        if is_total_descriptor(&normalize(&cell.descriptor)) {
            total = Some(v);
        } else {
            values.push((cell, v));
        }
    }

    let base = ctx.record().with_fs_line(metric);

    if values.is_empty() {
        if total.is_some() {
            let mut rec = base;
            rec.total = total;
            out.records.push(rec);
        }
        return;
    }

    for (cell, v) in values {
        let kind = if is_share_descriptor(&normalize(&cell.descriptor)) {
            "Share"
        } else {
            "Amount"
        };
        let mut rec = base
            .clone()
            .with_currency(cell.descriptor.trim())
            .with_amount(Some(v))
            .with_amount_vs_share(kind);
        rec.total = total;
        out.records.push(rec);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{Group, Taxonomy, TaxonomyEntry};

    fn create_test_taxonomy() -> Taxonomy {
        Taxonomy::from_entries(vec![
            TaxonomyEntry::new("1", "Aktivlər"),
            TaxonomyEntry::new("1.1", "Nağd pul vəsaitləri"),
            TaxonomyEntry::new("1.5.6", "Xalis kreditlər"),
            TaxonomyEntry::new("2.1", "Müştəri depozitləri"),
            TaxonomyEntry::new("3.4", "Ümumi kapital ehtiyatları"),
        ])
    }

    fn create_test_context(table: IndicatorTable) -> SheetContext<'static> {
        SheetContext {
            bank: "abb",
            period: "2024_Q1",
            file: "abb/2024_Q1/report.xlsx",
            sheet: "Sheet1",
            table,
        }
    }

    #[test]
    fn test_strategy_per_report_type() {
        assert_eq!(
            ExtractionStrategy::for_table(IndicatorTable::BalanceSheet),
            ExtractionStrategy::SingleColumn
        );
        assert_eq!(
            ExtractionStrategy::for_table(IndicatorTable::CapitalAdequacy),
            ExtractionStrategy::SingleColumn
        );
        assert_eq!(
            ExtractionStrategy::for_table(IndicatorTable::CreditRisk),
            ExtractionStrategy::WideRow
        );
        assert_eq!(
            ExtractionStrategy::for_table(IndicatorTable::CurrencyRisk),
            ExtractionStrategy::WideRow
        );
    }

    #[test]
    fn test_balance_sheet_extraction() {
        let taxonomy = create_test_taxonomy();
        let matcher = TaxonomyMatcher::for_table(&taxonomy, IndicatorTable::BalanceSheet);
        let ctx = create_test_context(IndicatorTable::BalanceSheet);
        let grid = RawGrid::from_strings(&[
            vec!["Maliyyə vəziyyəti haqqında hesabat", "", ""],
            vec!["Maddələr", "Hesabat dövrü", "Ötən dövr"],
            vec!["Aktivlər:", "", ""],
            vec!["Nağd pul vəsaitləri", "42 653", "40 000"],
            vec!["Müştərilərə verilmiş xalis kreditlər", "(1 234,50)", "900"],
            vec!["Tamamilə naməlum sətir", "5", "4"],
            vec!["Müştəri depozitləri", "n/a", "7"],
        ]);

        let out = extract_single_column(&grid, &ctx, &matcher).unwrap();

        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].element_code.as_deref(), Some("1.1"));
        assert_eq!(out.records[0].amount, Some(42653.0));
        assert_eq!(out.records[0].sub_element.as_deref(), Some("Assets"));
        assert_eq!(out.records[1].element_code.as_deref(), Some("1.5.6"));
        assert_eq!(out.records[1].amount, Some(-1234.5));
        assert_eq!(out.records[1].source, "abb/2024_Q1/report.xlsx::Sheet1");

        let kinds: Vec<EventKind> = out.events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::UnresolvedLabel, EventKind::MalformedNumber]);
        assert_eq!(out.events[0].row, Some(6));
        assert_eq!(out.events[0].detail, "Tamamilə naməlum sətir");
        assert_eq!(out.events[1].row, Some(7));
    }

    #[test]
    fn test_code_column_used_as_hint() {
        let taxonomy = create_test_taxonomy();
        let matcher = TaxonomyMatcher::for_table(&taxonomy, IndicatorTable::BalanceSheet);
        let ctx = create_test_context(IndicatorTable::BalanceSheet);
        let grid = RawGrid::from_strings(&[
            vec!["Kod", "Maddə", "Cari"],
            vec!["2.1", "Zzz qqq", "300"],
        ]);

        let out = extract_single_column(&grid, &ctx, &matcher).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].element_code.as_deref(), Some("2.1"));
        assert_eq!(out.records[0].sub_element.as_deref(), Some(Group::Liabilities.to_string().as_str()));
    }

    #[test]
    fn test_no_reporting_column() {
        let taxonomy = create_test_taxonomy();
        let matcher = TaxonomyMatcher::for_table(&taxonomy, IndicatorTable::BalanceSheet);
        let ctx = create_test_context(IndicatorTable::BalanceSheet);
        let grid = RawGrid::from_strings(&[vec!["Maddə", "Qeyd"], vec!["Nağd pul", "yoxdur"]]);

        let err = extract_single_column(&grid, &ctx, &matcher).unwrap_err();
        assert!(matches!(err, EtlError::NoReportingColumnFound { .. }));
    }

    #[test]
    fn test_pnl_shaping() {
        let taxonomy = Taxonomy::from_entries(vec![
            TaxonomyEntry::new("1.2", "Kreditlər üzrə faiz gəlirləri"),
            TaxonomyEntry::new("9", "Xalis mənfəət"),
        ]);
        let matcher = TaxonomyMatcher::for_table(&taxonomy, IndicatorTable::ProfitAndLoss);
        let ctx = create_test_context(IndicatorTable::ProfitAndLoss);
        let grid = RawGrid::from_strings(&[
            vec!["Maddə", "Cari rüb"],
            vec!["Kreditlər üzrə faiz gəlirləri", "1200"],
        ]);

        let out = extract_single_column(&grid, &ctx, &matcher).unwrap();
        let rec = &out.records[0];
        assert_eq!(rec.fs_line.as_deref(), Some("Interest income"));
        assert_eq!(rec.item.as_deref(), Some("Kreditlər üzrə faiz gəlirləri"));
        assert_eq!(rec.amount_vs_share.as_deref(), Some("Amount"));
        assert_eq!(pnl_fs_line("9"), Some("Net profit (loss)"));
        assert_eq!(pnl_fs_line("12.1"), None);
    }

    #[test]
    fn test_capital_classification() {
        assert_eq!(
            classify_capital("Riskə görə çəkilmiş aktivlər"),
            (Some("Risk-weighted assets"), "Amount")
        );
        assert_eq!(classify_capital("Tier I capital"), (Some("Tier I Capital"), "Amount"));
        assert_eq!(classify_capital("Tier I ratio (%)"), (Some("Tier I Ratio"), "Ratio %"));
        assert_eq!(
            classify_capital("Total capital adequacy ratio"),
            (Some("Total Capital Ratio"), "Ratio %")
        );
        assert_eq!(classify_capital("Total capital"), (Some("Total Capital"), "Amount"));
        assert_eq!(classify_capital("Tier II capital"), (None, "Amount"));
    }

    #[test]
    fn test_tidy_sheet_skips_totals_and_uses_letters() {
        let grid = RawGrid::from_strings(&[
            vec!["Kredit portfeli", "", "", ""],
            vec!["Sektor", "Total", "31-60 days", ""],
            vec!["Ticarət", "100", "10", "x"],
            vec!["Cəmi", "100", "10", ""],
            vec!["", "", "", ""],
        ]);
        let cells = tidy_sheet(&grid);

        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0].metric, "Ticarət");
        assert_eq!(cells[0].descriptor, "Total");
        assert_eq!(cells[0].row, 3);
        assert_eq!(cells[2].descriptor, "D");
        assert_eq!(cells[2].value, Cell::text("x"));
        assert!(is_total_label("Yekun"));
        assert!(is_total_label("Итого"));
        assert!(!is_total_label("Ticarət"));
    }

    #[test]
    fn test_credit_risk_shaping() {
        let taxonomy = Taxonomy::from_entries(vec![
            TaxonomyEntry::new("5.1", "Ticarət və xidmət"),
            TaxonomyEntry::new("5.2", "Kənd təsərrüfatı"),
        ]);
        let matcher = TaxonomyMatcher::for_table(&taxonomy, IndicatorTable::CreditRisk);
        let ctx = create_test_context(IndicatorTable::CreditRisk);
        let grid = RawGrid::from_strings(&[
            vec!["Sector", "Total", "31-60 days", "61-90 days", "91+ days", "91+ days_share%inLP"],
            vec!["Ticarət və xidmət", "1 000", "10", "20", "30", "3,5"],
            vec!["Naməlum sahə", "50", "", "", "", ""],
            vec!["Cəmi", "1 050", "10", "20", "30", ""],
        ]);

        let out = extract_wide(&grid, &ctx, &matcher);

        assert_eq!(out.records.len(), 1);
        let rec = &out.records[0];
        assert_eq!(rec.element_code.as_deref(), Some("5.1"));
        assert_eq!(rec.item.as_deref(), Some("Loan portfolio"));
        assert_eq!(rec.fs_line.as_deref(), Some("Ticarət və xidmət"));
        assert_eq!(rec.total, Some(1000.0));
        assert_eq!(rec.aging.days_31_60, Some(10.0));
        assert_eq!(rec.aging.days_61_90, Some(20.0));
        assert_eq!(rec.aging.days_91_plus, Some(30.0));
        assert_eq!(rec.aging.share_91_plus, Some(3.5));

        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].kind, EventKind::UnresolvedLabel);
    }

    #[test]
    fn test_unmapped_credit_columns_are_logged() {
        let taxonomy = Taxonomy::from_entries(vec![TaxonomyEntry::new("5.1", "Ticarət və xidmət")]);
        let matcher = TaxonomyMatcher::for_table(&taxonomy, IndicatorTable::CreditRisk);
        let ctx = create_test_context(IndicatorTable::CreditRisk);
        let grid = RawGrid::from_strings(&[
            vec!["Sector", "Total", "0-30 days", "Standard"],
            vec!["Ticarət və xidmət", "1000", "700", "300"],
        ]);

        let out = extract_wide(&grid, &ctx, &matcher);

        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].total, Some(1000.0));

        let details: Vec<&str> = out
            .events
            .iter()
            .filter(|e| e.kind == EventKind::UnmappedColumn)
            .map(|e| e.detail.as_str())
            .collect();
        assert_eq!(details, vec!["column \"0-30 days\": 700", "column \"Standard\": 300"]);
        assert!(out.events.iter().all(|e| e.row == Some(2) && e.sheet.as_deref() == Some("Sheet1")));
    }

    #[test]
    fn test_currency_risk_shaping() {
        let taxonomy = create_test_taxonomy();
        let matcher = TaxonomyMatcher::for_table(&taxonomy, IndicatorTable::CurrencyRisk);
        let ctx = create_test_context(IndicatorTable::CurrencyRisk);
        let grid = RawGrid::from_strings(&[
            vec!["Maddə", "AZN", "USD", "EUR", "Cəmi"],
            vec!["Aktivlər", "100", "50", "-", "150"],
            vec!["Öhdəliklər", "80", "n/a", "", "80"],
        ]);

        let out = extract_wide(&grid, &ctx, &matcher);

        let assets: Vec<&ExtractedRecord> = out
            .records
            .iter()
            .filter(|r| r.fs_line.as_deref() == Some("Aktivlər"))
            .collect();
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].currency.as_deref(), Some("AZN"));
        assert_eq!(assets[0].amount, Some(100.0));
        assert_eq!(assets[0].total, Some(150.0));
        assert_eq!(assets[1].currency.as_deref(), Some("USD"));
        assert!(assets.iter().all(|r| r.element_code.is_none()));
        assert!(assets.iter().all(|r| r.amount_vs_share.as_deref() == Some("Amount")));

        assert_eq!(out.records.len(), 3);
        let malformed = out
            .events
            .iter()
            .filter(|e| e.kind == EventKind::MalformedNumber)
            .count();
        assert_eq!(malformed, 2);
    }

    #[test]
    fn test_extract_sheet_dispatches() {
        let taxonomy = create_test_taxonomy();
        let matcher = TaxonomyMatcher::for_table(&taxonomy, IndicatorTable::CurrencyRisk);
        let ctx = create_test_context(IndicatorTable::CurrencyRisk);
        let grid = RawGrid::from_strings(&[vec!["Maddə", "Qeyd"], vec!["Aktivlər", "yoxdur"]]);

        // a wide sheet without numbers is not an error
        let out = extract_sheet(&grid, &ctx, &matcher).unwrap();
        assert!(out.records.is_empty());
    }
}
