// 🧾 Extracted records - one reconciled numeric fact per record
// Core types shared by extraction, assembly and output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// INDICATOR TABLE (report type)
// ============================================================================

/// IndicatorTable - which regulatory report a record comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorTable {
    BalanceSheet,
    ProfitAndLoss,
    CapitalAdequacy,
    CreditRisk,
    CurrencyRisk,
}

static BALANCE_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(financial[_\s-]*position|maliyy[əe][_\s-]*v[əe]ziyy[əe]ti|balans|balance)")
        .expect("valid balance pattern")
});
static BALANCE_OF_PAYMENTS_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)balance[_\s-]*of[_\s-]*payments").expect("valid payments pattern")
});
static PNL_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(profit|loss|p&l|pnl|income[_\s-]*statement|m[əe]nf[əe][əe]t|z[əe]r[əe]r)")
        .expect("valid pnl pattern")
});
static CAPITAL_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(capital[_\s-]*adequacy|kapital[ıi]n[_\s-]*adekvat|adekvatl|capital)")
        .expect("valid capital pattern")
});
static CREDIT_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(credit|kredit|loan[_\s-]*portfolio)").expect("valid credit pattern"));
static CURRENCY_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(currency|valyuta|fx[_\s-]*risk)").expect("valid currency pattern"));

impl IndicatorTable {
    pub const ALL: [IndicatorTable; 5] = [
        IndicatorTable::BalanceSheet,
        IndicatorTable::ProfitAndLoss,
        IndicatorTable::CapitalAdequacy,
        IndicatorTable::CreditRisk,
        IndicatorTable::CurrencyRisk,
    ];

    /// Label written to the "Indicator table" output column
    pub fn label(&self) -> &'static str {
        match self {
            IndicatorTable::BalanceSheet => "Balance Sheet",
            IndicatorTable::ProfitAndLoss => "Profit & Loss",
            IndicatorTable::CapitalAdequacy => "Capital Adequacy",
            IndicatorTable::CreditRisk => "Credit Risk",
            IndicatorTable::CurrencyRisk => "Currency Risk",
        }
    }

    /// Short code for file names and the taxonomy `table` column
    pub fn code(&self) -> &'static str {
        match self {
            IndicatorTable::BalanceSheet => "balance_sheet",
            IndicatorTable::ProfitAndLoss => "profit_and_loss",
            IndicatorTable::CapitalAdequacy => "capital_adequacy",
            IndicatorTable::CreditRisk => "credit_risk",
            IndicatorTable::CurrencyRisk => "currency_risk",
        }
    }

    /// Detect the report type from a file stem.
    ///
    /// Risk reports are checked before balance/capital because their names
    /// often mention "balance" or "capital" too.
    pub fn detect(file_stem: &str) -> Option<IndicatorTable> {
        if CURRENCY_RX.is_match(file_stem) {
            return Some(IndicatorTable::CurrencyRisk);
        }
        if CREDIT_RX.is_match(file_stem) {
            return Some(IndicatorTable::CreditRisk);
        }
        if CAPITAL_RX.is_match(file_stem) {
            return Some(IndicatorTable::CapitalAdequacy);
        }
        if PNL_RX.is_match(file_stem) {
            return Some(IndicatorTable::ProfitAndLoss);
        }
        if BALANCE_RX.is_match(file_stem) && !BALANCE_OF_PAYMENTS_RX.is_match(file_stem) {
            return Some(IndicatorTable::BalanceSheet);
        }
        None
    }

    /// Normalized sheet-name hints used to pick the right sheet of a workbook
    pub fn sheet_hints(&self) -> &'static [&'static str] {
        match self {
            IndicatorTable::BalanceSheet => &["maliyye veziyyeti", "financial position", "balans", "balance"],
            IndicatorTable::ProfitAndLoss => &["menfeet", "zerer", "profit", "loss", "income"],
            IndicatorTable::CapitalAdequacy => &["adekvat", "capital", "kapital"],
            IndicatorTable::CreditRisk => &["kredit", "credit"],
            IndicatorTable::CurrencyRisk => &["valyuta", "currency"],
        }
    }
}

impl fmt::Display for IndicatorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for IndicatorTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        IndicatorTable::ALL
            .into_iter()
            .find(|t| t.code() == wanted || t.label().to_lowercase() == wanted)
            .ok_or_else(|| format!("unknown indicator table: {}", s))
    }
}

// ============================================================================
// PERIOD
// ============================================================================

/// Reporting quarter, rendered as `YYYY_Qn`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    pub year: u16,
    pub quarter: u8,
}

static PERIOD_YQ_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^0-9])(20\d{2})[ _\-.]?q([1-4])(?:[^0-9]|$)").expect("valid period pattern")
});
static PERIOD_QY_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z])q([1-4])[ _\-.]?(20\d{2})(?:[^0-9]|$)").expect("valid period pattern")
});
static PERIOD_12M_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^0-9])(20\d{2})[ _\-.]?12m(?:[^a-z0-9]|$)").expect("valid period pattern")
});

impl Period {
    pub fn new(year: u16, quarter: u8) -> Option<Period> {
        (1..=4).contains(&quarter).then_some(Period { year, quarter })
    }

    /// Find a period anywhere in a directory or file name.
    ///
    /// Accepts `2024_Q1`, `2024 Q1`, `2024-q1`, `Q1 2024`, and `2020_12M` (-> Q4).
    pub fn find_in(text: &str) -> Option<Period> {
        if let Some(c) = PERIOD_YQ_RX.captures(text) {
            return Period::new(c[1].parse().ok()?, c[2].parse().ok()?);
        }
        if let Some(c) = PERIOD_QY_RX.captures(text) {
            return Period::new(c[2].parse().ok()?, c[1].parse().ok()?);
        }
        if let Some(c) = PERIOD_12M_RX.captures(text) {
            return Period::new(c[1].parse().ok()?, 4);
        }
        None
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_Q{}", self.year, self.quarter)
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::find_in(s).ok_or_else(|| format!("not a reporting period: {}", s))
    }
}

// ============================================================================
// EXTRACTED RECORD
// ============================================================================

/// Overdue-loan buckets reported by credit-risk sheets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgingBuckets {
    pub days_31_60: Option<f64>,
    pub days_61_90: Option<f64>,
    pub days_91_plus: Option<f64>,
    pub share_31_60: Option<f64>,
    pub share_61_90: Option<f64>,
    pub share_91_plus: Option<f64>,
}

impl AgingBuckets {
    pub fn is_empty(&self) -> bool {
        self.days_31_60.is_none()
            && self.days_61_90.is_none()
            && self.days_91_plus.is_none()
            && self.share_31_60.is_none()
            && self.share_61_90.is_none()
            && self.share_91_plus.is_none()
    }
}

/// ExtractedRecord - one reconciled numeric fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub bank: String,
    pub period: String,
    pub indicator_table: IndicatorTable,
    pub element_code: Option<String>,
    pub sub_element: Option<String>,
    pub amount: Option<f64>,

    // Free-form descriptive fields
    pub fs_line: Option<String>,
    pub item: Option<String>,
    pub currency: Option<String>,
    pub amount_vs_share: Option<String>,
    pub total: Option<f64>,
    pub aging: AgingBuckets,

    // Provenance (file::sheet), not part of the output schema
    #[serde(default)]
    pub source: String,
}

impl ExtractedRecord {
    pub fn new(bank: &str, period: &str, indicator_table: IndicatorTable) -> Self {
        ExtractedRecord {
            bank: bank.to_string(),
            period: period.to_string(),
            indicator_table,
            element_code: None,
            sub_element: None,
            amount: None,
            fs_line: None,
            item: None,
            currency: None,
            amount_vs_share: None,
            total: None,
            aging: AgingBuckets::default(),
            source: String::new(),
        }
    }

    pub fn with_element(mut self, code: &str) -> Self {
        self.element_code = Some(code.to_string());
        self
    }

    pub fn with_sub_element(mut self, sub_element: &str) -> Self {
        self.sub_element = Some(sub_element.to_string());
        self
    }

    pub fn with_amount(mut self, amount: Option<f64>) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_fs_line(mut self, fs_line: &str) -> Self {
        self.fs_line = Some(fs_line.to_string());
        self
    }

    pub fn with_item(mut self, item: &str) -> Self {
        self.item = Some(item.to_string());
        self
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = Some(currency.to_string());
        self
    }

    pub fn with_amount_vs_share(mut self, kind: &str) -> Self {
        self.amount_vs_share = Some(kind.to_string());
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_report_type_from_stem() {
        assert_eq!(IndicatorTable::detect("balance_sheet"), Some(IndicatorTable::BalanceSheet));
        assert_eq!(IndicatorTable::detect("Financial_Position_2024"), Some(IndicatorTable::BalanceSheet));
        assert_eq!(IndicatorTable::detect("profit_and_loss"), Some(IndicatorTable::ProfitAndLoss));
        assert_eq!(IndicatorTable::detect("Mənfəət və zərər"), Some(IndicatorTable::ProfitAndLoss));
        assert_eq!(IndicatorTable::detect("capital_adequacy"), Some(IndicatorTable::CapitalAdequacy));
        assert_eq!(IndicatorTable::detect("credit_risk"), Some(IndicatorTable::CreditRisk));
        assert_eq!(IndicatorTable::detect("currency_risk"), Some(IndicatorTable::CurrencyRisk));
        assert_eq!(IndicatorTable::detect("balance_of_payments"), None);
        assert_eq!(IndicatorTable::detect("readme"), None);
    }

    #[test]
    fn test_indicator_table_from_str() {
        assert_eq!("credit_risk".parse::<IndicatorTable>(), Ok(IndicatorTable::CreditRisk));
        assert_eq!("Balance Sheet".parse::<IndicatorTable>(), Ok(IndicatorTable::BalanceSheet));
        assert!("weather".parse::<IndicatorTable>().is_err());
    }

    #[test]
    fn test_period_forms() {
        let q1 = Period::new(2024, 1).unwrap();
        assert_eq!(Period::find_in("2024_Q1"), Some(q1));
        assert_eq!(Period::find_in("2024 Q1"), Some(q1));
        assert_eq!(Period::find_in("2024-q1"), Some(q1));
        assert_eq!(Period::find_in("Q1 2024"), Some(q1));
        assert_eq!(Period::find_in("balance_2024_Q1.xlsx"), Some(q1));
        assert_eq!(Period::find_in("2020_12M"), Period::new(2020, 4));
        assert_eq!(Period::find_in("2024_Q5"), None);
        assert_eq!(Period::find_in("misc"), None);
    }

    #[test]
    fn test_period_display() {
        assert_eq!(Period::new(2023, 4).unwrap().to_string(), "2023_Q4");
        assert_eq!("2022 q2".parse::<Period>().unwrap().to_string(), "2022_Q2");
        assert!(Period::new(2023, 0).is_none());
    }

    #[test]
    fn test_record_builder() {
        let rec = ExtractedRecord::new("abb", "2024_Q1", IndicatorTable::BalanceSheet)
            .with_element("1.5.6")
            .with_sub_element("Assets")
            .with_amount(Some(1000.0))
            .with_source("bs.xlsx::Sheet1");

        assert_eq!(rec.element_code.as_deref(), Some("1.5.6"));
        assert_eq!(rec.sub_element.as_deref(), Some("Assets"));
        assert_eq!(rec.amount, Some(1000.0));
        assert!(rec.aging.is_empty());
        assert_eq!(rec.source, "bs.xlsx::Sheet1");
    }
}
