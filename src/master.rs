// 🗂️ Master Assembler - per-file records -> one master table
// Concatenate, force the schema, natural sort, one row per key.

use crate::amount::{format_opt, format_plain};
use crate::error::EtlError;
use crate::record::{ExtractedRecord, IndicatorTable};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::warn;

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Zero-pad width of each numeric code component
const CODE_PAD: usize = 6;

// ============================================================================
// NATURAL ORDER
// ============================================================================

/// Sort key of an element code: `1.10` sorts after `1.9`, missing codes sort last
pub fn natural_key(code: Option<&str>) -> (bool, String) {
    match code {
        Some(c) => (
            false,
            c.split('.')
                .map(|p| {
                    if !p.is_empty() && p.chars().all(|ch| ch.is_ascii_digit()) {
                        format!("{:0>width$}", p, width = CODE_PAD)
                    } else {
                        p.to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join("."),
        ),
        None => (true, String::new()),
    }
}

fn compare_records(a: &ExtractedRecord, b: &ExtractedRecord) -> Ordering {
    a.bank
        .cmp(&b.bank)
        .then_with(|| a.period.cmp(&b.period))
        .then_with(|| a.indicator_table.cmp(&b.indicator_table))
        .then_with(|| {
            natural_key(a.element_code.as_deref()).cmp(&natural_key(b.element_code.as_deref()))
        })
}

// ============================================================================
// DEDUP POLICY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DedupPolicy {
    /// Order a key's records by amount and keep the last (largest; missing amounts lose)
    #[default]
    LastByAmount,
    /// Keep the record from the file processed last
    LastSeen,
    /// Fail the run when a key holds different amounts
    RejectConflicts,
}

/// A key seen more than once with different numeric facts
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateConflict {
    pub bank: String,
    pub period: String,
    pub indicator_table: IndicatorTable,
    pub element_code: String,
    pub amounts: Vec<Option<f64>>,
    pub sources: Vec<String>,

    /// Every numeric field that disagrees, with its value per source
    pub differing: Vec<(&'static str, Vec<Option<f64>>)>,
    pub kept: Option<f64>,
    pub kept_source: Option<String>,
}

fn render(values: &[Option<f64>]) -> String {
    values
        .iter()
        .map(|v| v.map_or("null".to_string(), format_plain))
        .collect::<Vec<_>>()
        .join(", ")
}

impl DuplicateConflict {
    pub fn describe(&self) -> String {
        let fields: Vec<String> = self
            .differing
            .iter()
            .map(|(name, values)| format!("{} [{}]", name, render(values)))
            .collect();
        format!(
            "{} {}: {} from [{}], kept {}",
            self.indicator_table,
            self.element_code,
            fields.join("; "),
            self.sources.join(", "),
            self.kept_source.as_deref().unwrap_or("nothing")
        )
    }
}

// ============================================================================
// ASSEMBLY
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MasterTable {
    pub records: Vec<ExtractedRecord>,
    pub conflicts: Vec<DuplicateConflict>,
}

impl MasterTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn clean_text(value: Option<String>) -> Option<String> {
    let v = value?;
    let t = v.trim();
    if t.is_empty() || t == "nan" || t == "None" {
        None
    } else {
        Some(t.to_string())
    }
}

fn clean_number(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Trim text fields, collapse placeholder strings, drop non-finite numbers
pub fn force_schema(mut rec: ExtractedRecord) -> ExtractedRecord {
    rec.bank = rec.bank.trim().to_string();
    rec.period = rec.period.trim().to_string();
    rec.element_code = clean_text(rec.element_code);
    rec.sub_element = clean_text(rec.sub_element);
    rec.fs_line = clean_text(rec.fs_line);
    rec.item = clean_text(rec.item);
    rec.currency = clean_text(rec.currency);
    rec.amount_vs_share = clean_text(rec.amount_vs_share);

    rec.amount = clean_number(rec.amount);
    rec.total = clean_number(rec.total);
    let a = &mut rec.aging;
    a.days_31_60 = clean_number(a.days_31_60);
    a.days_61_90 = clean_number(a.days_61_90);
    a.days_91_plus = clean_number(a.days_91_plus);
    a.share_31_60 = clean_number(a.share_31_60);
    a.share_61_90 = clean_number(a.share_61_90);
    a.share_91_plus = clean_number(a.share_91_plus);
    rec
}

fn same_key(a: &ExtractedRecord, b: &ExtractedRecord) -> bool {
    a.element_code.is_some()
        && a.bank == b.bank
        && a.period == b.period
        && a.indicator_table == b.indicator_table
        && a.element_code == b.element_code
}

/// Every numeric fact of a record, by output column
fn numeric_facts(r: &ExtractedRecord) -> [(&'static str, Option<f64>); 8] {
    [
        ("AZN", r.amount),
        ("Total", r.total),
        ("31-60 days", r.aging.days_31_60),
        ("61-90 days", r.aging.days_61_90),
        ("91+ days", r.aging.days_91_plus),
        ("31-60 days_share%inLP", r.aging.share_31_60),
        ("61-90 days_share%inLP", r.aging.share_61_90),
        ("91+ days_share%inLP", r.aging.share_91_plus),
    ]
}

/// Numeric fields whose values are not the same across the group
fn differing_fields(group: &[ExtractedRecord]) -> Vec<(&'static str, Vec<Option<f64>>)> {
    let facts: Vec<_> = group.iter().map(numeric_facts).collect();
    (0..facts[0].len())
        .filter_map(|i| {
            let values: Vec<Option<f64>> = facts.iter().map(|f| f[i].1).collect();
            let first = values[0];
            values
                .iter()
                .any(|v| *v != first)
                .then(|| (facts[0][i].0, values))
        })
        .collect()
}

/// Pick the surviving record of one key group
fn pick(mut group: Vec<ExtractedRecord>, policy: DedupPolicy) -> Option<ExtractedRecord> {
    if policy == DedupPolicy::LastByAmount {
        // stable: equal amounts keep file order
        group.sort_by(|a, b| match (a.amount, b.amount) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }
    group.pop()
}

/// Assemble without failing; conflicts are reported on the table
pub fn build_master(parts: Vec<Vec<ExtractedRecord>>, policy: DedupPolicy) -> MasterTable {
    let mut all: Vec<ExtractedRecord> = parts.into_iter().flatten().map(force_schema).collect();
    all.sort_by(compare_records);

    let mut table = MasterTable::default();
    let mut iter = all.into_iter().peekable();

    while let Some(first) = iter.next() {
        let mut group = vec![first];
        while let Some(next) = iter.peek() {
            if !same_key(&group[0], next) {
                break;
            }
            if let Some(next) = iter.next() {
                group.push(next);
            }
        }

        let differing = if group.len() > 1 {
            differing_fields(&group)
        } else {
            Vec::new()
        };

        if !differing.is_empty() {
            let head = &group[0];
            let mut conflict = DuplicateConflict {
                bank: head.bank.clone(),
                period: head.period.clone(),
                indicator_table: head.indicator_table,
                element_code: head.element_code.clone().unwrap_or_default(),
                amounts: group.iter().map(|r| r.amount).collect(),
                sources: group.iter().map(|r| r.source.clone()).collect(),
                differing,
                kept: None,
                kept_source: None,
            };
            let kept = pick(group, policy);
            conflict.kept = kept.as_ref().and_then(|r| r.amount);
            conflict.kept_source = kept.as_ref().map(|r| r.source.clone());
            warn!(bank = %conflict.bank, period = %conflict.period, "duplicate key: {}", conflict.describe());
            table.conflicts.push(conflict);
            table.records.extend(kept);
        } else {
            table.records.extend(pick(group, policy));
        }
    }

    table
}

/// Assemble the master table. `RejectConflicts` fails when any key holds
/// different amounts.
pub fn assemble(
    parts: Vec<Vec<ExtractedRecord>>,
    policy: DedupPolicy,
) -> std::result::Result<MasterTable, EtlError> {
    let table = build_master(parts, policy);
    if policy == DedupPolicy::RejectConflicts && !table.conflicts.is_empty() {
        return Err(EtlError::ConflictingValues {
            groups: table.conflicts.len(),
        });
    }
    Ok(table)
}

// ============================================================================
// OUTPUT
// ============================================================================

/// One output row; every field is already rendered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterRow {
    #[serde(rename = "Bank")]
    pub bank: String,
    #[serde(rename = "Period")]
    pub period: String,
    #[serde(rename = "Indicator table")]
    pub indicator_table: String,
    #[serde(rename = "Element")]
    pub element: String,
    #[serde(rename = "Sub-element")]
    pub sub_element: String,
    #[serde(rename = "AZN")]
    pub azn: String,
    #[serde(rename = "FS Line")]
    pub fs_line: String,
    #[serde(rename = "Item")]
    pub item: String,
    #[serde(rename = "Currency")]
    pub currency: String,
    #[serde(rename = "Amount vs Share")]
    pub amount_vs_share: String,
    #[serde(rename = "Total")]
    pub total: String,
    #[serde(rename = "31-60 days")]
    pub days_31_60: String,
    #[serde(rename = "61-90 days")]
    pub days_61_90: String,
    #[serde(rename = "91+ days")]
    pub days_91_plus: String,
    #[serde(rename = "31-60 days_share%inLP")]
    pub share_31_60: String,
    #[serde(rename = "61-90 days_share%inLP")]
    pub share_61_90: String,
    #[serde(rename = "91+ days_share%inLP")]
    pub share_91_plus: String,
}

impl From<&ExtractedRecord> for MasterRow {
    fn from(r: &ExtractedRecord) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        MasterRow {
            bank: r.bank.clone(),
            period: r.period.clone(),
            indicator_table: r.indicator_table.label().to_string(),
            element: text(&r.element_code),
            sub_element: text(&r.sub_element),
            azn: format_opt(r.amount),
            fs_line: text(&r.fs_line),
            item: text(&r.item),
            currency: text(&r.currency),
            amount_vs_share: text(&r.amount_vs_share),
            total: format_opt(r.total),
            days_31_60: format_opt(r.aging.days_31_60),
            days_61_90: format_opt(r.aging.days_61_90),
            days_91_plus: format_opt(r.aging.days_91_plus),
            share_31_60: format_opt(r.aging.share_31_60),
            share_61_90: format_opt(r.aging.share_61_90),
            share_91_plus: format_opt(r.aging.share_91_plus),
        }
    }
}

pub fn write_master_csv<W: Write>(table: &MasterTable, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    if table.is_empty() {
        wtr.write_record(MASTER_COLUMNS)?;
    }
    for rec in &table.records {
        wtr.serialize(MasterRow::from(rec))
            .context("Failed to write master row")?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the master CSV as UTF-8 with a byte-order mark
pub fn write_master_file<P: AsRef<Path>>(table: &MasterTable, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create master file: {:?}", path))?;
    file.write_all(UTF8_BOM)?;
    write_master_csv(table, file)
}

pub const MASTER_COLUMNS: [&str; 17] = [
    "Bank",
    "Period",
    "Indicator table",
    "Element",
    "Sub-element",
    "AZN",
    "FS Line",
    "Item",
    "Currency",
    "Amount vs Share",
    "Total",
    "31-60 days",
    "61-90 days",
    "91+ days",
    "31-60 days_share%inLP",
    "61-90 days_share%inLP",
    "91+ days_share%inLP",
];

// ============================================================================
// TESTS
// ============================================================================
