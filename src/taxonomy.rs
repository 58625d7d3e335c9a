// 📚 Taxonomy - canonical financial-statement elements
// Loaded once from CSV, immutable afterwards, shared read-only by every worker.

use crate::error::EtlError;
use crate::normalize::normalize;
use crate::record::IndicatorTable;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

static ELEMENT_CODE_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)*$").expect("valid element code pattern"));

/// True for dotted numeric codes such as `1`, `1.5`, `1.5.6`
pub fn is_element_code(text: &str) -> bool {
    ELEMENT_CODE_RX.is_match(text.trim())
}

// ============================================================================
// GROUP
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Group {
    Assets,
    Liabilities,
    Equity,
    Other,
}

impl Group {
    /// Parse a group name (English or Azerbaijani, any case)
    pub fn parse(text: &str) -> Option<Group> {
        let t = normalize(text);
        if t.is_empty() {
            return None;
        }
        if t.starts_with("asset") || t.starts_with("aktiv") {
            Some(Group::Assets)
        } else if t.starts_with("liabilit") || t.starts_with("ohdelik") {
            Some(Group::Liabilities)
        } else if t.starts_with("equity") || t.starts_with("kapital") {
            Some(Group::Equity)
        } else {
            Some(Group::Other)
        }
    }

    /// Infer the group from the first code component
    pub fn from_code(code: &str) -> Group {
        match code.split('.').next().map(str::trim) {
            Some("1") => Group::Assets,
            Some("2") => Group::Liabilities,
            Some("3") => Group::Equity,
            _ => Group::Other,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Group::Assets => "Assets",
            Group::Liabilities => "Liabilities",
            Group::Equity => "Equity",
            Group::Other => "Other",
        };
        f.write_str(s)
    }
}

// ============================================================================
// ENTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub code: String,
    pub label: String,
    pub group: Group,

    /// Restricts the entry to one report type; `None` applies everywhere
    pub table: Option<IndicatorTable>,
}

impl TaxonomyEntry {
    pub fn new(code: &str, label: &str) -> Self {
        TaxonomyEntry {
            code: code.trim().to_string(),
            label: label.trim().to_string(),
            group: Group::from_code(code),
            table: None,
        }
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.group = group;
        self
    }

    pub fn with_table(mut self, table: IndicatorTable) -> Self {
        self.table = Some(table);
        self
    }

    pub fn applies_to(&self, table: IndicatorTable) -> bool {
        self.table.map_or(true, |t| t == table)
    }

    /// Number of dotted components (`1.5.6` -> 3)
    pub fn depth(&self) -> usize {
        self.code.split('.').count()
    }
}

/// One CSV row as written by analysts
#[derive(Debug, Deserialize)]
struct TaxonomyRow {
    code: Option<String>,
    #[serde(alias = "az_label")]
    label: Option<String>,
    #[serde(alias = "master_group", default)]
    group: Option<String>,
    #[serde(default)]
    table: Option<String>,
}

// ============================================================================
// TAXONOMY
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    entries: Vec<TaxonomyEntry>,
    by_code: HashMap<String, usize>,

    /// Normalized label of every entry, parallel to `entries`
    normalized: Vec<String>,

    /// False for entries whose normalized label repeats an earlier one in the same scope
    searchable: Vec<bool>,
}

impl Taxonomy {
    /// Load the taxonomy CSV. A missing file is fatal.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(EtlError::MissingTaxonomyFile(path.to_path_buf()).into());
        }
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open taxonomy file: {:?}", path))?;
        Taxonomy::from_reader(file)
            .with_context(|| format!("Failed to parse taxonomy file: {:?}", path))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut entries = Vec::new();
        for (i, row) in rdr.deserialize::<TaxonomyRow>().enumerate() {
            let row = row.with_context(|| format!("Failed to parse taxonomy row {}", i + 2))?;

            let (code, label) = match (row.code, row.label) {
                (Some(c), Some(l)) if is_element_code(&c) && !l.trim().is_empty() => (c, l),
                (code, _) => {
                    debug!(row = i + 2, ?code, "skipping taxonomy row without code or label");
                    continue;
                }
            };

            let mut entry = TaxonomyEntry::new(&code, &label);
            if let Some(group) = row.group.as_deref().and_then(Group::parse) {
                entry.group = group;
            }
            if let Some(scope) = row.table.as_deref().filter(|t| !t.trim().is_empty()) {
                match scope.parse::<IndicatorTable>() {
                    Ok(t) => entry.table = Some(t),
                    Err(e) => warn!(code = %entry.code, "ignoring table scope: {}", e),
                }
            }
            entries.push(entry);
        }

        Ok(Taxonomy::from_entries(entries))
    }

    /// Build from entries; later duplicate codes are dropped
    pub fn from_entries(entries: Vec<TaxonomyEntry>) -> Self {
        let mut taxonomy = Taxonomy::default();
        let mut seen_labels: HashSet<(String, Option<IndicatorTable>)> = HashSet::new();

        for entry in entries {
            if taxonomy.by_code.contains_key(&entry.code) {
                warn!(code = %entry.code, "duplicate taxonomy code, keeping the first");
                continue;
            }

            let norm = normalize(&entry.label);
            let searchable = seen_labels.insert((norm.clone(), entry.table));
            if !searchable {
                warn!(code = %entry.code, label = %entry.label, "duplicate taxonomy label, keeping the first");
            }

            taxonomy.by_code.insert(entry.code.clone(), taxonomy.entries.len());
            taxonomy.entries.push(entry);
            taxonomy.normalized.push(norm);
            taxonomy.searchable.push(searchable);
        }

        taxonomy
    }

    pub fn get(&self, code: &str) -> Option<&TaxonomyEntry> {
        self.by_code.get(code.trim()).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, code: &str) -> bool {
        self.by_code.contains_key(code.trim())
    }

    pub fn entries(&self) -> &[TaxonomyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(entry, normalized label)` pairs eligible for similarity search in `table`,
    /// in taxonomy order
    pub fn searchable_for(
        &self,
        table: IndicatorTable,
    ) -> impl Iterator<Item = (&TaxonomyEntry, &str)> + '_ {
        self.entries
            .iter()
            .zip(self.normalized.iter())
            .zip(self.searchable.iter())
            .filter(move |((e, n), s)| **s && !n.is_empty() && e.applies_to(table))
            .map(|((e, n), _)| (e, n.as_str()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
