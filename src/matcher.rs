// 🎯 Taxonomy Matcher - free-text row label -> taxonomy code
// Rules as data first, then token-set similarity, then the row's own code.

use crate::normalize::normalize;
use crate::record::IndicatorTable;
use crate::taxonomy::{is_element_code, Taxonomy, TaxonomyEntry};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Default similarity cutoff on the 0-100 scale
pub const DEFAULT_SCORE_CUTOFF: f64 = 70.0;

/// Candidates inspected after ranking
pub const TOP_CANDIDATES: usize = 5;

/// Labels longer than this (normalized, in chars) may not resolve to a broad code
pub const BROAD_GUARD_LEN: usize = 12;

// ============================================================================
// SPECIAL RULES
// ============================================================================

/// A regex over the normalized label that forces a code.
///
/// `unless` is a second pattern that vetoes the match (the regex crate has
/// no look-around).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialRule {
    pub id: String,
    pub pattern: String,
    pub code: String,

    #[serde(default)]
    pub unless: Option<String>,

    /// Report type the rule is limited to
    #[serde(default)]
    pub table: Option<IndicatorTable>,

    /// Higher = applied first; equal priorities keep file order
    #[serde(default)]
    pub priority: i32,
}

impl SpecialRule {
    pub fn new(id: &str, pattern: &str, code: &str) -> Self {
        SpecialRule {
            id: id.to_string(),
            pattern: pattern.to_string(),
            code: code.to_string(),
            unless: None,
            table: None,
            priority: 0,
        }
    }

    pub fn unless(mut self, pattern: &str) -> Self {
        self.unless = Some(pattern.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: SpecialRule,
    pattern: Regex,
    unless: Option<Regex>,
}

impl CompiledRule {
    pub fn compile(rule: SpecialRule) -> Result<Self> {
        let pattern = Regex::new(&rule.pattern)
            .with_context(|| format!("Invalid pattern in rule {}", rule.id))?;
        let unless = match &rule.unless {
            Some(p) => Some(
                Regex::new(p).with_context(|| format!("Invalid unless pattern in rule {}", rule.id))?,
            ),
            None => None,
        };
        Ok(CompiledRule { rule, pattern, unless })
    }

    /// Match against an already normalized label
    pub fn matches(&self, normalized: &str) -> bool {
        self.pattern.is_match(normalized)
            && !self.unless.as_ref().is_some_and(|u| u.is_match(normalized))
    }

    fn applies_to(&self, table: IndicatorTable) -> bool {
        self.rule.table.map_or(true, |t| t == table)
    }
}

/// Ordered special rules
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        RuleSet { rules: Vec::new() }
    }

    /// Loan-loss provisions and net loans, both vetoed by "umumi" (general)
    pub fn builtin() -> Self {
        let rules = vec![
            SpecialRule::new(
                "loan-loss-provision",
                r"\bmumkun.*\behtiyat|\bmeqsedli\s+ehtiyat",
                "1.5.5",
            )
            .unless(r"\bumumi\b"),
            SpecialRule::new("net-loans", r"\bxalis\b.*\b(kredit|musteri)", "1.5.6")
                .unless(r"\bumumi\b"),
        ];
        // literal patterns above are known to compile
        RuleSet::from_rules(rules).unwrap_or_default()
    }

    /// Load rules from a JSON array, replacing the built-ins
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read rules file: {:?}", path.as_ref()))?;

        let rules: Vec<SpecialRule> =
            serde_json::from_str(&content).context("Failed to parse rules JSON")?;

        RuleSet::from_rules(rules)
    }

    pub fn from_rules(mut rules: Vec<SpecialRule>) -> Result<Self> {
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        let rules = rules
            .into_iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(RuleSet { rules })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }
}

// ============================================================================
// SIMILARITY
// ============================================================================

fn ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b) * 100.0
}

fn join(tokens: &[&str]) -> String {
    tokens.join(" ")
}

/// Token-set similarity on a 0-100 scale.
///
/// Word order and repeated words do not matter; a label whose words are all
/// contained in the other scores 100.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let ta: BTreeSet<&str> = a.split_whitespace().collect();
    let tb: BTreeSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let common: Vec<&str> = ta.intersection(&tb).copied().collect();
    let only_a: Vec<&str> = ta.difference(&tb).copied().collect();
    let only_b: Vec<&str> = tb.difference(&ta).copied().collect();

    if !common.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100.0;
    }

    let sect = join(&common);
    let with_a = join(&common.iter().chain(only_a.iter()).copied().collect::<Vec<_>>());
    let with_b = join(&common.iter().chain(only_b.iter()).copied().collect::<Vec<_>>());

    let mut best = ratio(&with_a, &with_b);
    if !sect.is_empty() {
        best = best.max(ratio(&sect, &with_a)).max(ratio(&sect, &with_b));
    }
    best
}

// ============================================================================
// MATCHER
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum MatchStage {
    /// Special rule with this id
    Rule(String),
    Fuzzy,
    CodeHint,
}

#[derive(Debug, Clone)]
pub struct Resolution<'a> {
    pub entry: &'a TaxonomyEntry,
    pub stage: MatchStage,

    /// 100 for rules, similarity for fuzzy matches, 0 for code hints
    pub score: f64,
}

/// Resolves labels for one report type
pub struct TaxonomyMatcher<'a> {
    taxonomy: &'a Taxonomy,
    table: IndicatorTable,
    candidates: Vec<(&'a TaxonomyEntry, &'a str)>,
    rules: Vec<CompiledRule>,
    cutoff: f64,
    broad_codes: Option<HashSet<String>>,
}

impl<'a> TaxonomyMatcher<'a> {
    /// Matcher over every entry that applies to `table`, with the built-in rules
    pub fn for_table(taxonomy: &'a Taxonomy, table: IndicatorTable) -> Self {
        TaxonomyMatcher {
            taxonomy,
            table,
            candidates: taxonomy.searchable_for(table).collect(),
            rules: Vec::new(),
            cutoff: DEFAULT_SCORE_CUTOFF,
            broad_codes: None,
        }
        .with_rules(&RuleSet::builtin())
    }

    /// Replace the special rules. Rules pointing at unknown codes are dropped.
    pub fn with_rules(mut self, rules: &RuleSet) -> Self {
        self.rules = rules
            .rules()
            .iter()
            .filter(|r| r.applies_to(self.table))
            .filter(|r| {
                let known = self
                    .taxonomy
                    .get(&r.rule.code)
                    .is_some_and(|e| e.applies_to(self.table));
                if !known {
                    warn!(rule = %r.rule.id, code = %r.rule.code, table = %self.table,
                        "special rule targets a code missing from the taxonomy, ignoring");
                }
                known
            })
            .cloned()
            .collect();
        self
    }

    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Override which codes count as too broad for long labels
    pub fn with_broad_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.broad_codes = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    pub fn table(&self) -> IndicatorTable {
        self.table
    }

    fn is_broad(&self, entry: &TaxonomyEntry) -> bool {
        match &self.broad_codes {
            Some(codes) => codes.contains(&entry.code),
            None => entry.depth() == 1,
        }
    }

    /// Resolve a raw label (and the code printed next to it, if any)
    pub fn resolve(&self, label: &str, code_hint: Option<&str>) -> Option<Resolution<'a>> {
        let norm = normalize(label);

        if !norm.is_empty() {
            if let Some(res) = self.by_rule(&norm) {
                return Some(res);
            }
            if let Some(res) = self.by_similarity(&norm) {
                return Some(res);
            }
        }

        let hint = code_hint.map(str::trim).filter(|h| is_element_code(h))?;
        let entry = self.taxonomy.get(hint).filter(|e| e.applies_to(self.table))?;
        debug!(label = %label, code = %entry.code, "resolved by code hint");
        Some(Resolution {
            entry,
            stage: MatchStage::CodeHint,
            score: 0.0,
        })
    }

    fn by_rule(&self, norm: &str) -> Option<Resolution<'a>> {
        let rule = self.rules.iter().find(|r| r.matches(norm))?;
        let entry = self.taxonomy.get(&rule.rule.code)?;
        debug!(label = %norm, rule = %rule.rule.id, code = %entry.code, "resolved by rule");
        Some(Resolution {
            entry,
            stage: MatchStage::Rule(rule.rule.id.clone()),
            score: 100.0,
        })
    }

    fn by_similarity(&self, norm: &str) -> Option<Resolution<'a>> {
        let mut scored: Vec<(usize, f64)> = self
            .candidates
            .iter()
            .enumerate()
            .map(|(i, (_, label))| (i, token_set_ratio(norm, label)))
            .collect();
        // stable: equal scores keep taxonomy order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let long_label = norm.chars().count() > BROAD_GUARD_LEN;
        for (i, score) in scored.into_iter().take(TOP_CANDIDATES) {
            if score < self.cutoff {
                break;
            }
            let entry = self.candidates[i].0;
            if long_label && self.is_broad(entry) {
                debug!(label = %norm, code = %entry.code, "skipping broad code for long label");
                continue;
            }
            debug!(label = %norm, code = %entry.code, score, "resolved by similarity");
            return Some(Resolution {
                entry,
                stage: MatchStage::Fuzzy,
                score,
            });
        }
        None
    }
}

// ============================================================================
// TESTS
// ============================================================================
