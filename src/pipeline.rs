// 🚚 Pipeline - discover, extract in parallel, assemble, write
//
// Files are processed on a rayon pool; results come back in lexicographic
// path order so "last" in deduplication always means the same file.

use crate::config::PipelineConfig;
use crate::error::EtlError;
use crate::extraction::{extract_sheet, ExtractionStrategy, SheetContext};
use crate::master::{build_master, write_master_file, DedupPolicy, MasterTable};
use crate::matcher::{RuleSet, TaxonomyMatcher};
use crate::processing_log::{file_digest, EventKind, LogEvent, ProcessingLog, PROCESSING_LOG_FILE};
use crate::record::{ExtractedRecord, IndicatorTable, Period};
use crate::source::{discover, load_sheets, select_sheet, SourceFile};
use crate::taxonomy::Taxonomy;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub type Matchers<'a> = HashMap<IndicatorTable, TaxonomyMatcher<'a>>;

/// One matcher per report type, sharing the taxonomy and rules
pub fn build_matchers<'a>(taxonomy: &'a Taxonomy, rules: &RuleSet, cutoff: f64) -> Matchers<'a> {
    IndicatorTable::ALL
        .into_iter()
        .map(|t| {
            let matcher = TaxonomyMatcher::for_table(taxonomy, t)
                .with_rules(rules)
                .with_cutoff(cutoff);
            (t, matcher)
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct FileOutcome {
    pub records: Vec<ExtractedRecord>,
    pub events: Vec<LogEvent>,
}

fn file_event(file: &SourceFile, kind: EventKind, detail: impl Into<String>) -> LogEvent {
    LogEvent::new(kind, detail)
        .with_bank(&file.bank)
        .with_file(&file.relative)
}

/// Extract every record of one source file. Never fails: problems become events.
pub fn process_file(file: &SourceFile, matchers: &Matchers<'_>) -> FileOutcome {
    let mut out = FileOutcome::default();

    let Some(period) =
        Period::find_in(&file.period_dir).or_else(|| Period::find_in(&file.file_name()))
    else {
        warn!(file = %file.relative, "no reporting period in path");
        out.events.push(file_event(
            file,
            EventKind::InvalidPeriod,
            format!("period directory {:?}", file.period_dir),
        ));
        return out;
    };
    let period = period.to_string();

    let Some(table) = IndicatorTable::detect(&file.file_stem()) else {
        debug!(file = %file.relative, "not a known report");
        out.events.push(
            file_event(file, EventKind::UnrecognizedReportType, file.file_stem())
                .with_period(&period),
        );
        return out;
    };
    let Some(matcher) = matchers.get(&table) else {
        return out;
    };

    let sheets = match load_sheets(&file.path) {
        Ok(s) => s,
        Err(e) => {
            warn!(file = %file.relative, "{}", e);
            out.events.push(
                file_event(file, EventKind::UnreadableSource, e.to_string()).with_period(&period),
            );
            return out;
        }
    };

    let selected: Vec<usize> = match ExtractionStrategy::for_table(table) {
        ExtractionStrategy::SingleColumn => select_sheet(&sheets, table).into_iter().collect(),
        ExtractionStrategy::WideRow => (0..sheets.len()).collect(),
    };

    for i in selected {
        let sheet = &sheets[i];
        let ctx = SheetContext {
            bank: &file.bank,
            period: &period,
            file: &file.relative,
            sheet: &sheet.name,
            table,
        };
        match extract_sheet(&sheet.grid, &ctx, matcher) {
            Ok(outcome) => {
                out.records.extend(outcome.records);
                out.events.extend(outcome.events);
            }
            Err(e) => {
                warn!(file = %file.relative, sheet = %sheet.name, "{}", e);
                let kind = match e {
                    EtlError::NoReportingColumnFound { .. } => EventKind::NoReportingColumnFound,
                    _ => EventKind::UnreadableSource,
                };
                out.events.push(
                    file_event(file, kind, e.to_string())
                        .with_period(&period)
                        .with_sheet(&sheet.name),
                );
            }
        }
    }

    let digest = file_digest(&file.path).unwrap_or_else(|e| format!("unavailable ({})", e));
    info!(file = %file.relative, table = %table, records = out.records.len(), "processed");
    out.events.push(
        file_event(
            file,
            EventKind::Processed,
            format!("{} records={} sha256={}", table.code(), out.records.len(), digest),
        )
        .with_period(&period),
    );

    out
}

fn conflict_events(master: &MasterTable) -> Vec<LogEvent> {
    master
        .conflicts
        .iter()
        .map(|c| {
            LogEvent::new(EventKind::DuplicateConflict, c.describe())
                .with_bank(&c.bank)
                .with_period(&c.period)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub files_seen: usize,
    pub files_processed: usize,
    pub records: usize,
    pub conflicts: usize,
    pub unresolved_labels: usize,
    pub skipped_files: usize,
    pub master_path: PathBuf,
    pub log_path: PathBuf,
}

/// Extract and assemble without touching the output directory
pub fn extract_all(
    files: &[SourceFile],
    matchers: &Matchers<'_>,
    jobs: usize,
    policy: DedupPolicy,
) -> Result<(MasterTable, ProcessingLog)> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("Failed to build worker pool")?;

    // collect() on an indexed parallel iterator keeps input order
    let outcomes: Vec<FileOutcome> =
        pool.install(|| files.par_iter().map(|f| process_file(f, matchers)).collect());

    let mut log = ProcessingLog::new();
    let mut parts = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        log.extend(outcome.events);
        parts.push(outcome.records);
    }

    let master = build_master(parts, policy);
    log.extend(conflict_events(&master));
    Ok((master, log))
}

#[cfg(feature = "sqlite")]
fn export_database(path: &Path, master: &MasterTable, log: &mut ProcessingLog) -> Result<()> {
    crate::db::export_sqlite(path, master, log)?;
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
fn export_database(path: &Path, _master: &MasterTable, _log: &mut ProcessingLog) -> Result<()> {
    warn!(path = ?path, "built without the sqlite feature, skipping database export");
    Ok(())
}

/// Run the whole pipeline for one configuration
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    config.validate()?;

    let taxonomy = Taxonomy::load(&config.taxonomy_path)?;
    info!(entries = taxonomy.len(), "taxonomy loaded");

    let rules = match &config.rules_path {
        Some(path) => RuleSet::from_file(path)?,
        None => RuleSet::builtin(),
    };
    info!(rules = rules.rule_count(), "special rules loaded");
    let matchers = build_matchers(&taxonomy, &rules, config.score_cutoff);

    let files = discover(&config.input_root)?;
    info!(files = files.len(), root = ?config.input_root, "sources discovered");

    let (master, mut log) = extract_all(&files, &matchers, config.jobs, config.dedup_policy)?;

    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Failed to create output dir: {:?}", config.output_dir))?;
    let log_path = config.output_dir.join(PROCESSING_LOG_FILE);

    if config.dedup_policy == DedupPolicy::RejectConflicts && !master.conflicts.is_empty() {
        log.write_file(&log_path)?;
        return Err(EtlError::ConflictingValues {
            groups: master.conflicts.len(),
        }
        .into());
    }

    let master_path = config.master_path();
    write_master_file(&master, &master_path)?;

    if let Some(db_path) = &config.sqlite_path {
        export_database(db_path, &master, &mut log)?;
    }
    log.write_file(&log_path)?;

    Ok(RunSummary {
        files_seen: files.len(),
        files_processed: log.count(EventKind::Processed),
        records: master.len(),
        conflicts: master.conflicts.len(),
        unresolved_labels: log.count(EventKind::UnresolvedLabel),
        skipped_files: log.count(EventKind::UnreadableSource)
            + log.count(EventKind::UnrecognizedReportType)
            + log.count(EventKind::InvalidPeriod),
        master_path,
        log_path,
    })
}

// ============================================================================
// TESTS
// ============================================================================
