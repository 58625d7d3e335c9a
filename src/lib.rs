// Disclosure ETL - Core Library
// Bank disclosure files -> taxonomy-reconciled master table

pub mod amount;
pub mod columns;
pub mod config;
#[cfg(feature = "sqlite")]
pub mod db;
pub mod error;
pub mod extraction;
pub mod grid;
pub mod master;
pub mod matcher;
pub mod normalize;
pub mod pipeline;
pub mod processing_log;
pub mod record;
pub mod source;
pub mod taxonomy;

// Re-export commonly used types
pub use amount::{format_plain, parse_amount, parse_amount_str};
pub use config::PipelineConfig;
pub use error::EtlError;
pub use extraction::{extract_sheet, ExtractionStrategy, SheetContext, SheetOutcome};
pub use grid::{Cell, RawGrid, Table};
pub use master::{
    assemble, build_master, write_master_csv, write_master_file, DedupPolicy, DuplicateConflict,
    MasterTable, MASTER_COLUMNS,
};
pub use matcher::{MatchStage, Resolution, RuleSet, SpecialRule, TaxonomyMatcher};
pub use normalize::normalize;
pub use pipeline::{run, RunSummary};
pub use processing_log::{EventKind, LogEvent, ProcessingLog};
pub use record::{AgingBuckets, ExtractedRecord, IndicatorTable, Period};
pub use source::{discover, load_sheets, SourceFile};
pub use taxonomy::{Group, Taxonomy, TaxonomyEntry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
