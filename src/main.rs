use anyhow::Result;
use clap::{Parser, ValueEnum};
use disclosure_etl::{pipeline, DedupPolicy, PipelineConfig, VERSION};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Policy {
    /// Keep the largest amount of each duplicated key
    LastByAmount,
    /// Keep the record of the file processed last
    LastSeen,
    /// Fail the run when duplicated keys disagree
    RejectConflicts,
}

impl From<Policy> for DedupPolicy {
    fn from(p: Policy) -> Self {
        match p {
            Policy::LastByAmount => DedupPolicy::LastByAmount,
            Policy::LastSeen => DedupPolicy::LastSeen,
            Policy::RejectConflicts => DedupPolicy::RejectConflicts,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "disclosure-etl", version, about = "Bank disclosure files -> one master table")]
struct Cli {
    /// Input root laid out as {bank}/{period}/...
    #[arg(long)]
    input: PathBuf,

    /// Directory for the master CSV and the processing log
    #[arg(long = "output-dir")]
    output_dir: PathBuf,

    /// Taxonomy CSV (code,label[,group][,table])
    #[arg(long)]
    taxonomy: PathBuf,

    /// File name of the master CSV inside the output directory
    #[arg(long)]
    master: String,

    /// JSON special rules replacing the built-in ones
    #[arg(long)]
    rules: Option<PathBuf>,

    #[arg(long = "dedup-policy", value_enum, default_value = "last-by-amount")]
    dedup_policy: Policy,

    /// Minimal similarity (0-100) for a fuzzy label match
    #[arg(long = "score-cutoff", default_value_t = 70.0)]
    score_cutoff: f64,

    /// Worker threads, 0 = one per core
    #[arg(long, default_value_t = 0)]
    jobs: usize,

    /// Also export the run into this SQLite database
    #[arg(long)]
    sqlite: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = PipelineConfig::new(cli.input, cli.output_dir, cli.taxonomy, cli.master)
        .with_dedup_policy(cli.dedup_policy.into())
        .with_score_cutoff(cli.score_cutoff)
        .with_jobs(cli.jobs);
    if let Some(rules) = cli.rules {
        config = config.with_rules(rules);
    }
    if let Some(db) = cli.sqlite {
        config = config.with_sqlite(db);
    }

    println!("📊 disclosure-etl v{}", VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let summary = pipeline::run(&config)?;

    println!("✓ Files discovered:  {}", summary.files_seen);
    println!("✓ Files processed:   {}", summary.files_processed);
    println!("✓ Files skipped:     {}", summary.skipped_files);
    println!("✓ Master rows:       {}", summary.records);
    if summary.unresolved_labels > 0 {
        println!("⚠️  Unresolved labels: {}", summary.unresolved_labels);
    }
    if summary.conflicts > 0 {
        println!("⚠️  Duplicate conflicts: {}", summary.conflicts);
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📄 Master: {}", summary.master_path.display());
    println!("📝 Log:    {}", summary.log_path.display());

    Ok(())
}
