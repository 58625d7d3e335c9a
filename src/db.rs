// 🗄️ SQLite export - master table and processing log in one database
// Rebuilt from scratch on every run inside a single transaction.

use crate::master::MasterTable;
use crate::processing_log::{EventKind, LogEvent, ProcessingLog};
use crate::record::ExtractedRecord;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{info, warn};

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS master_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_hash TEXT UNIQUE NOT NULL,
            bank TEXT NOT NULL,
            period TEXT NOT NULL,
            indicator_table TEXT NOT NULL,
            element TEXT,
            sub_element TEXT,
            azn REAL,
            fs_line TEXT,
            item TEXT,
            currency TEXT,
            amount_vs_share TEXT,
            total REAL,
            days_31_60 REAL,
            days_61_90 REAL,
            days_91_plus REAL,
            share_31_60 REAL,
            share_61_90 REAL,
            share_91_plus REAL,
            source TEXT NOT NULL,
            run_id TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS processing_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            event TEXT NOT NULL,
            bank TEXT,
            period TEXT,
            file TEXT,
            sheet TEXT,
            row INTEGER,
            detail TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS runs (
            run_id TEXT PRIMARY KEY,
            finished_at TEXT NOT NULL,
            records INTEGER NOT NULL,
            conflicts INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_master_key ON master_records(bank, period, indicator_table, element)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_run ON processing_events(run_id, event)",
        [],
    )?;

    Ok(())
}

/// Identity of a master row, including the sheet it came from
pub fn record_hash(rec: &ExtractedRecord) -> String {
    let mut hasher = Sha256::new();
    for part in [
        rec.bank.as_str(),
        rec.period.as_str(),
        rec.indicator_table.code(),
        rec.element_code.as_deref().unwrap_or(""),
        rec.fs_line.as_deref().unwrap_or(""),
        rec.currency.as_deref().unwrap_or(""),
        rec.amount_vs_share.as_deref().unwrap_or(""),
        rec.source.as_str(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub inserted: usize,
    pub duplicates: usize,
    pub events: usize,
}

/// Replace the database contents with this run's master table and log.
///
/// Rows that collide on `record_hash` are skipped and reported in `log`.
pub fn write_run(
    conn: &mut Connection,
    table: &MasterTable,
    log: &mut ProcessingLog,
) -> Result<ExportStats> {
    let run_id = log.run_id().to_string();
    let tx = conn.transaction()?;
    let mut stats = ExportStats::default();

    tx.execute("DELETE FROM master_records", [])?;

    for rec in &table.records {
        let result = tx.execute(
            "INSERT INTO master_records (
                record_hash, bank, period, indicator_table, element, sub_element, azn,
                fs_line, item, currency, amount_vs_share, total,
                days_31_60, days_61_90, days_91_plus, share_31_60, share_61_90, share_91_plus,
                source, run_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            params![
                record_hash(rec),
                rec.bank,
                rec.period,
                rec.indicator_table.label(),
                rec.element_code,
                rec.sub_element,
                rec.amount,
                rec.fs_line,
                rec.item,
                rec.currency,
                rec.amount_vs_share,
                rec.total,
                rec.aging.days_31_60,
                rec.aging.days_61_90,
                rec.aging.days_91_plus,
                rec.aging.share_31_60,
                rec.aging.share_61_90,
                rec.aging.share_91_plus,
                rec.source,
                run_id,
            ],
        );

        match result {
            Ok(_) => stats.inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                stats.duplicates += 1;
                warn!(source = %rec.source, "row already stored, skipping");
                log.push(
                    LogEvent::new(
                        EventKind::DuplicateConflict,
                        format!(
                            "sqlite: row {} {} {} already stored, skipped",
                            rec.indicator_table,
                            rec.element_code.as_deref().unwrap_or("-"),
                            rec.currency.as_deref().unwrap_or("-"),
                        ),
                    )
                    .with_bank(&rec.bank)
                    .with_period(&rec.period)
                    .with_file(&rec.source),
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    for e in log.events() {
        tx.execute(
            "INSERT INTO processing_events (run_id, timestamp, event, bank, period, file, sheet, row, detail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                run_id,
                e.at.to_rfc3339(),
                e.kind.to_string(),
                e.bank,
                e.period,
                e.file,
                e.sheet,
                e.row.map(|r| r as i64),
                e.detail,
            ],
        )?;
        stats.events += 1;
    }

    tx.execute(
        "INSERT OR REPLACE INTO runs (run_id, finished_at, records, conflicts) VALUES (?1, ?2, ?3, ?4)",
        params![
            run_id,
            Utc::now().to_rfc3339(),
            stats.inserted as i64,
            table.conflicts.len() as i64
        ],
    )?;

    tx.commit()?;
    Ok(stats)
}

/// Open (or create) the database at `path` and write the run into it
pub fn export_sqlite<P: AsRef<Path>>(
    path: P,
    table: &MasterTable,
    log: &mut ProcessingLog,
) -> Result<ExportStats> {
    let path = path.as_ref();
    let mut conn = Connection::open(path)
        .with_context(|| format!("Failed to open SQLite database: {:?}", path))?;
    setup_database(&conn)?;
    let stats = write_run(&mut conn, table, log)?;
    info!(path = ?path, inserted = stats.inserted, duplicates = stats.duplicates, "sqlite export done");
    Ok(stats)
}

pub fn count_records(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM master_records", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// TESTS
// ============================================================================
