// 📜 Processing Log - every skip, drop and conflict of a run, as CSV
// An output file in its own right, written next to the master table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use uuid::Uuid;

pub const PROCESSING_LOG_FILE: &str = "processing_log.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    Processed,
    UnreadableSource,
    NoReportingColumnFound,
    UnresolvedLabel,
    MalformedNumber,
    UnmappedColumn,
    UnrecognizedReportType,
    InvalidPeriod,
    DuplicateConflict,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One line of the processing log
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub kind: EventKind,
    pub at: DateTime<Utc>,
    pub bank: Option<String>,
    pub period: Option<String>,
    pub file: Option<String>,
    pub sheet: Option<String>,

    /// 1-based spreadsheet row
    pub row: Option<usize>,
    pub detail: String,
}

impl LogEvent {
    pub fn new(kind: EventKind, detail: impl Into<String>) -> Self {
        LogEvent {
            kind,
            at: Utc::now(),
            bank: None,
            period: None,
            file: None,
            sheet: None,
            row: None,
            detail: detail.into(),
        }
    }

    pub fn with_bank(mut self, bank: &str) -> Self {
        self.bank = Some(bank.to_string());
        self
    }

    pub fn with_period(mut self, period: &str) -> Self {
        self.period = Some(period.to_string());
        self
    }

    pub fn with_file(mut self, file: &str) -> Self {
        self.file = Some(file.to_string());
        self
    }

    pub fn with_sheet(mut self, sheet: &str) -> Self {
        self.sheet = Some(sheet.to_string());
        self
    }

    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }
}

#[derive(Serialize)]
struct LogRow<'a> {
    run_id: String,
    timestamp: String,
    event: String,
    bank: &'a str,
    period: &'a str,
    file: &'a str,
    sheet: &'a str,
    row: Option<usize>,
    detail: &'a str,
}

/// Events of one run, in the order they were recorded
#[derive(Debug, Clone)]
pub struct ProcessingLog {
    run_id: Uuid,
    events: Vec<LogEvent>,
}

impl ProcessingLog {
    pub fn new() -> Self {
        ProcessingLog {
            run_id: Uuid::new_v4(),
            events: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn push(&mut self, event: LogEvent) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = LogEvent>) {
        self.events.extend(events);
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let run_id = self.run_id.to_string();

        for e in &self.events {
            wtr.serialize(LogRow {
                run_id: run_id.clone(),
                timestamp: e.at.to_rfc3339(),
                event: e.kind.to_string(),
                bank: e.bank.as_deref().unwrap_or(""),
                period: e.period.as_deref().unwrap_or(""),
                file: e.file.as_deref().unwrap_or(""),
                sheet: e.sheet.as_deref().unwrap_or(""),
                row: e.row,
                detail: &e.detail,
            })
            .context("Failed to write processing log row")?;
        }

        if self.events.is_empty() {
            wtr.write_record([
                "run_id", "timestamp", "event", "bank", "period", "file", "sheet", "row", "detail",
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Write the log as UTF-8 CSV with a byte-order mark
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create processing log: {:?}", path))?;
        file.write_all(crate::master::UTF8_BOM)?;
        self.write_csv(file)
    }
}

impl Default for ProcessingLog {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA-256 hex digest of a file's bytes
pub fn file_digest<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// TESTS
// ============================================================================
