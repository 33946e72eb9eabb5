use crate::logger::Logger;
use crate::session::{SessionOutcome, SessionSummary};
use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Completed,
    SizeMismatch,
    Failed,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TransferLogEntry {
    pub timestamp: String,
    pub session_id: Uuid,
    pub peer: String,
    pub filename: Option<String>,
    pub destination: Option<PathBuf>,
    pub status: TransferStatus,
    pub declared_size: Option<u64>,
    pub bytes_written: u64,
    pub elapsed_secs: f64,
    pub mib_per_sec: f64,
    pub error: Option<String>,
}

impl From<&SessionSummary> for TransferLogEntry {
    fn from(s: &SessionSummary) -> Self {
        let (status, error) = match &s.outcome {
            SessionOutcome::Completed => (TransferStatus::Completed, None),
            SessionOutcome::SizeMismatch { .. } => (TransferStatus::SizeMismatch, None),
            SessionOutcome::Failed { kind, stage, message } => (
                TransferStatus::Failed,
                Some(format!("{} ({} stage): {}", kind, stage, message)),
            ),
        };
        TransferLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            session_id: s.id,
            peer: s.peer.clone(),
            filename: s.filename.clone(),
            destination: s.destination.clone(),
            status,
            declared_size: s.declared_size,
            bytes_written: s.bytes_written,
            elapsed_secs: s.elapsed.as_secs_f64(),
            mib_per_sec: s.throughput_mib_s(),
            error,
        }
    }
}

/// Append-only JSONL record of finished sessions, one line each.
pub struct TransferLog {
    log_file_path: PathBuf,
    // Serializes appends from concurrent sessions
    write_lock: Mutex<()>,
}

impl TransferLog {
    pub fn new(path: &Path) -> Self {
        TransferLog {
            log_file_path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.log_file_path
    }

    pub fn add_entry(&self, entry: TransferLogEntry) -> Result<()> {
        let _guard = self.write_lock.lock();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)
            .context("Failed to open transfer log file")?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &entry)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_log(&self) -> Result<Vec<TransferLogEntry>> {
        if !self.log_file_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.log_file_path)
            .context("Failed to open transfer log file for reading")?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: TransferLogEntry = serde_json::from_str(&line)?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

impl Logger for TransferLog {
    fn session_done(&self, summary: &SessionSummary) {
        if let Err(e) = self.add_entry(TransferLogEntry::from(summary)) {
            eprintln!(
                "transfer log {}: {:#}",
                self.log_file_path.display(),
                e
            );
        }
    }
}
