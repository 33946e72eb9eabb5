use crate::session::{SessionOutcome, SessionSummary};
use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Event sink for the receive daemon. Every method has an empty default so
/// sinks only implement what they record.
pub trait Logger: Send + Sync {
    fn listening(&self, _bind: &str, _dir: &Path) {}
    fn session_start(&self, _peer: &str) {}
    fn file_open(&self, _peer: &str, _dest: &Path, _name: &str) {}
    fn size_mismatch(&self, _peer: &str, _written: u64, _declared: u64) {}
    fn error(&self, _context: &str, _peer: &str, _msg: &str) {}
    fn session_done(&self, _summary: &SessionSummary) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

/// Human-readable progress on stdout, problems on stderr.
pub struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn listening(&self, bind: &str, dir: &Path) {
        println!("Auto receive files and save them in {}", dir.display());
        println!("Listening on {}", bind);
    }
    fn session_start(&self, peer: &str) {
        println!("client: {}", peer);
    }
    fn file_open(&self, peer: &str, dest: &Path, name: &str) {
        let base = dest.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        println!("[{}] Open file: {} ({})", peer, base, name);
    }
    fn size_mismatch(&self, peer: &str, written: u64, declared: u64) {
        eprintln!("[{}] Filesize not matched! {}/{}", peer, written, declared);
    }
    fn error(&self, context: &str, peer: &str, msg: &str) {
        eprintln!("[{}] {}: {}", peer, context, msg);
    }
    fn session_done(&self, s: &SessionSummary) {
        println!(
            "[{}] cost time: {:.3} s  bytes written: {} bytes\nspeed: {:.2} MB/s\n",
            s.peer,
            s.elapsed.as_secs_f64(),
            s.bytes_written,
            s.throughput_mib_s()
        );
    }
}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    /// Open `path` for appending. The parent directory must already exist.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file {}", path.display()))?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        let mut f = self.file.lock();
        let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
    }
}

impl Logger for TextLogger {
    fn listening(&self, bind: &str, dir: &Path) {
        self.line(&format!("LISTEN bind={} dir={}", bind, dir.display()));
    }
    fn session_start(&self, peer: &str) {
        self.line(&format!("ACCEPT peer={}", peer));
    }
    fn file_open(&self, peer: &str, dest: &Path, name: &str) {
        self.line(&format!("OPEN peer={} dst={} name={}", peer, dest.display(), name));
    }
    fn size_mismatch(&self, peer: &str, written: u64, declared: u64) {
        self.line(&format!(
            "MISMATCH peer={} written={} declared={}",
            peer, written, declared
        ));
    }
    fn error(&self, context: &str, peer: &str, msg: &str) {
        self.line(&format!("ERROR ctx={} peer={} msg={}", context, peer, msg));
    }
    fn session_done(&self, s: &SessionSummary) {
        let status = match &s.outcome {
            SessionOutcome::Completed => "ok",
            SessionOutcome::SizeMismatch { .. } => "mismatch",
            SessionOutcome::Failed { kind, .. } => *kind,
        };
        self.line(&format!(
            "DONE id={} peer={} status={} bytes={} seconds={:.3} mibps={:.2}",
            s.id,
            s.peer,
            status,
            s.bytes_written,
            s.elapsed.as_secs_f64(),
            s.throughput_mib_s()
        ));
    }
}

/// Forwards every event to each inner sink in order.
pub struct MultiLogger {
    sinks: Vec<Arc<dyn Logger>>,
}

impl MultiLogger {
    pub fn new(sinks: Vec<Arc<dyn Logger>>) -> Self {
        Self { sinks }
    }
}

impl Logger for MultiLogger {
    fn listening(&self, bind: &str, dir: &Path) {
        self.sinks.iter().for_each(|l| l.listening(bind, dir));
    }
    fn session_start(&self, peer: &str) {
        self.sinks.iter().for_each(|l| l.session_start(peer));
    }
    fn file_open(&self, peer: &str, dest: &Path, name: &str) {
        self.sinks.iter().for_each(|l| l.file_open(peer, dest, name));
    }
    fn size_mismatch(&self, peer: &str, written: u64, declared: u64) {
        self.sinks
            .iter()
            .for_each(|l| l.size_mismatch(peer, written, declared));
    }
    fn error(&self, context: &str, peer: &str, msg: &str) {
        self.sinks.iter().for_each(|l| l.error(context, peer, msg));
    }
    fn session_done(&self, summary: &SessionSummary) {
        self.sinks.iter().for_each(|l| l.session_done(summary));
    }
}
