//! Per-connection receive session
//!
//! A session reads one file off one connection in three stages:
//! 1. a 16-byte header (file size, filename length)
//! 2. exactly `filename_len` filename bytes
//! 3. raw body bytes until the peer closes the connection
//!
//! Every stage uses the same 32KB buffer, so a session never holds more than
//! that in memory. A summary is reported on every exit path by a drop guard.
//!
//! File create and writes are plain blocking calls on the session task. Each
//! write is at most one buffer to a local file, small enough not to need
//! `spawn_blocking`.

use crate::error::SessionError;
use crate::logger::Logger;
use crate::protocol::{HEADER_LEN, MAX_BUFFER_SIZE};
use crate::protocol_core::{
    destination_path, display_name, parse_header, validate_filename_len, Header,
};
use std::fmt;
use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::Uuid;

/// Floor applied to elapsed time before computing throughput.
pub const MIN_ELAPSED: Duration = Duration::from_micros(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitHeader,
    AwaitFilename,
    ReceiveBody,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::AwaitHeader => "header",
            Stage::AwaitFilename => "filename",
            Stage::ReceiveBody => "body",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Peer closed after exactly the declared number of bytes
    Completed,
    /// Peer closed, but the byte count disagrees with the header
    SizeMismatch { written: u64, declared: u64 },
    /// Session ended on an error in `stage`
    Failed {
        kind: &'static str,
        stage: Stage,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: Uuid,
    pub peer: String,
    /// Filename exactly as sent (lossy UTF-8)
    pub filename: Option<String>,
    pub destination: Option<PathBuf>,
    pub declared_size: Option<u64>,
    pub bytes_written: u64,
    pub elapsed: Duration,
    pub outcome: SessionOutcome,
}

impl SessionSummary {
    /// Throughput in MiB/s over the whole session.
    pub fn throughput_mib_s(&self) -> f64 {
        mib_per_sec(self.bytes_written, self.elapsed)
    }
}

pub fn mib_per_sec(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.max(MIN_ELAPSED).as_secs_f64();
    bytes as f64 / (1024.0 * 1024.0) / secs
}

/// Accumulates session state and reports it exactly once, either through
/// `finish` or, if the session future is dropped early, from `Drop`.
struct SummaryGuard {
    id: Uuid,
    peer: String,
    started: Instant,
    stage: Stage,
    filename: Option<String>,
    destination: Option<PathBuf>,
    declared_size: Option<u64>,
    bytes_written: u64,
    outcome: SessionOutcome,
    logger: Arc<dyn Logger>,
    reported: bool,
}

impl SummaryGuard {
    fn new(id: Uuid, peer: String, logger: Arc<dyn Logger>) -> Self {
        Self {
            id,
            peer,
            started: Instant::now(),
            stage: Stage::AwaitHeader,
            filename: None,
            destination: None,
            declared_size: None,
            bytes_written: 0,
            outcome: SessionOutcome::Failed {
                kind: "aborted",
                stage: Stage::AwaitHeader,
                message: "session dropped before completion".to_string(),
            },
            logger,
            reported: false,
        }
    }

    fn summary(&self) -> SessionSummary {
        let mut outcome = self.outcome.clone();
        if let SessionOutcome::Failed { kind: "aborted", stage, .. } = &mut outcome {
            *stage = self.stage;
        }
        SessionSummary {
            id: self.id,
            peer: self.peer.clone(),
            filename: self.filename.clone(),
            destination: self.destination.clone(),
            declared_size: self.declared_size,
            bytes_written: self.bytes_written,
            elapsed: self.started.elapsed(),
            outcome,
        }
    }

    fn finish(mut self) -> SessionSummary {
        let summary = self.summary();
        self.logger.session_done(&summary);
        self.reported = true;
        summary
    }
}

impl Drop for SummaryGuard {
    fn drop(&mut self) {
        if !self.reported {
            let summary = self.summary();
            self.logger.session_done(&summary);
        }
    }
}

pub struct Session<S> {
    id: Uuid,
    stream: S,
    peer: String,
    dest_dir: PathBuf,
    logger: Arc<dyn Logger>,
    buffer: Box<[u8]>,
}

impl<S> Session<S>
where
    S: AsyncRead + Unpin,
{
    pub fn new(
        stream: S,
        peer: impl Into<String>,
        dest_dir: impl Into<PathBuf>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            stream,
            peer: peer.into(),
            dest_dir: dest_dir.into(),
            logger,
            buffer: vec![0u8; MAX_BUFFER_SIZE].into_boxed_slice(),
        }
    }

    /// Drive the session to completion. Errors end this session only; they
    /// are logged and folded into the returned summary.
    pub async fn run(mut self) -> SessionSummary {
        let mut guard = SummaryGuard::new(self.id, self.peer.clone(), Arc::clone(&self.logger));
        self.logger.session_start(&self.peer);

        if let Err(e) = self.receive(&mut guard).await {
            let message = e.to_string();
            self.logger.error(guard.stage.as_str(), &self.peer, &message);
            guard.outcome = SessionOutcome::Failed {
                kind: e.kind(),
                stage: guard.stage,
                message,
            };
        }
        guard.finish()
    }

    async fn receive(&mut self, guard: &mut SummaryGuard) -> Result<(), SessionError> {
        guard.stage = Stage::AwaitHeader;
        let header = self.read_header().await?;
        guard.declared_size = Some(header.file_size);

        guard.stage = Stage::AwaitFilename;
        let name_len = validate_filename_len(header.filename_len)?;
        self.stream.read_exact(&mut self.buffer[..name_len]).await?;
        let raw_name = &self.buffer[..name_len];
        let name = display_name(raw_name);
        let dest = destination_path(&self.dest_dir, raw_name);
        guard.filename = Some(name.clone());
        let dest = dest?;

        self.logger.file_open(&self.peer, &dest, &name);
        let file = File::create(&dest).map_err(|source| SessionError::Open {
            path: dest.clone(),
            source,
        })?;
        guard.destination = Some(dest.clone());

        guard.stage = Stage::ReceiveBody;
        let written = self.receive_body(file, &dest, guard).await?;

        guard.outcome = if written == header.file_size {
            SessionOutcome::Completed
        } else {
            self.logger.size_mismatch(&self.peer, written, header.file_size);
            SessionOutcome::SizeMismatch {
                written,
                declared: header.file_size,
            }
        };
        Ok(())
    }

    async fn read_header(&mut self) -> Result<Header, SessionError> {
        let mut hdr = [0u8; HEADER_LEN];
        self.stream.read_exact(&mut hdr).await?;
        Ok(parse_header(&hdr))
    }

    /// Copy body bytes to `file` until end of stream. Bytes past the declared
    /// size are written too; only the peer's close ends the body.
    async fn receive_body(
        &mut self,
        mut file: File,
        dest: &Path,
        guard: &mut SummaryGuard,
    ) -> Result<u64, SessionError> {
        loop {
            let n = self.stream.read(&mut self.buffer[..]).await?;
            if n == 0 {
                break;
            }
            // Count what the file accepted, not what the socket delivered
            let w = file
                .write(&self.buffer[..n])
                .map_err(|source| SessionError::Write {
                    path: dest.to_path_buf(),
                    source,
                })?;
            guard.bytes_written += w as u64;
        }
        Ok(guard.bytes_written)
    }
}
