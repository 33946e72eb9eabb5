use anyhow::Result;
use filerecv::log::{TransferLog, TransferStatus};
use filerecv::logger::{Logger, MultiLogger};
use filerecv::net_async::{client, server};
use filerecv::protocol::MAX_BUFFER_SIZE;
use filerecv::protocol_core::{build_header, Header};
use filerecv::session::{SessionOutcome, SessionSummary};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

#[derive(Default)]
struct Recorder {
    mismatches: Mutex<Vec<(u64, u64)>>,
    done: Mutex<Vec<SessionSummary>>,
}

impl Logger for Recorder {
    fn size_mismatch(&self, _peer: &str, written: u64, declared: u64) {
        self.mismatches.lock().push((written, declared));
    }
    fn session_done(&self, summary: &SessionSummary) {
        self.done.lock().push(summary.clone());
    }
}

impl Recorder {
    async fn wait_for_sessions(&self, n: usize) -> Vec<SessionSummary> {
        for _ in 0..250u32 {
            if self.done.lock().len() >= n {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let done = self.done.lock().clone();
        assert!(done.len() >= n, "only {} of {} sessions finished", done.len(), n);
        done
    }
}

fn pattern(size: usize, seed: u8) -> Vec<u8> {
    let mut val = seed;
    (0..size)
        .map(|_| {
            val = val.wrapping_mul(31).wrapping_add(7);
            val
        })
        .collect()
}

/// Start a server on an ephemeral loopback port writing into `dir`.
async fn start_server(dir: &Path, logger: Arc<dyn Logger>) -> Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let dir = dir.to_path_buf();
    let task = tokio::spawn(async move {
        let _ = server::serve_listener(listener, &dir, logger).await;
    });
    Ok((addr, task))
}

async fn send_raw(addr: SocketAddr, declared: u64, name: &[u8], body: &[u8]) -> Result<()> {
    let mut stream = TcpStream::connect(addr).await?;
    client::write_preamble(&mut stream, declared, name).await?;
    stream.write_all(body).await?;
    stream.shutdown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn send_file_round_trip() -> Result<()> {
    let out = tempfile::tempdir()?;
    let src = tempfile::tempdir()?;
    let rec = Arc::new(Recorder::default());
    let (addr, server_task) = start_server(out.path(), rec.clone()).await?;

    let data = pattern(1_100_000, 3); // spans many 32KB reads
    let src_file = src.path().join("nested").join("report.bin");
    std::fs::create_dir_all(src_file.parent().unwrap())?;
    std::fs::write(&src_file, &data)?;

    let sent = client::send_file(&addr.to_string(), &src_file).await?;
    assert_eq!(sent, data.len() as u64);

    let done = rec.wait_for_sessions(1).await;
    assert_eq!(done[0].outcome, SessionOutcome::Completed);
    assert_eq!(done[0].declared_size, Some(data.len() as u64));
    assert_eq!(done[0].filename.as_deref(), Some(&*src_file.to_string_lossy()));
    assert!(rec.mismatches.lock().is_empty());

    // Only the basename is used; the sender's directories are not recreated
    assert_eq!(std::fs::read(out.path().join("report.bin"))?, data);
    assert!(!out.path().join("nested").exists());

    server_task.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn under_delivery_keeps_partial_file_and_reports_mismatch() -> Result<()> {
    let out = tempfile::tempdir()?;
    let rec = Arc::new(Recorder::default());
    let (addr, server_task) = start_server(out.path(), rec.clone()).await?;

    send_raw(addr, 100, b"/a/b/partial.dat", &[0xAB; 50]).await?;

    let done = rec.wait_for_sessions(1).await;
    assert_eq!(
        done[0].outcome,
        SessionOutcome::SizeMismatch {
            written: 50,
            declared: 100
        }
    );
    assert_eq!(*rec.mismatches.lock(), vec![(50, 100)]);
    assert_eq!(std::fs::read(out.path().join("partial.dat"))?, vec![0xAB; 50]);

    server_task.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn over_delivery_writes_everything_until_close() -> Result<()> {
    let out = tempfile::tempdir()?;
    let rec = Arc::new(Recorder::default());
    let (addr, server_task) = start_server(out.path(), rec.clone()).await?;

    let body = pattern(150, 9);
    send_raw(addr, 100, b"extra.dat", &body).await?;

    let done = rec.wait_for_sessions(1).await;
    assert_eq!(
        done[0].outcome,
        SessionOutcome::SizeMismatch {
            written: 150,
            declared: 100
        }
    );
    assert_eq!(std::fs::read(out.path().join("extra.dat"))?, body);

    server_task.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oversized_filename_is_rejected_and_server_keeps_accepting() -> Result<()> {
    let out = tempfile::tempdir()?;
    let rec = Arc::new(Recorder::default());
    let (addr, server_task) = start_server(out.path(), rec.clone()).await?;

    let mut stream = TcpStream::connect(addr).await?;
    let hdr = build_header(&Header {
        file_size: 4,
        filename_len: MAX_BUFFER_SIZE as u64 + 1,
    });
    stream.write_all(&hdr).await?;
    // The server stops reading after the header; these bytes are never consumed
    let _ = stream.write_all(b"never-a-filename").await;

    let done = rec.wait_for_sessions(1).await;
    match &done[0].outcome {
        SessionOutcome::Failed { kind, .. } => assert_eq!(*kind, "protocol"),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(std::fs::read_dir(out.path())?.count(), 0);
    drop(stream);

    // A failed session does not affect the listener
    client::send_bytes(&addr.to_string(), "after.txt", b"still serving").await?;
    rec.wait_for_sessions(2).await;
    assert_eq!(std::fs::read(out.path().join("after.txt"))?, b"still serving");

    server_task.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sessions_do_not_interleave() -> Result<()> {
    let out = tempfile::tempdir()?;
    let rec = Arc::new(Recorder::default());
    let (addr, server_task) = start_server(out.path(), rec.clone()).await?;

    let a = pattern(300_000, 1);
    let b = pattern(200_000, 2);

    let mut sa = TcpStream::connect(addr).await?;
    let mut sb = TcpStream::connect(addr).await?;
    client::write_preamble(&mut sa, a.len() as u64, b"x/a.bin").await?;
    client::write_preamble(&mut sb, b.len() as u64, b"y\\b.bin").await?;

    // Alternate chunks between the two connections
    let mut ca = a.chunks(10_000);
    let mut cb = b.chunks(10_000);
    loop {
        let na = ca.next();
        let nb = cb.next();
        if na.is_none() && nb.is_none() {
            break;
        }
        if let Some(c) = na {
            sa.write_all(c).await?;
        }
        if let Some(c) = nb {
            sb.write_all(c).await?;
        }
    }
    sa.shutdown().await?;
    sb.shutdown().await?;

    let done = rec.wait_for_sessions(2).await;
    assert!(done.iter().all(|s| s.outcome == SessionOutcome::Completed));
    assert_eq!(std::fs::read(out.path().join("a.bin"))?, a);
    assert_eq!(std::fs::read(out.path().join("b.bin"))?, b);

    server_task.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transfer_log_records_each_session() -> Result<()> {
    let out = tempfile::tempdir()?;
    let logs = tempfile::tempdir()?;
    let rec = Arc::new(Recorder::default());
    let transfer_log = Arc::new(TransferLog::new(&logs.path().join("transfers.jsonl")));
    let sinks: Vec<Arc<dyn Logger>> = vec![rec.clone(), transfer_log.clone()];
    let (addr, server_task) = start_server(out.path(), Arc::new(MultiLogger::new(sinks))).await?;

    client::send_bytes(&addr.to_string(), "ok.txt", b"hello").await?;
    rec.wait_for_sessions(1).await;
    send_raw(addr, 10, b"short.txt", b"abc").await?;
    rec.wait_for_sessions(2).await;

    let mut entries = transfer_log.read_log()?;
    assert_eq!(entries.len(), 2);
    entries.sort_by_key(|e| e.bytes_written);
    assert_eq!(entries[0].status, TransferStatus::SizeMismatch);
    assert_eq!(entries[0].declared_size, Some(10));
    assert_eq!(entries[1].status, TransferStatus::Completed);
    assert_eq!(entries[1].filename.as_deref(), Some("ok.txt"));
    assert_eq!(
        entries[1].destination.as_deref(),
        Some(out.path().join("ok.txt").as_path())
    );
    assert_ne!(entries[0].session_id, entries[1].session_id);

    server_task.abort();
    Ok(())
}

#[tokio::test]
async fn bind_failure_is_an_error() -> Result<()> {
    let out = tempfile::tempdir()?;
    let taken = TcpListener::bind("127.0.0.1:0").await?;
    let addr = taken.local_addr()?.to_string();

    let res = server::serve(&addr, out.path(), Arc::new(Recorder::default())).await;
    assert!(res.is_err());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_output_dir_fails_session_without_creating_it() -> Result<()> {
    let out = tempfile::tempdir()?;
    let missing = out.path().join("missing");
    let rec = Arc::new(Recorder::default());
    let (addr, server_task) = start_server(&missing, rec.clone()).await?;

    // The server may hang up before the body is flushed, so the send result is not checked
    let _ = client::send_bytes(&addr.to_string(), "f.txt", b"data").await;

    let done = rec.wait_for_sessions(1).await;
    assert!(matches!(done[0].outcome, SessionOutcome::Failed { kind: "io", .. }));
    assert!(!missing.exists());

    server_task.abort();
    Ok(())
}
