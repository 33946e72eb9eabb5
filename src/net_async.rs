//! Async (Tokio) transport for the receive daemon and its sender.
//!
//! The server side accepts connections forever and runs one [`Session`](crate::session::Session) per
//! connection on its own task. The client side streams a single file using
//! the same wire format.

use anyhow::{Context, Result};

pub mod server {
    use super::*;
    use crate::logger::Logger;
    use crate::protocol::timeouts::ACCEPT_RETRY_MS;
    use crate::session::Session;
    use std::future::Future;
    use std::io;
    use std::net::SocketAddr;
    use std::path::Path;
    use std::sync::Arc;
    use tokio::io::AsyncRead;
    use tokio::net::TcpListener;
    use tokio::time::{sleep, Duration};

    /// Bind `bind` and serve until the process ends. Only binding can fail.
    pub async fn serve(bind: &str, dest_dir: &Path, logger: Arc<dyn Logger>) -> Result<()> {
        let listener = TcpListener::bind(bind)
            .await
            .with_context(|| format!("bind {}", bind))?;
        serve_listener(listener, dest_dir, logger).await
    }

    /// Accept loop on an already bound listener. Sessions run independently;
    /// an accept error is logged and the loop carries on.
    pub async fn serve_listener(
        listener: TcpListener,
        dest_dir: &Path,
        logger: Arc<dyn Logger>,
    ) -> Result<()> {
        let local = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "?".to_string());
        logger.listening(&local, dest_dir);

        let listener = &listener;
        accept_loop(move || listener.accept(), dest_dir, logger).await
    }

    async fn accept_loop<A, F, S>(
        mut accept: A,
        dest_dir: &Path,
        logger: Arc<dyn Logger>,
    ) -> Result<()>
    where
        A: FnMut() -> F,
        F: Future<Output = io::Result<(S, SocketAddr)>>,
        S: AsyncRead + Unpin + Send + 'static,
    {
        loop {
            let (stream, peer) = match accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    logger.error("accept", "-", &e.to_string());
                    // Avoid spinning on persistent failures such as fd exhaustion
                    sleep(Duration::from_millis(ACCEPT_RETRY_MS)).await;
                    continue;
                }
            };
            let dest_dir = dest_dir.to_path_buf();
            let logger = Arc::clone(&logger);
            tokio::spawn(async move {
                Session::new(stream, peer.to_string(), dest_dir, logger)
                    .run()
                    .await;
            });
        }
    }

}

pub mod client {
    use super::*;
    use crate::protocol::MAX_BUFFER_SIZE;
    use crate::protocol_core::{build_header, Header};
    use std::path::Path;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
    use tokio::net::TcpStream;

    /// Write header and filename segments.
    pub async fn write_preamble<S>(stream: &mut S, file_size: u64, name: &[u8]) -> Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        let hdr = build_header(&Header {
            file_size,
            filename_len: name.len() as u64,
        });
        stream.write_all(&hdr).await?;
        if !name.is_empty() {
            stream.write_all(name).await?;
        }
        Ok(())
    }

    async fn copy_body<R, W>(src: &mut R, dst: &mut W) -> Result<u64>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; MAX_BUFFER_SIZE];
        let mut sent = 0u64;
        loop {
            let n = src.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            dst.write_all(&buf[..n]).await?;
            sent += n as u64;
        }
        Ok(sent)
    }

    /// Send the file at `path`. The path string is sent as given; the receiver
    /// keeps only its last component. Returns body bytes sent.
    pub async fn send_file(addr: &str, path: &Path) -> Result<u64> {
        let mut file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("open {}", path.display()))?;
        let file_size = file.metadata().await?.len();
        let name = path.to_string_lossy();

        let mut stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connect {}", addr))?;
        write_preamble(&mut stream, file_size, name.as_bytes()).await?;
        let sent = copy_body(&mut file, &mut stream)
            .await
            .with_context(|| format!("send {}", path.display()))?;
        // Closing the write half is the end-of-file signal
        stream.shutdown().await?;
        Ok(sent)
    }

    /// Send an in-memory payload under `name`.
    pub async fn send_bytes(addr: &str, name: &str, data: &[u8]) -> Result<()> {
        let mut stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connect {}", addr))?;
        write_preamble(&mut stream, data.len() as u64, name.as_bytes()).await?;
        stream.write_all(data).await?;
        stream.shutdown().await?;
        Ok(())
    }

}
