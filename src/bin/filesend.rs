use anyhow::{Context, Result};
use clap::Parser;
use std::time::Instant;

use filerecv::cli::SendOpts;
use filerecv::net_async::client;
use filerecv::session::mib_per_sec;

fn main() -> Result<()> {
    let opts = SendOpts::parse();
    let addr = opts.target_addr();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let start = Instant::now();
    let sent = rt.block_on(client::send_file(&addr, &opts.file))?;
    let elapsed = start.elapsed();

    println!(
        "Sent {} ({} bytes) to {} in {:.2}s, {:.2} MB/s",
        opts.file.display(),
        sent,
        addr,
        elapsed.as_secs_f64(),
        mib_per_sec(sent, elapsed)
    );
    Ok(())
}
