//! filerecv - auto receive files over TCP and save them in a directory

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use filerecv::cli::DaemonOpts;
use filerecv::config::ReceiverConfig;
use filerecv::log::TransferLog;
use filerecv::logger::{ConsoleLogger, Logger, MultiLogger, TextLogger};
use filerecv::net_async;

fn build_logger(cfg: &ReceiverConfig) -> Arc<dyn Logger> {
    let mut sinks: Vec<Arc<dyn Logger>> = vec![Arc::new(ConsoleLogger)];
    if let Some(ref p) = cfg.log_file {
        match TextLogger::new(p) {
            Ok(l) => sinks.push(Arc::new(l)),
            Err(e) => eprintln!("Warning: log file {} disabled: {}", p.display(), e),
        }
    }
    if let Some(ref p) = cfg.transfer_log {
        sinks.push(Arc::new(TransferLog::new(p)));
    }
    Arc::new(MultiLogger::new(sinks))
}

fn main() -> Result<()> {
    // Ctrl-C is the normal way to stop the daemon
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted by user. Exiting (Ctrl-C)...");
        std::process::exit(0);
    })
    .context("Error setting Ctrl-C handler")?;

    let opts = DaemonOpts::parse();
    let cfg = ReceiverConfig::resolve(&opts)?;

    if !cfg.dir.is_dir() {
        anyhow::bail!(
            "Error: output directory does not exist or is not a directory: {}",
            cfg.dir.display()
        );
    }
    let dest_dir = std::fs::canonicalize(&cfg.dir)
        .with_context(|| format!("Failed to canonicalize output path: {}", cfg.dir.display()))?;

    let logger = build_logger(&cfg);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    rt.block_on(net_async::server::serve(&cfg.bind, &dest_dir, logger))
}
