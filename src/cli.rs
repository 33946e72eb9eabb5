//! Shared CLI helpers and small reusable Clap fragments

use crate::protocol::DEFAULT_PORT;
use clap::Parser;
use std::path::PathBuf;

/// Receive daemon options. Unset flags fall back to the config file, then to
/// built-in defaults (bind 0.0.0.0:1997, current directory).
#[derive(Clone, Debug, Default, Parser)]
#[command(author, version, about = "Auto receive files and save them in a directory")]
pub struct DaemonOpts {
    /// Bind address (host:port) [default: 0.0.0.0:1997]
    #[arg(long)]
    pub bind: Option<String>,

    /// Directory received files are written to [default: .]
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Append timestamped event lines to this file (its directory must exist)
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Append one JSON line per finished transfer to this file
    #[arg(long = "transfer-log")]
    pub transfer_log: Option<PathBuf>,
}

/// Options for the bundled sender
#[derive(Clone, Debug, Parser)]
#[command(author, version, about = "Send one file to a filerecv daemon")]
pub struct SendOpts {
    /// Receiver address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:1997")]
    pub target: String,

    /// File to send
    pub file: PathBuf,
}

impl SendOpts {
    /// Target address with the default port filled in when none was given.
    pub fn target_addr(&self) -> String {
        if self.target.rsplit_once(':').is_some_and(|(_, p)| p.parse::<u16>().is_ok()) {
            self.target.clone()
        } else {
            format!("{}:{}", self.target, DEFAULT_PORT)
        }
    }
}
