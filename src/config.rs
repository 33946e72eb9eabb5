use crate::cli::DaemonOpts;
use crate::protocol::DEFAULT_BIND;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Daemon settings as read from a TOML file. Missing keys take defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    pub bind: String,
    pub dir: PathBuf,
    pub log_file: Option<PathBuf>,
    pub transfer_log: Option<PathBuf>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            dir: PathBuf::from("."),
            log_file: None,
            transfer_log: None,
        }
    }
}

impl ReceiverConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&data)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Config file (if any) overlaid with whatever the command line set.
    pub fn resolve(opts: &DaemonOpts) -> Result<Self> {
        let mut cfg = match opts.config {
            Some(ref p) => Self::load(p)?,
            None => Self::default(),
        };
        if let Some(ref bind) = opts.bind {
            cfg.bind = bind.clone();
        }
        if let Some(ref dir) = opts.dir {
            cfg.dir = dir.clone();
        }
        if opts.log_file.is_some() {
            cfg.log_file = opts.log_file.clone();
        }
        if opts.transfer_log.is_some() {
            cfg.transfer_log = opts.transfer_log.clone();
        }
        Ok(cfg)
    }
}
