//! filerecv library
//!
//! Receive daemon that saves one streamed file per TCP connection, plus the
//! matching sender.

pub mod cli;
pub mod config;
pub mod error;
pub mod log;
pub mod logger;
pub mod net_async;
pub mod protocol;
pub mod protocol_core;
pub mod session;
