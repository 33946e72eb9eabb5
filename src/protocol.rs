//! Shared protocol constants for the filerecv transport

// Default listening port of the receive daemon
pub const DEFAULT_PORT: u16 = 1997;

// Default bind address (all interfaces, default port)
pub const DEFAULT_BIND: &str = "0.0.0.0:1997";

// Header layout: FILE_SIZE (8, LE) | FILENAME_LEN (8, LE)
pub const HEADER_LEN: usize = 16;

// Receive buffer size (32KB). Shared by the filename and body stages, so it
// also caps the filename length a sender may announce.
pub const MAX_BUFFER_SIZE: usize = 32 * 1024;

// Path separators recognised when deriving the destination basename
pub const PATH_SEPARATORS: [u8; 2] = [b'/', b'\\'];

pub mod timeouts {
    // Pause before re-arming accept after a failed accept (ms)
    pub const ACCEPT_RETRY_MS: u64 = 100;
}
