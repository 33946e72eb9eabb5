//! Wire-format helpers shared by the receive session and the sender
//!
//! Everything here is pure: header encoding, filename length validation and
//! destination name derivation. Socket and file I/O live in `session` and
//! `net_async`.

use crate::error::SessionError;
use crate::protocol::{HEADER_LEN, MAX_BUFFER_SIZE, PATH_SEPARATORS};
use std::io;
use std::path::{Path, PathBuf};

/// Fixed-size record sent first on every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    /// Total bytes of file content that follow the filename
    pub file_size: u64,
    /// Byte length of the filename segment
    pub filename_len: u64,
}

/// Build header (16 bytes)
/// Format: FILE_SIZE (8) | FILENAME_LEN (8), both little-endian
pub fn build_header(header: &Header) -> [u8; HEADER_LEN] {
    let mut buf = [0u8; HEADER_LEN];
    buf[0..8].copy_from_slice(&header.file_size.to_le_bytes());
    buf[8..16].copy_from_slice(&header.filename_len.to_le_bytes());
    buf
}

/// Parse header. Any 16 bytes are a well-formed header; the filename length
/// is checked separately by [`validate_filename_len`].
pub fn parse_header(buf: &[u8; HEADER_LEN]) -> Header {
    let mut size = [0u8; 8];
    let mut name_len = [0u8; 8];
    size.copy_from_slice(&buf[0..8]);
    name_len.copy_from_slice(&buf[8..16]);
    Header {
        file_size: u64::from_le_bytes(size),
        filename_len: u64::from_le_bytes(name_len),
    }
}

/// Reject filename lengths that would not fit the receive buffer.
pub fn validate_filename_len(len: u64) -> Result<usize, SessionError> {
    if len > MAX_BUFFER_SIZE as u64 {
        return Err(SessionError::PathTooLong {
            len,
            max: MAX_BUFFER_SIZE,
        });
    }
    Ok(len as usize)
}

/// Return the bytes after the last `/` or `\`, or the whole input when there
/// is no separator.
pub fn basename(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|b| PATH_SEPARATORS.contains(b)) {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

#[cfg(unix)]
fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

/// Resolve the output path for a received filename: the basename joined onto
/// `dir`. Names that cannot be a regular file (empty, `.` or `..`) are
/// rejected the same way a failed open would be.
pub fn destination_path(dir: &Path, name: &[u8]) -> Result<PathBuf, SessionError> {
    let base = basename(name);
    let path = dir.join(bytes_to_path(base));
    if base.is_empty() || base == b"." || base == b".." {
        return Err(SessionError::Open {
            path,
            source: io::Error::new(io::ErrorKind::InvalidInput, "no file name after last separator"),
        });
    }
    Ok(path)
}

/// Lossy, printable form of a raw filename for log lines.
pub fn display_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}
