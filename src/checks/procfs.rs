//! Small helpers for reading kernel state out of /proc

use std::io;
use std::path::Path;

/// Read a sysctl-style value, trimmed of whitespace
pub fn read_sysctl(path: impl AsRef<Path>) -> io::Result<String> {
    let data = std::fs::read_to_string(path)?;
    Ok(data.trim().to_string())
}
