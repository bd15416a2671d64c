// Tue Jan 13 2026 - Alex

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Address 0x{0:X} is not loaded")]
    NotLoaded(u64),
    #[error("Out of bounds: address 0x{0:X} not in range")]
    OutOfBounds(u64),
    #[error("Binary parse error: {0}")]
    BinaryParseError(String),
    #[error("Unterminated string at 0x{0:X}")]
    UnterminatedString(u64),
    #[error("Invalid string encoding at 0x{0:X}")]
    InvalidString(u64),
    #[error("Not supported: {0}")]
    NotSupported(String),
}
