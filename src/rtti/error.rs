// Wed Jan 14 2026 - Alex

use thiserror::Error;

/// Raised before scanning when the image is not an MSVC-built x86/x64 PE.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("Unsupported compiler: {0}")]
    UnsupportedCompiler(String),
    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(String),
}
