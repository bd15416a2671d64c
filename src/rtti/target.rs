// Wed Jan 14 2026 - Alex

use crate::memory::{ImageFormat, ImageInfo, PointerWidth};
use crate::rtti::addressing::AddressingMode;
use crate::rtti::error::TargetError;
use serde::Serialize;
use std::fmt;

pub const MACHINE_I386: u32 = 0x014C;
pub const MACHINE_AMD64: u32 = 0x8664;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Compiler {
    Msvc,
    Gnu,
    Unknown,
}

impl fmt::Display for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Msvc => write!(f, "MSVC"),
            Self::Gnu => write!(f, "GNU"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetInfo {
    pub format: ImageFormat,
    pub compiler: Compiler,
    pub width: PointerWidth,
    pub machine: u32,
}

impl TargetInfo {
    pub fn detect(info: &ImageInfo) -> Self {
        let compiler = match info.format {
            ImageFormat::Pe if info.gnu_sections => Compiler::Gnu,
            ImageFormat::Pe => Compiler::Msvc,
            ImageFormat::Elf => Compiler::Gnu,
            ImageFormat::MachO => Compiler::Unknown,
        };
        Self {
            format: info.format,
            compiler,
            width: info.width,
            machine: info.machine,
        }
    }

    pub fn mode(&self) -> AddressingMode {
        AddressingMode::for_width(self.width)
    }

    /// Ok only for MSVC-built x86 and x64 PE images; anything else still
    /// scans on request, at degraded accuracy.
    pub fn check(&self) -> Result<(), TargetError> {
        if self.compiler != Compiler::Msvc {
            return Err(TargetError::UnsupportedCompiler(format!("{} {} image", self.compiler, self.format)));
        }
        match (self.machine, self.width) {
            (MACHINE_I386, PointerWidth::Bits32) | (MACHINE_AMD64, PointerWidth::Bits64) => Ok(()),
            _ => Err(TargetError::UnsupportedArchitecture(format!(
                "machine 0x{:X} ({})",
                self.machine, self.width
            ))),
        }
    }
}

impl fmt::Display for TargetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (machine 0x{:X}, {})", self.format, self.width, self.machine, self.compiler)
    }
}
