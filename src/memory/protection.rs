// Tue Jan 13 2026 - Alex

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Protection {
    None = 0,
    Read = 1,
    Write = 2,
    Execute = 4,
    ReadWrite = 3,
    ReadExecute = 5,
    ReadWriteExecute = 7,
}

impl Protection {
    /// Builds from an `rwx` bit triple (r = 1, w = 2, x = 4).
    pub fn from_flags(flags: u32) -> Self {
        match flags & 7 {
            1 => Self::Read,
            2 => Self::Write,
            3 => Self::ReadWrite,
            4 => Self::Execute,
            5 => Self::ReadExecute,
            6 | 7 => Self::ReadWriteExecute,
            _ => Self::None,
        }
    }

    pub fn from_rwx(read: bool, write: bool, execute: bool) -> Self {
        let mut flags = 0;
        if read {
            flags |= 1;
        }
        if write {
            flags |= 2;
        }
        if execute {
            flags |= 4;
        }
        Self::from_flags(flags)
    }

    /// Mach-O `initprot` uses r = 1, w = 2, x = 4 as well.
    pub fn from_vm_prot(prot: u32) -> Self {
        Self::from_flags(prot)
    }

    pub fn can_read(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite | Self::ReadExecute | Self::ReadWriteExecute)
    }

    pub fn can_write(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite | Self::ReadWriteExecute)
    }

    pub fn can_execute(self) -> bool {
        matches!(self, Self::Execute | Self::ReadExecute | Self::ReadWriteExecute)
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "---"),
            Self::Read => write!(f, "r--"),
            Self::Write => write!(f, "-w-"),
            Self::Execute => write!(f, "--x"),
            Self::ReadWrite => write!(f, "rw-"),
            Self::ReadExecute => write!(f, "r-x"),
            Self::ReadWriteExecute => write!(f, "rwx"),
        }
    }
}
