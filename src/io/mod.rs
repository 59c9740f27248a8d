use std::{fmt, str::FromStr};

use crate::memory::Memory;

pub mod negotiate;
pub mod pool;
pub mod stream;

/// Number of buffers requested from the driver for streaming I/O
pub const MAX_BUFFERS: u32 = 4;

/// Streaming needs one buffer being filled while another one is consumed
pub const MIN_BUFFERS: u32 = 2;

/// How frame data moves from the driver into the process
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IoMethod {
    /// read(2) into a single host buffer
    Read,
    /// driver buffers mapped into the process
    MemoryMapped,
    /// driver writes into host buffers handed to it in advance
    UserPointer,
}

impl IoMethod {
    /// Memory type to request buffers with, `None` for read(2) I/O
    pub const fn memory(self) -> Option<Memory> {
        match self {
            IoMethod::Read => None,
            IoMethod::MemoryMapped => Some(Memory::Mmap),
            IoMethod::UserPointer => Some(Memory::UserPtr),
        }
    }

    pub const fn is_streaming(self) -> bool {
        self.memory().is_some()
    }
}

impl fmt::Display for IoMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoMethod::Read => write!(f, "read"),
            IoMethod::MemoryMapped => write!(f, "mmap"),
            IoMethod::UserPointer => write!(f, "userptr"),
        }
    }
}

impl FromStr for IoMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(IoMethod::Read),
            "mmap" => Ok(IoMethod::MemoryMapped),
            "userptr" => Ok(IoMethod::UserPointer),
            _ => Err(format!(
                "unknown I/O method {:?}, expected one of read, mmap, userptr",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_tokens() {
        assert_eq!("mmap".parse(), Ok(IoMethod::MemoryMapped));
        assert_eq!("userptr".parse(), Ok(IoMethod::UserPointer));
        assert_eq!(IoMethod::Read.to_string(), "read");
        assert!("dmabuf".parse::<IoMethod>().is_err());
        assert!(!IoMethod::Read.is_streaming());
    }
}
