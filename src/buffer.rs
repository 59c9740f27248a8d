use bitflags::bitflags;
use std::fmt;

use crate::timestamp::Timestamp;

bitflags! {
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Default)]
    pub struct Flags: u32 {
        /// Buffer is mapped
        const MAPPED                = 0x0000_0001;
        /// Buffer is queued for processing
        const QUEUED                = 0x0000_0002;
        /// Buffer is ready
        const DONE                  = 0x0000_0004;
        /// Buffer is ready, but the data contained within is corrupted
        const ERROR                 = 0x0000_0040;
        /// Timecode field is valid
        const TIMECODE              = 0x0000_0100;
        /// Timestamp type
        const TIMESTAMP_MASK        = 0x0000_e000;
        const TIMESTAMP_MONOTONIC   = 0x0000_2000;
        const TIMESTAMP_COPY        = 0x0000_4000;
        /// Timestamp taken at start of exposure rather than end of frame
        const TSTAMP_SRC_SOE        = 0x0001_0000;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Flags {
        Flags::from_bits_truncate(flags)
    }
}

impl From<Flags> for u32 {
    fn from(flags: Flags) -> u32 {
        flags.bits()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Per-frame information reported by the driver on dequeue
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Number of bytes the driver filled in
    pub bytesused: u32,
    /// Sequence number, counting the frames
    pub sequence: u32,
    /// Time of capture (usually set by the driver)
    pub timestamp: Timestamp,
    /// Buffer flags
    pub flags: Flags,
}

impl Metadata {
    /// Returns a buffer metadata description
    ///
    /// # Example
    ///
    /// ```
    /// use glcam::{buffer, timestamp::Timestamp};
    ///
    /// let ts = Timestamp::new(0 /* sec */, 0 /* usec */);
    /// let meta = buffer::Metadata::new(76800, 0, ts, buffer::Flags::DONE);
    /// ```
    pub fn new(bytesused: u32, sequence: u32, timestamp: Timestamp, flags: Flags) -> Self {
        Metadata {
            bytesused,
            sequence,
            timestamp,
            flags,
        }
    }
}
