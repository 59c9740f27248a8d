use bitflags::bitflags;
use std::fmt;

use crate::v4l2_sys::{v4l2_capability, V4L2_CAP_DEVICE_CAPS};

bitflags! {
    /// Device capability flags, the subset a capture session looks at
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Default)]
    pub struct Flags: u32 {
        const VIDEO_CAPTURE         = 0x0000_0001;
        const VIDEO_OUTPUT          = 0x0000_0002;
        const VIDEO_OVERLAY         = 0x0000_0004;
        const VIDEO_CAPTURE_MPLANE  = 0x0000_1000;
        const VIDEO_M2M             = 0x0000_8000;
        const TUNER                 = 0x0001_0000;
        const AUDIO                 = 0x0002_0000;
        const EXT_PIX_FORMAT        = 0x0020_0000;
        const READ_WRITE            = 0x0100_0000;
        const ASYNC_IO              = 0x0200_0000;
        const STREAMING             = 0x0400_0000;
        const DEVICE_CAPS           = 0x8000_0000;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Self {
        Self::from_bits_truncate(flags)
    }
}

impl From<Flags> for u32 {
    fn from(flags: Flags) -> Self {
        flags.bits()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Flags::VIDEO_CAPTURE, "Video Capture"),
            (Flags::VIDEO_CAPTURE_MPLANE, "Video Capture Multiplanar"),
            (Flags::VIDEO_OUTPUT, "Video Output"),
            (Flags::VIDEO_M2M, "Video Memory-to-Memory"),
            (Flags::VIDEO_OVERLAY, "Video Overlay"),
            (Flags::TUNER, "Tuner"),
            (Flags::AUDIO, "Audio"),
            (Flags::READ_WRITE, "Read/Write"),
            (Flags::ASYNC_IO, "Async I/O"),
            (Flags::STREAMING, "Streaming"),
            (Flags::EXT_PIX_FORMAT, "Extended Pix Format"),
            (Flags::DEVICE_CAPS, "Device Capabilities"),
        ];

        let mut prefix = "";
        for (flag, name) in names {
            if self.contains(flag) {
                write!(f, "{}{}", prefix, name)?;
                prefix = ", ";
            }
        }
        if prefix.is_empty() {
            write!(f, "none")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Device identification and capabilities as reported by `VIDIOC_QUERYCAP`
pub struct Capabilities {
    /// Driver name, e.g. uvc for usb video class devices
    pub driver: String,
    /// Card name
    pub card: String,
    /// Bus name, e.g. USB or PCI
    pub bus: String,
    /// Version number MAJOR.MINOR.PATCH
    pub version: (u8, u8, u8),

    /// Capability flags
    pub capabilities: Flags,
}

fn c_string(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

impl From<v4l2_capability> for Capabilities {
    fn from(cap: v4l2_capability) -> Self {
        // device_caps describes the opened node, capabilities the whole physical device
        let flags = if cap.capabilities & V4L2_CAP_DEVICE_CAPS != 0 {
            cap.device_caps
        } else {
            cap.capabilities
        };

        Capabilities {
            driver: c_string(&cap.driver),
            card: c_string(&cap.card),
            bus: c_string(&cap.bus_info),
            version: (
                ((cap.version >> 16) & 0xff) as u8,
                ((cap.version >> 8) & 0xff) as u8,
                (cap.version & 0xff) as u8,
            ),
            capabilities: Flags::from(flags),
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Driver      : {}", self.driver)?;
        writeln!(f, "Card        : {}", self.card)?;
        writeln!(f, "Bus         : {}", self.bus)?;
        writeln!(
            f,
            "Version     : {}.{}.{}",
            self.version.0, self.version.1, self.version.2
        )?;
        writeln!(f, "Capabilites : {}", self.capabilities)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn prefers_device_caps() {
        let mut raw: v4l2_capability = unsafe { mem::zeroed() };
        raw.driver[..3].copy_from_slice(b"uvc");
        raw.version = 0x0006_0102;
        raw.capabilities = 0x8520_0001;
        raw.device_caps = 0x0420_0001;

        let caps = Capabilities::from(raw);
        assert_eq!(caps.driver, "uvc");
        assert_eq!(caps.version, (6, 1, 2));
        assert!(caps.capabilities.contains(Flags::STREAMING));
        assert!(!caps.capabilities.contains(Flags::READ_WRITE));
        assert_eq!(
            caps.capabilities.to_string(),
            "Video Capture, Streaming, Extended Pix Format"
        );
    }
}
