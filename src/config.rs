use std::path::PathBuf;
use std::time::Duration;

use crate::format::Encoding;
use crate::io::IoMethod;
use crate::source::capture::DEFAULT_TIMEOUT;

/// Display window size, independent of the captured image size
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum WindowPreset {
    /// Same size as the image
    #[default]
    ImageSize,
    /// 1280x720
    Hd720,
    /// 1920x1080
    Hd1080,
}

impl WindowPreset {
    /// Maps a `-D` index to a preset; unknown indices keep the image size.
    pub fn from_index(index: u32) -> Self {
        match index {
            1 => WindowPreset::Hd720,
            2 => WindowPreset::Hd1080,
            _ => WindowPreset::ImageSize,
        }
    }

    /// Window size for an image of the given size
    pub fn dimensions(self, image_width: u32, image_height: u32) -> (u32, u32) {
        match self {
            WindowPreset::ImageSize => (image_width, image_height),
            WindowPreset::Hd720 => (1280, 720),
            WindowPreset::Hd1080 => (1920, 1080),
        }
    }
}

/// Configuration for a capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// The camera device path
    pub device_path: PathBuf,
    /// Requested image width in pixels
    pub width: u32,
    /// Requested image height in pixels
    pub height: u32,
    /// The desired pixel encoding
    pub encoding: Encoding,
    /// Force an I/O method instead of picking the best one the device offers
    pub method: Option<IoMethod>,
    /// Synthesize frames instead of opening a device
    pub test_pattern: bool,
    pub window: WindowPreset,
    /// How long to wait for a frame per event loop tick
    pub timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from("/dev/video0"),
            width: 320,
            height: 240,
            encoding: Encoding::Yuv422,
            method: None,
            test_pattern: false,
            window: WindowPreset::ImageSize,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl CaptureConfig {
    /// Window size the renderer should open
    pub fn window_dimensions(&self) -> (u32, u32) {
        self.window.dimensions(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        assert_eq!(WindowPreset::from_index(1), WindowPreset::Hd720);
        assert_eq!(WindowPreset::from_index(7), WindowPreset::ImageSize);

        let config = CaptureConfig {
            window: WindowPreset::from_index(2),
            ..Default::default()
        };
        assert_eq!(config.window_dimensions(), (1920, 1080));
        assert_eq!(CaptureConfig::default().window_dimensions(), (320, 240));
    }
}
