use std::{fmt, str::FromStr};

use crate::format::FourCC;

/// The pixel encodings a capture session can be configured for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// 8 bit greyscale (`GREY`)
    Luma,
    /// planar YUV 4:2:0 (`YU12`)
    Yuv420,
    /// packed YUV 4:2:2 (`YUYV`)
    Yuv422,
    /// packed RGB24 (`RGB3`)
    Rgb,
}

impl Encoding {
    pub const ALL: [Encoding; 4] = [
        Encoding::Luma,
        Encoding::Yuv420,
        Encoding::Yuv422,
        Encoding::Rgb,
    ];

    /// Returns the pixelformat code the driver knows this encoding by
    pub const fn fourcc(self) -> FourCC {
        match self {
            Encoding::Luma => FourCC::new(b"GREY"),
            Encoding::Yuv420 => FourCC::new(b"YU12"),
            Encoding::Yuv422 => FourCC::new(b"YUYV"),
            Encoding::Rgb => FourCC::new(b"RGB3"),
        }
    }

    pub fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        Self::ALL.into_iter().find(|enc| enc.fourcc() == fourcc)
    }

    /// Command line token, e.g. `YUV422`
    pub const fn token(self) -> &'static str {
        match self {
            Encoding::Luma => "LUMA",
            Encoding::Yuv420 => "YUV420",
            Encoding::Yuv422 => "YUV422",
            Encoding::Rgb => "RGB",
        }
    }

    /// Number of bytes allocated for one frame.
    ///
    /// YUV 4:2:0 reserves two bytes per pixel even though the payload only needs
    /// one and a half, see [`Encoding::payload_size`].
    pub const fn bytes_per_frame(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            Encoding::Luma => pixels,
            Encoding::Yuv420 | Encoding::Yuv422 => pixels * 2,
            Encoding::Rgb => pixels * 3,
        }
    }

    /// Number of bytes one frame of image data actually occupies.
    pub const fn payload_size(self, width: u32, height: u32) -> usize {
        match self {
            Encoding::Yuv420 => {
                let chroma = (width as usize / 2) * (height as usize / 2);
                width as usize * height as usize + 2 * chroma
            }
            _ => self.bytes_per_frame(width, height),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEncodingError(pub String);

impl fmt::Display for ParseEncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown encoding {:?}, expected one of LUMA, YUV420, YUV422, RGB",
            self.0
        )
    }
}

impl std::error::Error for ParseEncodingError {}

impl FromStr for Encoding {
    type Err = ParseEncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|enc| enc.token() == s)
            .ok_or_else(|| ParseEncodingError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_sizes_at_320x240() {
        assert_eq!(Encoding::Luma.bytes_per_frame(320, 240), 76800);
        assert_eq!(Encoding::Yuv420.bytes_per_frame(320, 240), 153600);
        assert_eq!(Encoding::Yuv420.payload_size(320, 240), 115200);
        assert_eq!(Encoding::Yuv422.bytes_per_frame(320, 240), 153600);
        assert_eq!(Encoding::Rgb.payload_size(320, 240), 230400);
    }

    #[test]
    fn tokens() {
        assert_eq!("YUV420".parse::<Encoding>(), Ok(Encoding::Yuv420));
        assert_eq!("RGB".parse::<Encoding>(), Ok(Encoding::Rgb));
        assert!("yuv422".parse::<Encoding>().is_err());
        for enc in Encoding::ALL {
            assert_eq!(enc.to_string().parse::<Encoding>(), Ok(enc));
        }
    }

    #[test]
    fn fourcc_lookup() {
        assert_eq!(
            Encoding::from_fourcc(FourCC::new(b"YUYV")),
            Some(Encoding::Yuv422)
        );
        assert_eq!(Encoding::from_fourcc(FourCC::new(b"MJPG")), None);
    }
}
