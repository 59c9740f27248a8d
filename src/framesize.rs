use std::convert::TryFrom;
use std::fmt;

use crate::format::FourCC;
use crate::v4l2_sys::*;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Frame size as returned by [`crate::v4l2::vidioc::VIDIOC_ENUM_FRAMESIZES`]
pub struct FrameSize {
    pub index: u32,
    pub fourcc: FourCC,
    pub size: FrameSizeEnum,
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.size.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSizeEnum {
    Discrete(Discrete),
    Stepwise(Stepwise),
}

impl FrameSizeEnum {
    /// Whether a frame of the given size can be captured
    pub fn fits(&self, width: u32, height: u32) -> bool {
        match self {
            Self::Discrete(d) => d.width == width && d.height == height,
            Self::Stepwise(s) => {
                let on_step = |v: u32, min: u32, step: u32| step == 0 || (v - min) % step == 0;
                (s.min_width..=s.max_width).contains(&width)
                    && (s.min_height..=s.max_height).contains(&height)
                    && on_step(width, s.min_width, s.step_width)
                    && on_step(height, s.min_height, s.step_height)
            }
        }
    }
}

impl fmt::Display for FrameSizeEnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameSizeEnum::Discrete(val) => write!(f, "Discrete({})", val),
            FrameSizeEnum::Stepwise(val) => write!(f, "Stepwise({})", val),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discrete {
    /// Width of the frame (in pixels).
    pub width: u32,
    /// Height of the frame (in pixels).
    pub height: u32,
}

impl fmt::Display for Discrete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stepwise {
    pub min_width: u32,
    pub max_width: u32,
    pub step_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    pub step_height: u32,
}

impl fmt::Display for Stepwise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} - {}x{} with step {}/{}",
            self.min_width,
            self.min_height,
            self.max_width,
            self.max_height,
            self.step_width,
            self.step_height,
        )
    }
}

impl TryFrom<v4l2_frmsizeenum> for FrameSize {
    type Error = String;

    fn try_from(desc: v4l2_frmsizeenum) -> Result<Self, Self::Error> {
        // Unsafe because of access to union __bindgen_anon_1, selected by type_
        let size = unsafe {
            match desc.type_ {
                v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_DISCRETE => FrameSizeEnum::Discrete(Discrete {
                    width: desc.__bindgen_anon_1.discrete.width,
                    height: desc.__bindgen_anon_1.discrete.height,
                }),
                v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_STEPWISE
                | v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_CONTINUOUS => {
                    let s = desc.__bindgen_anon_1.stepwise;
                    FrameSizeEnum::Stepwise(Stepwise {
                        min_width: s.min_width,
                        max_width: s.max_width,
                        step_width: s.step_width,
                        min_height: s.min_height,
                        max_height: s.max_height,
                        step_height: s.step_height,
                    })
                }
                typ => return Err(format!("Unknown frame size type: {}", typ)),
            }
        };

        Ok(FrameSize {
            index: desc.index,
            fourcc: FourCC::from(desc.pixel_format),
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepwise_fits_on_grid() {
        let size = FrameSizeEnum::Stepwise(Stepwise {
            min_width: 160,
            max_width: 1280,
            step_width: 16,
            min_height: 120,
            max_height: 720,
            step_height: 8,
        });
        assert!(size.fits(320, 240));
        assert!(!size.fits(321, 240));
        assert!(!size.fits(1920, 1080));

        let discrete = FrameSizeEnum::Discrete(Discrete {
            width: 640,
            height: 480,
        });
        assert!(discrete.fits(640, 480));
        assert!(!discrete.fits(320, 240));
    }

    #[test]
    fn converts_enumerated_sizes() {
        let mut raw: v4l2_frmsizeenum = unsafe { std::mem::zeroed() };
        raw.index = 1;
        raw.pixel_format = u32::from_le_bytes(*b"YUYV");
        raw.type_ = v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_DISCRETE;
        raw.__bindgen_anon_1.discrete = v4l2_frmsize_discrete {
            width: 640,
            height: 480,
        };

        let size = FrameSize::try_from(raw).unwrap();
        assert_eq!(size.index, 1);
        assert_eq!(size.fourcc, FourCC::from(raw.pixel_format));
        assert!(size.size.fits(640, 480));

        raw.type_ = v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_STEPWISE;
        raw.__bindgen_anon_1.stepwise = v4l2_frmsize_stepwise {
            min_width: 160,
            max_width: 1280,
            step_width: 16,
            min_height: 120,
            max_height: 720,
            step_height: 8,
        };
        let size = FrameSize::try_from(raw).unwrap();
        assert!(matches!(size.size, FrameSizeEnum::Stepwise(s) if s.max_width == 1280));
    }
}
