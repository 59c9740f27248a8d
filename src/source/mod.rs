use crate::buffer::Metadata;
use crate::error::Result;
use crate::format::Encoding;

pub mod capture;
pub use capture::Capture;

pub mod testpattern;
pub use testpattern::{TestPattern, DEFAULT_PATTERN_FRAMES};

/// A captured frame, borrowed from its source until the next frame is requested
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Image bytes
    pub data: &'a [u8],
    /// Buffer the frame lives in
    pub index: usize,
    pub meta: Metadata,
}

impl Frame<'_> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Anything that produces frames for display
pub trait FrameSource {
    /// Returns the next frame, or `None` if none arrived in time
    fn next_frame(&mut self) -> Result<Option<Frame<'_>>>;

    fn encoding(&self) -> Encoding;

    /// Width and height in pixels
    fn dimensions(&self) -> (u32, u32);

    /// Frame rate measured over the last complete window
    fn fps(&self) -> f32;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<Frame<'_>>> {
        (**self).next_frame()
    }

    fn encoding(&self) -> Encoding {
        (**self).encoding()
    }

    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }

    fn fps(&self) -> f32 {
        (**self).fps()
    }
}
