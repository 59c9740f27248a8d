use crate::buffer::{self, Metadata};
use crate::error::{Error, Result};
use crate::format::Encoding;
use crate::fps::FpsCounter;
use crate::source::{Frame, FrameSource};
use crate::timestamp::Timestamp;

/// Number of frames in one cycle of the pattern
pub const DEFAULT_PATTERN_FRAMES: usize = 30;

/// Synthetic frames for running without a camera
///
/// Frame `i` of `n` shows a rectangle growing from the top left corner to `i/n` of the
/// image, brightening over the cycle, while the area diagonally opposite fades. All frames
/// are rendered up front into one allocation and handed out in a loop.
#[derive(Debug)]
pub struct TestPattern {
    encoding: Encoding,
    width: u32,
    height: u32,
    frame_size: usize,
    nframes: usize,
    frames: Vec<u8>,
    current: usize,
    sequence: u32,
    fps: FpsCounter,
}

impl TestPattern {
    pub fn new(encoding: Encoding, width: u32, height: u32) -> Result<Self> {
        Self::with_frames(encoding, width, height, DEFAULT_PATTERN_FRAMES)
    }

    pub fn with_frames(encoding: Encoding, width: u32, height: u32, nframes: usize) -> Result<Self> {
        let nframes = nframes.max(1);
        let frame_size = encoding.bytes_per_frame(width, height);
        let total = frame_size
            .checked_mul(nframes)
            .ok_or(Error::Allocation { size: usize::MAX })?;

        let mut frames = Vec::new();
        frames
            .try_reserve_exact(total)
            .map_err(|_| Error::Allocation { size: total })?;
        frames.resize(total, 0);

        let (w, h) = (width as usize, height as usize);
        for (i, frame) in frames.chunks_exact_mut(frame_size.max(1)).enumerate() {
            match encoding {
                Encoding::Luma => luma(i, nframes, w, h, frame),
                Encoding::Yuv420 => yuv420(i, nframes, w, h, frame),
                Encoding::Yuv422 => yuv422(i, nframes, w, h, frame),
                Encoding::Rgb => rgb(i, nframes, w, h, frame),
            }
        }
        log::debug!(
            "{} test pattern: {} frames of {}x{}",
            encoding,
            nframes,
            width,
            height
        );

        Ok(TestPattern {
            encoding,
            width,
            height,
            frame_size,
            nframes,
            frames,
            current: 0,
            sequence: 0,
            fps: FpsCounter::new(),
        })
    }

    /// Number of frames before the pattern repeats
    pub fn len(&self) -> usize {
        self.nframes
    }

    pub fn is_empty(&self) -> bool {
        self.nframes == 0
    }
}

impl FrameSource for TestPattern {
    fn next_frame(&mut self) -> Result<Option<Frame<'_>>> {
        let index = self.current;
        self.current = (self.current + 1) % self.nframes;

        let payload = self.encoding.payload_size(self.width, self.height);
        let start = index * self.frame_size;
        let data = &self.frames[start..start + payload];

        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        self.fps.record_now();

        Ok(Some(Frame {
            data,
            index,
            meta: Metadata::new(
                payload as u32,
                sequence,
                Timestamp::default(),
                buffer::Flags::DONE,
            ),
        }))
    }

    fn encoding(&self) -> Encoding {
        self.encoding
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fps(&self) -> f32 {
        self.fps.fps()
    }
}

/// Extent and intensity of frame `i` of `n`
fn extent(i: usize, n: usize, width: usize, height: usize) -> (usize, usize, u8) {
    let level = (255 * i / n) as u8;
    (i * width / n, i * height / n, level)
}

fn luma(i: usize, n: usize, width: usize, height: usize, frame: &mut [u8]) {
    let (cols, rows, level) = extent(i, n, width, height);
    let plane = &mut frame[..width * height];
    plane.fill(0);
    for row in plane.chunks_exact_mut(width.max(1)).take(rows) {
        row[..cols].fill(level);
    }
}

fn yuv420(i: usize, n: usize, width: usize, height: usize, frame: &mut [u8]) {
    luma(i, n, width, height, frame);

    let quarter = width * height / 4;
    let chroma = &mut frame[width * height..];
    chroma[..quarter].fill(75);
    chroma[quarter..2 * quarter].fill(20);
}

fn clamp(v: f32) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

/// BT.601 studio range conversion of one pixel
fn rgb_to_yuv(red: u8, green: u8, blue: u8) -> (u8, u8, u8) {
    let (r, g, b) = (red as f32, green as f32, blue as f32);
    let y = 0.257 * r + 0.504 * g + 0.098 * b + 16.0;
    let u = -0.148 * r - 0.291 * g + 0.439 * b + 128.0;
    let v = 0.439 * r - 0.368 * g - 0.071 * b + 128.0;
    (clamp(y), clamp(u), clamp(v))
}

fn yuv422(i: usize, n: usize, width: usize, height: usize, frame: &mut [u8]) {
    let (cols, rows, level) = extent(i, n, width, height);
    let pairs = width / 2;
    let frame = &mut frame[..width * height * 2];

    for px in frame.chunks_exact_mut(4) {
        px.copy_from_slice(&[16, 128, 16, 128]);
    }

    let (y, u, v) = rgb_to_yuv(level, 0, 0);
    let grow = [y, u, y, v];
    let (y, u, v) = rgb_to_yuv(0, 0, 255 - level);
    let fade = [y, u, y, v];

    for (r, row) in frame.chunks_exact_mut(width * 2).enumerate() {
        let (src, range) = if r < rows {
            (&grow, 0..cols / 2)
        } else {
            (&fade, cols / 2..pairs)
        };
        for pair in range {
            row[4 * pair..4 * pair + 4].copy_from_slice(src);
        }
    }
}

fn rgb(i: usize, n: usize, width: usize, height: usize, frame: &mut [u8]) {
    let (cols, rows, level) = extent(i, n, width, height);
    let frame = &mut frame[..width * height * 3];
    frame.fill(0);

    for (r, row) in frame.chunks_exact_mut(width * 3).enumerate() {
        let (px, range) = if r < rows {
            ([level, 0, 0], 0..cols)
        } else {
            ([0, 0, 255 - level], cols..width)
        };
        for c in range {
            row[3 * c..3 * c + 3].copy_from_slice(&px);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grab(src: &mut TestPattern) -> (usize, Vec<u8>) {
        let frame = src.next_frame().unwrap().unwrap();
        (frame.index, frame.data.to_vec())
    }

    #[test]
    fn cycle_wraps() {
        let mut src = TestPattern::with_frames(Encoding::Luma, 32, 24, 4).unwrap();
        let first: Vec<_> = (0..3).map(|_| grab(&mut src)).collect();
        // one full cycle later the same frames come around again
        grab(&mut src);
        let again: Vec<_> = (0..3).map(|_| grab(&mut src)).collect();
        assert_eq!(first, again);
        assert_eq!(first[1].0, 1);
    }

    #[test]
    fn luma_rectangle_grows() {
        let mut src = TestPattern::with_frames(Encoding::Luma, 10, 10, 2).unwrap();
        let (_, first) = grab(&mut src);
        assert!(first.iter().all(|&b| b == 0));

        let (_, second) = grab(&mut src);
        // frame 1 of 2 covers the top left 5x5 at half intensity
        assert_eq!(second[0], 127);
        assert_eq!(second[4], 127);
        assert_eq!(second[5], 0);
        assert_eq!(second[5 * 10], 0);
    }

    #[test]
    fn yuv420_payload_is_shorter_than_the_slot() {
        let mut src = TestPattern::new(Encoding::Yuv420, 320, 240).unwrap();
        assert_eq!(src.len(), DEFAULT_PATTERN_FRAMES);
        let (_, data) = grab(&mut src);
        assert_eq!(data.len(), 115200);
        assert_eq!(data[76800], 75);
        assert_eq!(data[76800 + 19200], 20);
    }

    #[test]
    fn yuv422_background_is_black() {
        let mut src = TestPattern::with_frames(Encoding::Yuv422, 8, 2, 2).unwrap();
        let (_, first) = grab(&mut src);
        // frame 0: nothing grown, the whole image is the fading blue area
        let (y, u, _) = rgb_to_yuv(0, 0, 255);
        assert_eq!(&first[..2], &[y, u]);
        assert_eq!(src.dimensions(), (8, 2));
    }

    #[test]
    fn rgb_black_converts_to_studio_black() {
        assert_eq!(rgb_to_yuv(0, 0, 0), (16, 128, 128));
    }
}
