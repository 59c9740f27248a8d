//! An in-process stand-in for a capture driver.
//!
//! [`SimDevice`] keeps the driver-side buffer queue the way the kernel does: buffers are
//! filled in the order they were queued, `VIDIOC_DQBUF` on an empty queue reports `EAGAIN`,
//! and `VIDIOC_STREAMOFF` takes every buffer back. Failures can be scripted per operation so
//! error paths of the session can be exercised without hardware.

use std::cell::Cell;
use std::collections::VecDeque;
use std::ops::Deref;
use std::rc::Rc;
use std::{io, time::Duration};

use crate::buffer::{self, Metadata};
use crate::capability::{self, Capabilities};
use crate::control::{self, MenuItem};
use crate::device::{Dequeued, Driver};
use crate::format::{description, Description, Encoding, Format, FourCC};
use crate::framesize::{Discrete, FrameSize, FrameSizeEnum};
use crate::memory::Memory;
use crate::timestamp::Timestamp;

/// Frame period the simulated clock advances by per filled buffer
const FRAME_PERIOD: Duration = Duration::from_micros(33_333);

/// Mapped memory of a simulated buffer
///
/// Each buffer is filled with its own index so frames can be told apart.
#[derive(Debug)]
pub struct SimMapping {
    data: Vec<u8>,
    live: Rc<Cell<usize>>,
}

impl Deref for SimMapping {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for SimMapping {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

/// Outcome of one simulated read(2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimRead {
    /// Fill the whole buffer
    Full,
    /// Transfer only this many bytes
    Short(usize),
    /// Report end of file
    Eof,
    /// Fail with this errno
    Fail(i32),
}

/// Driver calls that touch the buffer queue, in the order they were made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    Queue(u32),
    Dequeue { index: u32, sequence: u32 },
    StreamOn,
    StreamOff,
}

#[derive(Debug)]
pub struct SimDevice {
    caps: Capabilities,
    controls: Option<Vec<control::Description>>,
    formats: Vec<Description>,
    framesizes: Vec<FrameSize>,
    format: Format,

    max_buffers: u32,
    granted: u32,
    memory: Option<Memory>,
    adjust_size: Option<(u32, u32)>,
    reject_format: bool,
    reject_reqbufs: Option<Memory>,
    map_failure: Option<u32>,
    streamon_error: Option<i32>,
    queue_failure: Option<(u32, i32)>,
    padding: u32,
    dequeue_errors: VecDeque<i32>,
    reads: VecDeque<SimRead>,
    timeouts: u32,

    incoming: VecDeque<(u32, usize)>,
    streaming: bool,
    sequence: u32,
    crop_resets: u32,
    live: Rc<Cell<usize>>,
    events: Vec<SimEvent>,
}

fn describe(index: u32, encoding: Encoding) -> Description {
    Description {
        index,
        flags: description::Flags::empty(),
        description: format!("{} (simulated)", encoding),
        fourcc: encoding.fourcc(),
    }
}

/// Brightness and power line frequency, as a typical UVC camera reports them
fn webcam_controls() -> Vec<control::Description> {
    let brightness = control::Description {
        id: 0x0098_0900,
        typ: control::Type::Integer,
        name: "Brightness".to_string(),
        minimum: 0,
        maximum: 255,
        step: 1,
        default: 128,
        flags: control::Flags::SLIDER,
        items: Vec::new(),
    };
    let power_line = control::Description {
        id: 0x0098_0918,
        typ: control::Type::Menu,
        name: "Power Line Frequency".to_string(),
        minimum: 0,
        maximum: 2,
        step: 1,
        default: 1,
        flags: control::Flags::empty(),
        items: ["Disabled", "50 Hz", "60 Hz"]
            .iter()
            .enumerate()
            .map(|(i, name)| (i as u32, MenuItem::Name(name.to_string())))
            .collect(),
    };
    vec![brightness, power_line]
}

impl SimDevice {
    /// A device supporting the given capabilities and encodings
    ///
    /// Every encoding advertises 320x240 and 640x480 frame sizes. The driver grants up to
    /// four buffers.
    pub fn new(flags: capability::Flags, encodings: &[Encoding]) -> Self {
        let formats: Vec<Description> = encodings
            .iter()
            .enumerate()
            .map(|(i, enc)| describe(i as u32, *enc))
            .collect();
        let framesizes = encodings
            .iter()
            .flat_map(|enc| {
                [(320, 240), (640, 480)]
                    .into_iter()
                    .enumerate()
                    .map(move |(i, (width, height))| FrameSize {
                        index: i as u32,
                        fourcc: enc.fourcc(),
                        size: FrameSizeEnum::Discrete(Discrete { width, height }),
                    })
            })
            .collect();
        let first = encodings.first().copied().unwrap_or(Encoding::Yuv422);

        SimDevice {
            caps: Capabilities {
                driver: "sim".to_string(),
                card: "Simulated Camera".to_string(),
                bus: "platform:sim".to_string(),
                version: (1, 0, 0),
                capabilities: flags | capability::Flags::VIDEO_CAPTURE,
            },
            controls: Some(webcam_controls()),
            formats,
            framesizes,
            format: sized(Format::for_encoding(first, 320, 240), first),
            max_buffers: 4,
            granted: 0,
            memory: None,
            adjust_size: None,
            reject_format: false,
            reject_reqbufs: None,
            map_failure: None,
            streamon_error: None,
            queue_failure: None,
            padding: 0,
            dequeue_errors: VecDeque::new(),
            reads: VecDeque::new(),
            timeouts: 0,
            incoming: VecDeque::new(),
            streaming: false,
            sequence: 0,
            crop_resets: 0,
            live: Rc::new(Cell::new(0)),
            events: Vec::new(),
        }
    }

    /// A streaming and read/write capable webcam offering all four encodings
    pub fn webcam() -> Self {
        Self::new(
            capability::Flags::STREAMING | capability::Flags::READ_WRITE,
            &Encoding::ALL,
        )
    }

    /// Cap the number of buffers `VIDIOC_REQBUFS` grants
    pub fn with_max_buffers(mut self, max: u32) -> Self {
        self.max_buffers = max;
        self
    }

    /// Make `VIDIOC_S_FMT` round every size to this one
    pub fn with_adjusted_size(mut self, width: u32, height: u32) -> Self {
        self.adjust_size = Some((width, height));
        self
    }

    /// Make `VIDIOC_S_FMT` fail with `EINVAL`
    pub fn with_format_rejected(mut self) -> Self {
        self.reject_format = true;
        self
    }

    /// Make `VIDIOC_REQBUFS` fail with `EINVAL` for one memory type
    pub fn with_reqbufs_rejected(mut self, memory: Memory) -> Self {
        self.reject_reqbufs = Some(memory);
        self
    }

    /// Make mapping of one buffer index fail with `ENOMEM`
    pub fn with_map_failure(mut self, index: u32) -> Self {
        self.map_failure = Some(index);
        self
    }

    /// Make the next `VIDIOC_STREAMON` fail with the given errno
    pub fn with_streamon_error(mut self, errno: i32) -> Self {
        self.streamon_error = Some(errno);
        self
    }

    /// Make the next `VIDIOC_QBUF` of one buffer index fail with the given errno
    pub fn with_queue_failure(mut self, index: u32, errno: i32) -> Self {
        self.queue_failure = Some((index, errno));
        self
    }

    /// Make `VIDIOC_QUERYCTRL` fail with `ENOTTY`
    pub fn without_controls(mut self) -> Self {
        self.controls = None;
        self
    }

    /// Report an image size this many bytes larger than the pixel data, as drivers with
    /// line or plane padding do
    pub fn with_image_padding(mut self, bytes: u32) -> Self {
        self.padding = bytes;
        self.format.size += bytes;
        self
    }

    /// Fail the next `VIDIOC_DQBUF` with the given errno, before any buffer is handed back
    pub fn push_dequeue_error(&mut self, errno: i32) {
        self.dequeue_errors.push_back(errno);
    }

    /// Script the outcome of the next read(2)
    pub fn push_read(&mut self, read: SimRead) {
        self.reads.push_back(read);
    }

    /// Let the next `count` waits time out
    pub fn push_timeouts(&mut self, count: u32) {
        self.timeouts += count;
    }

    /// Number of mappings handed out and not yet dropped
    pub fn live_mappings(&self) -> usize {
        self.live.get()
    }

    /// Buffers granted by the last `VIDIOC_REQBUFS`
    pub fn granted(&self) -> u32 {
        self.granted
    }

    /// Number of buffers queued on the driver side
    pub fn driver_queued(&self) -> usize {
        self.incoming.len()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn crop_resets(&self) -> u32 {
        self.crop_resets
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    fn check_index(&self, index: u32) -> io::Result<()> {
        if index >= self.granted {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        Ok(())
    }

    fn enqueue(&mut self, index: u32, userptr: usize) -> io::Result<()> {
        self.check_index(index)?;
        if let Some((failing, errno)) = self.queue_failure {
            if failing == index {
                self.queue_failure = None;
                return Err(io::Error::from_raw_os_error(errno));
            }
        }
        if self.incoming.iter().any(|(i, _)| *i == index) {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        self.incoming.push_back((index, userptr));
        self.events.push(SimEvent::Queue(index));
        Ok(())
    }

    fn next_meta(&mut self) -> Metadata {
        let sequence = self.sequence;
        self.sequence += 1;
        Metadata::new(
            self.format.size,
            sequence,
            Timestamp::from(FRAME_PERIOD * sequence),
            buffer::Flags::DONE | buffer::Flags::TIMESTAMP_MONOTONIC,
        )
    }
}

/// Fills in stride and image size the way a driver would
fn sized(mut fmt: Format, encoding: Encoding) -> Format {
    fmt.stride = match encoding {
        Encoding::Luma | Encoding::Yuv420 => fmt.width,
        Encoding::Yuv422 => fmt.width * 2,
        Encoding::Rgb => fmt.width * 3,
    };
    fmt.size = encoding.payload_size(fmt.width, fmt.height) as u32;
    fmt
}

impl Driver for SimDevice {
    type Mapping = SimMapping;

    fn query_caps(&self) -> io::Result<Capabilities> {
        Ok(self.caps.clone())
    }

    fn query_controls(&self) -> io::Result<Vec<control::Description>> {
        self.controls
            .clone()
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOTTY))
    }

    fn enum_formats(&self) -> io::Result<Vec<Description>> {
        Ok(self.formats.clone())
    }

    fn enum_framesizes(&self, fourcc: FourCC) -> io::Result<Vec<FrameSize>> {
        Ok(self
            .framesizes
            .iter()
            .filter(|size| size.fourcc == fourcc)
            .cloned()
            .collect())
    }

    fn format(&self) -> io::Result<Format> {
        Ok(self.format)
    }

    fn set_format(&mut self, fmt: &Format) -> io::Result<Format> {
        let offered = self.formats.iter().any(|d| d.fourcc == fmt.fourcc);
        let encoding = match fmt.encoding() {
            Some(enc) if offered && !self.reject_format => enc,
            _ => return Err(io::Error::from_raw_os_error(libc::EINVAL)),
        };
        let (width, height) = self.adjust_size.unwrap_or((fmt.width, fmt.height));
        self.format = sized(Format::new(width, height, fmt.fourcc), encoding);
        self.format.size += self.padding;
        Ok(self.format)
    }

    fn reset_crop(&mut self) -> io::Result<()> {
        self.crop_resets += 1;
        Ok(())
    }

    fn request_buffers(&mut self, memory: Memory, count: u32) -> io::Result<u32> {
        if self.reject_reqbufs == Some(memory) {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        if self.streaming {
            return Err(io::Error::from_raw_os_error(libc::EBUSY));
        }
        self.incoming.clear();
        self.granted = count.min(self.max_buffers);
        self.memory = if self.granted == 0 { None } else { Some(memory) };
        Ok(self.granted)
    }

    fn map_buffer(&mut self, index: u32) -> io::Result<SimMapping> {
        self.check_index(index)?;
        if self.memory != Some(Memory::Mmap) {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        if self.map_failure == Some(index) {
            return Err(io::Error::from_raw_os_error(libc::ENOMEM));
        }

        self.live.set(self.live.get() + 1);
        Ok(SimMapping {
            data: vec![index as u8; self.format.size as usize],
            live: Rc::clone(&self.live),
        })
    }

    fn queue_mapped(&mut self, index: u32) -> io::Result<()> {
        if self.memory != Some(Memory::Mmap) {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        self.enqueue(index, 0)
    }

    fn queue_user(&mut self, index: u32, buf: &mut [u8]) -> io::Result<()> {
        if self.memory != Some(Memory::UserPtr) || buf.len() < self.format.size as usize {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        self.enqueue(index, buf.as_ptr() as usize)
    }

    fn dequeue(&mut self, memory: Memory) -> io::Result<Dequeued> {
        if self.memory != Some(memory) {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        if let Some(errno) = self.dequeue_errors.pop_front() {
            return Err(io::Error::from_raw_os_error(errno));
        }
        if !self.streaming {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }

        let (index, userptr) = self
            .incoming
            .pop_front()
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EAGAIN))?;
        let meta = self.next_meta();
        self.events.push(SimEvent::Dequeue {
            index,
            sequence: meta.sequence,
        });

        Ok(Dequeued {
            index,
            userptr,
            meta,
        })
    }

    fn stream_on(&mut self) -> io::Result<()> {
        if let Some(errno) = self.streamon_error.take() {
            return Err(io::Error::from_raw_os_error(errno));
        }
        self.streaming = true;
        self.events.push(SimEvent::StreamOn);
        Ok(())
    }

    fn stream_off(&mut self) -> io::Result<()> {
        self.streaming = false;
        self.incoming.clear();
        self.events.push(SimEvent::StreamOff);
        Ok(())
    }

    fn wait(&mut self, _timeout: Duration) -> io::Result<bool> {
        if self.timeouts > 0 {
            self.timeouts -= 1;
            return Ok(false);
        }
        // a pending scripted error is reported through DQBUF, so the caller must get there
        Ok(!self.streaming || !self.incoming.is_empty() || !self.dequeue_errors.is_empty())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let fill = |buf: &mut [u8], seq: u32| {
            buf.fill(seq as u8);
            buf.len()
        };

        match self.reads.pop_front().unwrap_or(SimRead::Full) {
            SimRead::Full => {
                let seq = self.next_meta().sequence;
                Ok(fill(buf, seq))
            }
            SimRead::Short(n) => {
                let seq = self.next_meta().sequence;
                let n = n.min(buf.len());
                Ok(fill(&mut buf[..n], seq))
            }
            SimRead::Eof => Ok(0),
            SimRead::Fail(errno) => Err(io::Error::from_raw_os_error(errno)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_fill_in_queue_order() {
        let mut dev = SimDevice::webcam();
        assert_eq!(dev.request_buffers(Memory::Mmap, 8).ok(), Some(4));
        dev.queue_mapped(2).unwrap();
        dev.queue_mapped(0).unwrap();
        assert!(dev.queue_mapped(2).is_err());

        let err = dev.dequeue(Memory::Mmap).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));

        dev.stream_on().unwrap();
        assert_eq!(dev.dequeue(Memory::Mmap).unwrap().index, 2);
        let second = dev.dequeue(Memory::Mmap).unwrap();
        assert_eq!((second.index, second.meta.sequence), (0, 1));

        let err = dev.dequeue(Memory::Mmap).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn mappings_are_counted() {
        let mut dev = SimDevice::webcam();
        dev.request_buffers(Memory::Mmap, 2).unwrap();
        let a = dev.map_buffer(0).unwrap();
        let b = dev.map_buffer(1).unwrap();
        assert_eq!(dev.live_mappings(), 2);
        assert_eq!(b[0], 1);
        drop(a);
        assert_eq!(dev.live_mappings(), 1);
        drop(b);
        assert_eq!(dev.live_mappings(), 0);
    }
}
