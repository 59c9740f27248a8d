use std::{io, ops::Deref, time::Duration};

use crate::buffer::Metadata;
use crate::capability::Capabilities;
use crate::control;
use crate::format::{Description, Format, FourCC};
use crate::framesize::FrameSize;
use crate::memory::Memory;

/// A buffer handed back by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dequeued {
    /// Driver index of the buffer
    pub index: u32,
    /// Address of the user memory the driver wrote to, zero for mapped buffers
    pub userptr: usize,
    pub meta: Metadata,
}

/// Driver operations a capture session is built from
///
/// Every method maps onto one (or a fixed sequence of) `VIDIOC_*` requests. Errors are
/// reported the way the kernel reports them: as [`io::Error`] carrying the errno, so callers
/// can tell `EAGAIN`, `EIO` and `EINVAL` apart.
pub trait Driver {
    /// Driver memory mapped into the process
    type Mapping: Deref<Target = [u8]>;

    /// `VIDIOC_QUERYCAP`
    fn query_caps(&self) -> io::Result<Capabilities>;

    /// `VIDIOC_QUERYCTRL` over every control, with `VIDIOC_QUERYMENU` for menu entries
    ///
    /// Disabled controls are left out.
    fn query_controls(&self) -> io::Result<Vec<control::Description>>;

    /// `VIDIOC_ENUM_FMT` until the driver reports the end of the list
    fn enum_formats(&self) -> io::Result<Vec<Description>>;

    /// `VIDIOC_ENUM_FRAMESIZES` for one pixelformat
    fn enum_framesizes(&self, fourcc: FourCC) -> io::Result<Vec<FrameSize>>;

    /// `VIDIOC_G_FMT`
    fn format(&self) -> io::Result<Format>;

    /// `VIDIOC_S_FMT`, returning the format the driver actually applied
    fn set_format(&mut self, fmt: &Format) -> io::Result<Format>;

    /// `VIDIOC_CROPCAP` followed by `VIDIOC_S_CROP` with the default rectangle
    fn reset_crop(&mut self) -> io::Result<()>;

    /// `VIDIOC_REQBUFS`, returning the number of buffers granted
    ///
    /// A count of zero releases any earlier request.
    fn request_buffers(&mut self, memory: Memory, count: u32) -> io::Result<u32>;

    /// `VIDIOC_QUERYBUF` followed by mmap(2) of the buffer
    fn map_buffer(&mut self, index: u32) -> io::Result<Self::Mapping>;

    /// `VIDIOC_QBUF` for a memory-mapped buffer
    fn queue_mapped(&mut self, index: u32) -> io::Result<()>;

    /// `VIDIOC_QBUF` for a user pointer buffer
    ///
    /// The driver keeps writing into `buf` until the buffer is dequeued, so it must stay
    /// allocated and must not move in the meantime.
    fn queue_user(&mut self, index: u32, buf: &mut [u8]) -> io::Result<()>;

    /// `VIDIOC_DQBUF`
    fn dequeue(&mut self, memory: Memory) -> io::Result<Dequeued>;

    /// `VIDIOC_STREAMON`
    fn stream_on(&mut self) -> io::Result<()>;

    /// `VIDIOC_STREAMOFF`
    fn stream_off(&mut self) -> io::Result<()>;

    /// Blocks until the device has data or `timeout` elapses; `Ok(false)` on timeout.
    fn wait(&mut self, timeout: Duration) -> io::Result<bool>;

    /// read(2) of one frame
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}
