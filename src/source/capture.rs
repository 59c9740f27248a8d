use std::io;
use std::mem;
use std::time::{Duration, Instant};

use crate::buffer::{self, Metadata};
use crate::device::Driver;
use crate::error::{Error, Result};
use crate::format::{Encoding, Format};
use crate::fps::FpsCounter;
use crate::io::negotiate::negotiate;
use crate::io::pool::BufferPool;
use crate::io::stream::Controller;
use crate::io::IoMethod;
use crate::probe::DeviceCapabilities;
use crate::source::{Frame, FrameSource};
use crate::timestamp::Timestamp;

/// How long to wait for a frame before giving the event loop control back
pub const DEFAULT_TIMEOUT: Duration = Duration::from_nanos(1_000_000_000 / 15);

/// Frames from a live device
///
/// Owns the device, its buffers and the streaming state. Dropping a capture stops streaming
/// and releases all buffers.
pub struct Capture<D: Driver> {
    dev: D,
    caps: DeviceCapabilities,
    format: Format,
    encoding: Encoding,
    pool: BufferPool<D::Mapping>,
    ctl: Controller,
    timeout: Duration,
    fps: FpsCounter,
    epoch: Instant,
    reads: u32,
}

impl<D: Driver> Capture<D> {
    /// Sets up buffers for `method` on a device already configured for `format`.
    ///
    /// Streaming does not start until [`Capture::start`].
    pub fn new(
        mut dev: D,
        caps: DeviceCapabilities,
        format: Format,
        encoding: Encoding,
        method: IoMethod,
    ) -> Result<Self> {
        let pool = negotiate(&mut dev, &caps, method, &format)?;

        Ok(Capture {
            dev,
            caps,
            format,
            encoding,
            pool,
            ctl: Controller::new(),
            timeout: DEFAULT_TIMEOUT,
            fps: FpsCounter::new(),
            epoch: Instant::now(),
            reads: 0,
        })
    }

    pub fn start(&mut self) -> Result<()> {
        self.ctl.start(&mut self.dev, &mut self.pool)
    }

    pub fn stop(&mut self) {
        self.ctl.stop(&mut self.dev, &mut self.pool)
    }

    /// Hands the current frame's buffer back to the driver before the next frame is due.
    pub fn release(&mut self) -> Result<()> {
        self.ctl.release(&mut self.dev, &mut self.pool)
    }

    /// Sets how long [`FrameSource::next_frame`] waits for the device.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn method(&self) -> IoMethod {
        self.pool.method()
    }

    pub fn format(&self) -> &Format {
        &self.format
    }

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.caps
    }

    pub fn pool(&self) -> &BufferPool<D::Mapping> {
        &self.pool
    }

    pub fn controller(&self) -> &Controller {
        &self.ctl
    }

    pub fn device(&self) -> &D {
        &self.dev
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.dev
    }

    fn read_frame(&mut self) -> Result<Option<Frame<'_>>> {
        let want = self.encoding.payload_size(self.format.width, self.format.height);
        let buf = self
            .pool
            .buffer_mut(0)
            .and_then(|buf| buf.host_mut())
            .ok_or_else(|| Error::Read(io::Error::new(io::ErrorKind::Other, "no read buffer")))?;
        let want = want.min(buf.len());

        let n = match self.dev.read(&mut buf[..want]) {
            Ok(0) => return Ok(None),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(Error::Read(e)),
        };
        if n < want {
            log::debug!("short read: {} of {} bytes", n, want);
        }

        let sequence = self.reads;
        self.reads = self.reads.wrapping_add(1);
        self.fps.record_now();

        Ok(Some(Frame {
            data: &buf[..n],
            index: 0,
            meta: Metadata::new(
                n as u32,
                sequence,
                Timestamp::from(self.epoch.elapsed()),
                buffer::Flags::DONE,
            ),
        }))
    }
}

impl<D: Driver> FrameSource for Capture<D> {
    fn next_frame(&mut self) -> Result<Option<Frame<'_>>> {
        if !self.ctl.is_streaming() {
            return Ok(None);
        }
        if !self.dev.wait(self.timeout).map_err(Error::Wait)? {
            return Ok(None);
        }

        if self.pool.method() == IoMethod::Read {
            return self.read_frame();
        }

        if self.ctl.harvest(&mut self.dev, &mut self.pool)?.is_none() {
            return Ok(None);
        }
        self.fps.record_now();

        let Some(index) = self.pool.borrow_oldest() else {
            return Ok(None);
        };
        let Some(buf) = self.pool.get(index) else {
            return Ok(None);
        };

        Ok(Some(Frame {
            data: buf.payload(),
            index,
            meta: *buf.meta(),
        }))
    }

    fn encoding(&self) -> Encoding {
        self.encoding
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.format.width, self.format.height)
    }

    fn fps(&self) -> f32 {
        self.fps.fps()
    }
}

impl<D: Driver> Drop for Capture<D> {
    fn drop(&mut self) {
        self.ctl.stop(&mut self.dev, &mut self.pool);

        // mappings have to go before the driver lets go of its buffers
        let method = self.pool.method();
        drop(mem::replace(&mut self.pool, BufferPool::new(method, Vec::new())));
        if let Some(memory) = method.memory() {
            if let Err(e) = self.dev.request_buffers(memory, 0) {
                if e.raw_os_error() != Some(libc::ENODEV) {
                    log::warn!("releasing {} buffers failed: {}", memory, e);
                }
            }
        }
    }
}
