use std::io;
use std::ops::Deref;

use crate::device::Driver;
use crate::error::{Error, Result};
use crate::io::pool::{BufferPool, BufferState};
use crate::io::IoMethod;
use crate::memory::Memory;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamState {
    Stopped,
    Streaming,
}

/// Drives buffers between the driver and the ready-queue
///
/// Each harvested buffer is appended to the ready-queue; the buffer the consumer held before
/// is handed back to the driver right after, so there is always a buffer being filled while
/// the newest frame is read.
#[derive(Debug)]
pub struct Controller {
    state: StreamState,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

/// Hands one buffer to the driver.
fn enqueue<D, M>(dev: &mut D, pool: &mut BufferPool<M>, index: usize) -> io::Result<()>
where
    D: Driver,
    M: Deref<Target = [u8]>,
{
    match pool.method() {
        IoMethod::Read => return Ok(()),
        IoMethod::MemoryMapped => dev.queue_mapped(index as u32)?,
        IoMethod::UserPointer => {
            let buf = pool
                .buffer_mut(index)
                .and_then(|buf| buf.host_mut())
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no host buffer"))?;
            dev.queue_user(index as u32, buf)?;
        }
    }
    pool.mark_queued(index);
    Ok(())
}

impl Controller {
    pub fn new() -> Self {
        Controller {
            state: StreamState::Stopped,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == StreamState::Streaming
    }

    /// Queues every idle buffer and turns streaming on.
    ///
    /// If the driver refuses to stream the buffers stay queued, so a later stop or teardown
    /// takes them back and a later start only has to retry `VIDIOC_STREAMON`. If queueing
    /// fails partway, the buffers queued so far are taken back before the error is returned.
    pub fn start<D, M>(&mut self, dev: &mut D, pool: &mut BufferPool<M>) -> Result<()>
    where
        D: Driver,
        M: Deref<Target = [u8]>,
    {
        if self.is_streaming() {
            return Ok(());
        }

        if pool.method().is_streaming() {
            for index in 0..pool.len() {
                if pool.get(index).map(|buf| buf.state()) != Some(BufferState::Idle) {
                    continue;
                }
                if let Err(source) = enqueue(dev, pool, index) {
                    if let Err(e) = dev.stream_off() {
                        log::warn!("VIDIOC_STREAMOFF after a failed VIDIOC_QBUF: {}", e);
                    }
                    pool.reset();
                    return Err(Error::BufferQueue { index, source });
                }
            }
            dev.stream_on().map_err(Error::StreamStart)?;
            log::debug!("streaming with {} buffers", pool.len());
        }

        self.state = StreamState::Streaming;
        Ok(())
    }

    /// Turns streaming off and takes every buffer back.
    ///
    /// A driver refusing to stop is logged and otherwise ignored: the buffers are released
    /// anyway once the session is torn down.
    pub fn stop<D, M>(&mut self, dev: &mut D, pool: &mut BufferPool<M>)
    where
        D: Driver,
        M: Deref<Target = [u8]>,
    {
        if pool.method().is_streaming() {
            if let Err(e) = dev.stream_off() {
                // ENODEV: the device is gone, nothing left to stop
                if e.raw_os_error() != Some(libc::ENODEV) {
                    log::warn!("VIDIOC_STREAMOFF failed: {}", e);
                }
            }
        }

        pool.reset();
        self.state = StreamState::Stopped;
    }

    /// Dequeues one filled buffer if the driver has one.
    ///
    /// The buffer is appended to the ready-queue and its index returned. Afterwards the
    /// buffer the consumer borrowed last is handed back to the driver. `EAGAIN` and `EIO`
    /// produce `Ok(None)`.
    pub fn harvest<D, M>(&mut self, dev: &mut D, pool: &mut BufferPool<M>) -> Result<Option<usize>>
    where
        D: Driver,
        M: Deref<Target = [u8]>,
    {
        let memory = match pool.method().memory() {
            Some(memory) if self.is_streaming() => memory,
            _ => return Ok(None),
        };

        let dequeued = match dev.dequeue(memory) {
            Ok(dequeued) => dequeued,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) if e.raw_os_error() == Some(libc::EIO) => {
                log::debug!("VIDIOC_DQBUF: transient I/O error");
                return Ok(None);
            }
            Err(e) => return Err(Error::BufferDequeue(e)),
        };

        let index = match memory {
            Memory::Mmap => dequeued.index as usize,
            Memory::UserPtr => pool.index_of_address(dequeued.userptr).ok_or_else(|| {
                Error::BufferDequeue(io::Error::new(
                    io::ErrorKind::Other,
                    "driver returned an unknown user pointer",
                ))
            })?,
        };
        if pool.get(index).is_none() {
            return Err(Error::BufferDequeue(io::Error::new(
                io::ErrorKind::Other,
                format!("driver returned unknown buffer index {}", index),
            )));
        }

        pool.push_ready(index, dequeued.meta);
        log::trace!("harvested buffer {} (seq {})", index, dequeued.meta.sequence);

        self.release(dev, pool)?;
        Ok(Some(index))
    }

    /// Hands the borrowed buffer back to the driver right away.
    pub fn release<D, M>(&mut self, dev: &mut D, pool: &mut BufferPool<M>) -> Result<()>
    where
        D: Driver,
        M: Deref<Target = [u8]>,
    {
        let Some(index) = pool.take_borrowed() else {
            return Ok(());
        };

        if let Err(source) = enqueue(dev, pool, index) {
            pool.restore_borrowed(index);
            return Err(Error::BufferQueue { index, source });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::sim::SimDevice;
    use crate::format::{Encoding, Format};
    use crate::io::negotiate::negotiate;
    use crate::probe::probe;

    #[test]
    fn start_queues_everything() {
        let mut dev = SimDevice::webcam();
        let caps = probe(&dev).unwrap();
        let fmt = Format::for_encoding(Encoding::Luma, 320, 240);
        let mut pool = negotiate(&mut dev, &caps, IoMethod::MemoryMapped, &fmt).unwrap();
        let mut ctl = Controller::new();

        ctl.start(&mut dev, &mut pool).unwrap();
        assert!(ctl.is_streaming());
        assert_eq!(pool.count(BufferState::Queued), 4);
        assert_eq!(dev.driver_queued(), 4);

        // a second start must not queue anything twice
        ctl.start(&mut dev, &mut pool).unwrap();
        assert_eq!(dev.driver_queued(), 4);

        ctl.stop(&mut dev, &mut pool);
        assert_eq!(ctl.state(), StreamState::Stopped);
        assert_eq!(pool.count(BufferState::Idle), 4);
        assert_eq!(dev.driver_queued(), 0);
    }

    #[test]
    fn start_retries_streamon_without_queueing_twice() {
        let mut dev = SimDevice::webcam().with_streamon_error(libc::EBUSY);
        let caps = probe(&dev).unwrap();
        let fmt = Format::for_encoding(Encoding::Luma, 320, 240);
        let mut pool = negotiate(&mut dev, &caps, IoMethod::MemoryMapped, &fmt).unwrap();
        let mut ctl = Controller::new();

        assert!(matches!(
            ctl.start(&mut dev, &mut pool),
            Err(Error::StreamStart(_))
        ));
        assert!(!ctl.is_streaming());
        assert_eq!(pool.count(BufferState::Queued), 4);

        ctl.start(&mut dev, &mut pool).unwrap();
        assert!(ctl.is_streaming());
        assert!(dev.is_streaming());
        assert_eq!(dev.driver_queued(), 4);
        pool.check_invariant().unwrap();
    }

    #[test]
    fn failed_queue_takes_everything_back() {
        let mut dev = SimDevice::webcam().with_queue_failure(2, libc::ENOMEM);
        let caps = probe(&dev).unwrap();
        let fmt = Format::for_encoding(Encoding::Luma, 320, 240);
        let mut pool = negotiate(&mut dev, &caps, IoMethod::MemoryMapped, &fmt).unwrap();
        let mut ctl = Controller::new();

        let err = ctl.start(&mut dev, &mut pool).unwrap_err();
        assert!(matches!(err, Error::BufferQueue { index: 2, .. }));
        assert!(!ctl.is_streaming());
        assert_eq!(pool.count(BufferState::Idle), 4);
        assert_eq!(dev.driver_queued(), 0);
        pool.check_invariant().unwrap();

        ctl.start(&mut dev, &mut pool).unwrap();
        assert_eq!(pool.count(BufferState::Queued), 4);
        assert_eq!(dev.driver_queued(), 4);
    }

    #[test]
    fn harvest_while_stopped_is_neutral() {
        let mut dev = SimDevice::webcam();
        let caps = probe(&dev).unwrap();
        let fmt = Format::for_encoding(Encoding::Luma, 320, 240);
        let mut pool = negotiate(&mut dev, &caps, IoMethod::MemoryMapped, &fmt).unwrap();
        let mut ctl = Controller::new();
        assert_eq!(ctl.harvest(&mut dev, &mut pool).unwrap(), None);
    }
}
