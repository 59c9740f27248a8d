//! Picking an I/O method and setting up its buffers.

use crate::capability::Flags;
use crate::device::Driver;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::io::pool::{Backing, Buffer, BufferPool};
use crate::io::{IoMethod, MAX_BUFFERS, MIN_BUFFERS};
use crate::memory::Memory;
use crate::probe::DeviceCapabilities;

const fn required(method: IoMethod) -> Flags {
    match method {
        IoMethod::Read => Flags::READ_WRITE,
        IoMethod::MemoryMapped | IoMethod::UserPointer => Flags::STREAMING,
    }
}

/// Chooses how frames are transferred.
///
/// An explicit request wins if the device can honour it. Otherwise streaming devices use
/// memory-mapped buffers and read/write devices use read(2). User pointer I/O is only ever
/// used when asked for.
pub fn select_method(caps: &DeviceCapabilities, requested: Option<IoMethod>) -> Result<IoMethod> {
    let flags = caps.flags();

    if let Some(method) = requested {
        let missing = required(method) - flags;
        if !missing.is_empty() {
            return Err(Error::MethodUnsupported {
                method,
                missing,
                offered: flags,
            });
        }
        return Ok(method);
    }

    if flags.contains(Flags::STREAMING) {
        Ok(IoMethod::MemoryMapped)
    } else if flags.contains(Flags::READ_WRITE) {
        Ok(IoMethod::Read)
    } else {
        Err(Error::NoIoMethod(flags))
    }
}

fn allocate(size: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|_| Error::Allocation { size })?;
    buf.resize(size, 0);
    Ok(buf)
}

fn request<D: Driver>(dev: &mut D, memory: Memory) -> Result<u32> {
    let granted = dev
        .request_buffers(memory, MAX_BUFFERS)
        .map_err(|source| Error::BufferRequest { memory, source })?;

    if granted < MIN_BUFFERS {
        // hand back whatever was granted before giving up
        if let Err(e) = dev.request_buffers(memory, 0) {
            log::warn!("releasing {} buffers failed: {}", memory, e);
        }
        return Err(Error::InsufficientBuffers {
            requested: MAX_BUFFERS,
            granted,
        });
    }

    if granted < MAX_BUFFERS {
        log::info!("driver granted {} of {} buffers", granted, MAX_BUFFERS);
    }
    Ok(granted)
}

/// Sets up the buffers for `method`.
///
/// On failure every buffer set up so far is released again: mappings are unmapped as the
/// partially built pool is dropped and the driver-side request is reset.
pub fn negotiate<D: Driver>(
    dev: &mut D,
    caps: &DeviceCapabilities,
    method: IoMethod,
    format: &Format,
) -> Result<BufferPool<D::Mapping>> {
    let missing = required(method) - caps.flags();
    if !missing.is_empty() {
        return Err(Error::MethodUnsupported {
            method,
            missing,
            offered: caps.flags(),
        });
    }

    // drivers may pad lines or planes past the pixel data and expect room for it
    let size = match format.encoding() {
        Some(encoding) => encoding
            .bytes_per_frame(format.width, format.height)
            .max(format.size as usize),
        None => format.size as usize,
    };

    let bufs = match method {
        IoMethod::Read => vec![Buffer::new(0, Backing::Host(allocate(size)?))],
        IoMethod::MemoryMapped => {
            let count = request(dev, Memory::Mmap)?;
            let mut bufs = Vec::with_capacity(count as usize);
            for index in 0..count {
                match dev.map_buffer(index) {
                    Ok(map) => bufs.push(Buffer::new(index as usize, Backing::Mapped(map))),
                    Err(source) => {
                        drop(bufs);
                        if let Err(e) = dev.request_buffers(Memory::Mmap, 0) {
                            log::warn!("releasing mapped buffers failed: {}", e);
                        }
                        return Err(Error::BufferMap {
                            index: index as usize,
                            source,
                        });
                    }
                }
            }
            bufs
        }
        IoMethod::UserPointer => {
            let count = request(dev, Memory::UserPtr)?;
            let mut bufs = Vec::with_capacity(count as usize);
            for index in 0..count as usize {
                match allocate(size) {
                    Ok(host) => bufs.push(Buffer::new(index, Backing::Host(host))),
                    Err(e) => {
                        if let Err(e) = dev.request_buffers(Memory::UserPtr, 0) {
                            log::warn!("releasing user pointer buffers failed: {}", e);
                        }
                        return Err(e);
                    }
                }
            }
            bufs
        }
    };

    log::info!(
        "{} I/O with {} buffer(s) of {} bytes",
        method,
        bufs.len(),
        size
    );
    Ok(BufferPool::new(method, bufs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::sim::SimDevice;
    use crate::format::Encoding;
    use crate::probe::probe;

    fn caps_of(dev: &SimDevice) -> DeviceCapabilities {
        probe(dev).unwrap()
    }

    #[test]
    fn streaming_is_preferred() {
        let dev = SimDevice::webcam();
        let caps = caps_of(&dev);
        assert_eq!(select_method(&caps, None).unwrap(), IoMethod::MemoryMapped);
        assert_eq!(
            select_method(&caps, Some(IoMethod::UserPointer)).unwrap(),
            IoMethod::UserPointer
        );
    }

    #[test]
    fn read_write_only_device_reads() {
        let dev = SimDevice::new(Flags::READ_WRITE, &[Encoding::Luma]);
        let caps = caps_of(&dev);
        assert_eq!(select_method(&caps, None).unwrap(), IoMethod::Read);
        assert!(matches!(
            select_method(&caps, Some(IoMethod::MemoryMapped)),
            Err(Error::MethodUnsupported { missing, .. }) if missing == Flags::STREAMING
        ));
    }

    #[test]
    fn read_pool_holds_one_frame() {
        let mut dev = SimDevice::new(Flags::READ_WRITE, &[Encoding::Yuv420]);
        let caps = caps_of(&dev);
        let fmt = Format::for_encoding(Encoding::Yuv420, 320, 240);
        let pool = negotiate(&mut dev, &caps, IoMethod::Read, &fmt).unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(0).unwrap().len(), 153600);
    }

    #[test]
    fn reqbufs_rejection_names_memory() {
        let mut dev = SimDevice::webcam().with_reqbufs_rejected(Memory::UserPtr);
        let caps = caps_of(&dev);
        let fmt = Format::for_encoding(Encoding::Luma, 320, 240);
        let err = negotiate(&mut dev, &caps, IoMethod::UserPointer, &fmt).unwrap_err();
        assert!(matches!(
            err,
            Error::BufferRequest {
                memory: Memory::UserPtr,
                ..
            }
        ));
        assert!(err.to_string().contains("user pointer"));
    }
}
