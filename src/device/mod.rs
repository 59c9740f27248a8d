use std::os::unix::fs::FileTypeExt;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::{fs, io, mem, time::Duration};

use crate::buffer::Metadata;
use crate::capability::Capabilities;
use crate::control;
use crate::error::{Error, Result};
use crate::format::{Description, Format, FourCC};
use crate::framesize::FrameSize;
use crate::memory::{Memory, Mmap};
use crate::pselect;
use crate::v4l2;
use crate::v4l2_sys::*;

pub mod sim;

pub mod traits;
pub use traits::{Dequeued, Driver};

/// Linux capture device node
pub struct Device {
    /// raw OS file descriptor
    fd: RawFd,
    path: PathBuf,
}

impl Device {
    /// Opens a capture device by path
    ///
    /// The node must be a character device. It is opened non-blocking: dequeueing or
    /// reading with no frame available fails with `EAGAIN` instead of stalling.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use glcam::device::Device;
    /// let dev = Device::with_path("/dev/video0");
    /// ```
    pub fn with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let meta = fs::metadata(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        if !meta.file_type().is_char_device() {
            return Err(Error::NotCharDevice(path.to_path_buf()));
        }

        let fd = v4l2::open(path, libc::O_RDWR | libc::O_NONBLOCK).map_err(|source| {
            Error::Open {
                path: path.to_path_buf(),
                source,
            }
        })?;

        Ok(Device {
            fd,
            path: path.to_path_buf(),
        })
    }

    /// Returns the raw fd of the device
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// # Safety
    ///
    /// `arg` must be the structure `request` was built for.
    unsafe fn ioctl<T>(&self, request: v4l2::vidioc::_IOC_TYPE, arg: &mut T) -> io::Result<()> {
        v4l2::ioctl(self.fd, request, arg as *mut T as *mut std::os::raw::c_void)
    }

    fn buffer(memory: Memory, index: u32) -> v4l2_buffer {
        let mut buf: v4l2_buffer = unsafe { mem::zeroed() };
        buf.type_ = v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE;
        buf.memory = memory.code();
        buf.index = index;
        buf
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Err(e) = v4l2::close(self.fd) {
            log::warn!("closing {} failed: {}", self.path.display(), e);
        }
    }
}

fn end_of_list(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EINVAL)
}

impl Driver for Device {
    type Mapping = Mmap;

    fn query_caps(&self) -> io::Result<Capabilities> {
        unsafe {
            let mut v4l2_caps: v4l2_capability = mem::zeroed();
            self.ioctl(v4l2::vidioc::VIDIOC_QUERYCAP, &mut v4l2_caps)?;
            Ok(Capabilities::from(v4l2_caps))
        }
    }

    fn query_controls(&self) -> io::Result<Vec<control::Description>> {
        let mut controls = Vec::new();
        let mut v4l2_ctrl: v4l2_queryctrl = unsafe { mem::zeroed() };

        loop {
            v4l2_ctrl.id |= control::Flags::NEXT_CTRL.bits();
            match unsafe { self.ioctl(v4l2::vidioc::VIDIOC_QUERYCTRL, &mut v4l2_ctrl) } {
                Ok(()) => {}
                Err(e) if end_of_list(&e) => break,
                Err(e) => return Err(e),
            }

            let mut ctrl = control::Description::from(v4l2_ctrl);
            if ctrl.flags.contains(control::Flags::DISABLED) {
                continue;
            }

            if ctrl.typ.is_menu() {
                let mut v4l2_menu: v4l2_querymenu = unsafe { mem::zeroed() };
                v4l2_menu.id = v4l2_ctrl.id;
                let step = v4l2_ctrl.step.max(1) as usize;
                for i in (v4l2_ctrl.minimum..=v4l2_ctrl.maximum).step_by(step) {
                    v4l2_menu.index = i as u32;
                    // drivers may leave holes between minimum and maximum
                    if unsafe { self.ioctl(v4l2::vidioc::VIDIOC_QUERYMENU, &mut v4l2_menu) }
                        .is_err()
                    {
                        continue;
                    }
                    if let Some(item) = control::MenuItem::from_query(ctrl.typ, &v4l2_menu) {
                        ctrl.items.push((v4l2_menu.index, item));
                    }
                }
            }

            controls.push(ctrl);
        }

        Ok(controls)
    }

    fn enum_formats(&self) -> io::Result<Vec<Description>> {
        let mut formats = Vec::new();
        let mut v4l2_fmt: v4l2_fmtdesc = unsafe { mem::zeroed() };
        v4l2_fmt.type_ = v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE;

        loop {
            match unsafe { self.ioctl(v4l2::vidioc::VIDIOC_ENUM_FMT, &mut v4l2_fmt) } {
                Ok(()) => formats.push(Description::from(v4l2_fmt)),
                Err(e) if end_of_list(&e) => break,
                Err(e) => return Err(e),
            }
            v4l2_fmt.index += 1;
            v4l2_fmt.description = [0; 32];
        }

        Ok(formats)
    }

    fn enum_framesizes(&self, fourcc: FourCC) -> io::Result<Vec<FrameSize>> {
        let mut sizes = Vec::new();
        let mut v4l2_struct: v4l2_frmsizeenum = unsafe { mem::zeroed() };
        v4l2_struct.pixel_format = fourcc.into();

        loop {
            match unsafe { self.ioctl(v4l2::vidioc::VIDIOC_ENUM_FRAMESIZES, &mut v4l2_struct) } {
                Ok(()) => {
                    let size = FrameSize::try_from(v4l2_struct)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    sizes.push(size);
                }
                Err(e) if end_of_list(&e) => break,
                Err(e) => return Err(e),
            }
            // continuous and stepwise ranges are reported once, at index zero
            if v4l2_struct.type_ != v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_DISCRETE {
                break;
            }
            v4l2_struct.index += 1;
        }

        Ok(sizes)
    }

    fn format(&self) -> io::Result<Format> {
        unsafe {
            let mut v4l2_fmt: v4l2_format = mem::zeroed();
            v4l2_fmt.type_ = v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE;
            self.ioctl(v4l2::vidioc::VIDIOC_G_FMT, &mut v4l2_fmt)?;
            Ok(Format::from(v4l2_fmt.fmt.pix))
        }
    }

    fn set_format(&mut self, fmt: &Format) -> io::Result<Format> {
        unsafe {
            // start from the current format so field order and colorspace stay as the driver has them
            let mut v4l2_fmt: v4l2_format = mem::zeroed();
            v4l2_fmt.type_ = v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE;
            self.ioctl(v4l2::vidioc::VIDIOC_G_FMT, &mut v4l2_fmt)?;

            v4l2_fmt.fmt.pix.width = fmt.width;
            v4l2_fmt.fmt.pix.height = fmt.height;
            v4l2_fmt.fmt.pix.pixelformat = fmt.fourcc.into();
            v4l2_fmt.fmt.pix.bytesperline = fmt.stride;
            v4l2_fmt.fmt.pix.sizeimage = fmt.size;
            self.ioctl(v4l2::vidioc::VIDIOC_S_FMT, &mut v4l2_fmt)?;

            Ok(Format::from(v4l2_fmt.fmt.pix))
        }
    }

    fn reset_crop(&mut self) -> io::Result<()> {
        unsafe {
            let mut cropcap: v4l2_cropcap = mem::zeroed();
            cropcap.type_ = v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE;
            self.ioctl(v4l2::vidioc::VIDIOC_CROPCAP, &mut cropcap)?;

            let mut crop = v4l2_crop {
                type_: v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE,
                c: cropcap.defrect,
            };
            self.ioctl(v4l2::vidioc::VIDIOC_S_CROP, &mut crop)
        }
    }

    fn request_buffers(&mut self, memory: Memory, count: u32) -> io::Result<u32> {
        unsafe {
            let mut v4l2_reqbufs: v4l2_requestbuffers = mem::zeroed();
            v4l2_reqbufs.type_ = v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE;
            v4l2_reqbufs.memory = memory.code();
            v4l2_reqbufs.count = count;
            self.ioctl(v4l2::vidioc::VIDIOC_REQBUFS, &mut v4l2_reqbufs)?;
            Ok(v4l2_reqbufs.count)
        }
    }

    fn map_buffer(&mut self, index: u32) -> io::Result<Mmap> {
        let mut v4l2_buf = Self::buffer(Memory::Mmap, index);
        unsafe {
            self.ioctl(v4l2::vidioc::VIDIOC_QUERYBUF, &mut v4l2_buf)?;

            let len = v4l2_buf.length as usize;
            let ptr = v4l2::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                self.fd,
                v4l2_buf.m.offset as libc::off_t,
            )?;

            let ptr = NonNull::new(ptr as *mut u8)
                .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned NULL"))?;
            Ok(Mmap::from_raw(ptr, len))
        }
    }

    fn queue_mapped(&mut self, index: u32) -> io::Result<()> {
        let mut v4l2_buf = Self::buffer(Memory::Mmap, index);
        unsafe { self.ioctl(v4l2::vidioc::VIDIOC_QBUF, &mut v4l2_buf) }
    }

    fn queue_user(&mut self, index: u32, buf: &mut [u8]) -> io::Result<()> {
        let mut v4l2_buf = Self::buffer(Memory::UserPtr, index);
        v4l2_buf.m.userptr = buf.as_mut_ptr() as std::os::raw::c_ulong;
        v4l2_buf.length = buf.len() as u32;
        unsafe { self.ioctl(v4l2::vidioc::VIDIOC_QBUF, &mut v4l2_buf) }
    }

    fn dequeue(&mut self, memory: Memory) -> io::Result<Dequeued> {
        let mut v4l2_buf = Self::buffer(memory, 0);
        unsafe {
            self.ioctl(v4l2::vidioc::VIDIOC_DQBUF, &mut v4l2_buf)?;
        }

        let userptr = match memory {
            Memory::Mmap => 0,
            Memory::UserPtr => unsafe { v4l2_buf.m.userptr as usize },
        };

        Ok(Dequeued {
            index: v4l2_buf.index,
            userptr,
            meta: Metadata::new(
                v4l2_buf.bytesused,
                v4l2_buf.sequence,
                v4l2_buf.timestamp.into(),
                v4l2_buf.flags.into(),
            ),
        })
    }

    fn stream_on(&mut self) -> io::Result<()> {
        let mut typ = v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE as std::os::raw::c_int;
        unsafe { self.ioctl(v4l2::vidioc::VIDIOC_STREAMON, &mut typ) }
    }

    fn stream_off(&mut self) -> io::Result<()> {
        let mut typ = v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE as std::os::raw::c_int;
        unsafe { self.ioctl(v4l2::vidioc::VIDIOC_STREAMOFF, &mut typ) }
    }

    fn wait(&mut self, timeout: Duration) -> io::Result<bool> {
        pselect::wait_readable(self.fd, timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        v4l2::read(self.fd, buf)
    }
}
