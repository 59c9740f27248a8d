use std::{io, path::PathBuf};

use crate::{capability, format::Encoding, io::IoMethod, memory::Memory};

/// Errors raised while setting up or running a capture session.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The device node could not be opened or inspected.
    #[error("cannot open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The path exists but is not a character device.
    #[error("'{0}' is not a character device")]
    NotCharDevice(PathBuf),

    /// `VIDIOC_QUERYCAP` was rejected.
    #[error("{}", device_query_message(.0))]
    DeviceQuery(#[source] io::Error),

    /// None of the supported encodings is offered by the device.
    #[error("device supports none of LUMA, YUV420, YUV422, RGB; it offers: {offered}")]
    UnsupportedDevice { offered: String },

    /// The driver refused the requested format.
    #[error("cannot set format {encoding} {width}x{height}: {source}")]
    Format {
        encoding: Encoding,
        width: u32,
        height: u32,
        #[source]
        source: io::Error,
    },

    /// The device supports neither streaming nor read/write I/O.
    #[error("device supports neither streaming nor read/write I/O; capabilities: {0}")]
    NoIoMethod(capability::Flags),

    /// The requested I/O method needs a capability the device lacks.
    #[error("{method} I/O needs {missing} which the device lacks; capabilities: {offered}")]
    MethodUnsupported {
        method: IoMethod,
        missing: capability::Flags,
        offered: capability::Flags,
    },

    /// `VIDIOC_REQBUFS` was rejected.
    #[error("device does not support {memory} buffers: {source}")]
    BufferRequest {
        memory: Memory,
        #[source]
        source: io::Error,
    },

    /// The driver granted fewer buffers than streaming needs.
    #[error("insufficient buffer memory: requested {requested}, granted {granted}")]
    InsufficientBuffers { requested: u32, granted: u32 },

    /// Querying or mapping a driver buffer failed.
    #[error("cannot map buffer {index}: {source}")]
    BufferMap {
        index: usize,
        #[source]
        source: io::Error,
    },

    /// A host buffer could not be allocated.
    #[error("cannot allocate {size} byte buffer")]
    Allocation { size: usize },

    /// Handing a buffer to the driver with `VIDIOC_QBUF` failed.
    #[error("cannot queue buffer {index}: {source}")]
    BufferQueue {
        index: usize,
        #[source]
        source: io::Error,
    },

    /// `VIDIOC_STREAMON` was rejected.
    #[error("cannot start streaming: {0}")]
    StreamStart(#[source] io::Error),

    /// `VIDIOC_DQBUF` failed with something other than a transient condition.
    #[error("cannot dequeue buffer: {0}")]
    BufferDequeue(#[source] io::Error),

    /// A `read` transfer failed.
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// Waiting for device readiness failed.
    #[error("waiting for frame failed: {0}")]
    Wait(#[source] io::Error),
}

fn device_query_message(err: &io::Error) -> String {
    if err.raw_os_error() == Some(libc::EINVAL) {
        "not a V4L2 device".to_string()
    } else {
        format!("capability query failed: {}", err)
    }
}

impl Error {
    /// Whether the error happens while setting a session up, as opposed to a
    /// per-frame failure a caller may choose to retry.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::BufferQueue { .. } | Error::BufferDequeue(_) | Error::Read(_) | Error::Wait(_)
        )
    }
}

/// A `Result` alias for capture operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_einval_reads_as_not_v4l2() {
        let err = Error::DeviceQuery(io::Error::from_raw_os_error(libc::EINVAL));
        assert_eq!(err.to_string(), "not a V4L2 device");
        assert!(err.is_fatal());
    }

    #[test]
    fn runtime_errors_are_not_fatal() {
        let err = Error::BufferDequeue(io::Error::from_raw_os_error(libc::ENODEV));
        assert!(!err.is_fatal());
        let err = Error::InsufficientBuffers {
            requested: 4,
            granted: 1,
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("granted 1"));
    }
}
