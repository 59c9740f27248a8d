//! Webcam capture core for Video4Linux devices.
//!
//! Opens a capture device (or synthesizes a test pattern), negotiates how frames travel from
//! the driver (read, memory-mapped or user-pointer buffers) and hands them out one at a time
//! through [`FrameSource`].
//!
//! ```no_run
//! use glcam::config::CaptureConfig;
//!
//! let mut source = glcam::session::open(&CaptureConfig::default())?;
//! if let Some(frame) = source.next_frame()? {
//!     println!("{} bytes, sequence {}", frame.len(), frame.meta.sequence);
//! }
//! # Ok::<(), glcam::Error>(())
//! ```

pub use v4l2_sys;

pub mod v4l2;

pub mod app;
pub mod buffer;
pub mod capability;
pub mod config;
pub mod control;
pub mod device;
pub mod error;
pub mod format;
pub mod fps;
pub mod framesize;
pub mod io;
pub mod memory;
pub mod probe;
pub mod pselect;
pub mod session;
pub mod source;
pub mod timestamp;

pub use capability::Capabilities;
pub use config::CaptureConfig;
pub use device::{Device, Driver};
pub use error::{Error, Result};
pub use format::{Encoding, FourCC, Format};
pub use io::IoMethod;
pub use source::{Frame, FrameSource};
