//! Turning a [`CaptureConfig`] into a running frame source.

use std::io;

use crate::config::CaptureConfig;
use crate::device::{Device, Driver};
use crate::error::{Error, Result};
use crate::format::{Encoding, Format};
use crate::io::negotiate::select_method;
use crate::probe::{probe, DeviceCapabilities};
use crate::source::{Capture, FrameSource, TestPattern};

/// Applies image size and encoding to the device.
///
/// Cropping is reset to the full sensor area first where the driver supports it. Drivers may
/// round the size to one they can deliver; the size they settle on is returned.
pub fn configure<D: Driver>(
    dev: &mut D,
    caps: &DeviceCapabilities,
    encoding: Encoding,
    width: u32,
    height: u32,
) -> Result<Format> {
    let format_error = |source| Error::Format {
        encoding,
        width,
        height,
        source,
    };

    if !caps.supports(encoding) {
        return Err(format_error(io::Error::new(
            io::ErrorKind::Unsupported,
            "encoding not offered by the device",
        )));
    }

    if !caps.offers_size(encoding, width, height) {
        log::warn!(
            "{}x{} is not among the frame sizes advertised for {}, the driver may adjust it",
            width,
            height,
            encoding
        );
    }

    if let Err(e) = dev.reset_crop() {
        log::debug!("cropping left as is: {}", e);
    }

    let requested = Format::for_encoding(encoding, width, height);
    let applied = dev.set_format(&requested).map_err(format_error)?;

    if applied.fourcc != requested.fourcc {
        return Err(format_error(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("driver switched to {}", applied.fourcc),
        )));
    }
    if (applied.width, applied.height) != (width, height) {
        log::warn!(
            "driver adjusted image size from {}x{} to {}x{}",
            width,
            height,
            applied.width,
            applied.height
        );
    }

    Ok(applied)
}

/// Probes, configures and starts capturing from an opened device.
pub fn open_capture<D: Driver>(mut dev: D, config: &CaptureConfig) -> Result<Capture<D>> {
    let caps = probe(&dev)?;
    caps.ensure_usable()?;

    let format = configure(
        &mut dev,
        &caps,
        config.encoding,
        config.width,
        config.height,
    )?;
    let method = select_method(&caps, config.method)?;

    let mut capture = Capture::new(dev, caps, format, config.encoding, method)?;
    capture.set_timeout(config.timeout);
    capture.start()?;
    Ok(capture)
}

/// Opens the frame source a configuration describes.
pub fn open(config: &CaptureConfig) -> Result<Box<dyn FrameSource>> {
    if config.test_pattern {
        log::info!(
            "test pattern {} {}x{}",
            config.encoding,
            config.width,
            config.height
        );
        let pattern = TestPattern::new(config.encoding, config.width, config.height)?;
        return Ok(Box::new(pattern));
    }

    let dev = Device::with_path(&config.device_path)?;
    log::info!("opened {}", config.device_path.display());
    Ok(Box::new(open_capture(dev, config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::sim::SimDevice;

    #[test]
    fn adjusted_size_is_adopted() {
        let mut dev = SimDevice::webcam().with_adjusted_size(640, 480);
        let caps = probe(&dev).unwrap();
        let fmt = configure(&mut dev, &caps, Encoding::Luma, 300, 200).unwrap();
        assert_eq!((fmt.width, fmt.height), (640, 480));
        assert_eq!(dev.crop_resets(), 1);
    }

    #[test]
    fn unadvertised_size_is_still_requested() {
        let mut dev = SimDevice::webcam();
        let caps = probe(&dev).unwrap();
        assert!(!caps.offers_size(Encoding::Yuv422, 352, 288));

        let fmt = configure(&mut dev, &caps, Encoding::Yuv422, 352, 288).unwrap();
        assert_eq!((fmt.width, fmt.height), (352, 288));
    }

    #[test]
    fn rejected_format_is_reported() {
        let mut dev = SimDevice::webcam().with_format_rejected();
        let caps = probe(&dev).unwrap();
        let err = configure(&mut dev, &caps, Encoding::Rgb, 320, 240).unwrap_err();
        assert!(matches!(
            err,
            Error::Format {
                encoding: Encoding::Rgb,
                ..
            }
        ));
    }

    #[test]
    fn missing_device_fails_to_open() {
        let config = CaptureConfig {
            device_path: "/nonexistent/video9".into(),
            ..Default::default()
        };
        assert!(matches!(open(&config), Err(Error::Open { .. })));
    }

    #[test]
    fn regular_file_is_not_a_device() {
        let config = CaptureConfig {
            device_path: "/proc/self/status".into(),
            ..Default::default()
        };
        assert!(matches!(open(&config), Err(Error::NotCharDevice(_))));
    }
}
