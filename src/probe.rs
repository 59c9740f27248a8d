use std::fmt;

use crate::capability::{self, Capabilities};
use crate::control;
use crate::device::Driver;
use crate::error::{Error, Result};
use crate::format::{Description, Encoding};
use crate::framesize::FrameSize;

/// What a device can do, discovered once when a session is set up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Identification and capability flags
    pub info: Capabilities,

    pub luma: bool,
    pub yuv420: bool,
    pub yuv422: bool,
    pub rgb: bool,

    /// Enabled controls, empty when the driver does not report any
    pub controls: Vec<control::Description>,

    /// Every format the driver enumerated, recognized or not
    pub formats: Vec<Description>,
    /// Frame sizes advertised for the recognized formats
    pub framesizes: Vec<FrameSize>,
}

impl DeviceCapabilities {
    pub fn flags(&self) -> capability::Flags {
        self.info.capabilities
    }

    pub fn supports(&self, encoding: Encoding) -> bool {
        match encoding {
            Encoding::Luma => self.luma,
            Encoding::Yuv420 => self.yuv420,
            Encoding::Yuv422 => self.yuv422,
            Encoding::Rgb => self.rgb,
        }
    }

    /// Encodings the device accepts, in command line token order
    pub fn encodings(&self) -> impl Iterator<Item = Encoding> + '_ {
        Encoding::ALL.into_iter().filter(|enc| self.supports(*enc))
    }

    /// Whether the device advertises a frame size of `width`x`height` for `encoding`
    ///
    /// Devices that list no frame sizes at all are taken to accept any.
    pub fn offers_size(&self, encoding: Encoding, width: u32, height: u32) -> bool {
        let fourcc = encoding.fourcc();
        let mut sizes = self
            .framesizes
            .iter()
            .filter(|size| size.fourcc == fourcc)
            .peekable();
        sizes.peek().is_none() || sizes.any(|size| size.size.fits(width, height))
    }

    /// Fails unless at least one of the four encodings is available.
    pub fn ensure_usable(&self) -> Result<()> {
        if self.encodings().next().is_some() {
            return Ok(());
        }

        let offered = self
            .formats
            .iter()
            .map(|desc| desc.fourcc.to_string())
            .collect::<Vec<_>>();
        Err(Error::UnsupportedDevice {
            offered: if offered.is_empty() {
                "no formats".to_string()
            } else {
                offered.join(", ")
            },
        })
    }

    fn mark(&mut self, encoding: Encoding) {
        match encoding {
            Encoding::Luma => self.luma = true,
            Encoding::Yuv420 => self.yuv420 = true,
            Encoding::Yuv422 => self.yuv422 = true,
            Encoding::Rgb => self.rgb = true,
        }
    }
}

impl fmt::Display for DeviceCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info)?;
        write!(f, "Encodings   :")?;
        for enc in self.encodings() {
            write!(f, " {}", enc)?;
        }
        writeln!(f)
    }
}

/// Queries capabilities, pixel formats and frame sizes of a device
pub fn probe<D: Driver>(dev: &D) -> Result<DeviceCapabilities> {
    let info = dev.query_caps().map_err(Error::DeviceQuery)?;
    log::info!(
        "{} ({}) at {}, driver version {}.{}.{}",
        info.card,
        info.driver,
        info.bus,
        info.version.0,
        info.version.1,
        info.version.2
    );
    log::info!("capabilities: {}", info.capabilities);

    let mut caps = DeviceCapabilities {
        info,
        luma: false,
        yuv420: false,
        yuv422: false,
        rgb: false,
        controls: Vec::new(),
        formats: Vec::new(),
        framesizes: Vec::new(),
    };

    caps.controls = match dev.query_controls() {
        Ok(controls) => controls,
        Err(e) => {
            log::warn!("control enumeration failed: {}", e);
            Vec::new()
        }
    };
    if !caps.controls.is_empty() {
        log::info!("device has the following controls available:");
    }
    for ctrl in &caps.controls {
        log::info!("  {}", ctrl);
    }

    caps.formats = match dev.enum_formats() {
        Ok(formats) => formats,
        Err(e) => {
            log::warn!("format enumeration failed: {}", e);
            Vec::new()
        }
    };

    for desc in caps.formats.clone() {
        let Some(encoding) = desc.encoding() else {
            log::debug!("ignoring format {}", desc);
            continue;
        };
        log::info!("supported format {}", desc);
        caps.mark(encoding);

        match dev.enum_framesizes(desc.fourcc) {
            Ok(sizes) => {
                for size in &sizes {
                    log::debug!("  {}: {}", encoding, size);
                }
                caps.framesizes.extend(sizes);
            }
            Err(e) => log::debug!("frame sizes of {} unavailable: {}", desc.fourcc, e),
        }
    }

    let tokens: Vec<&str> = caps.encodings().map(Encoding::token).collect();
    log::info!("accepted encodings (-e): {}", tokens.join(" "));

    Ok(caps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::sim::SimDevice;

    #[test]
    fn probe_marks_offered_encodings() {
        let dev = SimDevice::new(
            capability::Flags::STREAMING,
            &[Encoding::Yuv422, Encoding::Luma],
        );
        let caps = probe(&dev).unwrap();

        assert!(caps.supports(Encoding::Luma));
        assert!(caps.supports(Encoding::Yuv422));
        assert!(!caps.supports(Encoding::Rgb));
        assert_eq!(
            caps.encodings().collect::<Vec<_>>(),
            vec![Encoding::Luma, Encoding::Yuv422]
        );
        assert_eq!(caps.framesizes.len(), 4);
        assert!(caps.ensure_usable().is_ok());
    }

    #[test]
    fn probe_lists_controls() {
        let caps = probe(&SimDevice::webcam()).unwrap();
        let names: Vec<&str> = caps.controls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Brightness", "Power Line Frequency"]);

        let power_line = &caps.controls[1];
        assert_eq!(power_line.typ, control::Type::Menu);
        assert_eq!(
            power_line.to_string(),
            "Power Line Frequency (Menu): 0=Disabled, 1=50 Hz, 2=60 Hz"
        );
    }

    #[test]
    fn missing_controls_do_not_fail_probe() {
        let caps = probe(&SimDevice::webcam().without_controls()).unwrap();
        assert!(caps.controls.is_empty());
        assert!(caps.supports(Encoding::Rgb));
    }

    #[test]
    fn advertised_sizes() {
        let caps = probe(&SimDevice::webcam()).unwrap();
        assert!(caps.offers_size(Encoding::Rgb, 640, 480));
        assert!(!caps.offers_size(Encoding::Rgb, 800, 600));

        let mut bare = caps.clone();
        bare.framesizes.clear();
        assert!(bare.offers_size(Encoding::Rgb, 800, 600));
    }

    #[test]
    fn device_without_known_encodings_is_unusable() {
        let dev = SimDevice::new(capability::Flags::STREAMING, &[]);
        let caps = probe(&dev).unwrap();
        assert!(matches!(
            caps.ensure_usable(),
            Err(Error::UnsupportedDevice { .. })
        ));
    }
}
