use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use argh::FromArgs;
use glcam::app::{Context, Handler, MenuItem};
use glcam::config::{CaptureConfig, WindowPreset};
use glcam::source::capture::DEFAULT_TIMEOUT;
use glcam::{Encoding, IoMethod};

/// Captures frames from a Video4Linux camera or a synthetic test pattern
#[derive(Debug, FromArgs)]
struct Args {
    /// camera device path
    #[argh(option, short = 'd', default = "PathBuf::from(\"/dev/video0\")")]
    device: PathBuf,

    /// image width in pixels
    #[argh(option, short = 'w', default = "320")]
    width: u32,

    /// image height in pixels
    #[argh(option, short = 'h', default = "240")]
    height: u32,

    /// pixel encoding: LUMA, YUV420, YUV422 or RGB
    #[argh(option, short = 'e', default = "Encoding::Yuv422")]
    encoding: Encoding,

    /// window size: 0 image size, 1 1280x720, 2 1920x1080
    #[argh(option, short = 'D', default = "0")]
    display: u32,

    /// use the test pattern instead of a camera
    #[argh(switch, short = 't')]
    test_pattern: bool,

    /// io method: read, mmap or userptr (default: best the device offers)
    #[argh(option, short = 'm')]
    method: Option<IoMethod>,

    /// stop after this many frames
    #[argh(option, short = 'n')]
    frames: Option<u64>,

    /// how long to wait for a frame, in milliseconds (default: a fifteenth of a second)
    #[argh(option)]
    timeout_ms: Option<u64>,
}

impl From<Args> for CaptureConfig {
    fn from(args: Args) -> Self {
        CaptureConfig {
            device_path: args.device,
            width: args.width,
            height: args.height,
            encoding: args.encoding,
            method: args.method,
            test_pattern: args.test_pattern,
            window: WindowPreset::from_index(args.display),
            timeout: args
                .timeout_ms
                .map_or(DEFAULT_TIMEOUT, Duration::from_millis),
        }
    }
}

/// Frames between two frame rate reports
const REPORT_EVERY: u64 = 150;

/// Popup menu entries in the order their ids are assigned
fn menu_entries() -> String {
    MenuItem::ALL
        .iter()
        .enumerate()
        .map(|(id, item)| format!("{}: {}", id, item.label()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn run(args: Args) -> glcam::Result<()> {
    let limit = args.frames;
    let config = CaptureConfig::from(args);
    let (win_w, win_h) = config.window_dimensions();
    log::info!("window {}x{}", win_w, win_h);
    log::info!("menu: {}", menu_entries());

    let mut ctx = Context::new(glcam::session::open(&config)?);

    while !ctx.exiting() && limit.map_or(true, |n| ctx.frames() < n) {
        let Some(frame) = ctx.idle()? else {
            continue;
        };
        log::trace!(
            "frame {} from buffer {}: {} bytes",
            frame.meta.sequence,
            frame.index,
            frame.len
        );
        if ctx.frames() % REPORT_EVERY == 0 {
            log::info!("{}", ctx.fps_overlay());
        }
    }

    log::info!("{} frames, {}", ctx.frames(), ctx.fps_overlay());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Args = argh::from_env();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_fatal() {
                eprintln!("setup failed: {}", e);
            } else {
                eprintln!("capture failed: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_and_defaults() {
        let args = Args::from_args(&["glcam"], &["-m", "userptr", "-h", "480"]).unwrap();
        assert_eq!(args.method, Some(IoMethod::UserPointer));
        assert_eq!(args.height, 480);

        let config = CaptureConfig::from(args);
        assert_eq!(config.width, 320);
        assert_eq!(config.encoding, Encoding::Yuv422);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(Args::from_args(&["glcam"], &["-m", "dma"]).is_err());
    }

    #[test]
    fn menu_lists_every_entry_by_id() {
        let menu = menu_entries();
        assert!(menu.starts_with("0: Exit, 1: Display greyscale"));
        assert!(menu.ends_with("6: Toggle histogram"));
    }
}
