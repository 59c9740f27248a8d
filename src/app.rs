//! Event loop state shared by the window callbacks.
//!
//! A windowing toolkit calls back into the application on key presses, menu selections and
//! whenever it is idle. [`Context`] holds everything those callbacks need and is handed to
//! them explicitly through the [`Handler`] trait.

use std::fmt;

use crate::buffer::Metadata;
use crate::error::Result;
use crate::fps::FpsCounter;
use crate::source::FrameSource;

/// Escape
pub const KEY_ESCAPE: u8 = 27;
/// Toggles image processing
pub const KEY_TOGGLE: u8 = b't';
/// Space, which only forces a redraw
pub const KEY_SPACE: u8 = b' ';

/// How frames are shown
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ColorMode {
    #[default]
    Color,
    Greyscale,
}

/// Image processing applied before display
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Processing {
    #[default]
    Passthru,
    /// Laplacian edge filter in the fragment shader
    ShaderLaplacian,
    /// Laplacian edge filter as a convolution pass
    ConvolutionLaplacian,
}

impl fmt::Display for Processing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Processing::Passthru => "passthru",
            Processing::ShaderLaplacian => "shader laplacian",
            Processing::ConvolutionLaplacian => "convolution laplacian",
        };
        write!(f, "{}", name)
    }
}

/// Entries of the window's popup menu
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MenuItem {
    Exit,
    DisplayGreyscale,
    DisplayColor,
    PassthruProcessing,
    ShaderLaplacian,
    ConvolutionLaplacian,
    ToggleHistogram,
}

impl MenuItem {
    pub const ALL: [MenuItem; 7] = [
        MenuItem::Exit,
        MenuItem::DisplayGreyscale,
        MenuItem::DisplayColor,
        MenuItem::PassthruProcessing,
        MenuItem::ShaderLaplacian,
        MenuItem::ConvolutionLaplacian,
        MenuItem::ToggleHistogram,
    ];

    /// Menu entry registered under `id`, as toolkits report selections by number.
    pub fn from_id(id: i32) -> Option<Self> {
        usize::try_from(id).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// Text shown in the menu
    pub fn label(self) -> &'static str {
        match self {
            MenuItem::Exit => "Exit",
            MenuItem::DisplayGreyscale => "Display greyscale",
            MenuItem::DisplayColor => "Display color",
            MenuItem::PassthruProcessing => "Passthru",
            MenuItem::ShaderLaplacian => "Laplacian (shader)",
            MenuItem::ConvolutionLaplacian => "Laplacian (convolution)",
            MenuItem::ToggleHistogram => "Toggle histogram",
        }
    }
}

/// What the renderer should currently do with frames
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct View {
    pub color: ColorMode,
    pub processing: Processing,
    /// Whether processing is applied at all, toggled from the keyboard
    pub process: bool,
    pub histogram: bool,
}

impl Default for View {
    fn default() -> Self {
        View {
            color: ColorMode::Color,
            processing: Processing::Passthru,
            process: true,
            histogram: false,
        }
    }
}

/// Tells the event loop whether to keep going
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Summary of a frame handed to the renderer
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    /// Buffer or pattern slot the frame came from
    pub index: usize,
    pub len: usize,
    pub meta: Metadata,
}

/// Callbacks a windowing toolkit drives.
pub trait Handler {
    /// A key was pressed.
    fn key(&mut self, key: u8) -> Flow;

    /// A menu entry was selected.
    fn menu(&mut self, item: MenuItem) -> Flow;

    /// Nothing else to do: fetch a frame if one is ready.
    ///
    /// Returns the frame that should be drawn, if any.
    fn idle(&mut self) -> Result<Option<FrameInfo>>;
}

/// The application state behind the window
pub struct Context<S: FrameSource> {
    source: S,
    view: View,
    display_fps: FpsCounter,
    frames: u64,
    exit: bool,
}

impl<S: FrameSource> Context<S> {
    pub fn new(source: S) -> Self {
        Context {
            source,
            view: View::default(),
            display_fps: FpsCounter::new(),
            frames: 0,
            exit: false,
        }
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Frames drawn so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Whether an exit was requested
    pub fn exiting(&self) -> bool {
        self.exit
    }

    /// Rate at which frames were drawn
    pub fn display_fps(&self) -> f32 {
        self.display_fps.fps()
    }

    /// Frame rate line drawn in the corner of the window
    pub fn fps_overlay(&self) -> String {
        format!(
            "FPS capture/display: {:.3}/{:.3}",
            self.source.fps(),
            self.display_fps()
        )
    }

    fn exit(&mut self) -> Flow {
        self.exit = true;
        Flow::Exit
    }
}

impl<S: FrameSource> Handler for Context<S> {
    fn key(&mut self, key: u8) -> Flow {
        match key {
            KEY_ESCAPE => return self.exit(),
            KEY_TOGGLE => {
                self.view.process = !self.view.process;
                log::debug!("processing {}", if self.view.process { "on" } else { "off" });
            }
            KEY_SPACE => {}
            _ => log::warn!("ignoring unassigned key {} (known keys: Escape exits)", key),
        }
        Flow::Continue
    }

    fn menu(&mut self, item: MenuItem) -> Flow {
        match item {
            MenuItem::Exit => return self.exit(),
            MenuItem::DisplayGreyscale => self.view.color = ColorMode::Greyscale,
            MenuItem::DisplayColor => self.view.color = ColorMode::Color,
            MenuItem::PassthruProcessing => self.view.processing = Processing::Passthru,
            MenuItem::ShaderLaplacian => self.view.processing = Processing::ShaderLaplacian,
            MenuItem::ConvolutionLaplacian => {
                self.view.processing = Processing::ConvolutionLaplacian
            }
            MenuItem::ToggleHistogram => self.view.histogram = !self.view.histogram,
        }
        log::debug!("{:?} selected", item);
        Flow::Continue
    }

    fn idle(&mut self) -> Result<Option<FrameInfo>> {
        if self.exit {
            return Ok(None);
        }

        let Some(frame) = self.source.next_frame()? else {
            return Ok(None);
        };
        let info = FrameInfo {
            index: frame.index,
            len: frame.len(),
            meta: frame.meta,
        };

        self.frames += 1;
        self.display_fps.record_now();
        Ok(Some(info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Encoding;
    use crate::source::TestPattern;

    fn context() -> Context<TestPattern> {
        Context::new(TestPattern::with_frames(Encoding::Luma, 16, 8, 3).unwrap())
    }

    #[test]
    fn keys() {
        let mut ctx = context();
        assert_eq!(ctx.key(KEY_SPACE), Flow::Continue);
        assert_eq!(ctx.key(b'x'), Flow::Continue);

        assert!(ctx.view().process);
        ctx.key(KEY_TOGGLE);
        assert!(!ctx.view().process);
        ctx.key(KEY_TOGGLE);
        assert!(ctx.view().process);

        assert!(!ctx.exiting());
        assert_eq!(ctx.key(KEY_ESCAPE), Flow::Exit);
        assert!(ctx.exiting());
    }

    #[test]
    fn menu() {
        let mut ctx = context();
        ctx.menu(MenuItem::DisplayGreyscale);
        assert_eq!(ctx.view().color, ColorMode::Greyscale);
        ctx.menu(MenuItem::DisplayColor);
        assert_eq!(ctx.view().color, ColorMode::Color);

        ctx.menu(MenuItem::ConvolutionLaplacian);
        assert_eq!(ctx.view().processing, Processing::ConvolutionLaplacian);
        ctx.menu(MenuItem::ShaderLaplacian);
        assert_eq!(ctx.view().processing, Processing::ShaderLaplacian);
        ctx.menu(MenuItem::PassthruProcessing);
        assert_eq!(ctx.view().processing, Processing::Passthru);

        ctx.menu(MenuItem::ToggleHistogram);
        assert!(ctx.view().histogram);

        assert_eq!(ctx.menu(MenuItem::Exit), Flow::Exit);
    }

    #[test]
    fn menu_ids() {
        assert_eq!(MenuItem::from_id(0), Some(MenuItem::Exit));
        assert_eq!(MenuItem::from_id(6), Some(MenuItem::ToggleHistogram));
        assert_eq!(MenuItem::from_id(7), None);
        assert_eq!(MenuItem::from_id(-1), None);
    }

    #[test]
    fn idle_draws_frames_until_exit() {
        let mut ctx = context();
        let first = ctx.idle().unwrap().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.len, 16 * 8);
        assert_eq!(ctx.idle().unwrap().unwrap().meta.sequence, 1);
        assert_eq!(ctx.frames(), 2);

        ctx.key(KEY_ESCAPE);
        assert_eq!(ctx.idle().unwrap(), None);
        assert_eq!(ctx.frames(), 2);
    }

    #[test]
    fn overlay() {
        let ctx = context();
        assert_eq!(ctx.fps_overlay(), "FPS capture/display: 0.000/0.000");
    }
}
