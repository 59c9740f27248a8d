use std::time::{Duration, Instant};

/// Length of the window the rate is averaged over.
pub const WINDOW: Duration = Duration::from_secs(5);

/// A frame rate meter averaging over fixed windows.
///
/// The first recorded frame starts the clock. Every frame after it is counted, and once a
/// full window has elapsed the rate is published and counting starts over.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use glcam::fps::FpsCounter;
///
/// let mut fps = FpsCounter::new();
/// for frame in 0..=150u32 {
///     fps.record(Duration::from_millis(100) * frame / 3);
/// }
/// assert!((fps.fps() - 30.0).abs() < 0.1);
/// ```
#[derive(Debug)]
pub struct FpsCounter {
    base: Instant,
    reference: Option<Duration>,
    frames: u32,
    windows: u32,
    fps: f32,
}

impl FpsCounter {
    /// Creates a new `FpsCounter`.
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            reference: None,
            frames: 0,
            windows: 0,
            fps: 0.0,
        }
    }

    /// Returns the rate of the last completed window, zero before the first one.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Number of windows completed so far
    pub fn windows(&self) -> u32 {
        self.windows
    }

    /// Counts a frame that arrived at `now`, measured on any monotonic clock.
    pub fn record(&mut self, now: Duration) {
        let Some(reference) = self.reference else {
            self.reference = Some(now);
            return;
        };

        self.frames += 1;
        let elapsed = now.saturating_sub(reference);
        if elapsed >= WINDOW {
            self.fps = self.frames as f32 / elapsed.as_secs_f32();
            log::debug!("{:.1} fps over {} frames", self.fps, self.frames);
            self.reference = Some(now);
            self.frames = 0;
            self.windows += 1;
        }
    }

    /// Counts a frame that arrived just now.
    pub fn record_now(&mut self) {
        self.record(self.base.elapsed());
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn even_30hz_reads_30() {
        let mut counter = FpsCounter::new();

        // ten seconds of frames
        for k in 0..=300u32 {
            counter.record(Duration::from_secs_f64(k as f64 / 30.0));
            if k == 149 {
                assert_eq!(counter.windows(), 0);
            }
            if k == 150 || k == 300 {
                assert_relative_eq!(counter.fps(), 30.0, epsilon = 1e-3);
            }
        }
        assert_eq!(counter.windows(), 2);
    }

    #[test]
    fn nothing_before_first_window() {
        let mut counter = FpsCounter::new();
        for k in 0..100u32 {
            counter.record(Duration::from_millis(10) * k);
        }
        assert_eq!(counter.fps(), 0.0);
    }
}
