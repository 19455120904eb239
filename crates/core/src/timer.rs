//! Frame timing statistics.

use std::time::{Duration, Instant};

/// Collects how long each frame took on the CPU side.
///
/// Call [`begin_frame`](Self::begin_frame) and [`end_frame`](Self::end_frame)
/// around each frame; the timer keeps count, total, min and max.
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    frame_start: Option<Instant>,
    frames: u32,
    total: Duration,
    min: Duration,
    max: Duration,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frame_start: None,
            frames: 0,
            total: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
        }
    }

    pub fn begin_frame(&mut self) {
        self.frame_start = Some(Instant::now());
    }

    /// Ends the current frame and returns its duration.
    ///
    /// Without a matching `begin_frame` nothing is recorded.
    pub fn end_frame(&mut self) -> Option<Duration> {
        let frame_time = self.frame_start.take()?.elapsed();
        self.record(frame_time);
        Some(frame_time)
    }

    /// Adds a measured frame time.
    pub fn record(&mut self, frame_time: Duration) {
        self.frames += 1;
        self.total += frame_time;
        self.min = self.min.min(frame_time);
        self.max = self.max.max(frame_time);
    }

    #[inline]
    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn average(&self) -> Duration {
        if self.frames == 0 {
            return Duration::ZERO;
        }
        self.total / self.frames
    }

    pub fn min(&self) -> Duration {
        if self.frames == 0 {
            return Duration::ZERO;
        }
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Wall time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_timer() {
        let timer = FrameTimer::new();
        assert_eq!(timer.frames(), 0);
        assert_eq!(timer.average(), Duration::ZERO);
        assert_eq!(timer.min(), Duration::ZERO);
        assert_eq!(timer.max(), Duration::ZERO);
    }

    #[test]
    fn test_recorded_statistics() {
        let mut timer = FrameTimer::new();
        timer.record(Duration::from_millis(4));
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(7));

        assert_eq!(timer.frames(), 3);
        assert_eq!(timer.min(), Duration::from_millis(4));
        assert_eq!(timer.max(), Duration::from_millis(10));
        assert_eq!(timer.average(), Duration::from_millis(7));
    }

    #[test]
    fn test_end_without_begin_is_ignored() {
        let mut timer = FrameTimer::new();
        assert_eq!(timer.end_frame(), None);
        assert_eq!(timer.frames(), 0);

        timer.begin_frame();
        assert!(timer.end_frame().is_some());
        assert_eq!(timer.frames(), 1);
        assert_eq!(timer.end_frame(), None);
    }
}
