use flyby_common::FrameTimer;
use std::collections::VecDeque;
use std::fmt;

/// Numbers shown by the fps overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub fps: f32,
    /// Milliseconds.
    pub frame_time: f32,
}

impl FrameStats {
    pub fn from_frame_time(seconds: f32) -> Self {
        if seconds <= 0.0 {
            return Self {
                fps: 0.0,
                frame_time: 0.0,
            };
        }
        Self {
            fps: 1.0 / seconds,
            frame_time: seconds * 1000.0,
        }
    }
}

impl fmt::Display for FrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fps: {:.1} | frame time: {:.3}", self.fps, self.frame_time)
    }
}

/// Averages frame times over a sliding window so the overlay does not flicker.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    samples: VecDeque<f32>,
    window: usize,
    sum: f32,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new(120)
    }
}

impl FpsCounter {
    pub fn new(window: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(window),
            window: window.max(1),
            sum: 0.0,
        }
    }

    pub fn push(&mut self, seconds: f32) {
        if self.samples.len() == self.window {
            let oldest = self.samples.pop_front().unwrap_or_default();
            self.sum -= oldest;
        }
        self.samples.push_back(seconds);
        self.sum += seconds;
    }

    /// Record the timer's last delta.
    pub fn sample(&mut self, timer: &FrameTimer) {
        self.push(timer.elapsed_time());
    }

    pub fn stats(&self) -> FrameStats {
        if self.samples.is_empty() {
            return FrameStats::from_frame_time(0.0);
        }
        FrameStats::from_frame_time(self.sum / self.samples.len() as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn overlay_text() {
        let stats = FrameStats::from_frame_time(0.02);
        assert_eq!(stats.to_string(), "fps: 50.0 | frame time: 20.000");
    }

    #[test]
    fn zero_delta_is_not_infinite() {
        assert_eq!(FrameStats::from_frame_time(0.0).fps, 0.0);
        assert_eq!(FpsCounter::default().stats().fps, 0.0);
    }

    #[test]
    fn window_drops_old_samples() {
        let mut counter = FpsCounter::new(2);
        counter.push(1.0);
        counter.push(0.5);
        counter.push(0.5);
        assert_eq!(counter.stats().fps, 2.0);
    }

    #[test]
    fn samples_the_timer() {
        let start = Instant::now();
        let timer = FrameTimer::starting_at(start);
        timer.update_at(start + Duration::from_millis(25));
        let mut counter = FpsCounter::default();
        counter.sample(&timer);
        assert!((counter.stats().fps - 40.0).abs() < 1e-3);
    }
}
