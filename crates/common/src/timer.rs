use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use std::time::{Duration, Instant};

/// Wall-clock frame timer.
///
/// One writer calls [`FrameTimer::update`] once per frame; any number of readers
/// may query the delta, frame rate and running total concurrently. The lock is
/// a `RwLock` so readers never block each other.
#[derive(Debug)]
pub struct FrameTimer {
    state: RwLock<TimerState>,
}

#[derive(Debug, Clone, Copy)]
struct TimerState {
    last: Instant,
    elapsed: Duration,
    total: f32,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a timer whose first frame starts at `start`.
    pub fn starting_at(start: Instant) -> Self {
        Self {
            state: RwLock::new(TimerState {
                last: start,
                elapsed: Duration::ZERO,
                total: 0.0,
            }),
        }
    }

    /// Close the current frame at the present instant.
    pub fn update(&self) {
        self.update_at(Instant::now());
    }

    /// Close the current frame at `now`. Instants earlier than the previous
    /// update produce a zero delta.
    pub fn update_at(&self, now: Instant) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.elapsed = now.saturating_duration_since(state.last);
        state.last = now;
        state.total += state.elapsed.as_secs_f32();
    }

    /// Seconds between the last two updates.
    pub fn elapsed_time(&self) -> f32 {
        self.read().elapsed.as_secs_f32()
    }

    /// Frames per second derived from the last delta. Infinite before the
    /// first non-zero delta.
    pub fn per_second(&self) -> f32 {
        1.0 / self.elapsed_time()
    }

    /// Seconds accumulated over all updates.
    pub fn total(&self) -> f32 {
        self.read().total
    }

    fn read(&self) -> RwLockReadGuard<'_, TimerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}
